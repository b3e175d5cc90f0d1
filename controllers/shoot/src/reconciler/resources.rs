//! Resource tier calculator for the kube-apiserver.
//!
//! Maps the maximum node count of a shoot to fixed request/limit pairs.

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// CPU and memory requests/limits of one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTier {
    /// CPU request
    pub cpu_request: &'static str,
    /// Memory request
    pub memory_request: &'static str,
    /// CPU limit
    pub cpu_limit: &'static str,
    /// Memory limit
    pub memory_limit: &'static str,
}

const HVPA_CPU_LIMIT: &str = "8";
const HVPA_MEMORY_LIMIT: &str = "16000M";

/// Tier for `node_count` nodes. Upper bounds are inclusive.
///
/// With vertical autoscaling the limits become a fixed ceiling, the
/// autoscaler right-sizes the requests.
pub fn tier(node_count: u32, hvpa_enabled: bool) -> ResourceTier {
    let base = match node_count {
        0..=2 => ResourceTier {
            cpu_request: "800m",
            memory_request: "800Mi",
            cpu_limit: "1000m",
            memory_limit: "1200Mi",
        },
        3..=10 => ResourceTier {
            cpu_request: "1000m",
            memory_request: "1100Mi",
            cpu_limit: "1200m",
            memory_limit: "1900Mi",
        },
        11..=50 => ResourceTier {
            cpu_request: "1200m",
            memory_request: "1600Mi",
            cpu_limit: "1500m",
            memory_limit: "3900Mi",
        },
        51..=100 => ResourceTier {
            cpu_request: "2500m",
            memory_request: "5200Mi",
            cpu_limit: "3000m",
            memory_limit: "5900Mi",
        },
        _ => ResourceTier {
            cpu_request: "3000m",
            memory_request: "5200Mi",
            cpu_limit: "4000m",
            memory_limit: "7800Mi",
        },
    };

    if hvpa_enabled {
        ResourceTier {
            cpu_limit: HVPA_CPU_LIMIT,
            memory_limit: HVPA_MEMORY_LIMIT,
            ..base
        }
    } else {
        base
    }
}

impl ResourceTier {
    /// Container resource requirements of this tier
    pub fn into_requirements(self) -> ResourceRequirements {
        let pair = |cpu: &str, memory: &str| {
            BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ])
        };
        ResourceRequirements {
            requests: Some(pair(self.cpu_request, self.memory_request)),
            limits: Some(pair(self.cpu_limit, self.memory_limit)),
            ..ResourceRequirements::default()
        }
    }
}
