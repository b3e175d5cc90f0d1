//! BackupInfrastructure CRD
//!
//! Legacy per-shoot backup record. It points at the snapshot store holding
//! etcd snapshots of a shoot. The controller retires it once the etcd
//! cluster has been migrated to backup-entry based storage.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "shootops.microscaler.io",
    version = "v1alpha1",
    kind = "BackupInfrastructure",
    namespaced,
    status = "BackupInfrastructureStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfrastructureSpec {
    /// Seed the backup bucket belongs to
    pub seed: String,

    /// UID of the shoot owning the backups
    pub shoot_uid: String,

    /// Base URL of the snapshot store
    pub snapstore_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfrastructureStatus {
    /// Generation observed by the backup infrastructure controller
    #[serde(default)]
    pub observed_generation: i64,
}
