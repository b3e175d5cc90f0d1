//! ComponentRelease CRD
//!
//! Declarative release of a control-plane component inside a seed namespace.
//! The values document is opaque to the API server and interpreted by the
//! chart renderer.

use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "shootops.microscaler.io",
    version = "v1alpha1",
    kind = "ComponentRelease",
    namespaced,
    status = "ComponentReleaseStatus",
    printcolumn = r#"{"name":"Component","type":"string","jsonPath":".spec.component"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReleaseSpec {
    /// Chart / component name (etcd, kube-apiserver, kube-controller-manager)
    pub component: String,

    /// Values rendered into the component templates
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReleaseStatus {
    /// Generation of the release that was last rendered
    #[serde(default)]
    pub observed_generation: i64,
}

fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}
