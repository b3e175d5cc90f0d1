//! Derived names and checksums shared by the reconcilers.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

/// Whether a seed namespace uses the `shoot--<project>--<name>` convention.
pub fn is_following_new_naming_convention(seed_namespace: &str) -> bool {
    seed_namespace.split("--").count() > 2
}

/// Name of the legacy BackupInfrastructure record of a shoot.
///
/// `<seed namespace>--<first 5 hex chars of sha1(uid)>`, with a single dash
/// for namespaces created before the naming convention change.
pub fn backup_infrastructure_name(seed_namespace: &str, shoot_uid: &str) -> String {
    let digest = hex(&Sha1::digest(shoot_uid.as_bytes()));
    let short = &digest[..5];
    if is_following_new_naming_convention(seed_namespace) {
        format!("{seed_namespace}--{short}")
    } else {
        format!("{seed_namespace}-{short}")
    }
}

/// Checksum of a secret's data: SHA-256 over the concatenated SHA-256 of each
/// value in key order.
pub fn compute_secret_checksum(data: &BTreeMap<String, Vec<u8>>) -> String {
    let concatenated: String = data.values().map(|v| sha256_hex(v)).collect();
    sha256_hex(concatenated.as_bytes())
}
