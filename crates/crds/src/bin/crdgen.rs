//! Prints the ShootOps CRD manifests as a multi-document YAML stream.

use crds::{BackupInfrastructure, ComponentRelease, Shoot};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    for crd in [
        Shoot::crd(),
        BackupInfrastructure::crd(),
        ComponentRelease::crd(),
    ] {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
