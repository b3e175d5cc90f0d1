//! ShootOps CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the ShootOps controllers.

pub mod backup_infrastructure;
pub mod component_release;
pub mod constants;
pub mod operation;
pub mod shoot;

pub use backup_infrastructure::*;
pub use component_release::*;
pub use constants::*;
pub use operation::*;
pub use shoot::*;
