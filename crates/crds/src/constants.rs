//! Well-known names shared between the CRDs and the controllers.

/// API group of all ShootOps custom resources
pub const API_GROUP: &str = "shootops.microscaler.io";

/// Annotation used as the operation command channel on a Shoot
pub const OPERATION_ANNOTATION: &str = "shoot.shootops.microscaler.io/operation";

/// Annotation holding the purpose of a Shoot (evaluation, development, production, ...)
pub const PURPOSE_ANNOTATION: &str = "shootops.microscaler.io/purpose";

/// Annotation that makes the controller skip a Shoot (only honoured when sync period overwrites are respected)
pub const IGNORE_ANNOTATION: &str = "shoot.shootops.microscaler.io/ignore";

/// Annotation overriding the resync period of a Shoot (Go-style duration, e.g. "30m")
pub const SYNC_PERIOD_ANNOTATION: &str = "shoot.shootops.microscaler.io/sync-period";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "shoot-controller";

/// Namespace whose shoots always have their ignore / sync-period annotations honoured
pub const SYSTEM_NAMESPACE: &str = "garden";
