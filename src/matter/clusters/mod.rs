//! Cluster servers hosted by the node.
//!
//! Diagnostics clusters come in a minimal and a fully configurable flavour;
//! [`lifecycle::ServerLifecycle`] picks one per endpoint and keeps it
//! registered with the interaction-model registry.

pub mod faults;
pub mod general_diagnostics;
pub mod lifecycle;
pub mod software_diag;
pub mod time_sync;

// Re-export for convenience
pub use general_diagnostics::{DiagnosticsContext, GeneralDiagnostics};
pub use lifecycle::{ManagedCluster, ServerLifecycle, ServerVariant};
pub use software_diag::SoftwareDiagnostics;
