//! Container management module
//!
//! Turns service descriptors into engine calls: creation specs, the
//! run/stop/port lifecycle and detached post-start commands.

pub mod config;
pub mod decommission;
pub mod handle;
pub mod lifecycle;
pub mod ports;
pub mod post_start;

pub use config::{CreationSpec, HostBinding, PortMap, RestartPolicy, VolumeMount};
pub use handle::{Deployment, PortReport, RunningContainer};
pub use lifecycle::LifecycleController;
pub use post_start::{collect_reports, PostStartOptions, PostStartReport};
