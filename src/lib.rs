//! Lanzo - A container service orchestration control plane
//!
//! Lanzo deploys named, pre-declared services onto a Docker-compatible
//! engine, local or remote, on request. It provides:
//!
//! - A static service registry with composite services and dependencies
//! - Idempotent run, stop and port lookup per service
//! - Network attachment and detached post-start commands
//! - Terraform provisioning in throwaway containers
//! - An HTTP API and a CLI over the same operations

pub mod api;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod network;
pub mod provision;
pub mod service;

pub use error::{LanzoError, Result};
