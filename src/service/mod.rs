//! Service catalogue
//!
//! Static descriptors for every deployable service, loaded once at process
//! start and never mutated afterwards.

pub mod descriptor;
pub mod registry;

pub use descriptor::{CompositeService, ConcreteService, RawDescriptor, ServiceDescriptor};
pub use registry::ServiceRegistry;
