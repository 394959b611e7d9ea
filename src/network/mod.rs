//! Network management module
//!
//! Makes sure named networks exist and attaches containers to them.

pub mod binder;

pub use binder::ensure_attached;
