//! Infrastructure provisioning
//!
//! Runs Terraform against a provisioning directory inside throwaway
//! containers on the local engine.

pub mod runner;

pub use runner::{DeployOutput, ProvisionCommand, Provisioner};

/// Image the provisioning commands run in
pub const TERRAFORM_IMAGE: &str = "hashicorp/terraform:light";

/// Mount point of the provisioning directory inside the container
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// Credentials handed to Terraform; they target a local AWS emulator
pub const PROVISION_ENV: &[(&str, &str)] = &[
    ("AWS_ACCESS_KEY_ID", "test"),
    ("AWS_SECRET_ACCESS_KEY", "test"),
    ("AWS_DEFAULT_REGION", "us-east-1"),
];
