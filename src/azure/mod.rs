//! Azure Resource Manager plumbing: authentication, the REST client,
//! long running operations, resource IDs and the service payloads.

pub mod auth;
pub mod client;
pub mod digitaltwins;
pub mod error;
pub mod eventhub;
pub mod id;
pub mod identity;
pub(crate) mod lro;

pub use auth::Credential;
pub use client::{ArmClient, ArmResponse};
pub use error::ArmError;
