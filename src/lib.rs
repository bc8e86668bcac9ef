//! Hemmer provider for Azure Digital Twins and Event Hubs.
//!
//! The provider runs as a Hemmer plugin: Hemmer spawns the binary, reads the
//! handshake line from stdout and talks to it over gRPC. Every resource
//! operation becomes one or more calls against Azure Resource Manager.
//!
//! # Overview
//!
//! - [`provider::AzureRmProvider`] implements [`ProviderService`] and routes
//!   calls to the [`resources`] and [`data_sources`] by type name
//! - [`azure`] is the ARM client: token acquisition, JSON requests,
//!   long running operation polling, resource IDs and payload types
//! - [`schema`], [`validation`] and [`plan`] describe configuration, check it
//!   and compute plans from the schemas
//! - [`server`] hosts the gRPC service and the handshake
//!
//! # Handshake Protocol
//!
//! On start the binary binds an ephemeral localhost port and prints:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Logs go to stderr.
//!
//! # Resources
//!
//! - `azurerm_digital_twins_instance`
//! - `azurerm_digital_twins_endpoint_eventhub`
//! - `azurerm_eventhub_namespace`
//! - `azurerm_eventhub`
//! - `azurerm_eventhub_consumer_group`
//! - `azurerm_eventhub_namespace_authorization_rule`
//! - `azurerm_eventhub_authorization_rule`
//! - `azurerm_eventhub_namespace_disaster_recovery_config`
//! - `azurerm_eventhub_namespace_schema_group`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod azure;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod locks;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use config::ProviderConfig;
pub use error::{ErrorContext, ProviderError};
pub use logging::{init_logging, init_logging_with_default};
pub use provider::AzureRmProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, DiffVerdict, ImportedResource, PlanResult, ProviderMetadata, Timeouts,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
