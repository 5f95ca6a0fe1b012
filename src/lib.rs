//! ServiceNow Table API client
//!
//! Authenticates with OAuth2 password and refresh grants, caches the token
//! in a pluggable store and exposes table CRUD with encoded queries.
//!
//! ```no_run
//! use std::sync::Arc;
//! use servicenow_client::{Config, FileStore, ServiceNowClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?.with_env_overrides();
//! let client = ServiceNowClient::new(config, Arc::new(FileStore::open_default()?))?;
//! client.initialize("dev12345", "admin", "secret").await?;
//!
//! let mut incidents = client.table("incident");
//! incidents.add_query("active", "true").order_by("number");
//! let outcome = incidents.query().await?;
//! println!("{}", outcome.to_legacy());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use api::{legacy_result, Outcome, QueryEncoder, ServiceNowClient, Table, TransportFailure};
pub use auth::{TokenManager, TokenRecord, TokenState};
pub use config::Config;
pub use error::{AuthFailure, Error, Grant, Result};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
