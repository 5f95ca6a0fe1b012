//! API client module for the ServiceNow Table API

pub mod client;
pub mod query;
pub mod response;
pub mod table;

pub use client::ServiceNowClient;
pub use query::{Predicate, QueryEncoder};
pub use response::{legacy_result, Outcome, TransportFailure};
pub use table::Table;
