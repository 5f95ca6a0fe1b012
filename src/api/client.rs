//! Authenticated HTTP client for the instance REST APIs
//!
//! Wraps reqwest::Client with bearer-token injection from the token manager.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use super::response::{Outcome, TransportFailure};
use super::table::Table;
use crate::auth::{TokenManager, TokenRecord};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::KeyValueStore;

const JSON: &str = "application/json";

/// Client that resolves a valid token before every data call
#[derive(Clone)]
pub struct ServiceNowClient {
    http: reqwest::Client,
    config: Arc<Config>,
    tokens: Arc<TokenManager>,
}

impl ServiceNowClient {
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let tokens = TokenManager::new(config.clone(), store)?;
        Self::with_token_manager(config, Arc::new(tokens))
    }

    pub fn with_token_manager(config: Config, tokens: Arc<TokenManager>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(format!("{:#}", e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            tokens,
        })
    }

    /// Authenticate once per session; see [`TokenManager::initialize`]
    pub async fn initialize(
        &self,
        instance: &str,
        username: &str,
        password: &str,
    ) -> Result<TokenRecord> {
        self.tokens.initialize(instance, username, password).await
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Accessor for one table on the stored instance
    pub fn table(&self, name: impl Into<String>) -> Table {
        Table::new(self.clone(), name)
    }

    /// `{base}/api/now/table/{table}[/{sys_id}]` for the stored instance
    pub(crate) fn table_url(&self, table: &str, sys_id: Option<&str>) -> Result<String> {
        let instance = self.tokens.instance()?;
        let mut url = format!(
            "{}/api/now/table/{}",
            self.config.instance_base(&instance),
            table
        );
        if let Some(id) = sys_id {
            url.push('/');
            url.push_str(id);
        }
        Ok(url)
    }

    /// Send one request with a valid bearer token.
    ///
    /// Token errors are returned as `Err` before any HTTP call. HTTP errors
    /// are folded into `Outcome::Failed`.
    pub async fn dispatch(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Outcome> {
        let token = self.tokens.get_valid_token().await?;
        tracing::debug!("ServiceNow {} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&token.access_token)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let outcome = match request.send().await {
            Ok(resp) => check_response(resp).await,
            Err(e) => Outcome::Failed(TransportFailure {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                reason: e.to_string(),
                body: None,
            }),
        };

        if let Outcome::Failed(failure) = &outcome {
            tracing::warn!("ServiceNow {} {} failed: {}", method, url, failure);
        }
        Ok(outcome)
    }
}

/// Map an HTTP response onto the uniform outcome shape
async fn check_response(resp: reqwest::Response) -> Outcome {
    let status = resp.status();
    let bytes = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Outcome::Failed(TransportFailure {
                status: status.as_u16(),
                reason: e.to_string(),
                body: None,
            })
        }
    };
    let text = String::from_utf8_lossy(&bytes);

    if !status.is_success() {
        return Outcome::Failed(TransportFailure {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body: (!text.trim().is_empty()).then(|| text.into_owned()),
        });
    }

    if text.trim().is_empty() {
        return Outcome::Empty;
    }

    match serde_json::from_str(&text) {
        Ok(value) => Outcome::Record(value),
        Err(e) => Outcome::Failed(TransportFailure {
            status: status.as_u16(),
            reason: format!("parse error: {}", e),
            body: Some(text.into_owned()),
        }),
    }
}
