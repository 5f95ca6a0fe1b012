//! Token lifecycle: acquisition, validity check and transparent refresh
//!
//! The store is the only place a token lives between calls. Every
//! evaluation re-reads it, so several managers over one store agree on
//! the current token.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::oauth::GrantClient;
use super::tokens::{Clock, SystemClock, TokenRecord, TokenState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{KeyValueStore, StoreError, INSTANCE_KEY, TOKEN_KEY};

pub struct TokenManager {
    grants: GrantClient,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    // Single-flight guard: at most one refresh in flight per manager
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self {
            grants: GrantClient::new(config)?,
            store,
            clock: Arc::new(SystemClock),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Authenticate with the password grant and persist the result.
    ///
    /// Nothing is written unless the grant succeeds. A repeat call replaces
    /// the stored token.
    pub async fn initialize(
        &self,
        instance: &str,
        username: &str,
        password: &str,
    ) -> Result<TokenRecord> {
        require_non_empty("instance", instance)?;
        require_non_empty("username", username)?;
        require_non_empty("password", password)?;

        tracing::info!("Initializing token for {}", instance);

        let _guard = self.refresh_lock.lock().await;
        let granted = self.grants.password(instance, username, password).await?;
        let record = TokenRecord::new(
            granted.access_token,
            granted.refresh_token.unwrap_or_default(),
            granted.expires_in,
            self.clock.now(),
        );

        // Token before instance: a failed token write leaves the previous
        // instance/token pair intact
        let raw = encode_token(&record)?;
        self.store.set(TOKEN_KEY, &raw)?;
        self.store.set(INSTANCE_KEY, instance)?;
        tracing::info!("Token acquired, expires at {}", record.expire_time);
        Ok(record)
    }

    /// Return a usable token, refreshing it first if it has expired.
    pub async fn get_valid_token(&self) -> Result<TokenRecord> {
        match self.token_state()? {
            TokenState::Uninitialized => {
                tracing::debug!("No existing token");
                Err(Error::Uninitialized)
            }
            TokenState::Valid(record) => Ok(record),
            TokenState::Expired(_) => {
                let _guard = self.refresh_lock.lock().await;

                // Another caller may have refreshed while we waited
                match self.token_state()? {
                    TokenState::Uninitialized => Err(Error::Uninitialized),
                    TokenState::Valid(record) => Ok(record),
                    TokenState::Expired(stale) => self.refresh(stale).await,
                }
            }
        }
    }

    /// Current state of the stored token, without side effects
    pub fn token_state(&self) -> Result<TokenState> {
        let record = self.load_token()?;
        let now = self.clock.now();
        let state = TokenState::evaluate(record, now);

        if let TokenState::Valid(record) | TokenState::Expired(record) = &state {
            tracing::debug!(
                "Current time: {}. Token expires: {}. Token is valid: {}",
                now,
                record.expire_time,
                state.is_valid()
            );
        }
        Ok(state)
    }

    pub fn instance(&self) -> Result<String> {
        self.store.get(INSTANCE_KEY)?.ok_or(Error::InstanceMissing)
    }

    async fn refresh(&self, stale: TokenRecord) -> Result<TokenRecord> {
        let instance = self.instance()?;
        tracing::info!("Token expired, refreshing...");

        // On failure the stale record stays so the next call retries
        let granted = self.grants.refresh(&instance, &stale.refresh_token).await?;
        let record = TokenRecord::new(
            granted.access_token,
            granted.refresh_token.unwrap_or(stale.refresh_token),
            granted.expires_in,
            self.clock.now(),
        );

        self.store.set(TOKEN_KEY, &encode_token(&record)?)?;
        tracing::info!("Token refreshed, expires at {}", record.expire_time);
        Ok(record)
    }

    fn load_token(&self) -> Result<Option<TokenRecord>> {
        let Some(raw) = self.store.get(TOKEN_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Unreadable records are treated like no record at all
                tracing::warn!("Ignoring unreadable stored token: {}", e);
                Ok(None)
            }
        }
    }

}

fn encode_token(record: &TokenRecord) -> Result<String> {
    serde_json::to_string(record).map_err(|e| Error::Store(StoreError::Encode(e)))
}

fn require_non_empty(name: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::EmptyArgument(name));
    }
    Ok(())
}
