//! Token record, validity state and time source

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Seconds subtracted from the server lifetime so a token is never sent
/// right as it expires.
pub const SAFETY_MARGIN_SECS: u64 = 10;

/// Cached OAuth token, always stored and replaced as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds, as returned by the server
    pub expires_in: u64,
    /// Epoch seconds after which the token is treated as expired
    pub expire_time: u64,
}

impl TokenRecord {
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: u64,
        issued_at: u64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            expire_time: issued_at
                .saturating_add(expires_in)
                .saturating_sub(SAFETY_MARGIN_SECS),
        }
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expire_time
    }
}

/// Where the stored token stands at a given instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Uninitialized,
    Valid(TokenRecord),
    Expired(TokenRecord),
}

impl TokenState {
    pub fn evaluate(record: Option<TokenRecord>, now: u64) -> Self {
        match record {
            None => Self::Uninitialized,
            Some(record) if record.is_expired_at(now) => Self::Expired(record),
            Some(record) => Self::Valid(record),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Wall clock in epoch seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Settable clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
