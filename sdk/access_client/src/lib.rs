//! # Access Client
//!
//! Host-side half of the one-time request-token boundary. The contracts
//! reject mutating calls whose token is absent or stale and answer with a
//! machine-readable code; this crate is what a hospital gateway links
//! against on the other side of that handshake.
//!
//! Three pieces:
//!
//! - [`TokenSource`] — the token endpoint, however the deployment reaches
//!   it (RPC call into the contract's `issue_request_token`, a relay, a
//!   test stub).
//! - [`TokenCache`] — per-purpose token storage with single-flight refresh:
//!   concurrent callers that need a token for the same purpose share one
//!   in-flight fetch and all receive its result, so a burst of rejected
//!   requests produces one refresh, not a storm.
//! - [`GuardedCall`] — runs an operation with a token and, when the server
//!   rejects that token, refreshes through the cache and retries exactly
//!   once. A second consecutive rejection is terminal.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};

use thiserror::Error;

#[cfg(test)]
mod test;

/// Machine-readable token rejection codes, mirrored from the on-chain guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    /// No outstanding token for this actor, or the zero sentinel was sent.
    TokenMissing,
    /// Token did not match the outstanding one, or aged past the maximum.
    TokenStale,
}

impl RejectCode {
    /// Wire label, matching the labels contracts put in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            RejectCode::TokenMissing => "token-missing",
            RejectCode::TokenStale => "token-stale",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The server refused the presented token.
    #[error("request token rejected: {}", .0.label())]
    TokenRejected(RejectCode),

    /// Refresh plus one retry both ended in a token rejection. The caller
    /// must not retry again; something other than staleness is wrong.
    #[error("request token rejected after refresh: {}", .0.label())]
    RetryExhausted(RejectCode),

    /// The token endpoint itself failed.
    #[error("token endpoint failed: {0}")]
    Source(String),

    /// The guarded operation failed for a reason unrelated to the token.
    /// Passed through unchanged, never retried.
    #[error("operation failed: {0}")]
    Operation(String),
}

/// A way to obtain a fresh request token.
///
/// Implementations report failure through `Err` rather than panicking; the
/// cache hands a returned error to every caller coalesced onto the fetch.
pub trait TokenSource {
    fn fetch(&self) -> Result<u64, ClientError>;
}

#[derive(Default)]
struct PurposeState {
    /// Token from the last successful fetch, until invalidated.
    token: Option<u64>,
    /// True while one caller runs the fetch for this purpose.
    fetching: bool,
    /// Bumped when a fetch completes, so waiters can tell theirs finished.
    epoch: u64,
    /// Outcome of the most recent completed fetch, fanned out to waiters.
    outcome: Option<Result<u64, ClientError>>,
}

/// Per-purpose token cache with single-flight refresh.
///
/// Keyed by a caller-chosen purpose string (one per logical endpoint, e.g.
/// `"consent:grant"`), so refreshes for unrelated endpoints never contend.
/// All coordination state lives in the cache value itself, not in a
/// process-wide flag.
#[derive(Default)]
pub struct TokenCache {
    states: Mutex<HashMap<String, PurposeState>>,
    refreshed: Condvar,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token for `purpose`: the cached one if present, the result
    /// of an in-flight fetch if one is running, or a fresh fetch otherwise.
    pub fn token<S: TokenSource>(&self, purpose: &str, source: &S) -> Result<u64, ClientError> {
        let mut states = self.lock_states();
        loop {
            let state = states.entry(purpose.to_string()).or_default();
            if let Some(token) = state.token {
                return Ok(token);
            }
            if !state.fetching {
                state.fetching = true;
                break;
            }
            // Another caller's fetch is in flight. Wait for it rather than
            // issuing a second one, then share its outcome.
            let seen = state.epoch;
            while states
                .get(purpose)
                .is_some_and(|s| s.fetching && s.epoch == seen)
            {
                states = self.wait_refreshed(states);
            }
            if let Some(outcome) = states.get(purpose).and_then(|s| s.outcome.clone()) {
                return outcome;
            }
        }

        // We are the fetching caller. Run the fetch with the lock released
        // so a slow endpoint does not hold up unrelated purposes.
        drop(states);
        let outcome = source.fetch();

        let mut states = self.lock_states();
        let state = states.entry(purpose.to_string()).or_default();
        state.fetching = false;
        state.epoch = state.epoch.wrapping_add(1);
        state.token = outcome.as_ref().ok().copied();
        state.outcome = Some(outcome.clone());
        drop(states);
        self.refreshed.notify_all();
        outcome
    }

    /// Drops the cached token for `purpose`, but only if it is still the
    /// rejected one. A concurrent caller may already have fetched a
    /// replacement; throwing that away would force a pointless extra fetch.
    pub fn invalidate(&self, purpose: &str, rejected: u64) {
        let mut states = self.lock_states();
        if let Some(state) = states.get_mut(purpose) {
            if state.token == Some(rejected) {
                state.token = None;
            }
        }
    }

    /// Cached token for `purpose` without fetching, if any.
    pub fn peek(&self, purpose: &str) -> Option<u64> {
        self.lock_states().get(purpose).and_then(|s| s.token)
    }

    // The map is consistent at every unlock point and the lock is never
    // held across caller code, so a poisoned lock is safe to re-enter.
    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, PurposeState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait_refreshed<'a>(
        &self,
        guard: MutexGuard<'a, HashMap<String, PurposeState>>,
    ) -> MutexGuard<'a, HashMap<String, PurposeState>> {
        match self.refreshed.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// One logical guarded request: fetch-or-reuse a token, run the operation,
/// and on a token rejection refresh and retry exactly once.
pub struct GuardedCall<'p> {
    purpose: &'p str,
}

impl<'p> GuardedCall<'p> {
    pub fn new(purpose: &'p str) -> Self {
        Self { purpose }
    }

    /// Runs `op` with a token for this purpose.
    ///
    /// If `op` answers [`ClientError::TokenRejected`], the rejected token is
    /// invalidated, a replacement is obtained through the cache (coalescing
    /// with any concurrent refresh), and `op` runs once more. A second
    /// rejection comes back as [`ClientError::RetryExhausted`]; any other
    /// error from `op` or the source is returned unchanged without retry.
    pub fn invoke<S, T, F>(
        &self,
        cache: &TokenCache,
        source: &S,
        mut op: F,
    ) -> Result<T, ClientError>
    where
        S: TokenSource,
        F: FnMut(u64) -> Result<T, ClientError>,
    {
        let token = cache.token(self.purpose, source)?;
        match op(token) {
            Ok(value) => return Ok(value),
            Err(ClientError::TokenRejected(_)) => {}
            Err(other) => return Err(other),
        }

        cache.invalidate(self.purpose, token);
        let fresh = cache.token(self.purpose, source)?;
        match op(fresh) {
            Ok(value) => Ok(value),
            Err(ClientError::TokenRejected(code)) => Err(ClientError::RetryExhausted(code)),
            Err(other) => Err(other),
        }
    }
}
