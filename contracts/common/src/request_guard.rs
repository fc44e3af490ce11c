//! # One-Time Request Tokens
//!
//! Anti-forgery guard for state-changing endpoints.  A caller first obtains
//! a token from the contract's token endpoint, then echoes it on the mutating
//! call.  Tokens are bound to `(contract, actor)`, single-use, and accepted
//! only while younger than the caller's configured maximum age.
//!
//! Guard failures are counted in a fixed window per actor so contracts can
//! flag repeat offenders as security violations.
//!
//! ## Usage pattern
//!
//! **Token endpoint** — mint and hand out:
//! ```ignore
//! actor.require_auth();
//! let token = request_guard::mint(&env, &actor)?;
//! ```
//!
//! **Mutating endpoint** — consume *before* any state change:
//! ```ignore
//! if let Err(e) = request_guard::consume(&env, &actor, token, MAX_TOKEN_AGE) {
//!     let strikes = request_guard::note_violation(&env, &actor, VIOLATION_WINDOW);
//!     // reject the call, flag a violation once `strikes` crosses the threshold
//! }
//! ```

use soroban_sdk::{contracttype, Address, Env};

use crate::CommonError;

// ── Storage keys ─────────────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
enum GuardKey {
    /// Outstanding token for an actor: `(value, issued_at)`.
    Token(Address),
    /// Monotonic token counter for an actor.
    Counter(Address),
    /// Guard failures for an actor: `(window_start, count)`.
    Failures(Address),
}

/// Reserved value meaning "no token was presented".
pub const ABSENT_TOKEN: u64 = 0;

// ── TTL constants (mirror common convention) ─────────────────────────────────

const TTL_THRESHOLD: u32 = 5_184_000;
const TTL_EXTEND_TO: u32 = 10_368_000;

// ── Internal helpers ─────────────────────────────────────────────────────────

fn outstanding(env: &Env, actor: &Address) -> Option<(u64, u64)> {
    env.storage()
        .persistent()
        .get(&GuardKey::Token(actor.clone()))
}

fn store_outstanding(env: &Env, actor: &Address, value: u64, issued_at: u64) {
    let key = GuardKey::Token(actor.clone());
    env.storage().persistent().set(&key, &(value, issued_at));
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

fn next_value(env: &Env, actor: &Address) -> Result<u64, CommonError> {
    let key = GuardKey::Counter(actor.clone());
    let current: u64 = env.storage().persistent().get(&key).unwrap_or(0);
    let next = current.checked_add(1).ok_or(CommonError::TokenOverflow)?;
    env.storage().persistent().set(&key, &next);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    Ok(next)
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Mint a fresh token for `actor`, replacing any outstanding one.
///
/// Token values are strictly increasing per actor and start at `1`; the
/// value `0` is reserved as [`ABSENT_TOKEN`].
///
/// Returns [`CommonError::TokenOverflow`] if the per-actor counter would
/// exceed `u64::MAX`.
pub fn mint(env: &Env, actor: &Address) -> Result<u64, CommonError> {
    let value = next_value(env, actor)?;
    store_outstanding(env, actor, value, env.ledger().timestamp());
    Ok(value)
}

/// Validate and consume `presented` for `actor`.
///
/// On success the outstanding token is cleared (single-use) and the actor's
/// failure window is reset.
///
/// # Errors
/// - [`CommonError::TokenMissing`] — `presented` is [`ABSENT_TOKEN`].
/// - [`CommonError::TokenStale`] — no token is outstanding, `presented` does
///   not match the outstanding one, or the outstanding token is older than
///   `max_age` seconds.
pub fn consume(
    env: &Env,
    actor: &Address,
    presented: u64,
    max_age: u64,
) -> Result<(), CommonError> {
    if presented == ABSENT_TOKEN {
        return Err(CommonError::TokenMissing);
    }
    let (value, issued_at) = outstanding(env, actor).ok_or(CommonError::TokenStale)?;
    let age = env.ledger().timestamp().saturating_sub(issued_at);
    if presented != value || age > max_age {
        return Err(CommonError::TokenStale);
    }
    env.storage()
        .persistent()
        .remove(&GuardKey::Token(actor.clone()));
    env.storage()
        .persistent()
        .remove(&GuardKey::Failures(actor.clone()));
    Ok(())
}

/// Record a guard failure for `actor` and return the updated failure count
/// within the current fixed window of `window` seconds.
///
/// The caller decides the threshold at which the count becomes a flagged
/// security violation.
pub fn note_violation(env: &Env, actor: &Address, window: u64) -> u32 {
    let key = GuardKey::Failures(actor.clone());
    let now = env.ledger().timestamp();
    let (start, count): (u64, u32) = env
        .storage()
        .persistent()
        .get(&key)
        .unwrap_or((now, 0u32));
    let (start, count) = if now.saturating_sub(start) >= window {
        (now, 0u32)
    } else {
        (start, count)
    };
    let count = count.saturating_add(1);
    env.storage().persistent().set(&key, &(start, count));
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    count
}

/// Current failure count for `actor` without modifying state.
///
/// Returns `0` when the recorded window has already elapsed.
pub fn violations_in_window(env: &Env, actor: &Address, window: u64) -> u32 {
    let key = GuardKey::Failures(actor.clone());
    match env.storage().persistent().get::<_, (u64, u32)>(&key) {
        Some((start, count)) if env.ledger().timestamp().saturating_sub(start) < window => count,
        _ => 0,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
