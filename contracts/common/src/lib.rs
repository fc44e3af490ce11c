//! Shared utilities and error codes for the Medrex contract suite.
//!
//! This crate provides:
//! - [`CommonError`] — standardised error codes for all contracts.
//! - [`request_guard`] — one-time request tokens for state-changing
//!   endpoints, with a fixed-window failure counter.
//!
//! Contract-specific errors can extend the range starting at code **100** and
//! above, ensuring no collisions with the common set.

#![no_std]

use soroban_sdk::contracterror;

// ── Modules ──────────────────────────────────────────────────────────────────

pub mod request_guard;

// ── Shared error enum ────────────────────────────────────────────────────────

/// Standardised error codes shared by every Medrex contract.
///
/// # Code ranges
/// | Range   | Purpose                        |
/// |---------|--------------------------------|
/// | 1 – 9   | Lifecycle / initialisation     |
/// | 10 – 19 | Authentication & authorisation |
/// | 20 – 29 | Resource not found             |
/// | 30 – 39 | Validation / input             |
/// | 40 – 49 | Contract state                 |
/// | 50 – 59 | Request-token guard            |
/// | 100+    | Reserved for contract-specific |
#[contracterror]
#[derive(Clone, Debug, Eq, PartialEq, Copy)]
#[repr(u32)]
pub enum CommonError {
    // ── Lifecycle (1–9) ──────────────────────────────────────
    /// The contract has not been initialised yet.
    /// Returned when a function requires prior initialisation.
    NotInitialized = 1,

    /// The contract has already been initialised.
    /// Returned when `initialize` is called more than once.
    AlreadyInitialized = 2,

    // ── Auth (10–19) ─────────────────────────────────────────
    /// The caller lacks the required role or permission to perform
    /// the requested operation (e.g. not an admin, not the record owner).
    AccessDenied = 10,

    // ── Not-found (20–29) ────────────────────────────────────
    /// The requested entry does not exist in contract storage.
    NotFound = 20,

    // ── Validation (30–39) ───────────────────────────────────
    /// One or more input parameters are invalid (e.g. empty payload,
    /// zero duration, malformed hash).
    InvalidInput = 30,

    /// An expiry timestamp lies in the past relative to ledger time.
    InvalidExpiry = 31,

    // ── Request-token guard (50–59) ──────────────────────────
    /// A state-changing call was made without a request token.
    TokenMissing = 50,

    /// The presented request token is not the outstanding one, or it
    /// outlived the caller's configured maximum age.
    TokenStale = 51,

    /// The per-actor token counter cannot be advanced any further.
    TokenOverflow = 52,
}
