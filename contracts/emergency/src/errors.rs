//! Error taxonomy for the emergency access workflow.
//!
//! Codes follow the suite-wide ranges (1–9 lifecycle, 10–19 authorisation,
//! 20–29 not found, 30–39 validation, 40–49 record state, 50–59
//! request-token guard). Workflow rejections that must leave an audit row
//! behind — ineligible staff, self-authorization, out-of-order transitions —
//! are not errors at all; they come back as [`AuthorizeReject`] values so the
//! denial is recorded on-chain rather than rolled back.
//!
//! [`AuthorizeReject`]: crate::types::AuthorizeReject

use soroban_sdk::contracttype;

/// Broad class of an emergency-workflow error, for host-side handling policy.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Initialisation and collaborator-wiring failures.
    Lifecycle = 1,
    /// Caller identity or permission failures.
    Authorization = 2,
    /// Lookup failures.
    NotFound = 3,
    /// Parameter and policy-table validation failures.
    Validation = 4,
    /// Operations attempted against a record in the wrong lifecycle state.
    State = 5,
    /// Request-token guard failures.
    Guard = 6,
}

/// Impact level used when routing errors to monitoring.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
}

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum EmergencyError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 10,
    RecordNotFound = 20,
    InvalidInput = 30,
    PolicyNotConfigured = 31,
    RecordNotActive = 40,
    TokenMissing = 50,
    TokenStale = 51,
    TokenOverflow = 52,
}

impl EmergencyError {
    /// Category of this error, matching its code range.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EmergencyError::NotInitialized | EmergencyError::AlreadyInitialized => {
                ErrorCategory::Lifecycle
            }
            EmergencyError::Unauthorized => ErrorCategory::Authorization,
            EmergencyError::RecordNotFound => ErrorCategory::NotFound,
            EmergencyError::InvalidInput | EmergencyError::PolicyNotConfigured => {
                ErrorCategory::Validation
            }
            EmergencyError::RecordNotActive => ErrorCategory::State,
            EmergencyError::TokenMissing
            | EmergencyError::TokenStale
            | EmergencyError::TokenOverflow => ErrorCategory::Guard,
        }
    }

    /// Severity for monitoring routes.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EmergencyError::AlreadyInitialized
            | EmergencyError::RecordNotFound
            | EmergencyError::InvalidInput
            | EmergencyError::RecordNotActive => ErrorSeverity::Low,
            EmergencyError::PolicyNotConfigured
            | EmergencyError::Unauthorized
            | EmergencyError::TokenMissing
            | EmergencyError::TokenStale => ErrorSeverity::Medium,
            EmergencyError::NotInitialized | EmergencyError::TokenOverflow => ErrorSeverity::High,
        }
    }

    /// Whether a caller may retry after repairing its request.
    ///
    /// Guard failures are the retryable class: the caller mints a fresh
    /// token and repeats the call once.
    pub fn retryable(&self) -> bool {
        matches!(self, EmergencyError::TokenMissing | EmergencyError::TokenStale)
    }

    /// Human-readable message for logs and API responses.
    pub fn message(&self) -> &'static str {
        match self {
            EmergencyError::NotInitialized => "Contract has not been initialized",
            EmergencyError::AlreadyInitialized => "Contract is already initialized",
            EmergencyError::Unauthorized => "Caller is not authorized for this operation",
            EmergencyError::RecordNotFound => "Emergency consent record not found",
            EmergencyError::InvalidInput => "Invalid input parameters provided",
            EmergencyError::PolicyNotConfigured => "No policy window for this emergency type",
            EmergencyError::RecordNotActive => "Record is not in a state that allows this",
            EmergencyError::TokenMissing => "No request token was presented",
            EmergencyError::TokenStale => "Request token is stale or already used",
            EmergencyError::TokenOverflow => "Request token counter exhausted",
        }
    }
}
