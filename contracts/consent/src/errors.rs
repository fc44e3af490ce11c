//! Error taxonomy for the consent ledger.
//!
//! Codes follow the suite-wide ranges (1–9 lifecycle, 10–19 authorisation,
//! 20–29 not found, 30–39 validation, 50–59 request-token guard). Each error
//! additionally carries category, severity and retryability metadata so
//! host-side callers can decide between surfacing, alerting and retrying
//! without hard-coding code numbers.

use soroban_sdk::contracttype;

/// Broad class of a consent error, for host-side handling policy.
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
    /// Parameter and timestamp validation failures.
    Validation = 4,
    /// Request-token guard failures.
    Guard = 5,
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
pub enum ConsentError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 10,
    GrantNotFound = 20,
    InvalidInput = 30,
    InvalidExpiry = 31,
    TokenMissing = 50,
    TokenStale = 51,
    TokenOverflow = 52,
}

impl ConsentError {
    /// Category of this error, matching its code range.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConsentError::NotInitialized | ConsentError::AlreadyInitialized => {
                ErrorCategory::Lifecycle
            }
            ConsentError::Unauthorized => ErrorCategory::Authorization,
            ConsentError::GrantNotFound => ErrorCategory::NotFound,
            ConsentError::InvalidInput | ConsentError::InvalidExpiry => ErrorCategory::Validation,
            ConsentError::TokenMissing | ConsentError::TokenStale | ConsentError::TokenOverflow => {
                ErrorCategory::Guard
            }
        }
    }

    /// Severity for monitoring routes.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ConsentError::AlreadyInitialized
            | ConsentError::GrantNotFound
            | ConsentError::InvalidInput
            | ConsentError::InvalidExpiry => ErrorSeverity::Low,
            ConsentError::Unauthorized | ConsentError::TokenMissing | ConsentError::TokenStale => {
                ErrorSeverity::Medium
            }
            ConsentError::NotInitialized | ConsentError::TokenOverflow => ErrorSeverity::High,
        }
    }

    /// Whether a caller may retry after repairing its request.
    ///
    /// Guard failures are the retryable class: the caller mints a fresh
    /// token and repeats the call once.
    pub fn retryable(&self) -> bool {
        matches!(self, ConsentError::TokenMissing | ConsentError::TokenStale)
    }

    /// Human-readable message for logs and API responses.
    pub fn message(&self) -> &'static str {
        match self {
            ConsentError::NotInitialized => "Contract has not been initialized",
            ConsentError::AlreadyInitialized => "Contract is already initialized",
            ConsentError::Unauthorized => "Caller is not authorized for this operation",
            ConsentError::GrantNotFound => "Consent grant not found",
            ConsentError::InvalidInput => "Invalid input parameters provided",
            ConsentError::InvalidExpiry => "Expiry timestamp lies in the past",
            ConsentError::TokenMissing => "No request token was presented",
            ConsentError::TokenStale => "Request token is stale or already used",
            ConsentError::TokenOverflow => "Request token counter exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(ConsentError::NotInitialized as u32, 1);
        assert_eq!(ConsentError::AlreadyInitialized as u32, 2);
        assert_eq!(ConsentError::Unauthorized as u32, 10);
        assert_eq!(ConsentError::GrantNotFound as u32, 20);
        assert_eq!(ConsentError::InvalidInput as u32, 30);
        assert_eq!(ConsentError::InvalidExpiry as u32, 31);
        assert_eq!(ConsentError::TokenMissing as u32, 50);
        assert_eq!(ConsentError::TokenStale as u32, 51);
        assert_eq!(ConsentError::TokenOverflow as u32, 52);
    }

    #[test]
    fn guard_failures_are_the_retryable_class() {
        assert!(ConsentError::TokenMissing.retryable());
        assert!(ConsentError::TokenStale.retryable());
        assert!(!ConsentError::TokenOverflow.retryable());
        assert!(!ConsentError::Unauthorized.retryable());
        assert_eq!(ConsentError::TokenStale.category(), ErrorCategory::Guard);
    }

    #[test]
    fn categories_match_code_ranges() {
        assert_eq!(
            ConsentError::NotInitialized.category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(
            ConsentError::Unauthorized.category(),
            ErrorCategory::Authorization
        );
        assert_eq!(ConsentError::GrantNotFound.category(), ErrorCategory::NotFound);
        assert_eq!(
            ConsentError::InvalidExpiry.category(),
            ErrorCategory::Validation
        );
        assert_eq!(ConsentError::NotInitialized.severity(), ErrorSeverity::High);
        assert_eq!(ConsentError::InvalidInput.severity(), ErrorSeverity::Low);
    }
}
