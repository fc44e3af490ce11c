use soroban_sdk::{contracttype, Address, BytesN, String};

/// Scope of access a patient grants over a record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsentKind {
    Read,
    Write,
    Share,
}

impl ConsentKind {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            ConsentKind::Read => "read",
            ConsentKind::Write => "write",
            ConsentKind::Share => "share",
        }
    }
}

/// Attestation state of a grant on the external anchoring ledger.
///
/// Granting never blocks on the anchor; a reconciliation job confirms the
/// write later via `confirm_anchor`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AnchorStatus {
    Pending,
    Recorded,
}

/// Request-token guard settings, admin-set and read at decision time.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GuardConfig {
    /// Maximum accepted token age in seconds.
    pub token_max_age: u64,
    /// Fixed window for counting guard failures, in seconds.
    pub failure_window: u64,
    /// Failure count at which a `RequestForgery` violation is flagged.
    pub failure_threshold: u32,
}

impl GuardConfig {
    pub fn default_config() -> Self {
        GuardConfig {
            token_max_age: 300,
            failure_window: 600,
            failure_threshold: 3,
        }
    }
}

/// A patient's consent for one requester to access one record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsentGrant {
    /// Sequential id within the hospital tenant.
    pub grant_id: u64,
    /// Hospital tenant the grant lives under.
    pub hospital: Address,
    /// DID of the consenting patient.
    pub patient_did: String,
    /// Patient controller account; authorizes the grant and may revoke it.
    pub patient: Address,
    /// Account the access is granted to.
    pub requester: Address,
    /// Hash identifying the record content the consent covers.
    pub content_hash: BytesN<32>,
    pub kind: ConsentKind,
    /// Live flag; flipped to false in place when expiry is detected.
    pub consent_given: bool,
    /// Consent credential that backed the grant at creation time.
    pub credential_id: u64,
    pub granted_at: u64,
    /// Expiry timestamp; `None` means the grant does not expire.
    pub expires_at: Option<u64>,
    pub revoked_at: Option<u64>,
    pub revoked_by: Option<Address>,
    pub anchor_status: AnchorStatus,
    /// Transaction reference on the anchoring ledger, once recorded.
    pub anchor_ref: Option<BytesN<32>>,
}

/// Why a consent check denied access.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DenyReason {
    NotGranted,
    Expired,
    Revoked,
}

impl DenyReason {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            DenyReason::NotGranted => "not_granted",
            DenyReason::Expired => "expired",
            DenyReason::Revoked => "revoked",
        }
    }
}

/// Outcome of a consent check.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccessDecision {
    /// Access permitted under the carried grant id.
    Allow(u64),
    Deny(DenyReason),
}

/// Why a grant request was turned away without creating a grant.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GrantReject {
    /// No usable consent credential for the patient at this hospital.
    CredentialMissingOrRevoked,
    TokenMissing,
    TokenStale,
}

impl GrantReject {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            GrantReject::CredentialMissingOrRevoked => "credential_missing_or_revoked",
            GrantReject::TokenMissing => "token_missing",
            GrantReject::TokenStale => "token_stale",
        }
    }
}

/// Outcome of a grant request.
///
/// Rejections are values rather than errors so the audit write and the
/// guard's failure bookkeeping survive the invocation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GrantOutcome {
    Granted(ConsentGrant),
    Rejected(GrantReject),
}
