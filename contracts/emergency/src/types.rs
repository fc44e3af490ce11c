use soroban_sdk::{contracttype, Address, String, Symbol, Vec};

use identity::types::StaffRole;

/// Category of emergency under which access is being requested.
///
/// Each type has its own admin-set [`PolicyWindow`]; requests for a type
/// without one are refused outright.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EmergencyType {
    Trauma,
    CardiacArrest,
    Stroke,
    Overdose,
    Unconscious,
}

impl EmergencyType {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            EmergencyType::Trauma => "trauma",
            EmergencyType::CardiacArrest => "cardiac_arrest",
            EmergencyType::Stroke => "stroke",
            EmergencyType::Overdose => "overdose",
            EmergencyType::Unconscious => "unconscious",
        }
    }
}

/// Lifecycle state of an emergency consent record.
///
/// Transitions are strictly linear: `Requested → PrimaryAuthorized →
/// SecondaryAuthorized → Active → {Expired | Revoked}`. Anything
/// out of order is rejected without touching the record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EmergencyState {
    Requested,
    PrimaryAuthorized,
    SecondaryAuthorized,
    Active,
    Expired,
    Revoked,
}

/// Identity of a staff member who authorized an emergency, copied from the
/// Identity Registry roster at authorization time. Never caller-supplied.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthorizerDetails {
    pub staff_id: String,
    pub license_number: String,
    pub role: StaffRole,
    pub authorized_at: u64,
}

/// Consent given by a patient's next of kin during an emergency.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NextOfKinConsent {
    pub name: String,
    pub relationship: String,
    /// Phone number or other contact handle, for post-hoc review.
    pub contact: String,
    /// Set server-side when the consent is attached.
    pub consented_at: u64,
}

/// Per-[`EmergencyType`] access policy, admin-set and never user-supplied.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PolicyWindow {
    /// How long activated access lasts, in seconds.
    pub access_secs: u64,
    /// Whether this type expects next-of-kin consent on file.
    pub nok_required: bool,
    /// Sub-window after activation during which a late next-of-kin
    /// attachment still clears the `NOK_PENDING` limitation.
    pub nok_grace_secs: u64,
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

/// One break-glass request and everything that happened to it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmergencyConsentRecord {
    /// Sequential id within the hospital tenant.
    pub record_id: u64,
    /// Hospital tenant the record lives under.
    pub hospital: Address,
    /// DID of the patient whose records are being opened.
    pub patient_did: String,
    pub emergency_type: EmergencyType,
    /// Free-text clinical justification captured at request time.
    pub medical_justification: String,
    pub state: EmergencyState,
    pub primary_authorizer: Option<AuthorizerDetails>,
    pub secondary_authorizer: Option<AuthorizerDetails>,
    pub next_of_kin: Option<NextOfKinConsent>,
    /// Review markers attached to the record, e.g. `NOK_PENDING` when a
    /// type that expects next-of-kin consent activated without one.
    pub limitations: Vec<Symbol>,
    /// Staff id or DID of whoever raised the request.
    pub requested_by: String,
    pub requested_at: u64,
    /// Set when the record activates.
    pub granted_at: Option<u64>,
    /// `granted_at + policy.access_secs`; access ends here, hard stop.
    pub expires_at: Option<u64>,
    pub revoked_at: Option<u64>,
    pub revoked_by: Option<Address>,
}

/// Why a request was turned away without creating a record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RequestReject {
    TokenMissing,
    TokenStale,
}

impl RequestReject {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            RequestReject::TokenMissing => "token_missing",
            RequestReject::TokenStale => "token_stale",
        }
    }
}

/// Outcome of an access request.
///
/// Rejections are values rather than errors so the audit write and the
/// guard's failure bookkeeping survive the invocation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RequestOutcome {
    Requested(EmergencyConsentRecord),
    Rejected(RequestReject),
}

/// Why an authorization attempt was refused.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthorizeReject {
    /// The secondary authorizer matched the primary. Two distinct staff
    /// members must sign off; the attempt is also flagged as a violation.
    SelfAuthorizationNotAllowed,
    /// Not on this hospital's roster, off duty, or role not approved.
    StaffNotEligible,
    /// The record is not in the state this authorization applies to.
    WrongState,
    TokenMissing,
    TokenStale,
}

impl AuthorizeReject {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            AuthorizeReject::SelfAuthorizationNotAllowed => "self_authorization",
            AuthorizeReject::StaffNotEligible => "staff_not_eligible",
            AuthorizeReject::WrongState => "wrong_state",
            AuthorizeReject::TokenMissing => "token_missing",
            AuthorizeReject::TokenStale => "token_stale",
        }
    }
}

/// Outcome of an authorization attempt, rejections as values for the same
/// reason as [`RequestOutcome`].
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthorizeOutcome {
    Authorized(EmergencyConsentRecord),
    Rejected(AuthorizeReject),
}

/// Why an emergency access check denied access.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EmergencyDenyReason {
    /// The record never reached `Active`.
    NotActive,
    EmergencyExpired,
    EmergencyRevoked,
}

impl EmergencyDenyReason {
    /// Short label used in audit metadata.
    pub fn label(&self) -> &'static str {
        match self {
            EmergencyDenyReason::NotActive => "not_active",
            EmergencyDenyReason::EmergencyExpired => "emergency_expired",
            EmergencyDenyReason::EmergencyRevoked => "emergency_revoked",
        }
    }
}

/// Outcome of an emergency access check.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EmergencyDecision {
    /// Access permitted under the carried record id.
    Allow(u64),
    Deny(EmergencyDenyReason),
}
