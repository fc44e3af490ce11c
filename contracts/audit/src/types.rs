use soroban_sdk::{contracttype, Address, BytesN, String, Symbol};

/// Class of actor attributed to an audit event.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActorKind {
    Patient,
    Hospital,
    Staff,
    Admin,
    System,
}

/// Action recorded by an audit event.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuditAction {
    Grant,
    Check,
    Revoke,
    Request,
    AuthorizePrimary,
    AuthorizeSecondary,
    Activate,
    Expire,
    Issue,
    Verify,
    Deactivate,
    Flag,
    Anchor,
}

/// Outcome of the audited operation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuditOutcome {
    Success,
    Denied,
    Failed,
}

/// Severity attached to events and violations.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// An immutable, hash-chained record of a security-relevant action.
///
/// Events are scoped to a hospital tenant; `prev_hash` links each event to
/// its predecessor within that tenant's chain (zero for the first), and
/// `entry_hash` commits to the event's own contents.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuditEvent {
    pub event_id: u64,
    pub hospital: Address,
    /// Domain tag of the originating subsystem (e.g. `consent`, `emr`).
    pub event_type: Symbol,
    pub actor_kind: ActorKind,
    pub actor: String,
    /// Kind of the acted-on entity (e.g. `grant`, `proof`).
    pub target_kind: Symbol,
    pub target_id: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub severity: Severity,
    pub metadata: String,
    pub timestamp: u64,
    pub prev_hash: BytesN<32>,
    pub entry_hash: BytesN<32>,
}

/// Category of a flagged anomaly.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ViolationKind {
    RequestForgery,
    UnauthorizedAccess,
    SelfAuthorization,
    CommitmentMismatch,
    ReplayAttempt,
}

/// A flagged anomaly with its own resolution lifecycle, independent of the
/// audit event stream.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityViolation {
    pub violation_id: u64,
    pub hospital: Address,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub actor: String,
    pub details: String,
    pub flagged_at: u64,
    pub resolved: bool,
    pub resolved_at: Option<u64>,
    pub resolved_by: Option<Address>,
}
