//! # Emergency Access Workflow
//!
//! Break-glass access to patient records when consent cannot be obtained.
//! A request opens a record in `Requested`; two distinct on-duty staff
//! members with approved roles must sign off before it activates, and
//! activation runs on an admin-set per-emergency-type policy clock.
//! Authorizer identity is always copied from the Identity Registry roster,
//! never taken from the caller. Every transition and every denial lands in
//! the audit chain within the same invocation.
//!
//! Rejections a caller can repair (missing token, ineligible staff,
//! out-of-order transition) are returned as outcome values so the audit row
//! and the guard's failure bookkeeping persist; errors abort and roll back.

#![no_std]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod events;
pub mod types;


use soroban_sdk::{
    contract, contractimpl, symbol_short, vec, Address, Env, String, Symbol, Vec,
};

use audit::types::{ActorKind, AuditAction, AuditOutcome, Severity, ViolationKind};
use audit::AuditContractClient;
use common::{request_guard, CommonError};
use errors::EmergencyError;
use identity::types::StaffRole;
use identity::IdentityContractClient;
use types::{
    AuthorizeOutcome, AuthorizeReject, AuthorizerDetails, EmergencyConsentRecord,
    EmergencyDecision, EmergencyDenyReason, EmergencyState, EmergencyType, GuardConfig,
    NextOfKinConsent, PolicyWindow, RequestOutcome, RequestReject,
};
use zk_proofs::types::VerifyOutcome;
use zk_proofs::ZkProofContractClient;

/// Storage keys
const ADMIN: Symbol = symbol_short!("ADMIN");
const IDENTITY: Symbol = symbol_short!("IDENTITY");
const AUDIT: Symbol = symbol_short!("AUDIT");
const ZK_PROOFS: Symbol = symbol_short!("ZKPROOFS");
const INITIALIZED: Symbol = symbol_short!("INIT");
const GUARD_CFG: Symbol = symbol_short!("GUARD_CFG");
const APPROVED_ROLES: Symbol = symbol_short!("APPR_ROLE");

/// Limitation marker on records that activated without next-of-kin consent.
const NOK_PENDING: &str = "NOK_PENDING";

/// TTL constants for persistent storage (in ledgers)
const TTL_THRESHOLD: u32 = 5_184_000; // ~60 days
const TTL_EXTEND_TO: u32 = 10_368_000; // ~120 days

#[contract]
pub struct EmergencyContract;

#[contractimpl]
impl EmergencyContract {
    // ── Initialization ───────────────────────────────────────────────────────

    /// Initialize the workflow with an administrator and its collaborators:
    /// the identity registry authorizers are validated against and the
    /// audit recorder every step is appended to.
    pub fn initialize(
        env: Env,
        admin: Address,
        identity: Address,
        audit: Address,
    ) -> Result<(), EmergencyError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(EmergencyError::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&IDENTITY, &identity);
        env.storage().instance().set(&AUDIT, &audit);
        env.storage()
            .instance()
            .set(&GUARD_CFG, &GuardConfig::default_config());
        env.storage().instance().set(&INITIALIZED, &true);
        env.storage()
            .instance()
            .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_initialized(&env, admin, identity, audit);

        Ok(())
    }

    /// Get the admin address.
    pub fn get_admin(env: Env) -> Result<Address, EmergencyError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(EmergencyError::NotInitialized)
    }

    /// Point the workflow at a different identity registry.
    pub fn set_identity(
        env: Env,
        caller: Address,
        identity: Address,
    ) -> Result<(), EmergencyError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&IDENTITY, &identity);
        Ok(())
    }

    /// Point the workflow at a different audit recorder.
    pub fn set_audit(env: Env, caller: Address, audit: Address) -> Result<(), EmergencyError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&AUDIT, &audit);
        Ok(())
    }

    /// Point the workflow at the proof verifier used for break-glass
    /// verifications.
    pub fn set_zk_proofs(
        env: Env,
        caller: Address,
        zk_proofs: Address,
    ) -> Result<(), EmergencyError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&ZK_PROOFS, &zk_proofs);
        Ok(())
    }

    /// Replace the request-token guard settings.
    pub fn set_guard_config(
        env: Env,
        caller: Address,
        config: GuardConfig,
    ) -> Result<(), EmergencyError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        if config.token_max_age == 0 || config.failure_window == 0 || config.failure_threshold == 0
        {
            return Err(EmergencyError::InvalidInput);
        }

        env.storage().instance().set(&GUARD_CFG, &config);
        Ok(())
    }

    /// Current request-token guard settings.
    pub fn get_guard_config(env: Env) -> GuardConfig {
        Self::guard_config(&env)
    }

    // ── Policy configuration ─────────────────────────────────────────────────

    /// Set the access policy for one emergency type. The grace sub-window
    /// cannot outlast the access window itself.
    pub fn set_policy_window(
        env: Env,
        caller: Address,
        emergency_type: EmergencyType,
        window: PolicyWindow,
    ) -> Result<(), EmergencyError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        if window.access_secs == 0 || window.nok_grace_secs > window.access_secs {
            return Err(EmergencyError::InvalidInput);
        }

        let key = policy_key(&emergency_type);
        env.storage().persistent().set(&key, &window);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(())
    }

    /// Access policy for an emergency type, if one has been set.
    pub fn get_policy_window(
        env: Env,
        emergency_type: EmergencyType,
    ) -> Result<PolicyWindow, EmergencyError> {
        Self::policy_window(&env, &emergency_type)
    }

    /// Replace the set of roles allowed to authorize emergencies.
    pub fn set_approved_roles(
        env: Env,
        caller: Address,
        roles: Vec<StaffRole>,
    ) -> Result<(), EmergencyError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        if roles.is_empty() {
            return Err(EmergencyError::InvalidInput);
        }

        env.storage().instance().set(&APPROVED_ROLES, &roles);
        Ok(())
    }

    /// Roles allowed to authorize emergencies; the built-in default until
    /// the admin replaces it.
    pub fn get_approved_roles(env: Env) -> Vec<StaffRole> {
        Self::approved_roles_or_default(&env)
    }

    // ── Request tokens ───────────────────────────────────────────────────────

    /// Mint a one-time request token for `actor`, to be echoed on the next
    /// guarded mutation. Minting replaces any token still outstanding.
    pub fn issue_request_token(env: Env, actor: Address) -> Result<u64, EmergencyError> {
        Self::require_initialized(&env)?;
        actor.require_auth();
        request_guard::mint(&env, &actor).map_err(Self::map_guard_error)
    }

    // ── Break-glass workflow ─────────────────────────────────────────────────

    /// Open a break-glass request for `patient_did` under the `hospital`
    /// tenant. The record starts in `Requested` and grants nothing until
    /// two staff members have signed off.
    ///
    /// The hospital account authorizes the call and must present a valid
    /// request token; a type without a configured policy window is refused
    /// outright. Token failures come back as [`RequestOutcome::Rejected`]
    /// with the audit row already written and count toward the forgery
    /// threshold.
    pub fn request_access(
        env: Env,
        hospital: Address,
        patient_did: String,
        emergency_type: EmergencyType,
        medical_justification: String,
        requested_by: String,
        token: u64,
    ) -> Result<RequestOutcome, EmergencyError> {
        Self::require_initialized(&env)?;

        if patient_did.is_empty() || medical_justification.is_empty() || requested_by.is_empty() {
            return Err(EmergencyError::InvalidInput);
        }
        // policy gate up front: a type without a window could never activate
        Self::policy_window(&env, &emergency_type)?;

        hospital.require_auth();

        let config = Self::guard_config(&env);
        if let Err(guard_err) = request_guard::consume(&env, &hospital, token, config.token_max_age)
        {
            let reject = match guard_err {
                CommonError::TokenMissing => RequestReject::TokenMissing,
                _ => RequestReject::TokenStale,
            };
            Self::note_guard_failure(&env, &hospital, &config)?;
            Self::record_audit(
                &env,
                &hospital,
                symbol_short!("EMG_REQ"),
                ActorKind::Staff,
                &requested_by,
                &patient_did,
                AuditAction::Request,
                AuditOutcome::Denied,
                Severity::Warning,
                &String::from_str(&env, reject.label()),
            )?;
            return Ok(RequestOutcome::Rejected(reject));
        }

        let now = env.ledger().timestamp();
        let record_id = Self::next_record_id(&env, &hospital);
        let record = EmergencyConsentRecord {
            record_id,
            hospital: hospital.clone(),
            patient_did: patient_did.clone(),
            emergency_type: emergency_type.clone(),
            medical_justification,
            state: EmergencyState::Requested,
            primary_authorizer: None,
            secondary_authorizer: None,
            next_of_kin: None,
            limitations: Vec::new(&env),
            requested_by: requested_by.clone(),
            requested_at: now,
            granted_at: None,
            expires_at: None,
            revoked_at: None,
            revoked_by: None,
        };
        Self::store_record(&env, &record);

        let listing_key = patient_records_key(&hospital, &patient_did);
        let mut listing: Vec<u64> = env
            .storage()
            .persistent()
            .get(&listing_key)
            .unwrap_or(Vec::new(&env));
        listing.push_back(record_id);
        env.storage().persistent().set(&listing_key, &listing);
        env.storage()
            .persistent()
            .extend_ttl(&listing_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("EMG_REQ"),
            ActorKind::Staff,
            &requested_by,
            &patient_did,
            AuditAction::Request,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, emergency_type.label()),
        )?;
        events::publish_requested(
            &env,
            hospital,
            record_id,
            patient_did,
            emergency_type,
            requested_by,
        );

        Ok(RequestOutcome::Requested(record))
    }

    /// First sign-off on a request: `Requested → PrimaryAuthorized`.
    ///
    /// The staff member is validated against the identity registry roster
    /// (same hospital, on duty, approved role) and the authorizer details
    /// stored on the record are copied from that roster entry. Ineligible
    /// staff and out-of-order calls come back as
    /// [`AuthorizeOutcome::Rejected`] with the denial audited.
    pub fn authorize_primary(
        env: Env,
        hospital: Address,
        record_id: u64,
        staff_id: String,
        token: u64,
    ) -> Result<AuthorizeOutcome, EmergencyError> {
        Self::require_initialized(&env)?;
        if staff_id.is_empty() {
            return Err(EmergencyError::InvalidInput);
        }
        let mut record = Self::load_record(&env, &hospital, record_id)?;

        hospital.require_auth();

        let config = Self::guard_config(&env);
        if let Err(guard_err) = request_guard::consume(&env, &hospital, token, config.token_max_age)
        {
            let reject = match guard_err {
                CommonError::TokenMissing => AuthorizeReject::TokenMissing,
                _ => AuthorizeReject::TokenStale,
            };
            Self::note_guard_failure(&env, &hospital, &config)?;
            Self::audit_authorize(
                &env,
                &hospital,
                symbol_short!("EMG_PRI"),
                &staff_id,
                &record.patient_did,
                AuditAction::AuthorizePrimary,
                AuditOutcome::Denied,
                reject.label(),
            )?;
            return Ok(AuthorizeOutcome::Rejected(reject));
        }

        let details = match Self::eligible_authorizer(&env, &hospital, &staff_id)? {
            Some(details) => details,
            None => {
                let reject = AuthorizeReject::StaffNotEligible;
                Self::audit_authorize(
                    &env,
                    &hospital,
                    symbol_short!("EMG_PRI"),
                    &staff_id,
                    &record.patient_did,
                    AuditAction::AuthorizePrimary,
                    AuditOutcome::Denied,
                    reject.label(),
                )?;
                return Ok(AuthorizeOutcome::Rejected(reject));
            }
        };

        if record.state != EmergencyState::Requested {
            let reject = AuthorizeReject::WrongState;
            Self::audit_authorize(
                &env,
                &hospital,
                symbol_short!("EMG_PRI"),
                &staff_id,
                &record.patient_did,
                AuditAction::AuthorizePrimary,
                AuditOutcome::Denied,
                reject.label(),
            )?;
            return Ok(AuthorizeOutcome::Rejected(reject));
        }

        record.primary_authorizer = Some(details);
        record.state = EmergencyState::PrimaryAuthorized;
        Self::store_record(&env, &record);

        Self::audit_authorize(
            &env,
            &hospital,
            symbol_short!("EMG_PRI"),
            &staff_id,
            &record.patient_did,
            AuditAction::AuthorizePrimary,
            AuditOutcome::Success,
            record.emergency_type.label(),
        )?;
        events::publish_primary_authorized(&env, hospital, record_id, staff_id);

        Ok(AuthorizeOutcome::Authorized(record))
    }

    /// Second, distinct sign-off. Success drives the record through
    /// `PrimaryAuthorized → SecondaryAuthorized → Active` in the same
    /// invocation, starting the policy clock:
    /// `expires_at = granted_at + policy.access_secs`.
    ///
    /// A `staff_id` matching the primary authorizer is rejected without a
    /// state change and flagged as a `SelfAuthorization` violation. If the
    /// emergency type expects next-of-kin consent and none is attached yet,
    /// the record still activates carrying the `NOK_PENDING` limitation.
    pub fn authorize_secondary(
        env: Env,
        hospital: Address,
        record_id: u64,
        staff_id: String,
        token: u64,
    ) -> Result<AuthorizeOutcome, EmergencyError> {
        Self::require_initialized(&env)?;
        if staff_id.is_empty() {
            return Err(EmergencyError::InvalidInput);
        }
        let mut record = Self::load_record(&env, &hospital, record_id)?;

        hospital.require_auth();

        let config = Self::guard_config(&env);
        if let Err(guard_err) = request_guard::consume(&env, &hospital, token, config.token_max_age)
        {
            let reject = match guard_err {
                CommonError::TokenMissing => AuthorizeReject::TokenMissing,
                _ => AuthorizeReject::TokenStale,
            };
            Self::note_guard_failure(&env, &hospital, &config)?;
            Self::audit_authorize(
                &env,
                &hospital,
                symbol_short!("EMG_SEC"),
                &staff_id,
                &record.patient_did,
                AuditAction::AuthorizeSecondary,
                AuditOutcome::Denied,
                reject.label(),
            )?;
            return Ok(AuthorizeOutcome::Rejected(reject));
        }

        let details = match Self::eligible_authorizer(&env, &hospital, &staff_id)? {
            Some(details) => details,
            None => {
                let reject = AuthorizeReject::StaffNotEligible;
                Self::audit_authorize(
                    &env,
                    &hospital,
                    symbol_short!("EMG_SEC"),
                    &staff_id,
                    &record.patient_did,
                    AuditAction::AuthorizeSecondary,
                    AuditOutcome::Denied,
                    reject.label(),
                )?;
                return Ok(AuthorizeOutcome::Rejected(reject));
            }
        };

        if record.state != EmergencyState::PrimaryAuthorized {
            let reject = AuthorizeReject::WrongState;
            Self::audit_authorize(
                &env,
                &hospital,
                symbol_short!("EMG_SEC"),
                &staff_id,
                &record.patient_did,
                AuditAction::AuthorizeSecondary,
                AuditOutcome::Denied,
                reject.label(),
            )?;
            return Ok(AuthorizeOutcome::Rejected(reject));
        }

        // two-person rule: the countersignature must come from someone else
        let is_self = match &record.primary_authorizer {
            Some(primary) => primary.staff_id == staff_id,
            None => false,
        };
        if is_self {
            let reject = AuthorizeReject::SelfAuthorizationNotAllowed;
            Self::flag_self_authorization(&env, &hospital, &staff_id)?;
            Self::audit_authorize(
                &env,
                &hospital,
                symbol_short!("EMG_SEC"),
                &staff_id,
                &record.patient_did,
                AuditAction::AuthorizeSecondary,
                AuditOutcome::Denied,
                reject.label(),
            )?;
            return Ok(AuthorizeOutcome::Rejected(reject));
        }

        let now = env.ledger().timestamp();
        let policy = Self::policy_window(&env, &record.emergency_type)?;

        record.secondary_authorizer = Some(details);
        record.state = EmergencyState::SecondaryAuthorized;
        Self::audit_authorize(
            &env,
            &hospital,
            symbol_short!("EMG_SEC"),
            &staff_id,
            &record.patient_did,
            AuditAction::AuthorizeSecondary,
            AuditOutcome::Success,
            record.emergency_type.label(),
        )?;
        events::publish_secondary_authorized(&env, hospital.clone(), record_id, staff_id.clone());

        // the dual-control gate is satisfied; activate on the policy clock
        let expires_at = now.saturating_add(policy.access_secs);
        record.granted_at = Some(now);
        record.expires_at = Some(expires_at);
        if policy.nok_required && record.next_of_kin.is_none() {
            record.limitations.push_back(Symbol::new(&env, NOK_PENDING));
        }
        record.state = EmergencyState::Active;
        Self::store_record(&env, &record);

        Self::audit_authorize(
            &env,
            &hospital,
            symbol_short!("EMG_ACT"),
            &staff_id,
            &record.patient_did,
            AuditAction::Activate,
            AuditOutcome::Success,
            record.emergency_type.label(),
        )?;
        events::publish_activated(&env, hospital, record_id, expires_at);

        Ok(AuthorizeOutcome::Authorized(record))
    }

    /// Attach next-of-kin consent to a record. Allowed from `Requested` up
    /// to an unexpired `Active`; the caller-supplied `consented_at` is
    /// ignored and stamped server-side.
    ///
    /// An attachment within the grace sub-window
    /// (`granted_at + policy.nok_grace_secs`) clears the `NOK_PENDING`
    /// limitation; after it the flag stays as a post-hoc review marker.
    pub fn attach_next_of_kin(
        env: Env,
        hospital: Address,
        record_id: u64,
        consent: NextOfKinConsent,
        token: u64,
    ) -> Result<EmergencyConsentRecord, EmergencyError> {
        Self::require_initialized(&env)?;

        if consent.name.is_empty() || consent.relationship.is_empty() {
            return Err(EmergencyError::InvalidInput);
        }

        let mut record = Self::load_record(&env, &hospital, record_id)?;
        let now = env.ledger().timestamp();

        let attachable = match record.state {
            EmergencyState::Requested
            | EmergencyState::PrimaryAuthorized
            | EmergencyState::SecondaryAuthorized => true,
            EmergencyState::Active => now < record.expires_at.unwrap_or(0),
            EmergencyState::Expired | EmergencyState::Revoked => false,
        };
        if !attachable {
            return Err(EmergencyError::RecordNotActive);
        }

        hospital.require_auth();
        let config = Self::guard_config(&env);
        request_guard::consume(&env, &hospital, token, config.token_max_age)
            .map_err(Self::map_guard_error)?;

        let attached = NextOfKinConsent {
            name: consent.name,
            relationship: consent.relationship,
            contact: consent.contact,
            consented_at: now,
        };
        record.next_of_kin = Some(attached.clone());

        let mut cleared = false;
        let marker = Symbol::new(&env, NOK_PENDING);
        if record.state == EmergencyState::Active && record.limitations.contains(&marker) {
            let policy = Self::policy_window(&env, &record.emergency_type)?;
            let grace_deadline = record
                .granted_at
                .unwrap_or(0)
                .saturating_add(policy.nok_grace_secs);
            if now <= grace_deadline {
                let mut remaining = Vec::new(&env);
                for limitation in record.limitations.iter() {
                    if limitation != marker {
                        remaining.push_back(limitation);
                    }
                }
                record.limitations = remaining;
                cleared = true;
            }
        }

        Self::store_record(&env, &record);

        let metadata = if cleared {
            "nok_attached_cleared"
        } else {
            "nok_attached"
        };
        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("EMG_NOK"),
            ActorKind::Patient,
            &record.patient_did,
            &record.patient_did,
            AuditAction::Grant,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, metadata),
        )?;
        events::publish_nok_attached(&env, hospital, record_id, attached, cleared);

        Ok(record)
    }

    // ── Access checks ────────────────────────────────────────────────────────

    /// Answer whether the emergency currently grants access.
    ///
    /// Access holds only while the record is `Active`, both authorizers are
    /// on it, and `now < expires_at`. Expiry is lazy: the first check past
    /// the deadline flips the record to `Expired` in place and answers
    /// `Deny(EmergencyExpired)` — there is no background timer. One audit
    /// event per call, carrying the decision.
    pub fn check_access(
        env: Env,
        hospital: Address,
        record_id: u64,
    ) -> Result<EmergencyDecision, EmergencyError> {
        Self::require_initialized(&env)?;
        let mut record = Self::load_record(&env, &hospital, record_id)?;

        let decision = Self::live_decision(&env, &mut record);

        let (outcome, metadata) = match &decision {
            EmergencyDecision::Allow(_) => (AuditOutcome::Success, String::from_str(&env, "allow")),
            EmergencyDecision::Deny(reason) => {
                (AuditOutcome::Denied, String::from_str(&env, reason.label()))
            }
        };
        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("EMG_CHK"),
            ActorKind::Staff,
            &record.requested_by,
            &record.patient_did,
            AuditAction::Check,
            outcome,
            Severity::Info,
            &metadata,
        )?;

        Ok(decision)
    }

    /// Present a proof for verification under an active emergency.
    ///
    /// The record must currently grant access, judged by the same lazy
    /// evaluation as [`check_access`]; the proof then goes to the verifier
    /// contract with the emergency-access flag set, so the attempt is
    /// recorded there as a break-glass verification.
    ///
    /// [`check_access`]: EmergencyContract::check_access
    pub fn verify_proof_for_emergency(
        env: Env,
        hospital: Address,
        record_id: u64,
        proof_id: u64,
        verifier: Address,
        presented_statement: String,
    ) -> Result<VerifyOutcome, EmergencyError> {
        Self::require_initialized(&env)?;
        let mut record = Self::load_record(&env, &hospital, record_id)?;

        match Self::live_decision(&env, &mut record) {
            EmergencyDecision::Allow(_) => {}
            EmergencyDecision::Deny(_) => return Err(EmergencyError::RecordNotActive),
        }

        let zk_addr = Self::zk_proofs_address(&env)?;
        let prover = ZkProofContractClient::new(&env, &zk_addr);
        Ok(prover.verify_proof(&hospital, &proof_id, &verifier, &presented_statement, &true))
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Revoke an active emergency. Terminal.
    ///
    /// Only the admin or the patient's controller (resolved through the
    /// identity registry) may revoke. A replayed revocation answers with
    /// the original timestamp without touching storage, so a retried
    /// transaction cannot double-audit. A token failure aborts instead: a
    /// revocation must never half-apply.
    pub fn revoke_access(
        env: Env,
        hospital: Address,
        record_id: u64,
        revoked_by: Address,
        token: u64,
    ) -> Result<u64, EmergencyError> {
        Self::require_initialized(&env)?;
        let mut record = Self::load_record(&env, &hospital, record_id)?;

        if record.state == EmergencyState::Revoked {
            return Ok(record.revoked_at.unwrap_or(0));
        }

        let now = env.ledger().timestamp();
        if record.state != EmergencyState::Active || now >= record.expires_at.unwrap_or(0) {
            return Err(EmergencyError::RecordNotActive);
        }

        revoked_by.require_auth();

        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(EmergencyError::NotInitialized)?;
        let (actor_kind, actor) = if revoked_by == admin {
            (ActorKind::Admin, revoked_by.to_string())
        } else {
            let identity_addr = Self::identity_address(&env)?;
            let registry = IdentityContractClient::new(&env, &identity_addr);
            let controller = match registry.try_resolve_controller(&record.patient_did) {
                Ok(Ok(controller)) => controller,
                _ => return Err(EmergencyError::Unauthorized),
            };
            if controller != revoked_by {
                return Err(EmergencyError::Unauthorized);
            }
            (ActorKind::Patient, record.patient_did.clone())
        };

        let config = Self::guard_config(&env);
        request_guard::consume(&env, &revoked_by, token, config.token_max_age)
            .map_err(Self::map_guard_error)?;

        record.state = EmergencyState::Revoked;
        record.revoked_at = Some(now);
        record.revoked_by = Some(revoked_by.clone());
        Self::store_record(&env, &record);

        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("EMG_REV"),
            actor_kind,
            &actor,
            &record.patient_did,
            AuditAction::Revoke,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, record.emergency_type.label()),
        )?;
        events::publish_revoked(&env, hospital, record_id, revoked_by);

        Ok(now)
    }

    /// Sweep `record_ids`, flipping any whose access window has passed to
    /// `Expired`, each flip audited. Complements lazy expiry for tenants
    /// that want terminal states visible without waiting for the next
    /// check. Unknown ids and records in other states are skipped; returns
    /// how many records flipped.
    pub fn expire_stale(
        env: Env,
        hospital: Address,
        record_ids: Vec<u64>,
    ) -> Result<u32, EmergencyError> {
        Self::require_initialized(&env)?;
        let now = env.ledger().timestamp();
        let mut flipped: u32 = 0;

        for record_id in record_ids.iter() {
            let key = record_key(&hospital, record_id);
            let found: Option<EmergencyConsentRecord> = env.storage().persistent().get(&key);
            let mut record = match found {
                Some(record) => record,
                None => continue,
            };
            if record.state != EmergencyState::Active {
                continue;
            }
            let deadline = record.expires_at.unwrap_or(0);
            if now < deadline {
                continue;
            }

            record.state = EmergencyState::Expired;
            Self::store_record(&env, &record);

            Self::record_audit(
                &env,
                &hospital,
                symbol_short!("EMG_EXP"),
                ActorKind::System,
                &String::from_str(&env, "expiry-sweep"),
                &record.patient_did,
                AuditAction::Expire,
                AuditOutcome::Success,
                Severity::Info,
                &String::from_str(&env, record.emergency_type.label()),
            )?;
            events::publish_expired(&env, hospital.clone(), record_id, deadline);
            flipped = flipped.saturating_add(1);
        }

        Ok(flipped)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Fetch an emergency consent record.
    pub fn get_record(
        env: Env,
        hospital: Address,
        record_id: u64,
    ) -> Result<EmergencyConsentRecord, EmergencyError> {
        Self::load_record(&env, &hospital, record_id)
    }

    /// Record ids for a patient under a hospital tenant, oldest first.
    pub fn list_patient_records(env: Env, hospital: Address, patient_did: String) -> Vec<u64> {
        env.storage()
            .persistent()
            .get(&patient_records_key(&hospital, &patient_did))
            .unwrap_or(Vec::new(&env))
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), EmergencyError> {
        if !env.storage().instance().has(&INITIALIZED) {
            return Err(EmergencyError::NotInitialized);
        }
        Ok(())
    }

    fn require_admin(env: &Env, caller: &Address) -> Result<(), EmergencyError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(EmergencyError::NotInitialized)?;
        if *caller != admin {
            return Err(EmergencyError::Unauthorized);
        }
        Ok(())
    }

    fn guard_config(env: &Env) -> GuardConfig {
        env.storage()
            .instance()
            .get(&GUARD_CFG)
            .unwrap_or(GuardConfig::default_config())
    }

    fn identity_address(env: &Env) -> Result<Address, EmergencyError> {
        env.storage()
            .instance()
            .get(&IDENTITY)
            .ok_or(EmergencyError::NotInitialized)
    }

    fn audit_address(env: &Env) -> Result<Address, EmergencyError> {
        env.storage()
            .instance()
            .get(&AUDIT)
            .ok_or(EmergencyError::NotInitialized)
    }

    fn zk_proofs_address(env: &Env) -> Result<Address, EmergencyError> {
        env.storage()
            .instance()
            .get(&ZK_PROOFS)
            .ok_or(EmergencyError::NotInitialized)
    }

    fn map_guard_error(err: CommonError) -> EmergencyError {
        match err {
            CommonError::TokenMissing => EmergencyError::TokenMissing,
            CommonError::TokenOverflow => EmergencyError::TokenOverflow,
            _ => EmergencyError::TokenStale,
        }
    }

    fn approved_roles_or_default(env: &Env) -> Vec<StaffRole> {
        env.storage().instance().get(&APPROVED_ROLES).unwrap_or_else(|| {
            vec![
                env,
                StaffRole::EmergencyDoctor,
                StaffRole::Surgeon,
                StaffRole::ChiefResident,
            ]
        })
    }

    fn policy_window(
        env: &Env,
        emergency_type: &EmergencyType,
    ) -> Result<PolicyWindow, EmergencyError> {
        env.storage()
            .persistent()
            .get(&policy_key(emergency_type))
            .ok_or(EmergencyError::PolicyNotConfigured)
    }

    fn load_record(
        env: &Env,
        hospital: &Address,
        record_id: u64,
    ) -> Result<EmergencyConsentRecord, EmergencyError> {
        env.storage()
            .persistent()
            .get(&record_key(hospital, record_id))
            .ok_or(EmergencyError::RecordNotFound)
    }

    /// Roster-validate `staff_id` for `hospital` and build authorizer
    /// details from the roster profile. `None` when the staff member is
    /// unknown, registered elsewhere, off duty, or holding an unapproved
    /// role.
    fn eligible_authorizer(
        env: &Env,
        hospital: &Address,
        staff_id: &String,
    ) -> Result<Option<AuthorizerDetails>, EmergencyError> {
        let identity_addr = Self::identity_address(env)?;
        let registry = IdentityContractClient::new(env, &identity_addr);
        let approved = Self::approved_roles_or_default(env);
        if !registry.is_staff_eligible(staff_id, hospital, &approved) {
            return Ok(None);
        }
        let profile = registry.get_staff(staff_id);
        Ok(Some(AuthorizerDetails {
            staff_id: profile.staff_id,
            license_number: profile.license_number,
            role: profile.role,
            authorized_at: env.ledger().timestamp(),
        }))
    }

    /// Evaluate whether `record` currently grants access, flipping a stale
    /// `Active` to `Expired` in place.
    fn live_decision(env: &Env, record: &mut EmergencyConsentRecord) -> EmergencyDecision {
        match record.state {
            EmergencyState::Revoked => {
                EmergencyDecision::Deny(EmergencyDenyReason::EmergencyRevoked)
            }
            EmergencyState::Expired => {
                EmergencyDecision::Deny(EmergencyDenyReason::EmergencyExpired)
            }
            EmergencyState::Active => {
                let deadline = record.expires_at.unwrap_or(0);
                if env.ledger().timestamp() >= deadline {
                    record.state = EmergencyState::Expired;
                    Self::store_record(env, record);
                    events::publish_expired(env, record.hospital.clone(), record.record_id, deadline);
                    EmergencyDecision::Deny(EmergencyDenyReason::EmergencyExpired)
                } else {
                    EmergencyDecision::Allow(record.record_id)
                }
            }
            _ => EmergencyDecision::Deny(EmergencyDenyReason::NotActive),
        }
    }

    fn store_record(env: &Env, record: &EmergencyConsentRecord) {
        let key = record_key(&record.hospital, record.record_id);
        env.storage().persistent().set(&key, record);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }

    fn next_record_id(env: &Env, hospital: &Address) -> u64 {
        let key = record_count_key(hospital);
        let next = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or(0u64)
            .saturating_add(1);
        env.storage().persistent().set(&key, &next);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        next
    }

    /// Count a guard failure for the hospital account and flag a forgery
    /// violation the moment the count reaches the configured threshold
    /// within the window.
    fn note_guard_failure(
        env: &Env,
        hospital: &Address,
        config: &GuardConfig,
    ) -> Result<(), EmergencyError> {
        let strikes = request_guard::note_violation(env, hospital, config.failure_window);
        if strikes == config.failure_threshold {
            let audit_addr = Self::audit_address(env)?;
            let recorder = AuditContractClient::new(env, &audit_addr);
            recorder.flag_violation(
                &env.current_contract_address(),
                hospital,
                &ViolationKind::RequestForgery,
                &Severity::Warning,
                &hospital.to_string(),
                &String::from_str(env, "repeated request-token failures on emergency endpoints"),
            );
        }
        Ok(())
    }

    /// Flag a staff member who tried to countersign their own
    /// authorization. Integrity-class violation, so it goes out at
    /// `Critical` regardless of whether the attempt repeats.
    fn flag_self_authorization(
        env: &Env,
        hospital: &Address,
        staff_id: &String,
    ) -> Result<(), EmergencyError> {
        let audit_addr = Self::audit_address(env)?;
        let recorder = AuditContractClient::new(env, &audit_addr);
        recorder.flag_violation(
            &env.current_contract_address(),
            hospital,
            &ViolationKind::SelfAuthorization,
            &Severity::Critical,
            staff_id,
            &String::from_str(env, "staff member countersigned their own authorization"),
        );
        Ok(())
    }

    /// Shorthand for the authorize paths, which always audit with a staff
    /// actor and `Info`/`Warning` severity keyed off the outcome.
    fn audit_authorize(
        env: &Env,
        hospital: &Address,
        event_type: Symbol,
        staff_id: &String,
        patient_did: &String,
        action: AuditAction,
        outcome: AuditOutcome,
        metadata: &'static str,
    ) -> Result<(), EmergencyError> {
        let severity = match outcome {
            AuditOutcome::Success => Severity::Info,
            _ => Severity::Warning,
        };
        Self::record_audit(
            env,
            hospital,
            event_type,
            ActorKind::Staff,
            staff_id,
            patient_did,
            action,
            outcome,
            severity,
            &String::from_str(env, metadata),
        )
    }

    /// Append to the audit recorder. A failure there aborts this
    /// invocation, so no workflow step can complete unrecorded.
    fn record_audit(
        env: &Env,
        hospital: &Address,
        event_type: Symbol,
        actor_kind: ActorKind,
        actor: &String,
        target_id: &String,
        action: AuditAction,
        outcome: AuditOutcome,
        severity: Severity,
        metadata: &String,
    ) -> Result<(), EmergencyError> {
        let audit_addr = Self::audit_address(env)?;
        let recorder = AuditContractClient::new(env, &audit_addr);
        recorder.record_event(
            &env.current_contract_address(),
            hospital,
            &event_type,
            &actor_kind,
            actor,
            &symbol_short!("EMERGENCY"),
            target_id,
            &action,
            &outcome,
            &severity,
            metadata,
        );
        Ok(())
    }
}

// ── Storage key helpers ──────────────────────────────────────────────────────

fn record_key(hospital: &Address, record_id: u64) -> (Symbol, Address, u64) {
    (symbol_short!("EMG_REC"), hospital.clone(), record_id)
}

fn patient_records_key(hospital: &Address, patient_did: &String) -> (Symbol, Address, String) {
    (
        symbol_short!("EMG_PAT"),
        hospital.clone(),
        patient_did.clone(),
    )
}

fn record_count_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("EMG_CNT"), hospital.clone())
}

fn policy_key(emergency_type: &EmergencyType) -> (Symbol, EmergencyType) {
    (symbol_short!("EMG_POL"), emergency_type.clone())
}
