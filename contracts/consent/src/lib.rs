//! # Consent Ledger
//!
//! Patient-controlled consent over health-record exchange. A grant names the
//! hospital tenant, the consenting patient, the requester and the record
//! content hash; checks answer Allow or Deny with a machine-readable reason.
//! Grants must be backed by a live consent credential from the credential
//! store, mutations are guarded by one-time request tokens, and every
//! decision lands in the audit chain within the same invocation.
//!
//! Rejections a caller can repair (missing token, missing credential) are
//! returned as [`GrantOutcome::Rejected`] values so the audit row and the
//! guard's failure bookkeeping persist; errors abort and roll back.

#![no_std]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod events;
pub mod types;


use soroban_sdk::{
    contract, contractimpl, symbol_short, Address, BytesN, Env, String, Symbol, Vec,
};

use audit::types::{ActorKind, AuditAction, AuditOutcome, Severity, ViolationKind};
use audit::AuditContractClient;
use common::{request_guard, CommonError};
use credentials::types::CredentialKind;
use credentials::CredentialContractClient;
use errors::ConsentError;
use types::{
    AccessDecision, AnchorStatus, ConsentGrant, ConsentKind, DenyReason, GrantOutcome,
    GrantReject, GuardConfig,
};

/// Storage keys
const ADMIN: Symbol = symbol_short!("ADMIN");
const CREDENTIALS: Symbol = symbol_short!("CREDS");
const AUDIT: Symbol = symbol_short!("AUDIT");
const INITIALIZED: Symbol = symbol_short!("INIT");
const GUARD_CFG: Symbol = symbol_short!("GUARD_CFG");

/// TTL constants for persistent storage (in ledgers)
const TTL_THRESHOLD: u32 = 5_184_000; // ~60 days
const TTL_EXTEND_TO: u32 = 10_368_000; // ~120 days

#[contract]
pub struct ConsentContract;

#[contractimpl]
impl ConsentContract {
    // ── Initialization ───────────────────────────────────────────────────────

    /// Initialize the ledger with an administrator and its collaborators:
    /// the credential store grants are checked against and the audit
    /// recorder every decision is appended to.
    pub fn initialize(
        env: Env,
        admin: Address,
        credentials: Address,
        audit: Address,
    ) -> Result<(), ConsentError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(ConsentError::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&CREDENTIALS, &credentials);
        env.storage().instance().set(&AUDIT, &audit);
        env.storage()
            .instance()
            .set(&GUARD_CFG, &GuardConfig::default_config());
        env.storage().instance().set(&INITIALIZED, &true);
        env.storage()
            .instance()
            .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_initialized(&env, admin, credentials, audit);

        Ok(())
    }

    /// Get the admin address.
    pub fn get_admin(env: Env) -> Result<Address, ConsentError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ConsentError::NotInitialized)
    }

    /// Point the ledger at a different credential store.
    pub fn set_credentials(
        env: Env,
        caller: Address,
        credentials: Address,
    ) -> Result<(), ConsentError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&CREDENTIALS, &credentials);
        Ok(())
    }

    /// Point the ledger at a different audit recorder.
    pub fn set_audit(env: Env, caller: Address, audit: Address) -> Result<(), ConsentError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&AUDIT, &audit);
        Ok(())
    }

    /// Replace the request-token guard settings.
    pub fn set_guard_config(
        env: Env,
        caller: Address,
        config: GuardConfig,
    ) -> Result<(), ConsentError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        if config.token_max_age == 0 || config.failure_window == 0 || config.failure_threshold == 0
        {
            return Err(ConsentError::InvalidInput);
        }

        env.storage().instance().set(&GUARD_CFG, &config);
        Ok(())
    }

    /// Current request-token guard settings.
    pub fn get_guard_config(env: Env) -> GuardConfig {
        Self::guard_config(&env)
    }

    // ── Request tokens ───────────────────────────────────────────────────────

    /// Mint a one-time request token for `actor`, to be echoed on the next
    /// guarded mutation. Minting replaces any token still outstanding.
    pub fn issue_request_token(env: Env, actor: Address) -> Result<u64, ConsentError> {
        Self::require_initialized(&env)?;
        actor.require_auth();
        request_guard::mint(&env, &actor).map_err(Self::map_guard_error)
    }

    // ── Grants ───────────────────────────────────────────────────────────────

    /// Record a patient's consent for `requester` to access the record
    /// identified by `content_hash` under the `hospital` tenant.
    ///
    /// The patient controller authorizes the call directly and must present
    /// a valid request token; the patient must hold a live consent
    /// credential at this hospital. Repairable failures come back as
    /// [`GrantOutcome::Rejected`] with the audit row already written; token
    /// failures additionally count toward the forgery threshold.
    ///
    /// A past `expires_at` is a validation error and leaves no trace.
    pub fn grant_consent(
        env: Env,
        hospital: Address,
        patient_did: String,
        patient: Address,
        requester: Address,
        content_hash: BytesN<32>,
        kind: ConsentKind,
        expires_at: Option<u64>,
        token: u64,
    ) -> Result<GrantOutcome, ConsentError> {
        Self::require_initialized(&env)?;

        if patient_did.is_empty() {
            return Err(ConsentError::InvalidInput);
        }
        if let Some(expiry) = expires_at {
            if expiry <= env.ledger().timestamp() {
                return Err(ConsentError::InvalidExpiry);
            }
        }

        patient.require_auth();

        let config = Self::guard_config(&env);
        if let Err(guard_err) = request_guard::consume(&env, &patient, token, config.token_max_age)
        {
            let reject = match guard_err {
                CommonError::TokenMissing => GrantReject::TokenMissing,
                _ => GrantReject::TokenStale,
            };
            Self::note_guard_failure(&env, &hospital, &patient, &config)?;
            Self::record_audit(
                &env,
                &hospital,
                symbol_short!("CNS_GRT"),
                ActorKind::Patient,
                &patient_did,
                &patient_did,
                AuditAction::Grant,
                AuditOutcome::Denied,
                Severity::Warning,
                &String::from_str(&env, reject.label()),
            )?;
            return Ok(GrantOutcome::Rejected(reject));
        }

        let credentials_addr = Self::credentials_address(&env)?;
        let store = CredentialContractClient::new(&env, &credentials_addr);
        let backing =
            store.find_active_credential(&patient_did, &hospital, &CredentialKind::Consent);
        let credential_id = match backing {
            Some(credential_id) => credential_id,
            None => {
                let reject = GrantReject::CredentialMissingOrRevoked;
                Self::record_audit(
                    &env,
                    &hospital,
                    symbol_short!("CNS_GRT"),
                    ActorKind::Patient,
                    &patient_did,
                    &patient_did,
                    AuditAction::Grant,
                    AuditOutcome::Failed,
                    Severity::Warning,
                    &String::from_str(&env, reject.label()),
                )?;
                return Ok(GrantOutcome::Rejected(reject));
            }
        };

        let grant_id = Self::next_grant_id(&env, &hospital);
        let grant = ConsentGrant {
            grant_id,
            hospital: hospital.clone(),
            patient_did: patient_did.clone(),
            patient: patient.clone(),
            requester: requester.clone(),
            content_hash: content_hash.clone(),
            kind: kind.clone(),
            consent_given: true,
            credential_id,
            granted_at: env.ledger().timestamp(),
            expires_at,
            revoked_at: None,
            revoked_by: None,
            anchor_status: AnchorStatus::Pending,
            anchor_ref: None,
        };
        Self::store_grant(&env, &grant);

        // Checks resolve through this index; a new grant for the same
        // triple supersedes the old one.
        let idx_key = latest_key(&hospital, &patient_did, &requester, &content_hash);
        env.storage().persistent().set(&idx_key, &grant_id);
        env.storage()
            .persistent()
            .extend_ttl(&idx_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let listing_key = patient_grants_key(&hospital, &patient_did);
        let mut listed: Vec<u64> = env
            .storage()
            .persistent()
            .get(&listing_key)
            .unwrap_or(Vec::new(&env));
        listed.push_back(grant_id);
        env.storage().persistent().set(&listing_key, &listed);
        env.storage()
            .persistent()
            .extend_ttl(&listing_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let anchor_key = pending_anchor_key(&hospital);
        let mut pending: Vec<u64> = env
            .storage()
            .persistent()
            .get(&anchor_key)
            .unwrap_or(Vec::new(&env));
        pending.push_back(grant_id);
        env.storage().persistent().set(&anchor_key, &pending);
        env.storage()
            .persistent()
            .extend_ttl(&anchor_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("CNS_GRT"),
            ActorKind::Patient,
            &patient_did,
            &patient_did,
            AuditAction::Grant,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, kind.label()),
        )?;
        events::publish_granted(&env, hospital, grant_id, patient_did, requester, kind);

        Ok(GrantOutcome::Granted(grant))
    }

    /// Decide whether `requester` may access the record identified by
    /// `content_hash` for this patient under the `hospital` tenant.
    ///
    /// Allow requires a live grant: consented, not revoked, not past its
    /// expiry. An expired grant is flipped dormant in place on first
    /// detection and keeps answering `Deny(Expired)`. Every call writes
    /// exactly one audit event carrying the decision.
    pub fn check_consent(
        env: Env,
        hospital: Address,
        patient_did: String,
        requester: Address,
        content_hash: BytesN<32>,
    ) -> Result<AccessDecision, ConsentError> {
        Self::require_initialized(&env)?;

        let grant_id: Option<u64> = env
            .storage()
            .persistent()
            .get(&latest_key(&hospital, &patient_did, &requester, &content_hash));
        let decision = Self::decide(&env, &hospital, grant_id)?;

        let (outcome, metadata) = match &decision {
            AccessDecision::Allow(_) => (AuditOutcome::Success, String::from_str(&env, "allow")),
            AccessDecision::Deny(reason) => {
                (AuditOutcome::Denied, String::from_str(&env, reason.label()))
            }
        };
        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("CNS_CHK"),
            ActorKind::Staff,
            &requester.to_string(),
            &patient_did,
            AuditAction::Check,
            outcome,
            Severity::Info,
            &metadata,
        )?;
        events::publish_checked(&env, hospital, requester, decision.clone());

        Ok(decision)
    }

    /// Withdraw a grant. Only the patient controller who authorized it or
    /// the admin may revoke; the caller presents a request token.
    ///
    /// Returns the revocation timestamp. Replays are answered from storage:
    /// a grant already revoked returns its original `revoked_at` without
    /// burning a token or writing a second audit row.
    pub fn revoke_consent(
        env: Env,
        hospital: Address,
        grant_id: u64,
        revoked_by: Address,
        token: u64,
    ) -> Result<u64, ConsentError> {
        Self::require_initialized(&env)?;

        let key = grant_key(&hospital, grant_id);
        let mut grant: ConsentGrant = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ConsentError::GrantNotFound)?;

        if let Some(revoked_at) = grant.revoked_at {
            return Ok(revoked_at);
        }

        revoked_by.require_auth();
        let actor_kind = if revoked_by == grant.patient {
            ActorKind::Patient
        } else {
            Self::require_admin(&env, &revoked_by)?;
            ActorKind::Admin
        };

        let config = Self::guard_config(&env);
        request_guard::consume(&env, &revoked_by, token, config.token_max_age)
            .map_err(Self::map_guard_error)?;

        let now = env.ledger().timestamp();
        grant.consent_given = false;
        grant.revoked_at = Some(now);
        grant.revoked_by = Some(revoked_by.clone());
        Self::store_grant(&env, &grant);

        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("CNS_REV"),
            actor_kind,
            &revoked_by.to_string(),
            &grant.patient_did,
            AuditAction::Revoke,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, grant.kind.label()),
        )?;
        events::publish_revoked(&env, hospital, grant_id, revoked_by);

        Ok(now)
    }

    // ── Anchor reconciliation ────────────────────────────────────────────────

    /// Mark a grant as recorded on the anchoring ledger.
    ///
    /// Endpoint for the reconciliation job; granting never waits on it.
    /// Re-posting an already recorded grant is a no-op that keeps the
    /// first anchor reference.
    pub fn confirm_anchor(
        env: Env,
        caller: Address,
        hospital: Address,
        grant_id: u64,
        anchor_ref: BytesN<32>,
    ) -> Result<(), ConsentError> {
        Self::require_initialized(&env)?;
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        let key = grant_key(&hospital, grant_id);
        let mut grant: ConsentGrant = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ConsentError::GrantNotFound)?;

        if grant.anchor_status == AnchorStatus::Recorded {
            return Ok(());
        }

        grant.anchor_status = AnchorStatus::Recorded;
        grant.anchor_ref = Some(anchor_ref.clone());
        Self::store_grant(&env, &grant);
        Self::remove_pending_anchor(&env, &hospital, grant_id);

        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("CNS_ANC"),
            ActorKind::Admin,
            &caller.to_string(),
            &grant.patient_did,
            AuditAction::Anchor,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, "anchor_recorded"),
        )?;
        events::publish_anchored(&env, hospital, grant_id, anchor_ref);

        Ok(())
    }

    /// Grants still awaiting their anchor attestation under a tenant.
    pub fn pending_anchor_grants(env: Env, hospital: Address) -> Vec<u64> {
        env.storage()
            .persistent()
            .get(&pending_anchor_key(&hospital))
            .unwrap_or(Vec::new(&env))
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Fetch a grant by tenant and id.
    pub fn get_grant(
        env: Env,
        hospital: Address,
        grant_id: u64,
    ) -> Result<ConsentGrant, ConsentError> {
        env.storage()
            .persistent()
            .get(&grant_key(&hospital, grant_id))
            .ok_or(ConsentError::GrantNotFound)
    }

    /// All grant ids a patient has issued under a tenant, oldest first.
    pub fn list_patient_grants(env: Env, hospital: Address, patient_did: String) -> Vec<u64> {
        env.storage()
            .persistent()
            .get(&patient_grants_key(&hospital, &patient_did))
            .unwrap_or(Vec::new(&env))
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), ConsentError> {
        if !env.storage().instance().has(&INITIALIZED) {
            return Err(ConsentError::NotInitialized);
        }
        Ok(())
    }

    fn require_admin(env: &Env, caller: &Address) -> Result<(), ConsentError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ConsentError::NotInitialized)?;
        if *caller != admin {
            return Err(ConsentError::Unauthorized);
        }
        Ok(())
    }

    fn guard_config(env: &Env) -> GuardConfig {
        env.storage()
            .instance()
            .get(&GUARD_CFG)
            .unwrap_or(GuardConfig::default_config())
    }

    fn credentials_address(env: &Env) -> Result<Address, ConsentError> {
        env.storage()
            .instance()
            .get(&CREDENTIALS)
            .ok_or(ConsentError::NotInitialized)
    }

    fn audit_address(env: &Env) -> Result<Address, ConsentError> {
        env.storage()
            .instance()
            .get(&AUDIT)
            .ok_or(ConsentError::NotInitialized)
    }

    fn map_guard_error(err: CommonError) -> ConsentError {
        match err {
            CommonError::TokenMissing => ConsentError::TokenMissing,
            CommonError::TokenOverflow => ConsentError::TokenOverflow,
            _ => ConsentError::TokenStale,
        }
    }

    /// Resolve the decision for the indexed grant, flipping expired grants
    /// dormant in place.
    fn decide(
        env: &Env,
        hospital: &Address,
        grant_id: Option<u64>,
    ) -> Result<AccessDecision, ConsentError> {
        let grant_id = match grant_id {
            Some(grant_id) => grant_id,
            None => return Ok(AccessDecision::Deny(DenyReason::NotGranted)),
        };
        let mut grant: ConsentGrant = env
            .storage()
            .persistent()
            .get(&grant_key(hospital, grant_id))
            .ok_or(ConsentError::GrantNotFound)?;

        if grant.revoked_at.is_some() {
            return Ok(AccessDecision::Deny(DenyReason::Revoked));
        }
        if let Some(expiry) = grant.expires_at {
            if env.ledger().timestamp() >= expiry {
                if grant.consent_given {
                    grant.consent_given = false;
                    Self::store_grant(env, &grant);
                }
                return Ok(AccessDecision::Deny(DenyReason::Expired));
            }
        }
        if !grant.consent_given {
            return Ok(AccessDecision::Deny(DenyReason::NotGranted));
        }
        Ok(AccessDecision::Allow(grant_id))
    }

    fn store_grant(env: &Env, grant: &ConsentGrant) {
        let key = grant_key(&grant.hospital, grant.grant_id);
        env.storage().persistent().set(&key, grant);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }

    fn next_grant_id(env: &Env, hospital: &Address) -> u64 {
        let key = grant_count_key(hospital);
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

    fn remove_pending_anchor(env: &Env, hospital: &Address, grant_id: u64) {
        let key = pending_anchor_key(hospital);
        let pending: Vec<u64> = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or(Vec::new(env));
        let mut remaining = Vec::new(env);
        for id in pending.iter() {
            if id != grant_id {
                remaining.push_back(id);
            }
        }
        env.storage().persistent().set(&key, &remaining);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }

    /// Count a guard failure for `actor` and flag a forgery violation the
    /// moment the count reaches the configured threshold within the window.
    fn note_guard_failure(
        env: &Env,
        hospital: &Address,
        actor: &Address,
        config: &GuardConfig,
    ) -> Result<(), ConsentError> {
        let strikes = request_guard::note_violation(env, actor, config.failure_window);
        if strikes == config.failure_threshold {
            let audit_addr = Self::audit_address(env)?;
            let recorder = AuditContractClient::new(env, &audit_addr);
            recorder.flag_violation(
                &env.current_contract_address(),
                hospital,
                &ViolationKind::RequestForgery,
                &Severity::Warning,
                &actor.to_string(),
                &String::from_str(env, "repeated request-token failures on consent endpoints"),
            );
        }
        Ok(())
    }

    /// Append to the audit recorder. A failure there aborts this invocation,
    /// so no consent decision can complete unrecorded.
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
    ) -> Result<(), ConsentError> {
        let audit_addr = Self::audit_address(env)?;
        let recorder = AuditContractClient::new(env, &audit_addr);
        recorder.record_event(
            &env.current_contract_address(),
            hospital,
            &event_type,
            &actor_kind,
            actor,
            &symbol_short!("GRANT"),
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

fn grant_key(hospital: &Address, grant_id: u64) -> (Symbol, Address, u64) {
    (symbol_short!("GRANT"), hospital.clone(), grant_id)
}

fn latest_key(
    hospital: &Address,
    patient_did: &String,
    requester: &Address,
    content_hash: &BytesN<32>,
) -> (Symbol, Address, String, Address, BytesN<32>) {
    (
        symbol_short!("GRT_IDX"),
        hospital.clone(),
        patient_did.clone(),
        requester.clone(),
        content_hash.clone(),
    )
}

fn patient_grants_key(hospital: &Address, patient_did: &String) -> (Symbol, Address, String) {
    (
        symbol_short!("PAT_IDX"),
        hospital.clone(),
        patient_did.clone(),
    )
}

fn pending_anchor_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("ANC_PND"), hospital.clone())
}

fn grant_count_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("GRT_CNT"), hospital.clone())
}
