//! # ZKP Proof Verifier
//!
//! Issues predicate proofs bound to a single-use challenge and verifies them
//! against the stored commitment. Expired or deactivated proofs never
//! verify, every attempt leaves an immutable verification row, and a
//! commitment mismatch is flagged as an integrity violation.

#![no_std]
#![allow(clippy::too_many_arguments)]

pub mod commitment;
pub mod events;
pub mod types;


use soroban_sdk::{
    contract, contractimpl, symbol_short, Address, Bytes, Env, String, Symbol, Vec,
};

use audit::types::{ActorKind, AuditAction, AuditOutcome, Severity, ViolationKind};
use audit::AuditContractClient;
use types::{ProofKind, VerifyOutcome, VerifyReject, ZkProof, ZkVerification};

/// Storage keys
const ADMIN: Symbol = symbol_short!("ADMIN");
const AUDIT: Symbol = symbol_short!("AUDIT");
const INITIALIZED: Symbol = symbol_short!("INIT");
const PROOF_COUNT: Symbol = symbol_short!("PRF_CNT");

/// TTL constants for persistent storage (in ledgers)
const TTL_THRESHOLD: u32 = 172_800; // ~10 days
const TTL_EXTEND_TO: u32 = 1_036_800; // ~60 days

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ZkProofError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    ProofNotFound = 4,
    VerificationNotFound = 5,
    EmptySecret = 6,
    InvalidExpiry = 7,
    InvalidInput = 8,
}

#[contract]
pub struct ZkProofContract;

#[contractimpl]
impl ZkProofContract {
    // ── Initialization ───────────────────────────────────────────────────────

    /// Initialize the verifier with an administrator and the audit recorder.
    pub fn initialize(env: Env, admin: Address, audit: Address) -> Result<(), ZkProofError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(ZkProofError::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&AUDIT, &audit);
        env.storage().instance().set(&INITIALIZED, &true);
        env.storage()
            .instance()
            .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_initialized(&env, admin, audit);

        Ok(())
    }

    /// Get the admin address.
    pub fn get_admin(env: Env) -> Result<Address, ZkProofError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ZkProofError::NotInitialized)
    }

    /// Point the verifier at a different audit recorder.
    pub fn set_audit(env: Env, caller: Address, audit: Address) -> Result<(), ZkProofError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&AUDIT, &audit);
        Ok(())
    }

    // ── Proof lifecycle ──────────────────────────────────────────────────────

    /// Issue a proof over a sealed secret.
    ///
    /// Each call mints a fresh challenge, so two proofs over identical
    /// inputs still carry distinct commitments and neither can stand in for
    /// the other.
    pub fn issue_proof(
        env: Env,
        issuer: Address,
        patient_did: String,
        kind: ProofKind,
        public_statement: String,
        sealed_secret: Bytes,
        expires_at: u64,
    ) -> Result<ZkProof, ZkProofError> {
        Self::require_initialized(&env)?;
        issuer.require_auth();

        if patient_did.is_empty() || public_statement.is_empty() {
            return Err(ZkProofError::InvalidInput);
        }
        if sealed_secret.is_empty() {
            return Err(ZkProofError::EmptySecret);
        }
        let now = env.ledger().timestamp();
        if expires_at <= now {
            return Err(ZkProofError::InvalidExpiry);
        }

        let proof_id = Self::next_proof_id(&env);
        let challenge = commitment::mint_challenge(&env, proof_id, &sealed_secret);
        let binding = commitment::bind_commitment(&env, &sealed_secret, &challenge, &public_statement);

        let proof = ZkProof {
            proof_id,
            patient_did: patient_did.clone(),
            kind: kind.clone(),
            public_statement,
            sealed_secret,
            challenge,
            commitment: binding,
            issued_by: issuer.clone(),
            issued_at: now,
            expires_at,
            active: true,
            verification_count: 0,
        };

        let key = proof_key(proof_id);
        env.storage().persistent().set(&key, &proof);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let idx_key = patient_proofs_key(&patient_did);
        let mut ids: Vec<u64> = env
            .storage()
            .persistent()
            .get(&idx_key)
            .unwrap_or(Vec::new(&env));
        ids.push_back(proof_id);
        env.storage().persistent().set(&idx_key, &ids);
        env.storage()
            .persistent()
            .extend_ttl(&idx_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        Self::record_audit(
            &env,
            &issuer,
            symbol_short!("ZKP_ISS"),
            ActorKind::Hospital,
            &issuer.to_string(),
            &patient_did,
            AuditAction::Issue,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, kind_label(&kind)),
        )?;

        events::publish_proof_issued(&env, patient_did, proof_id, kind);

        Ok(proof)
    }

    /// Verify a proof by recomputing its commitment with the presented
    /// statement.
    ///
    /// Checks are ordered: expiry, then activity, then the commitment — an
    /// expired proof is rejected as expired even when the commitment would
    /// match. Every attempt appends a verification row and an audit event.
    /// Only a success moves `verification_count`, and it moves exactly once.
    pub fn verify_proof(
        env: Env,
        hospital: Address,
        proof_id: u64,
        verifier: Address,
        presented_statement: String,
        emergency_access: bool,
    ) -> Result<VerifyOutcome, ZkProofError> {
        Self::require_initialized(&env)?;
        verifier.require_auth();

        let key = proof_key(proof_id);
        let mut proof: ZkProof = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ZkProofError::ProofNotFound)?;

        let now = env.ledger().timestamp();
        let reject = if now >= proof.expires_at {
            Some(VerifyReject::ProofExpired)
        } else if !proof.active {
            Some(VerifyReject::ProofInactive)
        } else {
            let recomputed = commitment::bind_commitment(
                &env,
                &proof.sealed_secret,
                &proof.challenge,
                &presented_statement,
            );
            if recomputed != proof.commitment {
                Some(VerifyReject::ProofInvalid)
            } else {
                None
            }
        };

        let outcome_ok = reject.is_none();
        if outcome_ok {
            proof.verification_count = proof.verification_count.saturating_add(1);
            env.storage().persistent().set(&key, &proof);
            env.storage()
                .persistent()
                .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        }

        let seq = Self::next_attempt_seq(&env, proof_id);
        let row = ZkVerification {
            proof_id,
            seq,
            verified_by: verifier.clone(),
            outcome_ok,
            reject: reject.clone(),
            emergency_access,
            verified_at: now,
        };
        let row_key = verification_key(proof_id, seq);
        env.storage().persistent().set(&row_key, &row);
        env.storage()
            .persistent()
            .extend_ttl(&row_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let (audit_outcome, metadata) = match &reject {
            None => (AuditOutcome::Success, "verified"),
            Some(r) => (AuditOutcome::Denied, reject_label(r)),
        };
        Self::record_audit(
            &env,
            &hospital,
            symbol_short!("ZKP_VRF"),
            ActorKind::Hospital,
            &verifier.to_string(),
            &proof.patient_did,
            AuditAction::Verify,
            audit_outcome,
            Severity::Info,
            &String::from_str(&env, metadata),
        )?;

        if reject == Some(VerifyReject::ProofInvalid) {
            Self::flag_commitment_mismatch(&env, &hospital, &verifier.to_string())?;
        }

        events::publish_proof_verified(&env, hospital, proof_id, outcome_ok, emergency_access);

        match reject {
            None => Ok(VerifyOutcome::Verified),
            Some(r) => Ok(VerifyOutcome::Rejected(r)),
        }
    }

    /// Take a proof out of circulation. Issuer or admin; deactivating an
    /// already inactive proof is a no-op and records nothing.
    pub fn deactivate_proof(
        env: Env,
        caller: Address,
        proof_id: u64,
    ) -> Result<(), ZkProofError> {
        caller.require_auth();

        let key = proof_key(proof_id);
        let mut proof: ZkProof = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ZkProofError::ProofNotFound)?;

        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ZkProofError::NotInitialized)?;
        if caller != admin && caller != proof.issued_by {
            return Err(ZkProofError::Unauthorized);
        }

        if !proof.active {
            return Ok(());
        }

        proof.active = false;
        env.storage().persistent().set(&key, &proof);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        Self::record_audit(
            &env,
            &proof.issued_by,
            symbol_short!("ZKP_DEA"),
            if caller == admin {
                ActorKind::Admin
            } else {
                ActorKind::Hospital
            },
            &caller.to_string(),
            &proof.patient_did,
            AuditAction::Deactivate,
            AuditOutcome::Success,
            Severity::Info,
            &String::from_str(&env, "proof deactivated"),
        )?;

        events::publish_proof_deactivated(&env, proof_id);

        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Fetch a proof by id.
    pub fn get_proof(env: Env, proof_id: u64) -> Result<ZkProof, ZkProofError> {
        let key = proof_key(proof_id);
        let proof: ZkProof = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ZkProofError::ProofNotFound)?;
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(proof)
    }

    /// Successful verification count for a proof.
    pub fn verification_count(env: Env, proof_id: u64) -> Result<u64, ZkProofError> {
        Ok(Self::get_proof(env, proof_id)?.verification_count)
    }

    /// Fetch one verification attempt row.
    pub fn get_verification(
        env: Env,
        proof_id: u64,
        seq: u64,
    ) -> Result<ZkVerification, ZkProofError> {
        env.storage()
            .persistent()
            .get(&verification_key(proof_id, seq))
            .ok_or(ZkProofError::VerificationNotFound)
    }

    /// All verification attempts against a proof, in order.
    pub fn list_verifications(env: Env, proof_id: u64) -> Vec<ZkVerification> {
        let count: u64 = env
            .storage()
            .persistent()
            .get(&attempt_count_key(proof_id))
            .unwrap_or(0u64);
        let mut rows = Vec::new(&env);
        let mut seq: u64 = 1;
        while seq <= count {
            if let Some(row) = env
                .storage()
                .persistent()
                .get::<_, ZkVerification>(&verification_key(proof_id, seq))
            {
                rows.push_back(row);
            }
            seq += 1;
        }
        rows
    }

    /// Ids of all proofs issued for a patient.
    pub fn list_patient_proofs(env: Env, patient_did: String) -> Vec<u64> {
        env.storage()
            .persistent()
            .get(&patient_proofs_key(&patient_did))
            .unwrap_or(Vec::new(&env))
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), ZkProofError> {
        if !env.storage().instance().has(&INITIALIZED) {
            return Err(ZkProofError::NotInitialized);
        }
        Ok(())
    }

    fn require_admin(env: &Env, caller: &Address) -> Result<(), ZkProofError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ZkProofError::NotInitialized)?;
        if *caller != admin {
            return Err(ZkProofError::Unauthorized);
        }
        Ok(())
    }

    fn next_proof_id(env: &Env) -> u64 {
        let next = env
            .storage()
            .persistent()
            .get(&PROOF_COUNT)
            .unwrap_or(0u64)
            .saturating_add(1);
        env.storage().persistent().set(&PROOF_COUNT, &next);
        env.storage()
            .persistent()
            .extend_ttl(&PROOF_COUNT, TTL_THRESHOLD, TTL_EXTEND_TO);
        next
    }

    fn next_attempt_seq(env: &Env, proof_id: u64) -> u64 {
        let key = attempt_count_key(proof_id);
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

    /// Append to the audit recorder. A failure there aborts this invocation,
    /// so no proof transition or verification attempt goes unrecorded.
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
    ) -> Result<(), ZkProofError> {
        let audit_addr: Address = env
            .storage()
            .instance()
            .get(&AUDIT)
            .ok_or(ZkProofError::NotInitialized)?;
        let client = AuditContractClient::new(env, &audit_addr);
        client.record_event(
            &env.current_contract_address(),
            hospital,
            &event_type,
            &actor_kind,
            actor,
            &symbol_short!("PROOF"),
            target_id,
            &action,
            &outcome,
            &severity,
            metadata,
        );
        Ok(())
    }

    fn flag_commitment_mismatch(
        env: &Env,
        hospital: &Address,
        actor: &String,
    ) -> Result<(), ZkProofError> {
        let audit_addr: Address = env
            .storage()
            .instance()
            .get(&AUDIT)
            .ok_or(ZkProofError::NotInitialized)?;
        let client = AuditContractClient::new(env, &audit_addr);
        client.flag_violation(
            &env.current_contract_address(),
            hospital,
            &ViolationKind::CommitmentMismatch,
            &Severity::Critical,
            actor,
            &String::from_str(env, "commitment recomputation mismatch"),
        );
        Ok(())
    }
}

// ── Storage key helpers ──────────────────────────────────────────────────────

fn proof_key(proof_id: u64) -> (Symbol, u64) {
    (symbol_short!("PROOF"), proof_id)
}

fn verification_key(proof_id: u64, seq: u64) -> (Symbol, u64, u64) {
    (symbol_short!("VERIF"), proof_id, seq)
}

fn attempt_count_key(proof_id: u64) -> (Symbol, u64) {
    (symbol_short!("ATT_CNT"), proof_id)
}

fn patient_proofs_key(patient_did: &String) -> (Symbol, String) {
    (symbol_short!("PAT_IDX"), patient_did.clone())
}

// ── Labels ───────────────────────────────────────────────────────────────────

fn kind_label(kind: &ProofKind) -> &'static str {
    match kind {
        ProofKind::AllergyPresence => "allergy_presence",
        ProofKind::BloodTypeMatch => "blood_type_match",
        ProofKind::VaccinationStatus => "vaccination_status",
        ProofKind::DiagnosisPresence => "diagnosis_presence",
        ProofKind::AgeOver => "age_over",
    }
}

fn reject_label(reject: &VerifyReject) -> &'static str {
    match reject {
        VerifyReject::ProofExpired => "proof_expired",
        VerifyReject::ProofInactive => "proof_inactive",
        VerifyReject::ProofInvalid => "commitment_mismatch",
    }
}
