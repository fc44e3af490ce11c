//! # Credential Store
//!
//! Registry of verifiable credentials backing consent and emergency access.
//! Issuers sign a canonical message over the credential envelope hash; the
//! contract checks the Ed25519 signature against the issuer's registered key
//! before anything is stored. Every issuance and revocation is appended to
//! the audit recorder in the same invocation.

#![no_std]
#![allow(clippy::too_many_arguments)]

pub mod events;
pub mod types;


use soroban_sdk::{
    contract, contractimpl, symbol_short, Address, Bytes, BytesN, Env, String, Symbol, Vec,
};

use audit::types::{ActorKind, AuditAction, AuditOutcome, Severity};
use audit::AuditContractClient;
use types::{CredentialKind, IssuerProfile, VerifiableCredential};

/// Storage keys
const ADMIN: Symbol = symbol_short!("ADMIN");
const AUDIT: Symbol = symbol_short!("AUDIT");
const INITIALIZED: Symbol = symbol_short!("INIT");
const CREDENTIAL_COUNT: Symbol = symbol_short!("CRD_CNT");

/// TTL constants for persistent storage (in ledgers)
const TTL_THRESHOLD: u32 = 518_400; // ~30 days
const TTL_EXTEND_TO: u32 = 1_036_800; // ~60 days

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum CredentialError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    IssuerNotFound = 4,
    IssuerAlreadyRegistered = 5,
    IssuerInactive = 6,
    CredentialNotFound = 7,
    InvalidExpiry = 8,
    InvalidInput = 9,
}

#[contract]
pub struct CredentialContract;

#[contractimpl]
impl CredentialContract {
    // ── Initialization ───────────────────────────────────────────────────────

    /// Initialize the store with an administrator and the audit recorder
    /// this contract appends to.
    pub fn initialize(env: Env, admin: Address, audit: Address) -> Result<(), CredentialError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(CredentialError::AlreadyInitialized);
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
    pub fn get_admin(env: Env) -> Result<Address, CredentialError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(CredentialError::NotInitialized)
    }

    /// Point the store at a different audit recorder.
    pub fn set_audit(env: Env, caller: Address, audit: Address) -> Result<(), CredentialError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;
        env.storage().instance().set(&AUDIT, &audit);
        Ok(())
    }

    // ── Issuer registry ──────────────────────────────────────────────────────

    /// Register an issuer and the Ed25519 key its credential signatures are
    /// checked against.
    pub fn register_issuer(
        env: Env,
        caller: Address,
        issuer_did: String,
        hospital: Address,
        public_key: BytesN<32>,
    ) -> Result<(), CredentialError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        if issuer_did.is_empty() {
            return Err(CredentialError::InvalidInput);
        }

        let key = issuer_key(&issuer_did);
        if env.storage().persistent().has(&key) {
            return Err(CredentialError::IssuerAlreadyRegistered);
        }

        let profile = IssuerProfile {
            issuer_did: issuer_did.clone(),
            hospital: hospital.clone(),
            public_key,
            registered_at: env.ledger().timestamp(),
            active: true,
        };
        env.storage().persistent().set(&key, &profile);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_issuer_registered(&env, issuer_did, hospital);

        Ok(())
    }

    /// Retire or reinstate an issuer. Retiring blocks new issuance only;
    /// credentials already on the books keep their own lifecycle.
    pub fn set_issuer_active(
        env: Env,
        caller: Address,
        issuer_did: String,
        active: bool,
    ) -> Result<(), CredentialError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        let key = issuer_key(&issuer_did);
        let mut profile: IssuerProfile = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(CredentialError::IssuerNotFound)?;

        profile.active = active;
        env.storage().persistent().set(&key, &profile);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_issuer_status(&env, issuer_did, active);

        Ok(())
    }

    /// Fetch an issuer profile.
    pub fn get_issuer(env: Env, issuer_did: String) -> Result<IssuerProfile, CredentialError> {
        env.storage()
            .persistent()
            .get(&issuer_key(&issuer_did))
            .ok_or(CredentialError::IssuerNotFound)
    }

    // ── Credential lifecycle ─────────────────────────────────────────────────

    /// Record a credential after checking the issuer's signature over the
    /// canonical credential message.
    ///
    /// The submitting hospital must be the one bound to the issuer. A zero
    /// `expires_at` means the credential never expires.
    ///
    /// # Panics
    ///
    /// Panics if `signature` does not verify against the issuer's registered
    /// key (host behavior of `ed25519_verify`).
    pub fn issue_credential(
        env: Env,
        patient_did: String,
        issuer_did: String,
        kind: CredentialKind,
        envelope_hash: BytesN<32>,
        signature: BytesN<64>,
        expires_at: u64,
    ) -> Result<u64, CredentialError> {
        Self::require_initialized(&env)?;

        let issuer: IssuerProfile = env
            .storage()
            .persistent()
            .get(&issuer_key(&issuer_did))
            .ok_or(CredentialError::IssuerNotFound)?;
        if !issuer.active {
            return Err(CredentialError::IssuerInactive);
        }

        issuer.hospital.require_auth();

        if patient_did.is_empty() {
            return Err(CredentialError::InvalidInput);
        }
        let now = env.ledger().timestamp();
        if expires_at != 0 && expires_at <= now {
            return Err(CredentialError::InvalidExpiry);
        }

        let message = build_credential_message(&env, &envelope_hash, &kind, expires_at);
        env.crypto()
            .ed25519_verify(&issuer.public_key, &message, &signature);

        let credential_id = Self::next_credential_id(&env);
        let credential = VerifiableCredential {
            credential_id,
            patient_did: patient_did.clone(),
            issuer_did: issuer_did.clone(),
            hospital: issuer.hospital.clone(),
            kind: kind.clone(),
            envelope_hash,
            signature,
            issued_at: now,
            expires_at,
            revoked: false,
            revoked_at: None,
        };

        let key = credential_key(credential_id);
        env.storage().persistent().set(&key, &credential);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let idx_key = subject_key(&patient_did, &issuer.hospital, &kind);
        let mut ids: Vec<u64> = env
            .storage()
            .persistent()
            .get(&idx_key)
            .unwrap_or(Vec::new(&env));
        ids.push_back(credential_id);
        env.storage().persistent().set(&idx_key, &ids);
        env.storage()
            .persistent()
            .extend_ttl(&idx_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        Self::record_audit(
            &env,
            &issuer.hospital,
            symbol_short!("CRD_ISS"),
            ActorKind::Hospital,
            &issuer_did,
            &patient_did,
            AuditAction::Issue,
            &String::from_str(&env, kind_label(&kind)),
        )?;

        events::publish_credential_issued(&env, issuer.hospital, credential_id, kind);

        Ok(credential_id)
    }

    /// Revoke a credential. Only the submitting hospital or the admin may
    /// revoke. Revoking an already revoked credential is a no-op and records
    /// nothing.
    pub fn revoke_credential(
        env: Env,
        caller: Address,
        credential_id: u64,
    ) -> Result<(), CredentialError> {
        caller.require_auth();

        let key = credential_key(credential_id);
        let mut credential: VerifiableCredential = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(CredentialError::CredentialNotFound)?;

        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(CredentialError::NotInitialized)?;
        let actor_kind = if caller == admin {
            ActorKind::Admin
        } else if caller == credential.hospital {
            ActorKind::Hospital
        } else {
            return Err(CredentialError::Unauthorized);
        };

        if credential.revoked {
            return Ok(());
        }

        credential.revoked = true;
        credential.revoked_at = Some(env.ledger().timestamp());
        env.storage().persistent().set(&key, &credential);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        Self::record_audit(
            &env,
            &credential.hospital,
            symbol_short!("CRD_REV"),
            actor_kind,
            &credential.issuer_did,
            &credential.patient_did,
            AuditAction::Revoke,
            &String::from_str(&env, kind_label(&credential.kind)),
        )?;

        events::publish_credential_revoked(&env, credential.hospital, credential_id);

        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Fetch a credential by id.
    pub fn get_credential(
        env: Env,
        credential_id: u64,
    ) -> Result<VerifiableCredential, CredentialError> {
        let key = credential_key(credential_id);
        let credential: VerifiableCredential = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(CredentialError::CredentialNotFound)?;
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(credential)
    }

    /// Whether a credential exists, is unrevoked, and is unexpired.
    pub fn is_credential_active(env: Env, credential_id: u64) -> bool {
        match env
            .storage()
            .persistent()
            .get::<_, VerifiableCredential>(&credential_key(credential_id))
        {
            Some(credential) => Self::credential_usable(&env, &credential),
            None => false,
        }
    }

    /// Newest active credential of a kind for a patient under a hospital
    /// tenant, if any.
    pub fn find_active_credential(
        env: Env,
        patient_did: String,
        hospital: Address,
        kind: CredentialKind,
    ) -> Option<u64> {
        let ids: Vec<u64> = env
            .storage()
            .persistent()
            .get(&subject_key(&patient_did, &hospital, &kind))
            .unwrap_or(Vec::new(&env));

        let mut idx = ids.len();
        while idx > 0 {
            idx -= 1;
            if let Some(credential_id) = ids.get(idx) {
                let credential: Option<VerifiableCredential> =
                    env.storage().persistent().get(&credential_key(credential_id));
                if let Some(credential) = credential {
                    if Self::credential_usable(&env, &credential) {
                        return Some(credential_id);
                    }
                }
            }
        }
        None
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), CredentialError> {
        if !env.storage().instance().has(&INITIALIZED) {
            return Err(CredentialError::NotInitialized);
        }
        Ok(())
    }

    fn require_admin(env: &Env, caller: &Address) -> Result<(), CredentialError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(CredentialError::NotInitialized)?;
        if *caller != admin {
            return Err(CredentialError::Unauthorized);
        }
        Ok(())
    }

    fn credential_usable(env: &Env, credential: &VerifiableCredential) -> bool {
        if credential.revoked {
            return false;
        }
        credential.expires_at == 0 || env.ledger().timestamp() < credential.expires_at
    }

    fn next_credential_id(env: &Env) -> u64 {
        let next = env
            .storage()
            .persistent()
            .get(&CREDENTIAL_COUNT)
            .unwrap_or(0u64)
            .saturating_add(1);
        env.storage().persistent().set(&CREDENTIAL_COUNT, &next);
        env.storage()
            .persistent()
            .extend_ttl(&CREDENTIAL_COUNT, TTL_THRESHOLD, TTL_EXTEND_TO);
        next
    }

    /// Append to the audit recorder. A failure there aborts this invocation,
    /// so no credential transition can complete unrecorded.
    fn record_audit(
        env: &Env,
        hospital: &Address,
        event_type: Symbol,
        actor_kind: ActorKind,
        actor: &String,
        target_id: &String,
        action: AuditAction,
        metadata: &String,
    ) -> Result<(), CredentialError> {
        let audit_addr: Address = env
            .storage()
            .instance()
            .get(&AUDIT)
            .ok_or(CredentialError::NotInitialized)?;
        let client = AuditContractClient::new(env, &audit_addr);
        client.record_event(
            &env.current_contract_address(),
            hospital,
            &event_type,
            &actor_kind,
            actor,
            &symbol_short!("CRED"),
            target_id,
            &action,
            &AuditOutcome::Success,
            &Severity::Info,
            metadata,
        );
        Ok(())
    }
}

// ── Storage key helpers ──────────────────────────────────────────────────────

fn credential_key(credential_id: u64) -> (Symbol, u64) {
    (symbol_short!("CRED"), credential_id)
}

fn issuer_key(issuer_did: &String) -> (Symbol, String) {
    (symbol_short!("ISSUER"), issuer_did.clone())
}

fn subject_key(
    patient_did: &String,
    hospital: &Address,
    kind: &CredentialKind,
) -> (Symbol, String, Address, CredentialKind) {
    (
        symbol_short!("SUBJ_IDX"),
        patient_did.clone(),
        hospital.clone(),
        kind.clone(),
    )
}

// ── Canonical message ────────────────────────────────────────────────────────

/// Build the byte message an issuer signs when attesting a credential.
///
/// Layout: `"medrex_credential"` tag, envelope hash (32 bytes), kind code
/// (4 bytes BE), expiry (8 bytes BE, zero for none). The envelope hash
/// already commits to the DIDs and claims inside the envelope, so these
/// fields bind the signature to exactly one credential.
pub fn build_credential_message(
    env: &Env,
    envelope_hash: &BytesN<32>,
    kind: &CredentialKind,
    expires_at: u64,
) -> Bytes {
    let mut message = Bytes::new(env);
    message.append(&Bytes::from_slice(env, b"medrex_credential"));
    message.extend_from_array(&envelope_hash.to_array());
    message.extend_from_array(&kind.code().to_be_bytes());
    message.extend_from_array(&expires_at.to_be_bytes());
    message
}

fn kind_label(kind: &CredentialKind) -> &'static str {
    match kind {
        CredentialKind::Consent => "consent",
        CredentialKind::MedicalLicense => "medical_license",
        CredentialKind::Insurance => "insurance",
        CredentialKind::EmergencyContact => "emergency_contact",
    }
}
