#![no_std]
#![allow(clippy::too_many_arguments)]

pub mod events;
pub mod types;


use soroban_sdk::{
    contract, contractimpl, symbol_short, xdr::ToXdr, Address, Bytes, BytesN, Env, String, Symbol,
    Vec,
};
use types::{
    ActorKind, AuditAction, AuditEvent, AuditOutcome, SecurityViolation, Severity, ViolationKind,
};

/// Storage keys
const ADMIN: Symbol = symbol_short!("ADMIN");
const INITIALIZED: Symbol = symbol_short!("INIT");
const VIOLATION_COUNT: Symbol = symbol_short!("VIO_CNT");

/// TTL constants for persistent storage (in ledgers)
const TTL_THRESHOLD: u32 = 5_184_000; // ~60 days
const TTL_EXTEND_TO: u32 = 10_368_000; // ~120 days

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum AuditError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    RecorderNotRegistered = 4,
    EventNotFound = 5,
    ViolationNotFound = 6,
    InvalidInput = 7,
}

#[contract]
pub struct AuditContract;

#[contractimpl]
impl AuditContract {
    // ── Initialization ───────────────────────────────────────────────────────

    /// Initialize the audit recorder with an administrator.
    pub fn initialize(env: Env, admin: Address) -> Result<(), AuditError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(AuditError::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&INITIALIZED, &true);
        env.storage()
            .instance()
            .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_initialized(&env, admin);

        Ok(())
    }

    /// Get the admin address.
    pub fn get_admin(env: Env) -> Result<Address, AuditError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(AuditError::NotInitialized)
    }

    // ── Recorder whitelist ───────────────────────────────────────────────────

    /// Register a contract address that may append events and violations.
    ///
    /// Appends from any other address are rejected, which aborts the calling
    /// operation: an unaudited action is a defect, not a degraded mode.
    pub fn register_recorder(env: Env, caller: Address, recorder: Address) -> Result<(), AuditError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        let key = recorder_key(&recorder);
        env.storage().persistent().set(&key, &true);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_recorder_registered(&env, recorder);

        Ok(())
    }

    /// Remove a registered recorder.
    pub fn remove_recorder(env: Env, caller: Address, recorder: Address) -> Result<(), AuditError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        env.storage().persistent().remove(&recorder_key(&recorder));

        events::publish_recorder_removed(&env, recorder);

        Ok(())
    }

    /// Whether an address is a registered recorder.
    pub fn is_recorder(env: Env, recorder: Address) -> bool {
        env.storage()
            .persistent()
            .get(&recorder_key(&recorder))
            .unwrap_or(false)
    }

    // ── Event stream ─────────────────────────────────────────────────────────

    /// Append an audit event to the calling hospital tenant's chain.
    ///
    /// Each event links to its predecessor via `prev_hash` and commits to its
    /// own contents via `entry_hash`, so any later tampering or gap is
    /// detectable with [`Self::verify_chain`]. Event ids are sequential per
    /// tenant, starting at 1.
    pub fn record_event(
        env: Env,
        recorder: Address,
        hospital: Address,
        event_type: Symbol,
        actor_kind: ActorKind,
        actor: String,
        target_kind: Symbol,
        target_id: String,
        action: AuditAction,
        outcome: AuditOutcome,
        severity: Severity,
        metadata: String,
    ) -> Result<u64, AuditError> {
        Self::require_initialized(&env)?;
        recorder.require_auth();
        Self::require_recorder(&env, &recorder)?;

        if actor.is_empty() {
            return Err(AuditError::InvalidInput);
        }

        let event_id = Self::next_event_id(&env, &hospital);
        let prev_hash = Self::chain_head(&env, &hospital);

        let mut event = AuditEvent {
            event_id,
            hospital: hospital.clone(),
            event_type,
            actor_kind,
            actor,
            target_kind,
            target_id,
            action,
            outcome,
            severity,
            metadata,
            timestamp: env.ledger().timestamp(),
            prev_hash,
            entry_hash: BytesN::from_array(&env, &[0u8; 32]),
        };
        event.entry_hash = hash_entry(&env, &event);

        let key = event_key(&hospital, event_id);
        env.storage().persistent().set(&key, &event);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let head_key = chain_head_key(&hospital);
        env.storage().persistent().set(&head_key, &event.entry_hash);
        env.storage()
            .persistent()
            .extend_ttl(&head_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_event_recorded(&env, hospital, event_id, event.entry_hash.clone());

        Ok(event_id)
    }

    /// Fetch one event from a tenant's chain.
    pub fn get_event(env: Env, hospital: Address, event_id: u64) -> Result<AuditEvent, AuditError> {
        let key = event_key(&hospital, event_id);
        let event: AuditEvent = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(AuditError::EventNotFound)?;
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(event)
    }

    /// Number of events recorded for a tenant.
    pub fn event_count(env: Env, hospital: Address) -> u64 {
        env.storage()
            .persistent()
            .get(&event_count_key(&hospital))
            .unwrap_or(0u64)
    }

    /// Hash of the most recent event in a tenant's chain (zero when empty).
    pub fn get_chain_head(env: Env, hospital: Address) -> BytesN<32> {
        Self::chain_head(&env, &hospital)
    }

    /// Walk a tenant's chain and verify every link and entry hash.
    ///
    /// Returns `false` on any missing event, broken link, or entry whose
    /// stored hash does not match its recomputed contents.
    pub fn verify_chain(env: Env, hospital: Address) -> bool {
        let count = Self::event_count(env.clone(), hospital.clone());
        let mut expected_prev = BytesN::from_array(&env, &[0u8; 32]);

        let mut id: u64 = 1;
        while id <= count {
            let event: AuditEvent = match env.storage().persistent().get(&event_key(&hospital, id))
            {
                Some(ev) => ev,
                None => return false,
            };
            if event.prev_hash != expected_prev {
                return false;
            }
            let computed = hash_entry(&env, &event);
            if event.entry_hash != computed {
                return false;
            }
            expected_prev = computed;
            id += 1;
        }

        let head = Self::chain_head(&env, &hospital);
        head == expected_prev
    }

    // ── Violation channel ────────────────────────────────────────────────────

    /// Flag an anomaly, separate from the normal audit trail.
    ///
    /// Violations carry their own `resolved` lifecycle and are indexed per
    /// tenant while open.
    pub fn flag_violation(
        env: Env,
        recorder: Address,
        hospital: Address,
        kind: ViolationKind,
        severity: Severity,
        actor: String,
        details: String,
    ) -> Result<u64, AuditError> {
        Self::require_initialized(&env)?;
        recorder.require_auth();
        Self::require_recorder(&env, &recorder)?;

        if actor.is_empty() {
            return Err(AuditError::InvalidInput);
        }

        let violation_id = Self::next_violation_id(&env);
        let violation = SecurityViolation {
            violation_id,
            hospital: hospital.clone(),
            kind: kind.clone(),
            severity: severity.clone(),
            actor,
            details,
            flagged_at: env.ledger().timestamp(),
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        };

        let key = violation_key(violation_id);
        env.storage().persistent().set(&key, &violation);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let open_key = open_violations_key(&hospital);
        let mut open: Vec<u64> = env
            .storage()
            .persistent()
            .get(&open_key)
            .unwrap_or(Vec::new(&env));
        open.push_back(violation_id);
        env.storage().persistent().set(&open_key, &open);
        env.storage()
            .persistent()
            .extend_ttl(&open_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_violation_flagged(&env, hospital, violation_id, kind, severity);

        Ok(violation_id)
    }

    /// Mark a violation resolved. Idempotent: resolving twice is a no-op.
    pub fn resolve_violation(
        env: Env,
        caller: Address,
        violation_id: u64,
    ) -> Result<(), AuditError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        let key = violation_key(violation_id);
        let mut violation: SecurityViolation = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(AuditError::ViolationNotFound)?;

        if violation.resolved {
            return Ok(());
        }

        violation.resolved = true;
        violation.resolved_at = Some(env.ledger().timestamp());
        violation.resolved_by = Some(caller.clone());
        env.storage().persistent().set(&key, &violation);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let open_key = open_violations_key(&violation.hospital);
        let open: Vec<u64> = env
            .storage()
            .persistent()
            .get(&open_key)
            .unwrap_or(Vec::new(&env));
        let mut remaining: Vec<u64> = Vec::new(&env);
        for id in open.iter() {
            if id != violation_id {
                remaining.push_back(id);
            }
        }
        env.storage().persistent().set(&open_key, &remaining);

        events::publish_violation_resolved(&env, violation_id, caller);

        Ok(())
    }

    /// Fetch a violation by id.
    pub fn get_violation(env: Env, violation_id: u64) -> Result<SecurityViolation, AuditError> {
        let key = violation_key(violation_id);
        let violation: SecurityViolation = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(AuditError::ViolationNotFound)?;
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(violation)
    }

    /// Ids of unresolved violations for a tenant.
    pub fn list_open_violations(env: Env, hospital: Address) -> Vec<u64> {
        env.storage()
            .persistent()
            .get(&open_violations_key(&hospital))
            .unwrap_or(Vec::new(&env))
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), AuditError> {
        if !env.storage().instance().has(&INITIALIZED) {
            return Err(AuditError::NotInitialized);
        }
        Ok(())
    }

    fn require_admin(env: &Env, caller: &Address) -> Result<(), AuditError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(AuditError::NotInitialized)?;
        if *caller != admin {
            return Err(AuditError::Unauthorized);
        }
        Ok(())
    }

    fn require_recorder(env: &Env, recorder: &Address) -> Result<(), AuditError> {
        let registered: bool = env
            .storage()
            .persistent()
            .get(&recorder_key(recorder))
            .unwrap_or(false);
        if !registered {
            return Err(AuditError::RecorderNotRegistered);
        }
        Ok(())
    }

    fn next_event_id(env: &Env, hospital: &Address) -> u64 {
        let key = event_count_key(hospital);
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

    fn next_violation_id(env: &Env) -> u64 {
        let next = env
            .storage()
            .persistent()
            .get(&VIOLATION_COUNT)
            .unwrap_or(0u64)
            .saturating_add(1);
        env.storage().persistent().set(&VIOLATION_COUNT, &next);
        env.storage()
            .persistent()
            .extend_ttl(&VIOLATION_COUNT, TTL_THRESHOLD, TTL_EXTEND_TO);
        next
    }

    fn chain_head(env: &Env, hospital: &Address) -> BytesN<32> {
        env.storage()
            .persistent()
            .get(&chain_head_key(hospital))
            .unwrap_or(BytesN::from_array(env, &[0u8; 32]))
    }
}

// ── Storage key helpers ──────────────────────────────────────────────────────

fn recorder_key(recorder: &Address) -> (Symbol, Address) {
    (symbol_short!("RECORDER"), recorder.clone())
}

fn event_key(hospital: &Address, event_id: u64) -> (Symbol, Address, u64) {
    (symbol_short!("EVENT"), hospital.clone(), event_id)
}

fn event_count_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("EVT_CNT"), hospital.clone())
}

fn chain_head_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("CHN_HEAD"), hospital.clone())
}

fn violation_key(violation_id: u64) -> (Symbol, u64) {
    (symbol_short!("VIOL"), violation_id)
}

fn open_violations_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("VIO_OPEN"), hospital.clone())
}

// ── Chain hashing ────────────────────────────────────────────────────────────

/// Compute a keccak256 hash over an event's canonical contents.
///
/// The stored `entry_hash` field is excluded; everything else, including the
/// link to the predecessor, is bound in.
fn hash_entry(env: &Env, event: &AuditEvent) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.extend_from_array(&event.prev_hash.to_array());
    data.extend_from_array(&event.event_id.to_be_bytes());
    data.extend_from_array(&event.timestamp.to_be_bytes());
    data.append(&event.hospital.clone().to_xdr(env));
    data.append(&event.event_type.clone().to_xdr(env));
    data.append(&event.actor_kind.clone().to_xdr(env));
    data.append(&event.actor.clone().to_xdr(env));
    data.append(&event.target_kind.clone().to_xdr(env));
    data.append(&event.target_id.clone().to_xdr(env));
    data.append(&event.action.clone().to_xdr(env));
    data.append(&event.outcome.clone().to_xdr(env));
    data.append(&event.severity.clone().to_xdr(env));
    data.append(&event.metadata.clone().to_xdr(env));
    env.crypto().keccak256(&data).into()
}
