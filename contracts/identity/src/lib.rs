#![no_std]

pub mod events;
pub mod types;


use soroban_sdk::{contract, contractimpl, symbol_short, Address, BytesN, Env, String, Symbol, Vec};
use types::{PatientIdentity, StaffProfile, StaffRole};

// ── Storage keys ─────────────────────────────────────────────────────────────

const ADMIN: Symbol = symbol_short!("ADMIN");
const INITIALIZED: Symbol = symbol_short!("INIT");

/// TTL constants for persistent storage (in ledgers)
const TTL_THRESHOLD: u32 = 17_280; // ~1 day
const TTL_EXTEND_TO: u32 = 518_400; // ~30 days

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum IdentityError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    PatientNotFound = 4,
    PatientAlreadyRegistered = 5,
    ControllerAlreadyBound = 6,
    PatientInactive = 7,
    StaffNotFound = 8,
    StaffAlreadyRegistered = 9,
    InvalidInput = 10,
}

#[contract]
pub struct IdentityContract;

#[contractimpl]
impl IdentityContract {
    // ── Initialization ───────────────────────────────────────────────────────

    /// Initialize the identity registry with an administrator.
    pub fn initialize(env: Env, admin: Address) -> Result<(), IdentityError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(IdentityError::AlreadyInitialized);
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
    pub fn get_admin(env: Env) -> Result<Address, IdentityError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(IdentityError::NotInitialized)
    }

    // ── Patient registry ─────────────────────────────────────────────────────

    /// Register a patient DID controlled by the authenticated caller.
    ///
    /// One DID per controller; re-registering either side is rejected.
    pub fn register_patient(
        env: Env,
        controller: Address,
        did: String,
        public_key: BytesN<32>,
        phone_number: String,
        did_document_hash: BytesN<32>,
    ) -> Result<PatientIdentity, IdentityError> {
        controller.require_auth();

        if did.is_empty() {
            return Err(IdentityError::InvalidInput);
        }

        let key = patient_key(&did);
        if env.storage().persistent().has(&key) {
            return Err(IdentityError::PatientAlreadyRegistered);
        }
        let ctrl_key = controller_key(&controller);
        if env.storage().persistent().has(&ctrl_key) {
            return Err(IdentityError::ControllerAlreadyBound);
        }

        let patient = PatientIdentity {
            did: did.clone(),
            controller: controller.clone(),
            public_key,
            phone_number,
            did_document_hash,
            registered_at: env.ledger().timestamp(),
            key_rotated_at: None,
            active: true,
        };

        env.storage().persistent().set(&key, &patient);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        env.storage().persistent().set(&ctrl_key, &did);
        env.storage()
            .persistent()
            .extend_ttl(&ctrl_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_patient_registered(&env, did, controller);

        Ok(patient)
    }

    /// Rotate a patient's key material. Only the stored controller may rotate.
    pub fn rotate_key(
        env: Env,
        did: String,
        new_public_key: BytesN<32>,
        new_did_document_hash: BytesN<32>,
    ) -> Result<PatientIdentity, IdentityError> {
        let key = patient_key(&did);
        let mut patient: PatientIdentity = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(IdentityError::PatientNotFound)?;

        patient.controller.require_auth();

        if !patient.active {
            return Err(IdentityError::PatientInactive);
        }

        let now = env.ledger().timestamp();
        patient.public_key = new_public_key;
        patient.did_document_hash = new_did_document_hash;
        patient.key_rotated_at = Some(now);

        env.storage().persistent().set(&key, &patient);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_key_rotated(&env, did, now);

        Ok(patient)
    }

    /// Deactivate a patient identity (admin or controller). The record stays
    /// resolvable; it is never hard-deleted.
    pub fn deactivate_patient(env: Env, caller: Address, did: String) -> Result<(), IdentityError> {
        caller.require_auth();

        let key = patient_key(&did);
        let mut patient: PatientIdentity = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(IdentityError::PatientNotFound)?;
        Self::require_admin_or(&env, &caller, &patient.controller)?;

        if !patient.active {
            return Ok(());
        }

        patient.active = false;
        env.storage().persistent().set(&key, &patient);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_patient_deactivated(&env, did);

        Ok(())
    }

    /// Reactivate a previously deactivated patient identity.
    pub fn reactivate_patient(env: Env, caller: Address, did: String) -> Result<(), IdentityError> {
        caller.require_auth();

        let key = patient_key(&did);
        let mut patient: PatientIdentity = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(IdentityError::PatientNotFound)?;
        Self::require_admin_or(&env, &caller, &patient.controller)?;

        if patient.active {
            return Ok(());
        }

        patient.active = true;
        env.storage().persistent().set(&key, &patient);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_patient_reactivated(&env, did);

        Ok(())
    }

    /// Resolve a patient identity by DID.
    pub fn get_patient(env: Env, did: String) -> Result<PatientIdentity, IdentityError> {
        let key = patient_key(&did);
        let patient: PatientIdentity = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(IdentityError::PatientNotFound)?;
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(patient)
    }

    /// The controller account for a DID.
    pub fn resolve_controller(env: Env, did: String) -> Result<Address, IdentityError> {
        Ok(Self::get_patient(env, did)?.controller)
    }

    /// Reverse lookup: the identity controlled by an account.
    pub fn get_patient_by_controller(
        env: Env,
        controller: Address,
    ) -> Result<PatientIdentity, IdentityError> {
        let did: String = env
            .storage()
            .persistent()
            .get(&controller_key(&controller))
            .ok_or(IdentityError::PatientNotFound)?;
        Self::get_patient(env, did)
    }

    // ── Staff roster ─────────────────────────────────────────────────────────

    /// Register a staff member on a hospital's roster (admin only).
    pub fn register_staff(
        env: Env,
        caller: Address,
        staff_id: String,
        hospital: Address,
        name: String,
        license_number: String,
        role: StaffRole,
    ) -> Result<StaffProfile, IdentityError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        if staff_id.is_empty() || license_number.is_empty() {
            return Err(IdentityError::InvalidInput);
        }

        let key = staff_key(&staff_id);
        if env.storage().persistent().has(&key) {
            return Err(IdentityError::StaffAlreadyRegistered);
        }

        let profile = StaffProfile {
            staff_id: staff_id.clone(),
            hospital: hospital.clone(),
            name,
            license_number,
            role,
            on_duty: false,
            registered_at: env.ledger().timestamp(),
        };

        env.storage().persistent().set(&key, &profile);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        let roster_key = hospital_staff_key(&hospital);
        let mut roster: Vec<String> = env
            .storage()
            .persistent()
            .get(&roster_key)
            .unwrap_or(Vec::new(&env));
        roster.push_back(staff_id.clone());
        env.storage().persistent().set(&roster_key, &roster);
        env.storage()
            .persistent()
            .extend_ttl(&roster_key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_staff_registered(&env, staff_id, hospital);

        Ok(profile)
    }

    /// Set a staff member's on-duty flag (admin only).
    pub fn set_on_duty(
        env: Env,
        caller: Address,
        staff_id: String,
        on_duty: bool,
    ) -> Result<(), IdentityError> {
        caller.require_auth();
        Self::require_admin(&env, &caller)?;

        let key = staff_key(&staff_id);
        let mut profile: StaffProfile = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(IdentityError::StaffNotFound)?;

        profile.on_duty = on_duty;
        env.storage().persistent().set(&key, &profile);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

        events::publish_duty_changed(&env, staff_id, on_duty);

        Ok(())
    }

    /// Fetch a staff profile.
    pub fn get_staff(env: Env, staff_id: String) -> Result<StaffProfile, IdentityError> {
        let key = staff_key(&staff_id);
        let profile: StaffProfile = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(IdentityError::StaffNotFound)?;
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
        Ok(profile)
    }

    /// Whether a staff member may authorize emergency access for `hospital`:
    /// registered there, currently on duty, and holding an approved role.
    pub fn is_staff_eligible(
        env: Env,
        staff_id: String,
        hospital: Address,
        approved_roles: Vec<StaffRole>,
    ) -> bool {
        let profile: Option<StaffProfile> = env.storage().persistent().get(&staff_key(&staff_id));
        match profile {
            Some(p) => p.hospital == hospital && p.on_duty && approved_roles.contains(&p.role),
            None => false,
        }
    }

    /// All staff ids registered for a hospital.
    pub fn list_hospital_staff(env: Env, hospital: Address) -> Vec<String> {
        env.storage()
            .persistent()
            .get(&hospital_staff_key(&hospital))
            .unwrap_or(Vec::new(&env))
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn require_admin(env: &Env, caller: &Address) -> Result<(), IdentityError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&ADMIN)
            .ok_or(IdentityError::NotInitialized)?;
        if *caller != admin {
            return Err(IdentityError::Unauthorized);
        }
        Ok(())
    }

    fn require_admin_or(
        env: &Env,
        caller: &Address,
        allowed: &Address,
    ) -> Result<(), IdentityError> {
        if caller == allowed {
            return Ok(());
        }
        Self::require_admin(env, caller)
    }
}

// ── Storage key helpers ──────────────────────────────────────────────────────

fn patient_key(did: &String) -> (Symbol, String) {
    (symbol_short!("PATIENT"), did.clone())
}

fn controller_key(controller: &Address) -> (Symbol, Address) {
    (symbol_short!("CTRL_IDX"), controller.clone())
}

fn staff_key(staff_id: &String) -> (Symbol, String) {
    (symbol_short!("STAFF"), staff_id.clone())
}

fn hospital_staff_key(hospital: &Address) -> (Symbol, Address) {
    (symbol_short!("HOSP_STF"), hospital.clone())
}
