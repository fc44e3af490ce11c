use soroban_sdk::{symbol_short, Address, Env, String};

use crate::types::{EmergencyType, NextOfKinConsent};

pub fn publish_initialized(env: &Env, admin: Address, identity: Address, audit: Address) {
    env.events()
        .publish((symbol_short!("EMG_INIT"),), (admin, identity, audit));
}

pub fn publish_requested(
    env: &Env,
    hospital: Address,
    record_id: u64,
    patient_did: String,
    emergency_type: EmergencyType,
    requested_by: String,
) {
    env.events().publish(
        (symbol_short!("EMG_REQ"), hospital, record_id),
        (patient_did, emergency_type, requested_by),
    );
}

pub fn publish_primary_authorized(env: &Env, hospital: Address, record_id: u64, staff_id: String) {
    env.events()
        .publish((symbol_short!("EMG_PRI"), hospital, record_id), staff_id);
}

pub fn publish_secondary_authorized(
    env: &Env,
    hospital: Address,
    record_id: u64,
    staff_id: String,
) {
    env.events()
        .publish((symbol_short!("EMG_SEC"), hospital, record_id), staff_id);
}

pub fn publish_activated(env: &Env, hospital: Address, record_id: u64, expires_at: u64) {
    env.events()
        .publish((symbol_short!("EMG_ACT"), hospital, record_id), expires_at);
}

pub fn publish_nok_attached(
    env: &Env,
    hospital: Address,
    record_id: u64,
    consent: NextOfKinConsent,
    cleared_pending: bool,
) {
    env.events().publish(
        (symbol_short!("EMG_NOK"), hospital, record_id),
        (consent.relationship, cleared_pending),
    );
}

pub fn publish_expired(env: &Env, hospital: Address, record_id: u64, deadline: u64) {
    env.events()
        .publish((symbol_short!("EMG_EXP"), hospital, record_id), deadline);
}

pub fn publish_revoked(env: &Env, hospital: Address, record_id: u64, revoked_by: Address) {
    env.events()
        .publish((symbol_short!("EMG_REV"), hospital, record_id), revoked_by);
}
