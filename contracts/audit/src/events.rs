use soroban_sdk::{symbol_short, Address, BytesN, Env};

use crate::types::{Severity, ViolationKind};

pub fn publish_initialized(env: &Env, admin: Address) {
    env.events().publish((symbol_short!("AUD_INIT"),), admin);
}

pub fn publish_recorder_registered(env: &Env, recorder: Address) {
    env.events().publish((symbol_short!("REC_ADD"),), recorder);
}

pub fn publish_recorder_removed(env: &Env, recorder: Address) {
    env.events().publish((symbol_short!("REC_DEL"),), recorder);
}

pub fn publish_event_recorded(env: &Env, hospital: Address, event_id: u64, entry_hash: BytesN<32>) {
    env.events()
        .publish((symbol_short!("AUD_REC"), hospital, event_id), entry_hash);
}

pub fn publish_violation_flagged(
    env: &Env,
    hospital: Address,
    violation_id: u64,
    kind: ViolationKind,
    severity: Severity,
) {
    env.events()
        .publish((symbol_short!("VIO_FLAG"), hospital, violation_id), (kind, severity));
}

pub fn publish_violation_resolved(env: &Env, violation_id: u64, resolved_by: Address) {
    env.events()
        .publish((symbol_short!("VIO_RES"), violation_id), resolved_by);
}
