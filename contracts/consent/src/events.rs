use soroban_sdk::{symbol_short, Address, BytesN, Env, String};

use crate::types::{AccessDecision, ConsentKind};

pub fn publish_initialized(env: &Env, admin: Address, credentials: Address, audit: Address) {
    env.events()
        .publish((symbol_short!("CNS_INIT"),), (admin, credentials, audit));
}

pub fn publish_granted(
    env: &Env,
    hospital: Address,
    grant_id: u64,
    patient_did: String,
    requester: Address,
    kind: ConsentKind,
) {
    env.events().publish(
        (symbol_short!("CNS_GRT"), hospital, grant_id),
        (patient_did, requester, kind),
    );
}

pub fn publish_checked(env: &Env, hospital: Address, requester: Address, decision: AccessDecision) {
    env.events()
        .publish((symbol_short!("CNS_CHK"), hospital, requester), decision);
}

pub fn publish_revoked(env: &Env, hospital: Address, grant_id: u64, revoked_by: Address) {
    env.events()
        .publish((symbol_short!("CNS_REV"), hospital, grant_id), revoked_by);
}

pub fn publish_anchored(env: &Env, hospital: Address, grant_id: u64, anchor_ref: BytesN<32>) {
    env.events()
        .publish((symbol_short!("CNS_ANC"), hospital, grant_id), anchor_ref);
}
