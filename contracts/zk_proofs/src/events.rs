use soroban_sdk::{symbol_short, Address, Env, String};

use crate::types::ProofKind;

pub fn publish_initialized(env: &Env, admin: Address, audit: Address) {
    env.events().publish((symbol_short!("ZKP_INIT"),), (admin, audit));
}

pub fn publish_proof_issued(env: &Env, patient_did: String, proof_id: u64, kind: ProofKind) {
    env.events()
        .publish((symbol_short!("ZKP_ISS"), patient_did), (proof_id, kind));
}

pub fn publish_proof_verified(
    env: &Env,
    hospital: Address,
    proof_id: u64,
    outcome_ok: bool,
    emergency_access: bool,
) {
    env.events().publish(
        (symbol_short!("ZKP_VRF"), hospital, proof_id),
        (outcome_ok, emergency_access),
    );
}

pub fn publish_proof_deactivated(env: &Env, proof_id: u64) {
    env.events().publish((symbol_short!("ZKP_DEA"), proof_id), ());
}
