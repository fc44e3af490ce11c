use soroban_sdk::{symbol_short, Address, Env, String};

use crate::types::CredentialKind;

pub fn publish_initialized(env: &Env, admin: Address, audit: Address) {
    env.events().publish((symbol_short!("CRD_INIT"),), (admin, audit));
}

pub fn publish_issuer_registered(env: &Env, issuer_did: String, hospital: Address) {
    env.events()
        .publish((symbol_short!("ISS_REG"), issuer_did), hospital);
}

pub fn publish_issuer_status(env: &Env, issuer_did: String, active: bool) {
    env.events()
        .publish((symbol_short!("ISS_STAT"), issuer_did), active);
}

pub fn publish_credential_issued(
    env: &Env,
    hospital: Address,
    credential_id: u64,
    kind: CredentialKind,
) {
    env.events()
        .publish((symbol_short!("CRD_ISS"), hospital, credential_id), kind);
}

pub fn publish_credential_revoked(env: &Env, hospital: Address, credential_id: u64) {
    env.events()
        .publish((symbol_short!("CRD_REV"), hospital, credential_id), ());
}
