#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use ed25519_dalek::{Signer, SigningKey};
use libfuzzer_sys::fuzz_target;
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{Address, BytesN, Env, String};

use audit::{AuditContract, AuditContractClient};
use consent::types::{AccessDecision, ConsentKind, DenyReason, GrantOutcome};
use consent::{ConsentContract, ConsentContractClient};
use credentials::types::CredentialKind;
use credentials::{CredentialContract, CredentialContractClient};

#[derive(Arbitrary, Debug)]
pub enum FuzzAction {
    Grant {
        requester: u8,
        hash: u8,
        kind: u8,
        ttl: Option<u16>,
    },
    Check {
        requester: u8,
        hash: u8,
    },
    Revoke {
        slot: u8,
    },
    Advance {
        secs: u16,
    },
}

/// What the ledger should say about the latest grant in one
/// (requester, content-hash) cell.
struct ModelGrant {
    grant_id: u64,
    expires_at: Option<u64>,
    revoked: bool,
}

impl ModelGrant {
    fn expected(&self, now: u64) -> AccessDecision {
        if self.revoked {
            AccessDecision::Deny(DenyReason::Revoked)
        } else if self.expires_at.is_some_and(|e| now >= e) {
            AccessDecision::Deny(DenyReason::Expired)
        } else {
            AccessDecision::Allow(self.grant_id)
        }
    }
}

const REQUESTERS: usize = 3;
const HASHES: [[u8; 32]; 2] = [[0xAA; 32], [0xBB; 32]];

// The consent check must agree with a reference model over any sequence of
// grants, revocations and clock advances: the latest grant per
// (requester, hash) cell rules, revoked never comes back, expiry is exact,
// and the audit chain stays verifiable throughout.
fuzz_target!(|actions: Vec<FuzzAction>| {
    let env = Env::default();
    env.mock_all_auths();
    let mut now: u64 = 1_000;
    env.ledger().set_timestamp(now);

    let audit_id = env.register(AuditContract, ());
    let audit = AuditContractClient::new(&env, &audit_id);
    let credentials_id = env.register(CredentialContract, ());
    let credentials = CredentialContractClient::new(&env, &credentials_id);
    let consent_id = env.register(ConsentContract, ());
    let consent = ConsentContractClient::new(&env, &consent_id);

    let admin = Address::generate(&env);
    audit.initialize(&admin);
    audit.register_recorder(&admin, &credentials_id);
    audit.register_recorder(&admin, &consent_id);
    credentials.initialize(&admin, &audit_id);
    consent.initialize(&admin, &credentials_id, &audit_id);

    let hospital = Address::generate(&env);
    let patient = Address::generate(&env);
    let did = String::from_str(&env, "did:medrex:patient:fuzz");

    // Never-expiring consent credential backing every grant attempt.
    let signing_key = SigningKey::from_bytes(&[7u8; 32]);
    let public = signing_key.verifying_key().to_bytes();
    let issuer_did = String::from_str(&env, "did:medrex:issuer:fuzz");
    credentials.register_issuer(
        &admin,
        &issuer_did,
        &hospital,
        &BytesN::from_array(&env, &public),
    );
    let envelope_hash = [0x5C; 32];
    let mut message = Vec::new();
    message.extend_from_slice(b"medrex_credential");
    message.extend_from_slice(&envelope_hash);
    message.extend_from_slice(&1u32.to_be_bytes());
    message.extend_from_slice(&0u64.to_be_bytes());
    let sig = signing_key.sign(&message).to_bytes();
    credentials.issue_credential(
        &did,
        &issuer_did,
        &CredentialKind::Consent,
        &BytesN::from_array(&env, &envelope_hash),
        &BytesN::from_array(&env, &sig),
        &0u64,
    );

    let requesters: Vec<Address> = (0..REQUESTERS).map(|_| Address::generate(&env)).collect();

    // Latest grant per cell, plus every id ever granted for revoke picks.
    let mut model: HashMap<(usize, usize), ModelGrant> = HashMap::new();
    let mut granted: Vec<(u64, usize, usize)> = Vec::new();

    for action in actions {
        match action {
            FuzzAction::Grant {
                requester,
                hash,
                kind,
                ttl,
            } => {
                let r_idx = requester as usize % REQUESTERS;
                let h_idx = hash as usize % HASHES.len();
                let kind = match kind % 3 {
                    0 => ConsentKind::Read,
                    1 => ConsentKind::Write,
                    _ => ConsentKind::Share,
                };
                // At least one second in the future so validation passes.
                let expires_at = ttl.map(|t| now + u64::from(t).max(1));

                let token = consent.issue_request_token(&patient);
                let outcome = consent.try_grant_consent(
                    &hospital,
                    &did,
                    &patient,
                    &requesters[r_idx],
                    &BytesN::from_array(&env, &HASHES[h_idx]),
                    &kind,
                    &expires_at,
                    &token,
                );
                if let Ok(Ok(GrantOutcome::Granted(grant))) = outcome {
                    granted.push((grant.grant_id, r_idx, h_idx));
                    model.insert(
                        (r_idx, h_idx),
                        ModelGrant {
                            grant_id: grant.grant_id,
                            expires_at: grant.expires_at,
                            revoked: false,
                        },
                    );
                }
            }
            FuzzAction::Check { requester, hash } => {
                let r_idx = requester as usize % REQUESTERS;
                let h_idx = hash as usize % HASHES.len();
                let decision = consent.check_consent(
                    &hospital,
                    &did,
                    &requesters[r_idx],
                    &BytesN::from_array(&env, &HASHES[h_idx]),
                );
                let expected = match model.get(&(r_idx, h_idx)) {
                    Some(grant) => grant.expected(now),
                    None => AccessDecision::Deny(DenyReason::NotGranted),
                };
                assert_eq!(decision, expected);
            }
            FuzzAction::Revoke { slot } => {
                if granted.is_empty() {
                    continue;
                }
                let (grant_id, r_idx, h_idx) = granted[slot as usize % granted.len()];
                let token = consent.issue_request_token(&patient);
                let result = consent.try_revoke_consent(&hospital, &grant_id, &patient, &token);
                assert!(result.is_ok(), "controller revoke must not fail");
                // Revoking a superseded grant does not resurrect the cell.
                if let Some(grant) = model.get_mut(&(r_idx, h_idx)) {
                    if grant.grant_id == grant_id {
                        grant.revoked = true;
                    }
                }
            }
            FuzzAction::Advance { secs } => {
                now += u64::from(secs);
                env.ledger().set_timestamp(now);
            }
        }

        // Full sweep: every cell must agree with the model after every step.
        for r_idx in 0..REQUESTERS {
            for h_idx in 0..HASHES.len() {
                let decision = consent.check_consent(
                    &hospital,
                    &did,
                    &requesters[r_idx],
                    &BytesN::from_array(&env, &HASHES[h_idx]),
                );
                let expected = match model.get(&(r_idx, h_idx)) {
                    Some(grant) => grant.expected(now),
                    None => AccessDecision::Deny(DenyReason::NotGranted),
                };
                assert_eq!(decision, expected);
            }
        }
    }

    assert!(audit.verify_chain(&hospital), "audit chain must verify");
});
