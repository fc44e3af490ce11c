#![allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]
//! Decision-predicate properties for the consent ledger.
//!
//! `check_consent` must answer Allow exactly while the indexed grant is
//! consented, unrevoked and short of its expiry, whatever combination of
//! clock moves and revocations got it there.

use ed25519_dalek::{Signer, SigningKey};
use proptest::prelude::*;
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{Address, BytesN, Env, String};

use audit::{AuditContract, AuditContractClient};
use consent::types::{AccessDecision, ConsentKind, DenyReason, GrantOutcome};
use consent::{ConsentContract, ConsentContractClient};
use credentials::types::CredentialKind;
use credentials::{CredentialContract, CredentialContractClient};

const BASE_TIME: u64 = 1_000;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Fixture {
    env: Env,
    consent: ConsentContractClient<'static>,
    hospital: Address,
    patient: Address,
}

fn fixture() -> Fixture {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().set_timestamp(BASE_TIME);

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

    let signing_key = SigningKey::from_bytes(&[11u8; 32]);
    let issuer_did = String::from_str(&env, "did:medrex:issuer:stmarys");
    credentials.register_issuer(
        &admin,
        &issuer_did,
        &hospital,
        &BytesN::from_array(&env, &signing_key.verifying_key().to_bytes()),
    );
    let envelope_hash = [0x5C; 32];
    let mut message = std::vec::Vec::new();
    message.extend_from_slice(b"medrex_credential");
    message.extend_from_slice(&envelope_hash);
    message.extend_from_slice(&1u32.to_be_bytes());
    message.extend_from_slice(&0u64.to_be_bytes());
    let sig = signing_key.sign(&message).to_bytes();
    credentials.issue_credential(
        &did(&env),
        &issuer_did,
        &CredentialKind::Consent,
        &BytesN::from_array(&env, &envelope_hash),
        &BytesN::from_array(&env, &sig),
        &0u64,
    );

    Fixture {
        env,
        consent,
        hospital,
        patient,
    }
}

fn did(env: &Env) -> String {
    String::from_str(env, "did:medrex:patient:alice")
}

fn record(env: &Env) -> BytesN<32> {
    BytesN::from_array(env, &[0xCD; 32])
}

fn grant(f: &Fixture, requester: &Address, expires_at: Option<u64>) -> u64 {
    let token = f.consent.issue_request_token(&f.patient);
    let outcome = f.consent.grant_consent(
        &f.hospital,
        &did(&f.env),
        &f.patient,
        requester,
        &record(&f.env),
        &ConsentKind::Read,
        &expires_at,
        &token,
    );
    match outcome {
        GrantOutcome::Granted(grant) => grant.grant_id,
        GrantOutcome::Rejected(reject) => panic!("unexpected rejection: {:?}", reject),
    }
}

fn check(f: &Fixture, requester: &Address) -> AccessDecision {
    f.consent
        .check_consent(&f.hospital, &did(&f.env), requester, &record(&f.env))
}

// ── proptest! blocks ──────────────────────────────────────────────────────────

proptest! {
    /// The expiry boundary is exclusive: Allow strictly before `expires_at`,
    /// Deny(Expired) at the timestamp itself and ever after.
    #[test]
    fn prop_expiry_boundary_is_exclusive(
        lifetime in 1u64..=86_400u64,
        probe in 0u64..=172_800u64,
    ) {
        let f = fixture();
        let requester = Address::generate(&f.env);
        let expires = BASE_TIME + lifetime;
        let grant_id = grant(&f, &requester, Some(expires));

        f.env.ledger().set_timestamp(BASE_TIME + probe);
        let decision = check(&f, &requester);
        if BASE_TIME + probe < expires {
            prop_assert_eq!(decision, AccessDecision::Allow(grant_id));
        } else {
            prop_assert_eq!(decision, AccessDecision::Deny(DenyReason::Expired));
        }
    }

    /// Revocation is permanent and wins over expiry: whenever the probe
    /// lands, a revoked grant answers Deny(Revoked).
    #[test]
    fn prop_revoked_grants_never_allow(
        lifetime in 1u64..=86_400u64,
        probe in 0u64..=172_800u64,
    ) {
        let f = fixture();
        let requester = Address::generate(&f.env);
        let grant_id = grant(&f, &requester, Some(BASE_TIME + lifetime));

        let token = f.consent.issue_request_token(&f.patient);
        f.consent.revoke_consent(&f.hospital, &grant_id, &f.patient, &token);

        f.env.ledger().set_timestamp(BASE_TIME + probe);
        prop_assert_eq!(check(&f, &requester), AccessDecision::Deny(DenyReason::Revoked));
    }

    /// A grant without expiry outlives any clock advance until revoked.
    #[test]
    fn prop_unbounded_grants_outlive_the_clock(probe in 0u64..=864_000u64) {
        let f = fixture();
        let requester = Address::generate(&f.env);
        let grant_id = grant(&f, &requester, None);

        f.env.ledger().set_timestamp(BASE_TIME + probe);
        prop_assert_eq!(check(&f, &requester), AccessDecision::Allow(grant_id));
    }

    /// Checks never allow a requester the patient did not name, no matter
    /// how many grants exist for others.
    #[test]
    fn prop_no_allow_for_unnamed_requesters(extra_grants in 1usize..=5) {
        let f = fixture();
        for _ in 0..extra_grants {
            let named = Address::generate(&f.env);
            grant(&f, &named, None);
        }

        let outsider = Address::generate(&f.env);
        prop_assert_eq!(
            check(&f, &outsider),
            AccessDecision::Deny(DenyReason::NotGranted)
        );
    }
}
