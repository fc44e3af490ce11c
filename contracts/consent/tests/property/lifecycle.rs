#![allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]
//! Lifecycle properties for the consent ledger.
//!
//! Random action sequences (grant, revoke, clock advance, check) are
//! replayed against both the contract and a small reference model; the
//! contract's decisions must match the model at every step.

use ed25519_dalek::{Signer, SigningKey};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{Address, BytesN, Env, String};

use audit::{AuditContract, AuditContractClient};
use consent::errors::ConsentError;
use consent::types::{AccessDecision, ConsentKind, DenyReason, GrantOutcome};
use consent::{ConsentContract, ConsentContractClient};
use credentials::types::CredentialKind;
use credentials::{CredentialContract, CredentialContractClient};

const BASE_TIME: u64 = 1_000;
const GRANT_LIFETIME: u64 = 600;

// ── Helpers ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Arbitrary)]
enum Action {
    Grant,
    Revoke,
    Check,
    Advance { secs: u16 },
}

/// What the latest grant for the probed triple should look like.
struct ModelGrant {
    id: u64,
    expires: u64,
    revoked: bool,
}

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

// ── proptest! blocks ──────────────────────────────────────────────────────────

proptest! {
    /// A second `initialize` call must always fail with `AlreadyInitialized`.
    #[test]
    fn prop_double_initialize_always_fails(_seed in 0u8..=255u8) {
        let f = fixture();
        let second_admin = Address::generate(&f.env);
        let result = f.consent.try_initialize(
            &second_admin,
            &Address::generate(&f.env),
            &Address::generate(&f.env),
        );
        match result {
            Err(Ok(e)) => prop_assert_eq!(e, ConsentError::AlreadyInitialized),
            _ => prop_assert!(false, "expected AlreadyInitialized"),
        }
    }

    /// Grant ids are dense and sequential per tenant, and the patient
    /// listing returns them oldest first.
    #[test]
    fn prop_grant_ids_are_sequential(count in 1usize..=8) {
        let f = fixture();
        for expected_id in 1..=count as u64 {
            let requester = Address::generate(&f.env);
            let token = f.consent.issue_request_token(&f.patient);
            let outcome = f.consent.grant_consent(
                &f.hospital,
                &did(&f.env),
                &f.patient,
                &requester,
                &record(&f.env),
                &ConsentKind::Read,
                &None,
                &token,
            );
            match outcome {
                GrantOutcome::Granted(grant) => prop_assert_eq!(grant.grant_id, expected_id),
                GrantOutcome::Rejected(reject) => prop_assert!(false, "rejected: {:?}", reject),
            }
        }

        let listed = f.consent.list_patient_grants(&f.hospital, &did(&f.env));
        prop_assert_eq!(listed.len() as usize, count);
        for (position, id) in listed.iter().enumerate() {
            prop_assert_eq!(id, position as u64 + 1);
        }
    }

    /// Replaying any action sequence, the contract's decision always
    /// matches the reference model of the latest grant.
    #[test]
    fn prop_action_sequences_match_reference_model(
        actions in prop::collection::vec(any::<Action>(), 1..24),
    ) {
        let f = fixture();
        let requester = Address::generate(&f.env);

        let mut now = BASE_TIME;
        let mut model: Option<ModelGrant> = None;

        for action in actions {
            match action {
                Action::Grant => {
                    let expires = now + GRANT_LIFETIME;
                    let token = f.consent.issue_request_token(&f.patient);
                    let outcome = f.consent.grant_consent(
                        &f.hospital,
                        &did(&f.env),
                        &f.patient,
                        &requester,
                        &record(&f.env),
                        &ConsentKind::Read,
                        &Some(expires),
                        &token,
                    );
                    let id = match outcome {
                        GrantOutcome::Granted(grant) => Some(grant.grant_id),
                        GrantOutcome::Rejected(_) => None,
                    };
                    prop_assert!(id.is_some(), "grant was rejected");
                    model = Some(ModelGrant {
                        id: id.unwrap(),
                        expires,
                        revoked: false,
                    });
                }
                Action::Revoke => {
                    if let Some(grant) = &mut model {
                        let token = f.consent.issue_request_token(&f.patient);
                        f.consent
                            .revoke_consent(&f.hospital, &grant.id, &f.patient, &token);
                        grant.revoked = true;
                    }
                }
                Action::Check => {
                    let decision = f.consent.check_consent(
                        &f.hospital,
                        &did(&f.env),
                        &requester,
                        &record(&f.env),
                    );
                    let expected = match &model {
                        None => AccessDecision::Deny(DenyReason::NotGranted),
                        Some(grant) if grant.revoked => {
                            AccessDecision::Deny(DenyReason::Revoked)
                        }
                        Some(grant) if now >= grant.expires => {
                            AccessDecision::Deny(DenyReason::Expired)
                        }
                        Some(grant) => AccessDecision::Allow(grant.id),
                    };
                    prop_assert_eq!(decision, expected);
                }
                Action::Advance { secs } => {
                    now += u64::from(secs);
                    f.env.ledger().set_timestamp(now);
                }
            }
        }
    }
}
