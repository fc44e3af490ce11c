//! State machine properties for the two-person authorization workflow.
//!
//! Random action sequences are replayed against the contract and a small
//! reference model of the strict linear lifecycle. The contract's access
//! decision must match the model at every check, and an active record must
//! always carry two distinct authorizers.

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{Address, Env, String};

use audit::{AuditContract, AuditContractClient};
use emergency::errors::EmergencyError;
use emergency::types::{
    AuthorizeOutcome, AuthorizeReject, EmergencyDecision, EmergencyDenyReason, EmergencyState,
    EmergencyType, PolicyWindow, RequestOutcome,
};
use emergency::{EmergencyContract, EmergencyContractClient};
use identity::types::StaffRole;
use identity::{IdentityContract, IdentityContractClient};

const BASE_TIME: u64 = 1_000;
const ACCESS_WINDOW: u64 = 600;

#[derive(Debug, Clone, Arbitrary)]
enum Action {
    Request,
    AuthorizePrimary,
    AuthorizeSecondary,
    Check,
    Revoke,
    Advance { secs: u16 },
}

#[derive(Clone, Copy, PartialEq)]
enum ModelState {
    Requested,
    PrimaryAuthorized,
    Active,
    Expired,
    Revoked,
}

/// Reference lifecycle of the most recently opened record.
struct ModelRecord {
    id: u64,
    state: ModelState,
    expires: u64,
}

struct Fixture {
    env: Env,
    emergency: EmergencyContractClient<'static>,
    admin: Address,
    hospital: Address,
    dr1: String,
    dr2: String,
}

fn fixture() -> Fixture {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().set_timestamp(BASE_TIME);

    let audit_id = env.register(AuditContract, ());
    let audit = AuditContractClient::new(&env, &audit_id);
    let identity_id = env.register(IdentityContract, ());
    let identity = IdentityContractClient::new(&env, &identity_id);
    let emergency_id = env.register(EmergencyContract, ());
    let emergency = EmergencyContractClient::new(&env, &emergency_id);

    let admin = Address::generate(&env);
    audit.initialize(&admin);
    audit.register_recorder(&admin, &emergency_id);
    identity.initialize(&admin);
    emergency.initialize(&admin, &identity_id, &audit_id);
    emergency.set_policy_window(
        &admin,
        &EmergencyType::Trauma,
        &PolicyWindow { access_secs: ACCESS_WINDOW, nok_required: false, nok_grace_secs: 0 },
    );

    let hospital = Address::generate(&env);
    let dr1 = String::from_str(&env, "DR-100");
    let dr2 = String::from_str(&env, "DR-200");
    for (staff_id, license, role) in [
        (&dr1, "LIC-100", StaffRole::EmergencyDoctor),
        (&dr2, "LIC-200", StaffRole::Surgeon),
    ] {
        identity.register_staff(
            &admin,
            staff_id,
            &hospital,
            &String::from_str(&env, "On-call clinician"),
            &String::from_str(&env, license),
            &role,
        );
        identity.set_on_duty(&admin, staff_id, &true);
    }

    Fixture { env, emergency, admin, hospital, dr1, dr2 }
}

fn patient_did(env: &Env) -> String {
    String::from_str(env, "did:medrex:patient:amara")
}

fn open_request(f: &Fixture) -> u64 {
    let token = f.emergency.issue_request_token(&f.hospital);
    let outcome = f.emergency.request_access(
        &f.hospital,
        &patient_did(&f.env),
        &EmergencyType::Trauma,
        &String::from_str(&f.env, "unresponsive on arrival, needs medication history"),
        &String::from_str(&f.env, "EMS-407"),
        &token,
    );
    match outcome {
        RequestOutcome::Requested(record) => record.record_id,
        RequestOutcome::Rejected(_) => panic!("fresh token was rejected"),
    }
}

proptest! {
    /// A second `initialize` call must always fail with `AlreadyInitialized`,
    /// regardless of anything else.
    #[test]
    fn prop_double_initialize_always_fails(_seed in 0u8..=255u8) {
        let env = Env::default();
        env.mock_all_auths();

        let audit_id = env.register(AuditContract, ());
        let identity_id = env.register(IdentityContract, ());
        let emergency_id = env.register(EmergencyContract, ());
        let emergency = EmergencyContractClient::new(&env, &emergency_id);

        let admin = Address::generate(&env);
        emergency.initialize(&admin, &identity_id, &audit_id);

        let second = emergency.try_initialize(&admin, &identity_id, &audit_id);
        prop_assert_eq!(second, Err(Ok(EmergencyError::AlreadyInitialized)));
    }

    /// Record ids are dense and sequential per tenant, and the patient
    /// listing returns them oldest first.
    #[test]
    fn prop_record_ids_are_sequential(count in 1usize..=8) {
        let f = fixture();

        for expected in 1..=count {
            let record_id = open_request(&f);
            prop_assert_eq!(record_id, expected as u64);
        }

        let listing = f.emergency.list_patient_records(&f.hospital, &patient_did(&f.env));
        prop_assert_eq!(listing.len() as usize, count);
        for (position, record_id) in listing.iter().enumerate() {
            prop_assert_eq!(record_id, position as u64 + 1);
        }
    }

    /// Replaying any action sequence, the contract's answers match a
    /// reference model of the strict linear lifecycle.
    #[test]
    fn prop_action_sequences_match_reference_model(
        actions in prop::collection::vec(any::<Action>(), 1..24),
    ) {
        let f = fixture();
        let mut now = BASE_TIME;
        let mut model: Option<ModelRecord> = None;

        for action in actions {
            // The model expires lazily, exactly like the contract.
            if let Some(record) = &mut model {
                if record.state == ModelState::Active && now >= record.expires {
                    record.state = ModelState::Expired;
                }
            }

            match action {
                Action::Request => {
                    let record_id = open_request(&f);
                    model = Some(ModelRecord {
                        id: record_id,
                        state: ModelState::Requested,
                        expires: 0,
                    });
                }
                Action::AuthorizePrimary => {
                    if let Some(record) = &mut model {
                        let token = f.emergency.issue_request_token(&f.hospital);
                        let outcome = f.emergency.authorize_primary(
                            &f.hospital,
                            &record.id,
                            &f.dr1,
                            &token,
                        );
                        if record.state == ModelState::Requested {
                            prop_assert!(matches!(outcome, AuthorizeOutcome::Authorized(_)));
                            record.state = ModelState::PrimaryAuthorized;
                        } else {
                            prop_assert_eq!(
                                outcome,
                                AuthorizeOutcome::Rejected(AuthorizeReject::WrongState)
                            );
                        }
                    }
                }
                Action::AuthorizeSecondary => {
                    if let Some(record) = &mut model {
                        let token = f.emergency.issue_request_token(&f.hospital);
                        let outcome = f.emergency.authorize_secondary(
                            &f.hospital,
                            &record.id,
                            &f.dr2,
                            &token,
                        );
                        if record.state == ModelState::PrimaryAuthorized {
                            match outcome {
                                AuthorizeOutcome::Authorized(activated) => {
                                    prop_assert_eq!(activated.state, EmergencyState::Active);
                                    let primary = activated.primary_authorizer.unwrap();
                                    let secondary = activated.secondary_authorizer.unwrap();
                                    prop_assert_ne!(primary.staff_id, secondary.staff_id);
                                }
                                AuthorizeOutcome::Rejected(reject) => {
                                    prop_assert!(false, "unexpected rejection: {:?}", reject);
                                }
                            }
                            record.state = ModelState::Active;
                            record.expires = now + ACCESS_WINDOW;
                        } else {
                            prop_assert_eq!(
                                outcome,
                                AuthorizeOutcome::Rejected(AuthorizeReject::WrongState)
                            );
                        }
                    }
                }
                Action::Check => {
                    if let Some(record) = &model {
                        let decision = f.emergency.check_access(&f.hospital, &record.id);
                        let expected = match record.state {
                            ModelState::Active => EmergencyDecision::Allow(record.id),
                            ModelState::Expired => {
                                EmergencyDecision::Deny(EmergencyDenyReason::EmergencyExpired)
                            }
                            ModelState::Revoked => {
                                EmergencyDecision::Deny(EmergencyDenyReason::EmergencyRevoked)
                            }
                            _ => EmergencyDecision::Deny(EmergencyDenyReason::NotActive),
                        };
                        prop_assert_eq!(decision, expected);
                    }
                }
                Action::Revoke => {
                    if let Some(record) = &mut model {
                        let token = f.emergency.issue_request_token(&f.admin);
                        let result =
                            f.emergency.try_revoke_access(&f.hospital, &record.id, &f.admin, &token);
                        match record.state {
                            ModelState::Active => {
                                prop_assert!(result.is_ok());
                                record.state = ModelState::Revoked;
                            }
                            // Replayed revocations answer from storage.
                            ModelState::Revoked => prop_assert!(result.is_ok()),
                            _ => prop_assert_eq!(
                                result,
                                Err(Ok(EmergencyError::RecordNotActive))
                            ),
                        }
                    }
                }
                Action::Advance { secs } => {
                    now += u64::from(secs);
                    f.env.ledger().set_timestamp(now);
                }
            }
        }
    }
}
