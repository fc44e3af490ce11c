#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{Address, Env, String};

use audit::{AuditContract, AuditContractClient};
use emergency::types::{
    EmergencyDecision, EmergencyState, EmergencyType, PolicyWindow, RequestOutcome,
};
use emergency::{EmergencyContract, EmergencyContractClient};
use identity::types::StaffRole;
use identity::{IdentityContract, IdentityContractClient};

const ACCESS_SECS: u64 = 3_600;

#[derive(Arbitrary, Debug)]
pub enum FuzzAction {
    Request,
    AuthorizePrimary { record: u8, staff: u8 },
    AuthorizeSecondary { record: u8, staff: u8 },
    Check { record: u8 },
    Revoke { record: u8 },
    Advance { secs: u16 },
}

// Arbitrary request/authorize/check/revoke/advance sequences must never
// produce a record that breaks the break-glass state machine: activation
// always carries two distinct roster authorizers, the intermediate
// secondary state never rests, and revoked or expired records never grant.
fuzz_target!(|actions: Vec<FuzzAction>| {
    let env = Env::default();
    env.mock_all_auths();
    let mut now: u64 = 1_000;
    env.ledger().set_timestamp(now);

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
        &PolicyWindow {
            access_secs: ACCESS_SECS,
            nok_required: false,
            nok_grace_secs: 0,
        },
    );

    let hospital = Address::generate(&env);
    let did = String::from_str(&env, "did:medrex:patient:fuzz");

    // Roster mix: two eligible authorizers, a nurse outside the approved
    // roles, and an off-duty doctor. The fuzzer picks freely among them.
    let staff_pool = [
        ("DR-1", "LIC-1", StaffRole::EmergencyDoctor, true),
        ("DR-2", "LIC-2", StaffRole::Surgeon, true),
        ("DR-3", "LIC-3", StaffRole::Nurse, true),
        ("DR-4", "LIC-4", StaffRole::EmergencyDoctor, false),
    ];
    for (staff_id, license, role, on_duty) in staff_pool {
        let staff_id = String::from_str(&env, staff_id);
        identity.register_staff(
            &admin,
            &staff_id,
            &hospital,
            &String::from_str(&env, "Fuzz Staff"),
            &String::from_str(&env, license),
            &role,
        );
        identity.set_on_duty(&admin, &staff_id, &on_duty);
    }

    let mut record_ids: Vec<u64> = Vec::new();

    for action in actions {
        match action {
            FuzzAction::Request => {
                let token = emergency.issue_request_token(&hospital);
                let outcome = emergency.request_access(
                    &hospital,
                    &did,
                    &EmergencyType::Trauma,
                    &String::from_str(&env, "unresponsive on arrival"),
                    &String::from_str(&env, "DR-1"),
                    &token,
                );
                if let RequestOutcome::Requested(record) = outcome {
                    record_ids.push(record.record_id);
                }
            }
            FuzzAction::AuthorizePrimary { record, staff } => {
                if record_ids.is_empty() {
                    continue;
                }
                let record_id = record_ids[record as usize % record_ids.len()];
                let staff_id = staff_pool[staff as usize % staff_pool.len()].0;
                let token = emergency.issue_request_token(&hospital);
                let _ = emergency.try_authorize_primary(
                    &hospital,
                    &record_id,
                    &String::from_str(&env, staff_id),
                    &token,
                );
            }
            FuzzAction::AuthorizeSecondary { record, staff } => {
                if record_ids.is_empty() {
                    continue;
                }
                let record_id = record_ids[record as usize % record_ids.len()];
                let staff_id = staff_pool[staff as usize % staff_pool.len()].0;
                let token = emergency.issue_request_token(&hospital);
                let _ = emergency.try_authorize_secondary(
                    &hospital,
                    &record_id,
                    &String::from_str(&env, staff_id),
                    &token,
                );
            }
            FuzzAction::Check { record } => {
                if record_ids.is_empty() {
                    continue;
                }
                let record_id = record_ids[record as usize % record_ids.len()];
                let decision = emergency.check_access(&hospital, &record_id);
                let stored = emergency.get_record(&hospital, &record_id);
                match decision {
                    EmergencyDecision::Allow(allowed_id) => {
                        assert_eq!(allowed_id, record_id);
                        assert_eq!(stored.state, EmergencyState::Active);
                        assert!(now < stored.expires_at.expect("active record has expiry"));
                    }
                    EmergencyDecision::Deny(_) => {
                        // Lazy expiry has already been applied, so a denied
                        // record can never still rest in Active.
                        assert_ne!(stored.state, EmergencyState::Active);
                    }
                }
            }
            FuzzAction::Revoke { record } => {
                if record_ids.is_empty() {
                    continue;
                }
                let record_id = record_ids[record as usize % record_ids.len()];
                let token = emergency.issue_request_token(&hospital);
                let _ = emergency.try_revoke_access(&hospital, &record_id, &admin, &token);
            }
            FuzzAction::Advance { secs } => {
                now += u64::from(secs);
                env.ledger().set_timestamp(now);
            }
        }

        // Structural sweep over every record after every step.
        for record_id in &record_ids {
            let record = emergency.get_record(&hospital, record_id);
            match record.state {
                EmergencyState::Requested => {
                    assert!(record.primary_authorizer.is_none());
                    assert!(record.secondary_authorizer.is_none());
                    assert!(record.granted_at.is_none());
                }
                EmergencyState::PrimaryAuthorized => {
                    assert!(record.primary_authorizer.is_some());
                    assert!(record.secondary_authorizer.is_none());
                    assert!(record.granted_at.is_none());
                }
                EmergencyState::SecondaryAuthorized => {
                    panic!("intermediate secondary state must never rest");
                }
                EmergencyState::Active | EmergencyState::Expired | EmergencyState::Revoked => {
                    let primary = record
                        .primary_authorizer
                        .as_ref()
                        .expect("activated record has a primary authorizer");
                    let secondary = record
                        .secondary_authorizer
                        .as_ref()
                        .expect("activated record has a secondary authorizer");
                    assert_ne!(primary.staff_id, secondary.staff_id);
                    let granted_at = record.granted_at.expect("activated record has granted_at");
                    assert_eq!(record.expires_at, Some(granted_at + ACCESS_SECS));
                    if record.state == EmergencyState::Revoked {
                        assert!(record.revoked_at.is_some());
                    }
                }
            }
        }
    }

    assert!(audit.verify_chain(&hospital), "audit chain must verify");
});
