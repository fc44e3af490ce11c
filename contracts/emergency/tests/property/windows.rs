//! Policy window properties.
//!
//! Draws random access windows and grace sub-windows and checks the
//! boundary arithmetic of the workflow: expiry is exclusive at the
//! deadline instant, revocation is terminal even past the deadline, and a
//! next-of-kin attachment clears the review marker exactly when it lands
//! inside the grace sub-window.

use proptest::prelude::*;
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{Address, Env, String, Symbol};

use audit::{AuditContract, AuditContractClient};
use emergency::types::{
    EmergencyDecision, EmergencyDenyReason, EmergencyType, NextOfKinConsent, PolicyWindow,
    RequestOutcome,
};
use emergency::{EmergencyContract, EmergencyContractClient};
use identity::types::StaffRole;
use identity::{IdentityContract, IdentityContractClient};

const BASE_TIME: u64 = 1_000;

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

fn set_trauma_policy(f: &Fixture, access_secs: u64, nok_required: bool, nok_grace_secs: u64) {
    f.emergency.set_policy_window(
        &f.admin,
        &EmergencyType::Trauma,
        &PolicyWindow { access_secs, nok_required, nok_grace_secs },
    );
}

/// Opens a request at `BASE_TIME` and drives it through both sign-offs,
/// returning the activated record's id.
fn activate(f: &Fixture) -> u64 {
    let token = f.emergency.issue_request_token(&f.hospital);
    let outcome = f.emergency.request_access(
        &f.hospital,
        &patient_did(&f.env),
        &EmergencyType::Trauma,
        &String::from_str(&f.env, "unresponsive on arrival, needs medication history"),
        &String::from_str(&f.env, "EMS-407"),
        &token,
    );
    let record_id = match outcome {
        RequestOutcome::Requested(record) => record.record_id,
        RequestOutcome::Rejected(_) => panic!("fresh token was rejected"),
    };
    let token = f.emergency.issue_request_token(&f.hospital);
    f.emergency.authorize_primary(&f.hospital, &record_id, &f.dr1, &token);
    let token = f.emergency.issue_request_token(&f.hospital);
    f.emergency.authorize_secondary(&f.hospital, &record_id, &f.dr2, &token);
    record_id
}

proptest! {
    /// Access runs from activation up to, but not including,
    /// `granted_at + access_secs`. The deadline instant itself denies.
    #[test]
    fn prop_access_window_boundary_is_exclusive(
        access in 1u64..=86_400,
        probe in 0u64..=172_800,
    ) {
        let f = fixture();
        set_trauma_policy(&f, access, false, 0);
        let record_id = activate(&f);

        f.env.ledger().set_timestamp(BASE_TIME + probe);
        let decision = f.emergency.check_access(&f.hospital, &record_id);
        if probe < access {
            prop_assert_eq!(decision, EmergencyDecision::Allow(record_id));
        } else {
            prop_assert_eq!(
                decision,
                EmergencyDecision::Deny(EmergencyDenyReason::EmergencyExpired)
            );
        }
    }

    /// Revocation is terminal: however far the clock advances afterwards,
    /// a revoked record keeps denying as revoked, never as expired.
    #[test]
    fn prop_revocation_wins_over_expiry(
        access in 2u64..=86_400,
        revoke_frac in 0u64..=99,
        probe in 0u64..=172_800,
    ) {
        let f = fixture();
        set_trauma_policy(&f, access, false, 0);
        let record_id = activate(&f);

        // Revoke somewhere strictly inside the live window.
        let revoked_at = BASE_TIME + access * revoke_frac / 100;
        f.env.ledger().set_timestamp(revoked_at);
        let token = f.emergency.issue_request_token(&f.admin);
        f.emergency.revoke_access(&f.hospital, &record_id, &f.admin, &token);

        f.env.ledger().set_timestamp(revoked_at + probe);
        prop_assert_eq!(
            f.emergency.check_access(&f.hospital, &record_id),
            EmergencyDecision::Deny(EmergencyDenyReason::EmergencyRevoked)
        );
    }

    /// When the policy demands next-of-kin consent, the review marker set
    /// at activation is cleared by an attachment if and only if the
    /// attachment lands within the grace sub-window.
    #[test]
    fn prop_nok_grace_boundary(
        access in 100u64..=86_400,
        grace_frac in 0u64..=100,
        attach_frac in 0u64..=99,
    ) {
        let f = fixture();
        let grace = access * grace_frac / 100;
        let attach_after = access * attach_frac / 100;
        set_trauma_policy(&f, access, true, grace);
        let record_id = activate(&f);

        let marker = Symbol::new(&f.env, "NOK_PENDING");
        let record = f.emergency.get_record(&f.hospital, &record_id);
        prop_assert!(record.limitations.contains(&marker));

        // Attach before expiry so the record is still amendable.
        f.env.ledger().set_timestamp(BASE_TIME + attach_after);
        let token = f.emergency.issue_request_token(&f.hospital);
        let record = f.emergency.attach_next_of_kin(
            &f.hospital,
            &record_id,
            &NextOfKinConsent {
                name: String::from_str(&f.env, "Ngozi Okafor"),
                relationship: String::from_str(&f.env, "spouse"),
                contact: String::from_str(&f.env, "+15550199"),
                consented_at: 0,
            },
            &token,
        );
        prop_assert!(record.next_of_kin.is_some());
        prop_assert_eq!(record.limitations.contains(&marker), attach_after > grace);
    }
}
