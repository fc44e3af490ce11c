use soroban_sdk::{symbol_short, Address, Env, String};

pub fn publish_initialized(env: &Env, admin: Address) {
    env.events().publish((symbol_short!("IDN_INIT"),), admin);
}

pub fn publish_patient_registered(env: &Env, did: String, controller: Address) {
    env.events()
        .publish((symbol_short!("PAT_REG"), did), controller);
}

pub fn publish_key_rotated(env: &Env, did: String, rotated_at: u64) {
    env.events()
        .publish((symbol_short!("KEY_ROT"), did), rotated_at);
}

pub fn publish_patient_deactivated(env: &Env, did: String) {
    env.events().publish((symbol_short!("PAT_DEAC"), did), ());
}

pub fn publish_patient_reactivated(env: &Env, did: String) {
    env.events().publish((symbol_short!("PAT_REAC"), did), ());
}

pub fn publish_staff_registered(env: &Env, staff_id: String, hospital: Address) {
    env.events()
        .publish((symbol_short!("STF_REG"), staff_id), hospital);
}

pub fn publish_duty_changed(env: &Env, staff_id: String, on_duty: bool) {
    env.events()
        .publish((symbol_short!("STF_DUTY"), staff_id), on_duty);
}
