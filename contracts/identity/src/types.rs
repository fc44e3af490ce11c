use soroban_sdk::{contracttype, Address, BytesN, String};

/// Roster role of a hospital staff member.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StaffRole {
    EmergencyDoctor,
    Surgeon,
    ChiefResident,
    Nurse,
    Administrator,
}

/// A patient's decentralized identifier and key material.
///
/// Identities are never hard-deleted; `active` is flipped instead so that
/// historical grants and audit trails keep resolving.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PatientIdentity {
    pub did: String,
    /// Account that controls this DID (authorises rotations and grants).
    pub controller: Address,
    pub public_key: BytesN<32>,
    pub phone_number: String,
    /// Hash of the full DID document held off-chain.
    pub did_document_hash: BytesN<32>,
    pub registered_at: u64,
    pub key_rotated_at: Option<u64>,
    pub active: bool,
}

/// A hospital staff member as known to the roster.
///
/// The emergency workflow validates authorizers against this record, never
/// against caller-supplied details.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StaffProfile {
    pub staff_id: String,
    pub hospital: Address,
    pub name: String,
    pub license_number: String,
    pub role: StaffRole,
    pub on_duty: bool,
    pub registered_at: u64,
}
