use soroban_sdk::{contracttype, Address, BytesN, String};

/// Categories of credential the store understands.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialKind {
    /// Patient consent attestation backing a consent grant.
    Consent,
    /// Practitioner medical license.
    MedicalLicense,
    /// Insurance coverage attestation.
    Insurance,
    /// Emergency contact / next-of-kin designation.
    EmergencyContact,
}

impl CredentialKind {
    /// Stable numeric code, bound into the signed credential message.
    pub fn code(&self) -> u32 {
        match self {
            CredentialKind::Consent => 1,
            CredentialKind::MedicalLicense => 2,
            CredentialKind::Insurance => 3,
            CredentialKind::EmergencyContact => 4,
        }
    }
}

/// An issuer trusted to sign credential envelopes.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IssuerProfile {
    /// DID of the issuing organization.
    pub issuer_did: String,
    /// Hospital account that submits credentials signed by this issuer.
    pub hospital: Address,
    /// Ed25519 key the issuer signs credential messages with.
    pub public_key: BytesN<32>,
    pub registered_at: u64,
    /// False once the admin retires the issuer. Retired issuers cannot
    /// submit new credentials; previously issued ones stand.
    pub active: bool,
}

/// On-chain record of a signed credential envelope.
///
/// The envelope itself (a signed JWT) stays off-chain. The store keeps its
/// hash, the issuer signature, and the parsed fields the authorization
/// contracts act on.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifiableCredential {
    pub credential_id: u64,
    /// DID of the subject patient.
    pub patient_did: String,
    /// DID of the signing issuer.
    pub issuer_did: String,
    /// Hospital tenant the credential was submitted under.
    pub hospital: Address,
    pub kind: CredentialKind,
    /// Hash of the off-chain credential envelope.
    pub envelope_hash: BytesN<32>,
    /// Issuer Ed25519 signature over the canonical credential message.
    pub signature: BytesN<64>,
    pub issued_at: u64,
    /// Expiry timestamp; zero means the credential never expires.
    pub expires_at: u64,
    pub revoked: bool,
    pub revoked_at: Option<u64>,
}
