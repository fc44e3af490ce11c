use soroban_sdk::{contracttype, Address, Bytes, BytesN, String};

/// Predicates a proof can attest to without disclosing the record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProofKind {
    AllergyPresence,
    BloodTypeMatch,
    VaccinationStatus,
    DiagnosisPresence,
    AgeOver,
}

/// A predicate proof over private patient data.
///
/// `sealed_secret` is the caller-encrypted secret blob; the contract never
/// interprets it, only binds it into the commitment. The challenge is minted
/// fresh per proof object and never reused.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZkProof {
    pub proof_id: u64,
    pub patient_did: String,
    pub kind: ProofKind,
    /// The claim the proof attests to, in the clear.
    pub public_statement: String,
    /// Opaque encrypted secret supplied by the prover.
    pub sealed_secret: Bytes,
    /// Single-use value bound into the commitment; unique per proof object.
    pub challenge: BytesN<32>,
    /// keccak256(sealed_secret ‖ challenge ‖ public_statement).
    pub commitment: BytesN<32>,
    /// Address that issued the proof; may deactivate it later.
    pub issued_by: Address,
    pub issued_at: u64,
    pub expires_at: u64,
    pub active: bool,
    /// Successful verifications only; rejections never move it.
    pub verification_count: u64,
}

/// Why a verification attempt was rejected.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyReject {
    ProofExpired,
    ProofInactive,
    ProofInvalid,
}

/// Result of one verification attempt.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyOutcome {
    Verified,
    Rejected(VerifyReject),
}

/// Immutable record of one verification attempt against a proof.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZkVerification {
    pub proof_id: u64,
    /// Attempt sequence number for this proof, starting at 1.
    pub seq: u64,
    pub verified_by: Address,
    pub outcome_ok: bool,
    pub reject: Option<VerifyReject>,
    /// Set when the check came through the emergency access workflow.
    pub emergency_access: bool,
    pub verified_at: u64,
}

