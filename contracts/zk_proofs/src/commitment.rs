//! Challenge minting and commitment binding.
//!
//! No host PRNG is involved: challenge uniqueness comes from the strictly
//! increasing proof counter, with the ledger position and the secret mixed
//! in so challenges are not predictable from the counter alone.

use soroban_sdk::{xdr::ToXdr, Bytes, BytesN, Env, String};

/// Mint the challenge for a new proof object.
///
/// `counter` is the proof id being assigned; it never repeats, so neither
/// does the challenge — even for identical `(patient, kind, secret)` inputs.
pub fn mint_challenge(env: &Env, counter: u64, sealed_secret: &Bytes) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.extend_from_array(&counter.to_be_bytes());
    data.extend_from_array(&env.ledger().timestamp().to_be_bytes());
    data.extend_from_array(&env.ledger().sequence().to_be_bytes());
    data.append(sealed_secret);
    env.crypto().keccak256(&data).into()
}

/// Bind secret, challenge, and statement into the stored commitment.
///
/// Recomputing with a different statement (or secret) cannot reproduce the
/// commitment, which is all `verify_proof` relies on.
pub fn bind_commitment(
    env: &Env,
    sealed_secret: &Bytes,
    challenge: &BytesN<32>,
    public_statement: &String,
) -> BytesN<32> {
    let mut data = Bytes::new(env);
    data.append(sealed_secret);
    data.extend_from_array(&challenge.to_array());
    data.append(&public_statement.clone().to_xdr(env));
    env.crypto().keccak256(&data).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use soroban_sdk::Env;

    fn with_contract_env<F: FnOnce(&Env)>(f: F) {
        let env = Env::default();
        let contract_id = env.register(crate::ZkProofContract, ());
        env.as_contract(&contract_id, || f(&env));
    }

    #[test]
    fn distinct_counters_mint_distinct_challenges() {
        with_contract_env(|env| {
            let secret = Bytes::from_slice(env, b"sealed");
            let a = mint_challenge(env, 1, &secret);
            let b = mint_challenge(env, 2, &secret);
            assert_ne!(a, b);
        });
    }

    #[test]
    fn commitment_binds_statement() {
        with_contract_env(|env| {
            let secret = Bytes::from_slice(env, b"sealed");
            let challenge = mint_challenge(env, 1, &secret);
            let stated = String::from_str(env, "allergic to penicillin");
            let tampered = String::from_str(env, "no known allergies");
            let c1 = bind_commitment(env, &secret, &challenge, &stated);
            let c2 = bind_commitment(env, &secret, &challenge, &tampered);
            assert_ne!(c1, c2);
            assert_eq!(c1, bind_commitment(env, &secret, &challenge, &stated));
        });
    }

    #[test]
    fn commitment_binds_challenge() {
        with_contract_env(|env| {
            let secret = Bytes::from_slice(env, b"sealed");
            let stated = String::from_str(env, "blood type O-");
            let c1 = bind_commitment(env, &secret, &mint_challenge(env, 1, &secret), &stated);
            let c2 = bind_commitment(env, &secret, &mint_challenge(env, 2, &secret), &stated);
            assert_ne!(c1, c2);
        });
    }
}
