use sha2::{Digest, Sha512};

/// Number of chained SHA-512 rounds applied to a machine code.
pub const DERIVATION_ROUNDS: usize = 10;

/// Derives the secret key returned to an activated machine.
///
/// Each round hashes the current string with SHA-512 and feeds the
/// lowercase hex digest into the next round. Nothing secret is mixed in,
/// so anyone who knows the machine code can recompute the key.
pub fn derive_secret_key(machine_code: &str) -> String {
    let mut current = machine_code.to_owned();
    for _ in 0..DERIVATION_ROUNDS {
        current = hex::encode(Sha512::digest(current.as_bytes()));
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_sha512_hex() {
        let key = derive_secret_key("machine-01");
        assert_eq!(key.len(), 128);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn different_machines_get_different_keys() {
        assert_ne!(derive_secret_key("machine-01"), derive_secret_key("machine-02"));
    }
}
