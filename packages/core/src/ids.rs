//! Identifiers for new graph nodes.
//!
//! IDs are 21 characters drawn uniformly from `[A-Za-z0-9]` using the OS
//! CSPRNG, giving roughly 125 bits of entropy. They carry no ordering and
//! cannot be guessed from neighbouring IDs.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of every generated ID.
pub const ID_LEN: usize = 21;

/// Generate a fresh, unguessable node ID.
pub fn generate_id() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// `true` if `s` has the shape of a generated ID.
pub fn is_valid_id(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_have_expected_shape() {
        for _ in 0..100 {
            let id = generate_id();
            assert!(is_valid_id(&id), "bad id {id:?}");
        }
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("abcdefghij-klmnopqrst"));
    }
}
