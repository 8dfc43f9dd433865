use rand::Rng;
use rand::distributions::Alphanumeric;
use subtle::ConstantTimeEq;

/// Default password length: 24 characters drawn from `[A-Za-z0-9]`.
pub const PASSWORD_LEN: usize = 24;

/// Generates a token password from a cryptographically secure source.
/// `rand::thread_rng` in this crate's `rand` version is itself a CSPRNG
/// (ChaCha, reseeded from the OS), so no separate `OsRng` plumbing is
/// needed to satisfy the "must be cryptographically secure" requirement.
#[must_use]
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Constant-time equality check, used whenever a caller-supplied password is
/// compared against a stored one. A naive `==` short-circuits on the first
/// differing byte, leaking timing information about how many leading bytes
/// matched; `subtle::ConstantTimeEq` walks the full length regardless.
#[must_use]
pub fn passwords_match(candidate: &str, stored: &str) -> bool {
    candidate.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_has_expected_length_and_alphabet() {
        let pw = generate_password();
        assert_eq!(pw.len(), PASSWORD_LEN);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_passwords_are_not_trivially_repeated() {
        let a = generate_password();
        let b = generate_password();
        assert_ne!(a, b);
    }

    #[test]
    fn matching_passwords_compare_equal() {
        assert!(passwords_match("sekret123", "sekret123"));
    }

    #[test]
    fn differing_passwords_and_lengths_do_not_match() {
        assert!(!passwords_match("sekret123", "sekret124"));
        assert!(!passwords_match("short", "shorter"));
    }
}
