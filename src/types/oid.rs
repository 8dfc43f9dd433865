use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A validated SHA-256 object id: exactly 64 lowercase hex characters.
///
/// Construction is the only place OID shape is checked; once built, an `Oid`
/// is known-valid everywhere it's passed, so the blob store never needs to
/// re-validate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.len() != 64 || !raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(Error::InvalidOid);
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first two fan-out prefixes, used to scope temp-file placement
    /// without walking the full five-level path.
    #[must_use]
    pub fn prefixes(&self) -> [&str; 5] {
        [
            &self.0[0..2],
            &self.0[2..4],
            &self.0[4..6],
            &self.0[6..8],
            &self.0[8..10],
        ]
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Oid::parse(s)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3";

    #[test]
    fn accepts_64_lowercase_hex() {
        assert!(Oid::parse(VALID).is_ok());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Oid::parse(&VALID[..63]).is_err());
        assert!(Oid::parse(&format!("{VALID}a")).is_err());
    }

    #[test]
    fn rejects_uppercase_and_out_of_range_hex() {
        assert!(Oid::parse(&VALID.to_uppercase()).is_err());
        let with_g = format!("g{}", &VALID[1..]);
        assert!(Oid::parse(&with_g).is_err());
    }

    #[test]
    fn prefixes_are_five_two_char_segments() {
        let oid = Oid::parse(VALID).unwrap();
        assert_eq!(oid.prefixes(), ["a6", "65", "a4", "59", "20"]);
    }
}
