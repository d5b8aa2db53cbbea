// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Admin password hashing.
//!
//! Magento verifies admin passwords stored as `hash:salt:version`, where
//! version 1 means `sha256(salt ++ password)` in lowercase hex. The salt is 32
//! characters of `[a-zA-Z0-9]`. Anything written to the admin table must
//! follow this exact layout, or the admin cannot log in afterwards.

use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

pub const SALT_LENGTH: usize = 32;
pub const HASH_VERSION: u32 = 1;

/// Hash plaintext password with fresh random salt.
pub fn hash(password: &str) -> String {
    hash_with_salt(password, &salt())
}

/// Hash plaintext password with given salt.
pub fn hash_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{digest}:{salt}:{HASH_VERSION}")
}

/// Check plaintext password against stored `hash:salt:version` triple.
pub fn verify(password: &str, stored: &str) -> bool {
    let mut parts = stored.split(':');
    let (Some(_), Some(salt), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    version == HASH_VERSION.to_string() && hash_with_salt(password, salt) == stored
}

fn salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn hash_layout() {
        let result = hash("admin12");
        let parts = result.split(':').collect::<Vec<_>>();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 64);
        assert!(parts[0].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(parts[1].len(), SALT_LENGTH);
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[2], "1");
    }

    #[test]
    fn hash_known_digest() {
        // sha256("abc")
        let result = hash_with_salt("c", "ab");
        assert_eq!(
            result,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad:ab:1"
        );
    }

    #[test]
    fn fresh_salt_per_hash() {
        let first = hash("s3cret!");
        let second = hash("s3cret!");

        assert_ne!(first, second);
        assert!(verify("s3cret!", &first));
        assert!(verify("s3cret!", &second));
        assert!(!verify("wrong", &first));
    }

    #[test]
    fn verify_rejects_malformed() {
        assert!(!verify("x", "nope"));
        assert!(!verify("x", "a:b:2"));
        assert!(!verify("x", "a:b:1:extra"));
    }
}
