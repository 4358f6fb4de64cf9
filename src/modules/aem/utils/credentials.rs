//! Password generation and strength checking

use rand::Rng;

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+.,:;|?";

pub const GENERATED_PASSWORD_LEN: usize = 16;

/// Random initial password for newly created accounts.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

/// Minimum length 12 with a digit, both letter cases and a special
/// character. Rejections carry the user-facing reason.
pub fn check_password_strength(password: &str) -> Result<(), String> {
    let long_enough = password.len() >= 12;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if long_enough && has_digit && has_lower && has_upper && has_special {
        Ok(())
    } else {
        Err("Password too weak. Minimum length is 12, with upper and lower case, \
             numeric and special characters"
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_use_the_documented_alphabet() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password
            .bytes()
            .all(|b| PASSWORD_ALPHABET.contains(&b)));
    }

    #[test]
    fn strong_password_is_accepted() {
        assert!(check_password_strength("Myprecious-2024").is_ok());
    }

    #[test]
    fn short_or_classless_passwords_are_rejected() {
        assert!(check_password_strength("Sh0rt-pw").is_err());
        assert!(check_password_strength("alllowercase12345").is_err());
        assert!(check_password_strength("NoSpecials12345").is_err());
        assert!(check_password_strength("No-Digits-Here").is_err());
    }
}
