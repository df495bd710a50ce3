use super::error::IdentityError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LOWERCASE: Regex = Regex::new(r"[a-z]").expect("valid regex");
    static ref UPPERCASE: Regex = Regex::new(r"[A-Z]").expect("valid regex");
    static ref DIGIT: Regex = Regex::new(r"[0-9]").expect("valid regex");
    static ref SPECIAL: Regex =
        Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};':"\\|,.<>/?]"#).expect("valid regex");
}

/// bcrypt hashing, run on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct PasswordService {
    cost: u32,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordService {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, IdentityError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| IdentityError::Password(e.to_string()))?
            .map_err(|e| IdentityError::Password(e.to_string()))
    }

    /// Empty input never matches.
    pub async fn verify(&self, password: &str, hashed: &str) -> Result<bool, IdentityError> {
        if password.is_empty() || hashed.is_empty() {
            return Ok(false);
        }
        let password = password.to_owned();
        let hashed = hashed.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
            .await
            .map_err(|e| IdentityError::Password(e.to_string()))?
            .map_err(|e| IdentityError::Password(e.to_string()))
    }

    /// Returns every strength rule `password` breaks; empty means strong enough.
    pub fn validate_strength(password: &str) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if password.is_empty() {
            errors.push("Password is required");
            return errors;
        }

        let length = password.chars().count();
        if length < 8 {
            errors.push("Password must be at least 8 characters long");
        }
        if length > 128 {
            errors.push("Password must be less than 128 characters long");
        }
        if !LOWERCASE.is_match(password) {
            errors.push("Password must contain at least one lowercase letter");
        }
        if !UPPERCASE.is_match(password) {
            errors.push("Password must contain at least one uppercase letter");
        }
        if !DIGIT.is_match(password) {
            errors.push("Password must contain at least one number");
        }
        if !SPECIAL.is_match(password) {
            errors.push("Password must contain at least one special character");
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let service = PasswordService::new(4);
        let hashed = service.hash("Sup3r$ecret").await.unwrap();
        assert_ne!(hashed, "Sup3r$ecret");
        assert!(service.verify("Sup3r$ecret", &hashed).await.unwrap());
        assert!(!service.verify("wrong", &hashed).await.unwrap());
        assert!(!service.verify("", &hashed).await.unwrap());
    }

    #[test]
    fn test_strong_password_passes() {
        assert!(PasswordService::validate_strength("Str0ng!Pass").is_empty());
    }

    #[test]
    fn test_weak_password_lists_every_broken_rule() {
        let errors = PasswordService::validate_strength("abc");
        assert_eq!(
            errors,
            vec![
                "Password must be at least 8 characters long",
                "Password must contain at least one uppercase letter",
                "Password must contain at least one number",
                "Password must contain at least one special character",
            ]
        );
        assert_eq!(PasswordService::validate_strength(""), vec!["Password is required"]);
    }
}
