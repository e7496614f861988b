//! Registration rules and credential checks. Demo-grade trust model:
//! passwords are compared in plaintext and the backend credentials are a
//! fixed placeholder pair.

use serde::{Deserialize, Serialize};

/// Teacher accounts must use an address under this domain.
pub const EMAIL_DOMAIN_SUFFIX: &str = "@schule.bayern.de";

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Fixed administrative login.
pub const BACKEND_USERNAME: &str = "admin";
const BACKEND_PASSWORD: &str = "password";

/// A registered teacher as exposed to session snapshots. The password
/// stays in the store and never leaves it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TeacherIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// A registration request as handed over by the sign-up form.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum RegistrationError {
    #[error("email must end with {EMAIL_DOMAIN_SUFFIX}")]
    InvalidEmailDomain,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("an account with this email already exists")]
    EmailTaken,
}

/// Check the in-core registration rules. Duplicate-email detection needs
/// the registry and happens in the store.
///
/// # Errors
/// Returns the first failing rule: domain suffix, password match, length.
pub fn validate_registration(registration: &Registration) -> Result<(), RegistrationError> {
    if !registration.email.ends_with(EMAIL_DOMAIN_SUFFIX) {
        return Err(RegistrationError::InvalidEmailDomain);
    }
    if registration.password != registration.confirm_password {
        return Err(RegistrationError::PasswordMismatch);
    }
    // Counted in characters, not UTF-8 bytes.
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RegistrationError::PasswordTooShort);
    }
    Ok(())
}

/// Check the fixed administrative credentials.
#[must_use]
pub fn authenticate_backend(username: &str, password: &str) -> bool {
    username == BACKEND_USERNAME && password == BACKEND_PASSWORD
}
