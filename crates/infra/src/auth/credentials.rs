use mowerlink_common::SecretString;

/// Account login held by the session manager for silent re-authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account login name
    pub email: String,
    /// Account password
    pub password: SecretString,
}

impl Credentials {
    /// Pair an account name with its password.
    pub fn new(email: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}
