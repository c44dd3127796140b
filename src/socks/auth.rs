//! SOCKS5 authentication policy
//!
//! Method selection during negotiation and the credential set checked by
//! the username/password sub-negotiation.

use super::consts::*;
use std::fmt;

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// Username/password authentication
    Password,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::None => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Password => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }

    /// Parse from SOCKS5 method byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => Some(AuthMethod::None),
            SOCKS5_AUTH_METHOD_PASSWORD => Some(AuthMethod::Password),
            _ => None,
        }
    }

    /// Parse a configured method name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" | "noauth" => Some(AuthMethod::None),
            "password" | "username" | "userpass" => Some(AuthMethod::Password),
            _ => None,
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::None => write!(f, "none"),
            AuthMethod::Password => write!(f, "password"),
        }
    }
}

/// Choose the method to answer a negotiation with
///
/// Walks the server's `accepted` methods in order and returns the first the
/// client offered. With no accepted methods configured the answer is no-auth.
/// If nothing matches, the client's first offer is returned as-is (no-auth
/// when the client offered nothing), so a client offering only no-auth to a
/// password-only server is let through. Callers that need strict
/// enforcement must check the result against `accepted` themselves.
pub fn select_method(offered: &[u8], accepted: &[u8]) -> u8 {
    if accepted.is_empty() {
        return SOCKS5_AUTH_METHOD_NONE;
    }
    accepted
        .iter()
        .copied()
        .find(|method| offered.contains(method))
        .or_else(|| offered.first().copied())
        .unwrap_or(SOCKS5_AUTH_METHOD_NONE)
}

/// A username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Credential {
    /// Create a credential
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The set of credentials accepted by username/password authentication
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    entries: Vec<Credential>,
}

impl Credentials {
    /// Create an empty credential set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential
    pub fn push(&mut self, credential: Credential) {
        self.entries.push(credential);
    }

    /// Whether `username` and `password` match an entry byte for byte
    pub fn verify(&self, username: impl AsRef<[u8]>, password: impl AsRef<[u8]>) -> bool {
        let (username, password) = (username.as_ref(), password.as_ref());
        self.entries
            .iter()
            .any(|c| c.username.as_bytes() == username && c.password.as_bytes() == password)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Credential> for Credentials {
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        Credentials {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_bytes() {
        assert_eq!(AuthMethod::None.to_byte(), SOCKS5_AUTH_METHOD_NONE);
        assert_eq!(AuthMethod::Password.to_byte(), SOCKS5_AUTH_METHOD_PASSWORD);
        assert_eq!(AuthMethod::from_byte(0), Some(AuthMethod::None));
        assert_eq!(AuthMethod::from_byte(2), Some(AuthMethod::Password));
        assert_eq!(AuthMethod::from_byte(1), None); // GSSAPI not implemented
        assert_eq!(AuthMethod::from_byte(255), None);
    }

    #[test]
    fn test_auth_method_from_name() {
        assert_eq!(AuthMethod::from_name("none"), Some(AuthMethod::None));
        assert_eq!(AuthMethod::from_name("Password"), Some(AuthMethod::Password));
        assert_eq!(AuthMethod::from_name("username"), Some(AuthMethod::Password));
        assert_eq!(AuthMethod::from_name("gssapi"), None);
    }

    #[test]
    fn test_select_prefers_server_order() {
        assert_eq!(select_method(&[0x00, 0x02], &[0x02]), 0x02);
        assert_eq!(select_method(&[0x02, 0x00], &[0x00, 0x02]), 0x00);
    }

    #[test]
    fn test_select_no_server_methods() {
        assert_eq!(select_method(&[0x02], &[]), 0x00);
        assert_eq!(select_method(&[], &[]), 0x00);
    }

    #[test]
    fn test_select_falls_back_to_first_offer() {
        assert_eq!(select_method(&[0x00], &[0x02]), 0x00);
        assert_eq!(select_method(&[0x01, 0x00], &[0x02]), 0x01);
        assert_eq!(select_method(&[], &[0x02]), 0x00);
    }

    #[test]
    fn test_credentials_verify() {
        let creds: Credentials = vec![Credential::new("alice", "pw1")].into_iter().collect();
        assert!(creds.verify("alice", "pw1"));
        assert!(!creds.verify("alice", "wrong"));
        assert!(!creds.verify("bob", "pw1"));
        assert!(!Credentials::new().verify("", ""));
        assert!(!creds.verify(b"alice\xFF".as_slice(), b"pw1".as_slice()));
        assert_eq!(creds.len(), 1);
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let debug = format!("{:?}", Credential::new("alice", "secret"));
        assert!(!debug.contains("secret"));
    }
}
