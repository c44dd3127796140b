//! Server configuration types
//!
//! Defines the main configuration structures for the SOCKS5 server.

use super::TcpConfig;
use crate::error::SocksRelayError;
use crate::socks::consts::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_RELAY_LINGER_SECS,
    DEFAULT_UDP_IDLE_TIMEOUT_SECS, MAX_DOMAIN_LEN,
};
use crate::socks::{AuthMethod, Credential, HandshakeConfig};
use crate::transport::SocketOpts;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

fn default_methods() -> Vec<String> {
    vec!["none".to_string()]
}

fn default_allow_udp() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_handshake_timeout() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}

fn default_udp_idle_timeout() -> u64 {
    DEFAULT_UDP_IDLE_TIMEOUT_SECS
}

fn default_relay_linger() -> u64 {
    DEFAULT_RELAY_LINGER_SECS
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Accepted authentication methods, most preferred first
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    /// Username/password credentials
    #[serde(default)]
    pub users: Vec<UserConfig>,

    /// Allow UDP associate command
    #[serde(default = "default_allow_udp")]
    pub allow_udp: bool,

    /// Local IP for UDP association listeners
    #[serde(default)]
    pub udp_bind_addr: Option<String>,

    /// Dial timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Maximum wait for one handshake message in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// UDP NAT entry idle timeout in seconds
    #[serde(default = "default_udp_idle_timeout")]
    pub udp_idle_timeout: u64,

    /// Seconds a CONNECT splice keeps draining after one side closes
    #[serde(default = "default_relay_linger")]
    pub relay_linger: u64,

    /// TCP socket options
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            methods: default_methods(),
            users: Vec::new(),
            allow_udp: default_allow_udp(),
            udp_bind_addr: None,
            connect_timeout: default_connect_timeout(),
            handshake_timeout: default_handshake_timeout(),
            udp_idle_timeout: default_udp_idle_timeout(),
            relay_linger: default_relay_linger(),
            tcp: TcpConfig::default(),
        }
    }
}

/// One username/password pair
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserConfig {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ServerConfig {
    /// Parsed accepted methods, in configured order
    pub fn auth_methods(&self) -> Result<Vec<AuthMethod>, SocksRelayError> {
        self.methods
            .iter()
            .map(|name| {
                AuthMethod::from_name(name).ok_or_else(|| {
                    SocksRelayError::Config(format!("unknown authentication method '{}'", name))
                })
            })
            .collect()
    }

    /// Parsed UDP bind address
    pub fn udp_bind_ip(&self) -> Result<Option<IpAddr>, SocksRelayError> {
        self.udp_bind_addr
            .as_deref()
            .map(|addr| {
                addr.parse().map_err(|_| {
                    SocksRelayError::Config(format!("invalid udp_bind_addr '{}'", addr))
                })
            })
            .transpose()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SocksRelayError> {
        let methods = self.auth_methods()?;
        if methods.contains(&AuthMethod::Password) && self.users.is_empty() {
            return Err(SocksRelayError::Config(
                "password authentication enabled but no users configured".to_string(),
            ));
        }

        for user in &self.users {
            if user.username.len() > MAX_DOMAIN_LEN {
                return Err(SocksRelayError::Config(format!(
                    "username '{}' must be at most {} bytes",
                    user.username, MAX_DOMAIN_LEN
                )));
            }
            if user.password.len() > MAX_DOMAIN_LEN {
                return Err(SocksRelayError::Config(format!(
                    "password for '{}' must be at most {} bytes",
                    user.username, MAX_DOMAIN_LEN
                )));
            }
        }

        for (name, secs) in [
            ("connect_timeout", self.connect_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("udp_idle_timeout", self.udp_idle_timeout),
            ("relay_linger", self.relay_linger),
        ] {
            if secs == 0 {
                return Err(SocksRelayError::Config(format!("{} must be non-zero", name)));
            }
        }

        self.udp_bind_ip()?;
        Ok(())
    }

    /// Build the settings the handshake runs with
    pub fn to_handshake_config(&self) -> Result<HandshakeConfig, SocksRelayError> {
        self.validate()?;

        Ok(HandshakeConfig {
            methods: self.auth_methods()?.into_iter().map(AuthMethod::to_byte).collect(),
            credentials: self
                .users
                .iter()
                .map(|u| Credential::new(u.username.as_str(), u.password.as_str()))
                .collect(),
            allow_udp: self.allow_udp,
            udp_bind_ip: self.udp_bind_ip()?,
            handshake_timeout: Duration::from_secs(self.handshake_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            udp_idle_timeout: Duration::from_secs(self.udp_idle_timeout),
            relay_linger: Duration::from_secs(self.relay_linger),
            socket_opts: SocketOpts::from_tcp_config(&self.tcp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password_config() -> ServerConfig {
        ServerConfig {
            methods: vec!["password".to_string()],
            users: vec![UserConfig {
                username: "alice".to_string(),
                password: "secret".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:1080");
        assert_eq!(config.methods, vec!["none"]);
        assert!(config.allow_udp);
        assert_eq!(config.connect_timeout, 10);
        assert_eq!(config.handshake_timeout, 10);
        assert_eq!(config.udp_idle_timeout, 20);
        assert_eq!(config.relay_linger, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_methods_means_no_auth() {
        let config = ServerConfig {
            methods: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let handshake = config.to_handshake_config().unwrap();
        assert!(handshake.methods.is_empty());
        assert_eq!(crate::socks::select_method(&[0x00], &handshake.methods), 0x00);
    }

    #[test]
    fn test_validate_empty_credentials_allowed() {
        let mut config = password_config();
        config.users.push(UserConfig {
            username: String::new(),
            password: String::new(),
        });
        assert!(config.validate().is_ok());

        let handshake = config.to_handshake_config().unwrap();
        assert!(handshake.credentials.verify("", ""));
    }

    #[test]
    fn test_validate_unknown_method() {
        let config = ServerConfig {
            methods: vec!["gssapi".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SocksRelayError::Config(_))));
    }

    #[test]
    fn test_validate_password_without_users() {
        let config = ServerConfig {
            methods: vec!["password".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(password_config().validate().is_ok());
    }

    #[test]
    fn test_validate_long_password() {
        let mut config = password_config();
        config.users[0].password = "x".repeat(256);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = ServerConfig {
            udp_idle_timeout: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_udp_bind_addr() {
        let config = ServerConfig {
            udp_bind_addr: Some("not-an-ip".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_handshake_config() {
        let mut config = password_config();
        config.methods.push("none".to_string());
        config.udp_bind_addr = Some("127.0.0.1".to_string());
        config.udp_idle_timeout = 5;
        config.relay_linger = 1;

        let handshake = config.to_handshake_config().unwrap();
        assert_eq!(handshake.methods, vec![0x02, 0x00]);
        assert!(handshake.credentials.verify("alice", "secret"));
        assert!(!handshake.credentials.verify("alice", "wrong"));
        assert_eq!(handshake.udp_bind_ip, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(handshake.udp_idle_timeout, Duration::from_secs(5));
        assert_eq!(handshake.relay_linger, Duration::from_secs(1));
    }

    #[test]
    fn test_user_config_debug_redacts_password() {
        let user = UserConfig {
            username: "alice".to_string(),
            password: "secret".to_string(),
        };
        let debug = format!("{:?}", user);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }
}
