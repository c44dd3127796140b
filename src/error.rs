//! Error types for Socksrelay
//!
//! This module defines the protocol-engine error kinds, the SOCKS5 reply
//! code enumeration, and the application-level error wrapper.

use std::io;
use thiserror::Error;

/// Main error type for Socksrelay operations
#[derive(Error, Debug)]
pub enum SocksRelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),
}

/// SOCKS5 protocol engine errors
///
/// Every handshake-stage error is terminal for its connection. Relay-stage
/// errors terminate only the session they occurred in.
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Malformed or truncated frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// Message cannot be represented on the wire
    #[error("Encode error: {0}")]
    Encode(String),

    /// Wrong protocol version at the negotiate, request, or auth stage
    #[error("Version mismatch: expected {expected:#04x}, got {actual:#04x}")]
    VersionMismatch {
        /// Version byte required at this stage
        expected: u8,
        /// Version byte received
        actual: u8,
    },

    /// No usable authentication method
    #[error("Unsupported authentication method: {0:#04x}")]
    UnsupportedMethod(u8),

    /// Command not supported
    #[error("Command not supported: {0}")]
    UnsupportedCommand(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    UnsupportedAddressType(u8),

    /// Username/password sub-negotiation failed
    #[error("Authentication failed")]
    AuthFailure,

    /// Dialing the destination failed
    #[error("Dial to {target} failed: {source}")]
    Dial {
        /// Destination that was dialed
        target: String,
        /// Underlying transport error
        #[source]
        source: io::Error,
    },

    /// I/O failure on an established connection
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// The proxy answered a relay request with a failure reply
    #[error("Request failed: {0:?}")]
    RequestFailed(ReplyCode),

    /// A bounded wait expired
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Address could not be parsed or encoded
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Socks5Error {
    /// Shorthand for a [`Socks5Error::Decode`] with a formatted reason
    pub fn decode(reason: impl Into<String>) -> Self {
        Socks5Error::Decode(reason.into())
    }

    /// Whether this error is the normal end of a stream
    pub fn is_eof(&self) -> bool {
        matches!(self, Socks5Error::Transport(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ReplyCode {
    type Error = Socks5Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReplyCode::Succeeded),
            0x01 => Ok(ReplyCode::GeneralFailure),
            0x02 => Ok(ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(ReplyCode::NetworkUnreachable),
            0x04 => Ok(ReplyCode::HostUnreachable),
            0x05 => Ok(ReplyCode::ConnectionRefused),
            0x06 => Ok(ReplyCode::TtlExpired),
            0x07 => Ok(ReplyCode::CommandNotSupported),
            0x08 => Ok(ReplyCode::AddressTypeNotSupported),
            other => Err(Socks5Error::decode(format!("unknown reply code {other:#04x}"))),
        }
    }
}

impl From<&io::Error> for ReplyCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
            io::ErrorKind::TimedOut => ReplyCode::HostUnreachable,
            io::ErrorKind::AddrNotAvailable => ReplyCode::HostUnreachable,
            io::ErrorKind::PermissionDenied => ReplyCode::ConnectionNotAllowed,
            _ => match err.raw_os_error() {
                Some(code) if is_network_unreachable(code) => ReplyCode::NetworkUnreachable,
                Some(code) if is_host_unreachable(code) => ReplyCode::HostUnreachable,
                _ => ReplyCode::GeneralFailure,
            },
        }
    }
}

impl From<&Socks5Error> for ReplyCode {
    fn from(err: &Socks5Error) -> Self {
        match err {
            Socks5Error::Dial { source, .. } => ReplyCode::from(source),
            Socks5Error::Timeout(_) => ReplyCode::HostUnreachable,
            Socks5Error::UnsupportedCommand(_) => ReplyCode::CommandNotSupported,
            Socks5Error::UnsupportedAddressType(_) => ReplyCode::AddressTypeNotSupported,
            _ => ReplyCode::GeneralFailure,
        }
    }
}

#[cfg(unix)]
fn is_network_unreachable(code: i32) -> bool {
    code == 101 // ENETUNREACH
}

#[cfg(unix)]
fn is_host_unreachable(code: i32) -> bool {
    code == 113 // EHOSTUNREACH
}

#[cfg(not(unix))]
fn is_network_unreachable(code: i32) -> bool {
    code == 10051 // WSAENETUNREACH
}

#[cfg(not(unix))]
fn is_host_unreachable(code: i32) -> bool {
    code == 10065 // WSAEHOSTUNREACH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_code_from_u8_valid() {
        for value in 0x00..=0x08u8 {
            let code = ReplyCode::try_from(value).unwrap();
            assert_eq!(u8::from(code), value);
        }
    }

    #[test]
    fn test_reply_code_from_u8_invalid() {
        assert!(ReplyCode::try_from(0xFF).is_err());
        assert!(ReplyCode::try_from(0x09).is_err());
        assert!(ReplyCode::try_from(100).is_err());
    }

    #[test]
    fn test_reply_code_to_u8() {
        assert_eq!(u8::from(ReplyCode::Succeeded), 0x00);
        assert_eq!(u8::from(ReplyCode::GeneralFailure), 0x01);
        assert_eq!(u8::from(ReplyCode::CommandNotSupported), 0x07);
        assert_eq!(u8::from(ReplyCode::AddressTypeNotSupported), 0x08);
    }

    #[test]
    fn test_reply_code_from_io_error() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(ReplyCode::from(&err), ReplyCode::ConnectionRefused);

        let err = io::Error::new(io::ErrorKind::TimedOut, "timeout");
        assert_eq!(ReplyCode::from(&err), ReplyCode::HostUnreachable);

        let err = io::Error::new(io::ErrorKind::AddrNotAvailable, "addr not available");
        assert_eq!(ReplyCode::from(&err), ReplyCode::HostUnreachable);

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ReplyCode::from(&err), ReplyCode::ConnectionNotAllowed);

        let err = io::Error::new(io::ErrorKind::Other, "other");
        assert_eq!(ReplyCode::from(&err), ReplyCode::GeneralFailure);
    }

    #[cfg(unix)]
    #[test]
    fn test_reply_code_from_raw_os_error() {
        assert_eq!(
            ReplyCode::from(&io::Error::from_raw_os_error(101)),
            ReplyCode::NetworkUnreachable
        );
        assert_eq!(
            ReplyCode::from(&io::Error::from_raw_os_error(113)),
            ReplyCode::HostUnreachable
        );
    }

    #[test]
    fn test_reply_code_from_socks5_error() {
        let err = Socks5Error::Dial {
            target: "127.0.0.1:9".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(ReplyCode::from(&err), ReplyCode::ConnectionRefused);
        assert_eq!(
            ReplyCode::from(&Socks5Error::Timeout("dial".into())),
            ReplyCode::HostUnreachable
        );
        assert_eq!(
            ReplyCode::from(&Socks5Error::UnsupportedCommand(2)),
            ReplyCode::CommandNotSupported
        );
        assert_eq!(
            ReplyCode::from(&Socks5Error::UnsupportedAddressType(9)),
            ReplyCode::AddressTypeNotSupported
        );
        assert_eq!(
            ReplyCode::from(&Socks5Error::AuthFailure),
            ReplyCode::GeneralFailure
        );
    }

    #[test]
    fn test_socks5_error_display() {
        let err = Socks5Error::VersionMismatch {
            expected: 5,
            actual: 4,
        };
        assert_eq!(format!("{}", err), "Version mismatch: expected 0x05, got 0x04");

        let err = Socks5Error::UnsupportedCommand(0xFF);
        assert_eq!(format!("{}", err), "Command not supported: 255");

        let err = Socks5Error::UnsupportedAddressType(0x99);
        assert_eq!(format!("{}", err), "Address type not supported: 153");

        assert_eq!(format!("{}", Socks5Error::AuthFailure), "Authentication failed");
        assert_eq!(
            format!("{}", Socks5Error::decode("frame too short")),
            "Decode error: frame too short"
        );
    }

    #[test]
    fn test_socks5_error_is_eof() {
        let err = Socks5Error::Transport(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(err.is_eof());
        let err = Socks5Error::Transport(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!err.is_eof());
        assert!(!Socks5Error::AuthFailure.is_eof());
    }

    #[test]
    fn test_socks_relay_error_from() {
        let err: SocksRelayError = io::Error::new(io::ErrorKind::Other, "io").into();
        assert!(matches!(err, SocksRelayError::Io(_)));

        let err: SocksRelayError = Socks5Error::AuthFailure.into();
        assert!(matches!(err, SocksRelayError::Socks5(_)));
        assert_eq!(format!("{}", err), "SOCKS5 error: Authentication failed");
    }
}
