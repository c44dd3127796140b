//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Sub-negotiation status
/// Username/password accepted
pub const SOCKS5_AUTH_SUCCESS: u8 = 0x00;
/// Username/password rejected
pub const SOCKS5_AUTH_FAILURE: u8 = 0x01;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (not implemented)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Sizes
/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;
/// Control-class buffer size, at least 515 bytes
///
/// The largest control frame is a 513-byte auth request with a 255-byte
/// username and password.
pub const MAX_CONTROL_FRAME_LEN: usize = 515;
/// UDP datagram and stream relay buffer size
pub const UDP_BUFFER_SIZE: usize = 8192;

// Default timeouts in seconds
/// Destination dial bound
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Maximum wait for a complete control frame
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// NAT entry idle deadline
pub const DEFAULT_UDP_IDLE_TIMEOUT_SECS: u64 = 20;
/// How long a half-closed splice waits for the other direction
pub const DEFAULT_RELAY_LINGER_SECS: u64 = 5;
/// Pause after a failed accept before retrying
pub const ACCEPT_ERROR_BACKOFF_MS: u64 = 100;
