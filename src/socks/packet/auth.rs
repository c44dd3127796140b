//! Username/password sub-negotiation messages (RFC 1929)
//!
//! `[VER][ULEN][UNAME][PLEN][PASSWD]` and `[VER][STATUS]`. The username and
//! password are opaque bytes.

use super::frame::{check_complete, Frame, FrameLen, Message};
use crate::error::Socks5Error;
use crate::pool::Recycle;
use crate::socks::consts::{SOCKS5_AUTH_SUCCESS, SOCKS5_AUTH_VERSION};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Username/password credentials sent by the client
#[derive(Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Sub-negotiation version
    pub version: u8,
    /// Username, 0 to 255 bytes
    pub username: Vec<u8>,
    /// Password, 0 to 255 bytes
    pub password: Vec<u8>,
}

impl Default for AuthRequest {
    fn default() -> Self {
        AuthRequest {
            version: SOCKS5_AUTH_VERSION,
            username: Vec::new(),
            password: Vec::new(),
        }
    }
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("version", &self.version)
            .field("username", &self.username_lossy())
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AuthRequest {
    /// Username for logging, with invalid UTF-8 replaced
    pub fn username_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.username)
    }
}

impl Recycle for AuthRequest {
    fn recycle(&mut self) -> bool {
        self.version = SOCKS5_AUTH_VERSION;
        self.username.clear();
        self.password.clear();
        true
    }
}

impl Message for AuthRequest {
    fn encoded_len(&self) -> usize {
        3 + self.username.len() + self.password.len()
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        if self.username.len() > u8::MAX as usize || self.password.len() > u8::MAX as usize {
            return Err(Socks5Error::Encode(
                "username and password must be at most 255 bytes".to_string(),
            ));
        }
        dst.put_u8(self.version);
        dst.put_u8(self.username.len() as u8);
        dst.put_slice(&self.username);
        dst.put_u8(self.password.len() as u8);
        dst.put_slice(&self.password);
        Ok(())
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        check_complete::<Self>(src)?;
        let ulen = src[1] as usize;

        self.version = src[0];
        self.username.clear();
        self.username.extend_from_slice(&src[2..2 + ulen]);
        self.password.clear();
        self.password.extend_from_slice(&src[3 + ulen..]);
        Ok(())
    }
}

impl Frame for AuthRequest {
    fn frame_len(prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        let Some(&ulen) = prefix.get(1) else {
            return Ok(FrameLen::AtLeast(2));
        };
        let plen_at = 2 + ulen as usize;
        match prefix.get(plen_at) {
            None => Ok(FrameLen::AtLeast(plen_at + 1)),
            Some(&plen) => Ok(FrameLen::Exact(plen_at + 1 + plen as usize)),
        }
    }
}

/// Result of the sub-negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResponse {
    /// Sub-negotiation version
    pub version: u8,
    /// 0 on success, anything else is a failure
    pub status: u8,
}

impl AuthResponse {
    /// Whether the server accepted the credentials
    pub fn is_success(&self) -> bool {
        self.status == SOCKS5_AUTH_SUCCESS
    }
}

impl Default for AuthResponse {
    fn default() -> Self {
        AuthResponse {
            version: SOCKS5_AUTH_VERSION,
            status: SOCKS5_AUTH_SUCCESS,
        }
    }
}

impl Recycle for AuthResponse {
    fn recycle(&mut self) -> bool {
        *self = Self::default();
        true
    }
}

impl Message for AuthResponse {
    fn encoded_len(&self) -> usize {
        2
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), Socks5Error> {
        dst.put_u8(self.version);
        dst.put_u8(self.status);
        Ok(())
    }

    fn decode_into(&mut self, src: &[u8]) -> Result<(), Socks5Error> {
        check_complete::<Self>(src)?;
        self.version = src[0];
        self.status = src[1];
        Ok(())
    }
}

impl Frame for AuthResponse {
    fn frame_len(_prefix: &[u8]) -> Result<FrameLen, Socks5Error> {
        Ok(FrameLen::Exact(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(username: &str, password: &str) -> AuthRequest {
        AuthRequest {
            version: SOCKS5_AUTH_VERSION,
            username: username.as_bytes().to_vec(),
            password: password.as_bytes().to_vec(),
        }
    }

    fn encode<M: Message>(msg: &M) -> BytesMut {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), msg.encoded_len());
        buf
    }

    #[test]
    fn test_auth_request_wire_form() {
        let bytes = encode(&auth("alice", "pw1"));
        assert_eq!(&bytes[..], b"\x01\x05alice\x03pw1");
    }

    #[test]
    fn test_auth_request_round_trip_lengths() {
        let long = "u".repeat(255);
        for (user, pass) in [("", ""), ("alice", ""), ("", "pw"), (long.as_str(), long.as_str())] {
            let req = auth(user, pass);
            assert_eq!(AuthRequest::decode(&encode(&req)).unwrap(), req);
        }
    }

    #[test]
    fn test_auth_request_max_fits_control_frame() {
        let long = "p".repeat(255);
        let req = auth(&long, &long);
        assert_eq!(req.encoded_len(), 513);
        assert!(req.encoded_len() <= crate::socks::consts::MAX_CONTROL_FRAME_LEN);
    }

    #[test]
    fn test_auth_request_too_long() {
        let req = auth(&"u".repeat(256), "pw");
        let mut buf = BytesMut::new();
        assert!(matches!(req.encode(&mut buf), Err(Socks5Error::Encode(_))));
    }

    #[test]
    fn test_auth_request_truncated() {
        let bytes = encode(&auth("alice", "pw1"));
        for end in 0..bytes.len() {
            let err = AuthRequest::decode(&bytes[..end]).unwrap_err();
            assert!(matches!(err, Socks5Error::Decode(_)), "prefix {}", end);
        }
    }

    #[test]
    fn test_auth_request_opaque_bytes() {
        let req = AuthRequest::decode(&[0x01, 0x01, 0xFF, 0x02, 0xC3, 0x28]).unwrap();
        assert_eq!(req.username, vec![0xFF]);
        assert_eq!(req.password, vec![0xC3, 0x28]);
        assert_eq!(req.username_lossy(), "\u{FFFD}");
    }

    #[test]
    fn test_auth_request_debug_hides_password() {
        let debug = format!("{:?}", auth("alice", "secret"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_auth_response() {
        let resp = AuthResponse {
            version: 1,
            status: 1,
        };
        let bytes = encode(&resp);
        assert_eq!(&bytes[..], &[0x01, 0x01]);
        let decoded = AuthResponse::decode(&bytes).unwrap();
        assert!(!decoded.is_success());
        assert!(AuthResponse::default().is_success());
    }
}
