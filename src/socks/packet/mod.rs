//! SOCKS5 wire messages
//!
//! Encoders and decoders for the seven message shapes exchanged by a SOCKS5
//! client and server. Decoders validate every length before indexing and
//! leave version checks to the caller, since the expected version depends on
//! the stage (0x05 for negotiation and requests, 0x01 for sub-negotiation).

mod auth;
mod codec;
mod frame;
mod negotiate;
mod request;
mod udp;

pub use auth::{AuthRequest, AuthResponse};
pub use codec::{Codec, PooledMessage};
pub use frame::{Frame, FrameLen, Message};
pub use negotiate::{NegotiateRequest, NegotiateResponse};
pub use request::{RelayRequest, RelayResponse};
pub use udp::UdpEnvelope;
