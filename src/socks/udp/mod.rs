//! UDP ASSOCIATE support
//!
//! The association handler owns the client-facing UDP listener; the NAT
//! table owns the outbound sockets and their reply tasks.

mod associate;
mod nat;

pub use associate::handle_udp_associate;
pub use nat::{AssociationId, NatTable};
