pub mod bitfield;
pub mod handshake;
pub mod message;

pub use bitfield::{Bitfield, BitfieldError};
pub use handshake::{FromHandshakeError, Handshake};
pub use message::{Message, MessageError};
