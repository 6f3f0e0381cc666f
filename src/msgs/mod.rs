pub mod alert;
pub mod ccs;
pub mod enums;
pub mod extensions;
pub mod handshake;
pub mod message;
