pub mod capability;
pub mod channel;
pub mod command;
pub mod compression;
pub mod constants;
pub mod frame;
pub mod handshake;
pub mod lenenc;
pub mod packets;
pub mod prepared;
pub mod status;

pub use constants::*;
