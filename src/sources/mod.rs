// Command sources: IR remote mailbox and zenoh command topics

pub mod bus;
pub mod remote;

pub use bus::{BusListener, BusMessage};
pub use remote::{RemoteDecoder, spawn_symbol_reader};
