mod jsonl_persistence;
mod message_bus;
mod persistence;

pub use jsonl_persistence::*;
pub use message_bus::*;
pub use persistence::*;
