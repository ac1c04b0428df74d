//! Gateway contract: the port trait and the typed shapes of its responses.

pub mod port;
pub mod types;

pub use port::Gateway;
