pub mod command;
#[cfg(feature = "kafka")]
pub mod kafka_commands;

pub use command::*;
#[cfg(feature = "kafka")]
pub use kafka_commands::*;
