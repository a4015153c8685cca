pub mod file_plan_store;
pub mod file_wall_source;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod postgres;

pub use file_plan_store::*;
pub use file_wall_source::*;
#[cfg(feature = "kafka")]
pub use kafka::*;
pub use memory::*;
pub use postgres::*;
