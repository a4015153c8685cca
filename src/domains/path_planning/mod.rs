pub mod algorithm;
pub mod events;
pub mod fingerprint;
pub mod grid;
pub mod plan;
pub mod ports;
pub mod search;
pub mod wall;

pub use algorithm::*;
pub use events::*;
pub use fingerprint::*;
pub use grid::*;
pub use plan::*;
pub use ports::*;
pub use search::*;
pub use wall::*;
