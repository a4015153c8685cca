pub mod path_planning;

pub use path_planning::*;
