pub mod dispatcher;
pub mod plan_cache;
pub mod planning_service;

pub use dispatcher::*;
pub use plan_cache::*;
pub use planning_service::*;
