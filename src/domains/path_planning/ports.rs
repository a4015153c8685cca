use crate::common::DomainResult;
use async_trait::async_trait;

use super::plan::Plan;
use super::wall::Wall;

/// Read access to registered walls. Registration itself lives elsewhere.
#[async_trait]
pub trait WallSource: Send + Sync {
    /// `Ok(None)` when no wall has this id.
    async fn get_wall(&self, wall_id: &str) -> DomainResult<Option<Wall>>;
}

/// Durable record of computed plans.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Saving an id that already exists is a no-op; the first write wins.
    async fn save(&self, plan: &Plan) -> DomainResult<()>;
    /// `Ok(None)` when the id is unknown. Errors are reserved for the medium failing.
    async fn load(&self, plan_id: &str) -> DomainResult<Option<Plan>>;
}

/// Send-only channel towards the robot. No acknowledgement is expected;
/// consumers must tolerate duplicates.
#[async_trait]
pub trait ExecutionChannel: Send + Sync {
    async fn publish(&self, key: &str, payload: &[u8]) -> DomainResult<()>;
}
