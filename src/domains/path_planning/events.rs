use crate::common::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::grid::GridCell;
use super::plan::Plan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathPlanningEvent {
    /// Handed to the execution channel. Carries the plan's creation time
    /// rather than the dispatch time so repeated dispatches are identical.
    PlanDispatched {
        plan_id: String,
        wall_id: String,
        algorithm: String,
        found: bool,
        cells: Vec<GridCell>,
        timestamp: DateTime<Utc>,
    },
}

impl PathPlanningEvent {
    pub fn dispatched(plan: &Plan) -> Self {
        PathPlanningEvent::PlanDispatched {
            plan_id: plan.id.clone(),
            wall_id: plan.wall_id.clone(),
            algorithm: plan.algorithm.clone(),
            found: plan.path.found,
            cells: plan.path.cells.clone(),
            timestamp: plan.created_at,
        }
    }
}

impl DomainEvent for PathPlanningEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PathPlanningEvent::PlanDispatched { .. } => "PlanDispatched",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            PathPlanningEvent::PlanDispatched { plan_id, .. } => plan_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PathPlanningEvent::PlanDispatched { timestamp, .. } => *timestamp,
        }
    }
}
