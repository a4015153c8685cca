use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::plan_cache::PlanCache;
use super::planning_service::{resolve_plan, PlanSource};
use crate::common::{DomainError, DomainResult, EventEnvelope, EventMetadata};
use crate::domains::path_planning::{ExecutionChannel, GridCell, PathPlanningEvent, PlanStore};

pub const PLAN_AGGREGATE_TYPE: &str = "Plan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub plan_id: String,
    /// Unique per publication.
    pub message_id: Uuid,
    pub found: bool,
    pub cells: Vec<GridCell>,
    pub source: PlanSource,
    pub dispatched_at: DateTime<Utc>,
}

/// Publishes finished plans to the execution channel.
///
/// Delivery is at-least-once: every call publishes, and repeated calls for the
/// same plan carry identical event data keyed by plan id.
pub struct Dispatcher {
    cache: Arc<PlanCache>,
    store: Arc<dyn PlanStore>,
    channel: Arc<dyn ExecutionChannel>,
    pin_duration: Duration,
    source_name: String,
}

impl Dispatcher {
    pub fn new(
        cache: Arc<PlanCache>,
        store: Arc<dyn PlanStore>,
        channel: Arc<dyn ExecutionChannel>,
        pin_duration: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            channel,
            pin_duration,
            source_name: "wallpath".to_string(),
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub async fn dispatch(&self, plan_id: &str) -> DomainResult<DispatchResult> {
        let outcome = match resolve_plan(&self.cache, self.store.as_ref(), plan_id).await? {
            Some(outcome) => outcome,
            None => {
                warn!(plan_id, "dispatch requested for unknown plan");
                return Err(DomainError::PlanNotFound {
                    plan_id: plan_id.to_string(),
                });
            }
        };
        let plan = outcome.plan;

        let event = PathPlanningEvent::dispatched(&plan);
        let metadata = EventMetadata {
            correlation_id: Uuid::parse_str(&plan.id).ok(),
            source: self.source_name.clone(),
        };
        let envelope = EventEnvelope::new(&event, PLAN_AGGREGATE_TYPE, metadata)?;
        let payload = envelope.to_bytes()?;

        self.channel.publish(&plan.id, &payload).await?;
        self.cache.pin_for(&plan.id, self.pin_duration).await;

        info!(
            plan_id = %plan.id,
            wall_id = %plan.wall_id,
            message_id = %envelope.event_id,
            found = plan.path.found,
            "plan dispatched"
        );

        Ok(DispatchResult {
            plan_id: plan.id.clone(),
            message_id: envelope.event_id,
            found: plan.path.found,
            cells: plan.path.cells.clone(),
            source: outcome.source,
            dispatched_at: Utc::now(),
        })
    }
}
