//! JSON command protocol shared by every inbound transport.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::application::{CacheStats, DispatchResult, Dispatcher, PlanSource, PlanningService};
use crate::common::DomainError;
use crate::domains::path_planning::{Plan, PlanRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCommand {
    /// Echoed back on the reply so callers can correlate.
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub body: CommandBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandBody {
    Plan(PlanRequest),
    Dispatch { plan_id: String },
    GetPlan { plan_id: String },
    Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReply {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub body: ReplyBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyBody {
    Planned { plan: Plan, source: PlanSource },
    Dispatched { result: DispatchResult },
    Found { plan: Plan, source: PlanSource },
    Stats { stats: CacheStats },
    Error { error: ErrorReply },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub kind: String,
    pub message: String,
    pub retriable: bool,
    /// Set when a plan was computed but its persistence failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl From<&DomainError> for ErrorReply {
    fn from(e: &DomainError) -> Self {
        let kind = match e {
            DomainError::InvalidWall { .. } => "invalid_wall",
            DomainError::InvalidEndpoint { .. } => "invalid_endpoint",
            DomainError::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            DomainError::UnsupportedConnectivity { .. } => "unsupported_connectivity",
            DomainError::WallNotFound { .. } => "wall_not_found",
            DomainError::PlanNotFound { .. } => "plan_not_found",
            DomainError::ComputationTimeout { .. } => "computation_timeout",
            DomainError::PlanPersistence { .. } => "plan_persistence",
            DomainError::SerializationError(_) => "serialization",
            DomainError::InfrastructureError(_) => "infrastructure",
        };
        let plan = match e {
            DomainError::PlanPersistence { plan, .. } => Some(plan.as_ref().clone()),
            _ => None,
        };
        Self {
            kind: kind.to_string(),
            message: e.to_string(),
            retriable: e.is_retriable(),
            plan,
        }
    }
}

/// Turns commands into service calls. Every outcome, including failures,
/// becomes a reply.
#[derive(Clone)]
pub struct CommandHandler {
    planning: Arc<PlanningService>,
    dispatcher: Arc<Dispatcher>,
}

impl CommandHandler {
    pub fn new(planning: Arc<PlanningService>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { planning, dispatcher }
    }

    pub async fn handle(&self, command: PlanCommand) -> PlanReply {
        let body = match self.execute(command.body).await {
            Ok(body) => body,
            Err(e) => {
                error!(request_id = ?command.request_id, error = %e, "command failed");
                ReplyBody::Error {
                    error: ErrorReply::from(&e),
                }
            }
        };
        PlanReply {
            request_id: command.request_id,
            body,
        }
    }

    /// Decodes a raw message. Malformed input yields an error reply rather
    /// than being dropped.
    pub async fn handle_bytes(&self, payload: &[u8]) -> PlanReply {
        match serde_json::from_slice::<PlanCommand>(payload) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                let e = DomainError::from(e);
                error!(error = %e, "malformed command");
                PlanReply {
                    request_id: None,
                    body: ReplyBody::Error {
                        error: ErrorReply::from(&e),
                    },
                }
            }
        }
    }

    async fn execute(&self, body: CommandBody) -> Result<ReplyBody, DomainError> {
        match body {
            CommandBody::Plan(request) => {
                info!(wall_id = %request.wall_id, algorithm = %request.algorithm, "plan requested");
                let outcome = self.planning.plan(&request).await?;
                Ok(ReplyBody::Planned {
                    plan: outcome.plan.as_ref().clone(),
                    source: outcome.source,
                })
            }
            CommandBody::Dispatch { plan_id } => {
                let result = self.dispatcher.dispatch(&plan_id).await?;
                Ok(ReplyBody::Dispatched { result })
            }
            CommandBody::GetPlan { plan_id } => match self.planning.get_plan(&plan_id).await? {
                Some(outcome) => Ok(ReplyBody::Found {
                    plan: outcome.plan.as_ref().clone(),
                    source: outcome.source,
                }),
                None => Err(DomainError::PlanNotFound { plan_id }),
            },
            CommandBody::Stats => Ok(ReplyBody::Stats {
                stats: self.planning.stats().await,
            }),
        }
    }
}
