use crate::domains::path_planning::{GridCell, Plan};
use thiserror::Error;

/// Errors raised by the planning core.
///
/// The type is `Clone` because a single failed computation is delivered to
/// every caller waiting on the same fingerprint.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid wall: {reason}")]
    InvalidWall { reason: String },

    #[error("Invalid endpoint {cell}: {reason}")]
    InvalidEndpoint { cell: GridCell, reason: String },

    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("Unsupported connectivity: {connectivity} (expected 4 or 8)")]
    UnsupportedConnectivity { connectivity: String },

    #[error("Wall not found: {wall_id}")]
    WallNotFound { wall_id: String },

    #[error("Plan not found: {plan_id}")]
    PlanNotFound { plan_id: String },

    #[error("Timed out after {waited_ms} ms waiting for plan computation {key}")]
    ComputationTimeout { key: String, waited_ms: u64 },

    #[error("Plan {} was computed but could not be persisted: {reason}", plan.id)]
    PlanPersistence { plan: Box<Plan>, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

impl DomainError {
    /// Transient failures a caller may retry without changing its input.
    /// Rasterization and search errors are deterministic and never qualify.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DomainError::ComputationTimeout { .. }
                | DomainError::PlanPersistence { .. }
                | DomainError::InfrastructureError(_)
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::SerializationError(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
