use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::{Plan, PlanStore};

/// Plan store keeping one JSON document per plan under a directory.
///
/// A plan is written to a temporary file and then hard-linked into place, so
/// readers never see a partial document and the first writer of an id wins.
pub struct FilePlanStore {
    base_path: PathBuf,
}

impl FilePlanStore {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// `None` for ids that cannot name a file in the store directory.
    fn file_path(&self, plan_id: &str) -> Option<PathBuf> {
        let valid = !plan_id.is_empty()
            && plan_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.base_path.join(format!("{}.json", plan_id)))
    }

    async fn ensure_base_dir(&self) -> DomainResult<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| DomainError::InfrastructureError(format!("Failed to create plan directory: {}", e)))
    }
}

#[async_trait]
impl PlanStore for FilePlanStore {
    async fn save(&self, plan: &Plan) -> DomainResult<()> {
        let path = self.file_path(&plan.id).ok_or_else(|| {
            DomainError::InfrastructureError(format!("plan id '{}' is not storable", plan.id))
        })?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        self.ensure_base_dir().await?;

        let json = serde_json::to_vec_pretty(plan)?;
        let tmp = self.base_path.join(format!(".{}.{}.tmp", plan.id, Uuid::new_v4()));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| DomainError::InfrastructureError(format!("Failed to write plan file {}: {}", tmp.display(), e)))?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => {
                debug!(plan_id = %plan.id, path = %path.display(), "plan written");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(DomainError::InfrastructureError(format!(
                "Failed to publish plan file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn load(&self, plan_id: &str) -> DomainResult<Option<Plan>> {
        let Some(path) = self.file_path(plan_id) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::InfrastructureError(format!(
                "Failed to read plan file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
