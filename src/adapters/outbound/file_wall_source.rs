use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::{Wall, WallSource};

/// Reads walls from `<base_path>/<wall_id>.json`, one JSON document per wall.
/// Walls are registered by dropping files into the directory.
pub struct FileWallSource {
    base_path: PathBuf,
}

impl FileWallSource {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn file_path(&self, wall_id: &str) -> Option<PathBuf> {
        let valid = !wall_id.is_empty()
            && wall_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.base_path.join(format!("{}.json", wall_id)))
    }
}

#[async_trait]
impl WallSource for FileWallSource {
    async fn get_wall(&self, wall_id: &str) -> DomainResult<Option<Wall>> {
        let Some(path) = self.file_path(wall_id) else {
            return Ok(None);
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::InfrastructureError(format!(
                    "Failed to read wall file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let wall: Wall = serde_json::from_slice(&bytes)?;
        if wall.id != wall_id {
            return Err(DomainError::InvalidWall {
                reason: format!("file {} holds wall '{}'", path.display(), wall.id),
            });
        }
        Ok(Some(wall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::path_planning::Obstacle;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_wall_documents() {
        let temp_dir = TempDir::new().unwrap();
        let wall = Wall::new("wall-7", 12.0, 8.0, vec![Obstacle::circle(3.0, 3.0, 1.0)]);
        tokio::fs::write(temp_dir.path().join("wall-7.json"), serde_json::to_vec(&wall).unwrap())
            .await
            .unwrap();

        let source = FileWallSource::new(temp_dir.path());
        assert_eq!(source.get_wall("wall-7").await.unwrap(), Some(wall));
        assert!(source.get_wall("wall-8").await.unwrap().is_none());
        assert!(source.get_wall("../wall-7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mismatched_id_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let wall = Wall::new("other", 1.0, 1.0, vec![]);
        tokio::fs::write(temp_dir.path().join("wall-1.json"), serde_json::to_vec(&wall).unwrap())
            .await
            .unwrap();

        let err = FileWallSource::new(temp_dir.path()).get_wall("wall-1").await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidWall { .. }));
    }
}
