use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::{ExecutionChannel, Plan, PlanStore, Wall, WallSource};

/// In-memory plan store for testing and development.
///
/// `set_unavailable(true)` makes every call fail with an infrastructure
/// error; `set_read_only(true)` fails saves only.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, Plan>>,
    saves: AtomicUsize,
    unavailable: AtomicBool,
    read_only: AtomicBool,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of saves that actually wrote a new plan.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plans.read().await.is_empty()
    }

    fn check_available(&self) -> DomainResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::InfrastructureError(
                "plan store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn save(&self, plan: &Plan) -> DomainResult<()> {
        self.check_available()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(DomainError::InfrastructureError(
                "plan store is read-only".to_string(),
            ));
        }
        let mut plans = self.plans.write().await;
        if !plans.contains_key(&plan.id) {
            plans.insert(plan.id.clone(), plan.clone());
            self.saves.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn load(&self, plan_id: &str) -> DomainResult<Option<Plan>> {
        self.check_available()?;
        Ok(self.plans.read().await.get(plan_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWallSource {
    walls: RwLock<HashMap<String, Wall>>,
}

impl InMemoryWallSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_wall(&self, wall: Wall) {
        self.walls.write().await.insert(wall.id.clone(), wall);
    }

    pub async fn remove_wall(&self, wall_id: &str) -> Option<Wall> {
        self.walls.write().await.remove(wall_id)
    }
}

#[async_trait]
impl WallSource for InMemoryWallSource {
    async fn get_wall(&self, wall_id: &str) -> DomainResult<Option<Wall>> {
        Ok(self.walls.read().await.get(wall_id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub key: String,
    pub payload: Vec<u8>,
}

/// Execution channel that keeps every published message.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    messages: RwLock<Vec<PublishedMessage>>,
    unavailable: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl ExecutionChannel for RecordingChannel {
    async fn publish(&self, key: &str, payload: &[u8]) -> DomainResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::InfrastructureError(
                "execution channel unavailable".to_string(),
            ));
        }
        self.messages.write().await.push(PublishedMessage {
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
