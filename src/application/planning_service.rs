use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::plan_cache::{CacheStats, PlanCache};
use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::{
    check_endpoints, fingerprint, plan_id_for, rasterize, AlgorithmSpec, Connectivity, FingerprintKey, GridCell,
    Plan, PlanRequest, PlanStore, PlanningAlgorithm, StrategyRegistry, WallSource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanningSettings {
    /// Cells along each wall axis.
    pub resolution: u32,
    pub default_algorithm: PlanningAlgorithm,
    pub default_connectivity: Connectivity,
    /// Upper bound on waiting for a shared computation. `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            resolution: 10,
            default_algorithm: PlanningAlgorithm::AStar,
            default_connectivity: Connectivity::Four,
            wait_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Where a returned plan came from, from the point of view of one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    /// This call ran the search.
    Computed,
    /// Served from the cache, or from a computation started by another caller.
    Cache,
    /// Loaded from the plan store.
    Store,
}

const SOURCE_CACHE: u8 = 0;
const SOURCE_COMPUTED: u8 = 1;
const SOURCE_STORE: u8 = 2;

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Arc<Plan>,
    pub source: PlanSource,
}

/// Cache first, then the store. A store hit is put back into the cache.
pub async fn resolve_plan(
    cache: &PlanCache,
    store: &dyn PlanStore,
    plan_id: &str,
) -> DomainResult<Option<PlanOutcome>> {
    if let Some(plan) = cache.get_by_plan_id(plan_id).await {
        return Ok(Some(PlanOutcome { plan, source: PlanSource::Cache }));
    }
    match store.load(plan_id).await? {
        Some(plan) => {
            let key = FingerprintKey::from_hex(plan.fingerprint.clone());
            let plan = cache.insert(key, Arc::new(plan)).await;
            Ok(Some(PlanOutcome { plan, source: PlanSource::Store }))
        }
        None => Ok(None),
    }
}

/// Plans paths for registered walls: wall lookup, rasterization,
/// fingerprinting, single-flight search and persistence.
pub struct PlanningService {
    walls: Arc<dyn WallSource>,
    store: Arc<dyn PlanStore>,
    cache: Arc<PlanCache>,
    registry: Arc<StrategyRegistry>,
    settings: PlanningSettings,
}

impl PlanningService {
    pub fn new(
        walls: Arc<dyn WallSource>,
        store: Arc<dyn PlanStore>,
        cache: Arc<PlanCache>,
        registry: Arc<StrategyRegistry>,
        settings: PlanningSettings,
    ) -> Self {
        Self {
            walls,
            store,
            cache,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &PlanningSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<PlanCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn PlanStore> {
        &self.store
    }

    pub async fn plan(&self, request: &PlanRequest) -> DomainResult<PlanOutcome> {
        let algorithm = if request.algorithm.trim().is_empty() {
            self.settings.default_algorithm
        } else {
            request.algorithm.parse()?
        };
        let strategy = self.registry.get(algorithm)?;
        let spec = AlgorithmSpec::new(
            algorithm,
            request.connectivity.unwrap_or(self.settings.default_connectivity),
        );

        let wall = self
            .walls
            .get_wall(&request.wall_id)
            .await?
            .ok_or_else(|| DomainError::WallNotFound {
                wall_id: request.wall_id.clone(),
            })?;
        let grid = Arc::new(rasterize(&wall, self.settings.resolution)?);

        let start = request.start.unwrap_or(GridCell::new(0, 0));
        let goal = request
            .goal
            .unwrap_or(GridCell::new(grid.width() - 1, grid.height() - 1));
        check_endpoints(&grid, start, goal)?;

        let key = fingerprint(&grid, start, goal, &spec);
        let plan_id = plan_id_for(&key);
        let source = Arc::new(AtomicU8::new(SOURCE_CACHE));

        let plan = self
            .cache
            .get_or_compute(&key, self.settings.wait_timeout, || {
                let store = self.store.clone();
                let source = source.clone();
                let wall_id = wall.id.clone();
                let fingerprint = key.to_string();
                async move {
                    if let Some(existing) = store.load(&plan_id).await? {
                        source.store(SOURCE_STORE, Ordering::SeqCst);
                        return Ok(existing);
                    }

                    let result = tokio::task::spawn_blocking(move || {
                        strategy.search(&grid, start, goal, spec.connectivity)
                    })
                    .await
                    .map_err(|e| DomainError::InfrastructureError(format!("search task failed: {}", e)))??;

                    let plan = Plan::new(
                        plan_id,
                        wall_id,
                        fingerprint,
                        spec.identifier(),
                        result.path,
                        result.metrics,
                    );
                    source.store(SOURCE_COMPUTED, Ordering::SeqCst);

                    if let Err(e) = store.save(&plan).await {
                        warn!(plan_id = %plan.id, error = %e, "computed plan could not be persisted");
                        return Err(DomainError::PlanPersistence {
                            plan: Box::new(plan),
                            reason: e.to_string(),
                        });
                    }
                    info!(
                        plan_id = %plan.id,
                        wall_id = %plan.wall_id,
                        algorithm = %plan.algorithm,
                        found = plan.path.found,
                        length = plan.path.len(),
                        nodes_expanded = plan.metrics.nodes_expanded,
                        "path planned"
                    );
                    Ok(plan)
                }
            })
            .await?;

        let source = match source.load(Ordering::SeqCst) {
            SOURCE_COMPUTED => PlanSource::Computed,
            SOURCE_STORE => PlanSource::Store,
            _ => PlanSource::Cache,
        };
        if source != PlanSource::Computed {
            info!(plan_id = %plan.id, wall_id = %request.wall_id, ?source, "plan reused");
        }
        Ok(PlanOutcome { plan, source })
    }

    /// Cache, then store. `Ok(None)` when neither knows the plan.
    pub async fn get_plan(&self, plan_id: &str) -> DomainResult<Option<PlanOutcome>> {
        let found = resolve_plan(&self.cache, self.store.as_ref(), plan_id).await?;
        match &found {
            Some(outcome) => info!(plan_id, source = ?outcome.source, "plan retrieved"),
            None => warn!(plan_id, "plan not found"),
        }
        Ok(found)
    }

    /// Saves a plan whose persistence failed earlier, then caches it.
    pub async fn retry_persistence(&self, plan: Plan) -> DomainResult<Arc<Plan>> {
        self.store.save(&plan).await?;
        let key = FingerprintKey::from_hex(plan.fingerprint.clone());
        Ok(self.cache.insert(key, Arc::new(plan)).await)
    }

    /// Keeps a plan that could not be persisted in the cache only.
    pub async fn accept_unpersisted(&self, plan: Plan) -> Arc<Plan> {
        warn!(plan_id = %plan.id, "serving plan from cache without a durable copy");
        let key = FingerprintKey::from_hex(plan.fingerprint.clone());
        self.cache.insert(key, Arc::new(plan)).await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
