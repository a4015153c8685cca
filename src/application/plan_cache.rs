//! Single-flight plan cache.
//!
//! At most one computation runs per fingerprint. Callers arriving while it is
//! in flight join it and receive the same `Arc<Plan>` (or the same error).
//! The index only keeps a weak handle on the in-flight computation: once every
//! waiter has gone away the computation is dropped, and the next caller
//! starts a fresh one.

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::{FingerprintKey, Plan};

type Computation = BoxFuture<'static, Result<Arc<Plan>, DomainError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of finished plans kept. Pinned plans may push the
    /// cache over this bound until their pin expires.
    pub capacity: usize,
    pub ttl: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl: Some(Duration::from_secs(3600)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub evictions: u64,
}

struct Entry {
    plan: Arc<Plan>,
    inserted_at: Instant,
    last_used: u64,
    pinned_until: Option<Instant>,
}

impl Entry {
    fn is_pinned(&self, now: Instant) -> bool {
        self.pinned_until.is_some_and(|until| until > now)
    }

    fn is_expired(&self, now: Instant, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => !self.is_pinned(now) && now.duration_since(self.inserted_at) >= ttl,
            None => false,
        }
    }
}

enum Slot {
    Ready(Entry),
    InFlight {
        generation: u64,
        computation: WeakShared<Computation>,
    },
}

#[derive(Default)]
struct Index {
    slots: HashMap<FingerprintKey, Slot>,
    by_plan_id: HashMap<String, FingerprintKey>,
    // last_used tick -> key, ready entries only
    recency: BTreeMap<u64, FingerprintKey>,
    tick: u64,
    next_generation: u64,
}

impl Index {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &FingerprintKey) -> Option<Arc<Plan>> {
        let tick = self.next_tick();
        let Some(Slot::Ready(entry)) = self.slots.get_mut(key) else {
            return None;
        };
        self.recency.remove(&entry.last_used);
        entry.last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(entry.plan.clone())
    }

    fn insert_ready(&mut self, key: FingerprintKey, plan: Arc<Plan>) {
        let tick = self.next_tick();
        self.by_plan_id.insert(plan.id.clone(), key.clone());
        self.recency.insert(tick, key.clone());
        self.slots.insert(
            key,
            Slot::Ready(Entry {
                plan,
                inserted_at: Instant::now(),
                last_used: tick,
                pinned_until: None,
            }),
        );
    }

    fn remove_ready(&mut self, key: &FingerprintKey) {
        if let Some(Slot::Ready(entry)) = self.slots.remove(key) {
            self.recency.remove(&entry.last_used);
            self.by_plan_id.remove(&entry.plan.id);
        }
    }

    fn ready_len(&self) -> usize {
        self.recency.len()
    }

    /// Drops expired entries, then least-recently-used unpinned entries until
    /// the bound holds. Returns how many entries were removed.
    fn enforce(&mut self, settings: &CacheSettings) -> u64 {
        let now = Instant::now();
        let mut victims = Vec::new();
        for key in self.recency.values() {
            if let Some(Slot::Ready(entry)) = self.slots.get(key) {
                if entry.is_expired(now, settings.ttl) {
                    victims.push(key.clone());
                }
            }
        }
        let mut removed = victims.len();
        for key in &victims {
            self.remove_ready(key);
        }

        let overflow = self.ready_len().saturating_sub(settings.capacity);
        if overflow > 0 {
            let lru: Vec<FingerprintKey> = self
                .recency
                .values()
                .filter(|key| matches!(self.slots.get(*key), Some(Slot::Ready(e)) if !e.is_pinned(now)))
                .take(overflow)
                .cloned()
                .collect();
            removed += lru.len();
            for key in &lru {
                self.remove_ready(key);
            }
        }

        // in-flight slots whose waiters all went away
        self.slots.retain(|_, slot| match slot {
            Slot::InFlight { computation, .. } => computation.upgrade().is_some(),
            Slot::Ready(_) => true,
        });
        removed as u64
    }
}

pub struct PlanCache {
    index: Mutex<Index>,
    settings: CacheSettings,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    evictions: AtomicU64,
}

impl PlanCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            index: Mutex::new(Index::default()),
            settings,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Finished plan for `key`, or `None`. Never starts a computation.
    pub async fn get(&self, key: &FingerprintKey) -> Option<Arc<Plan>> {
        let mut index = self.index.lock().await;
        if self.drop_if_expired(&mut index, key) {
            return None;
        }
        let plan = index.touch(key);
        if plan.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        plan
    }

    pub async fn get_by_plan_id(&self, plan_id: &str) -> Option<Arc<Plan>> {
        let key = {
            let index = self.index.lock().await;
            index.by_plan_id.get(plan_id).cloned()
        }?;
        self.get(&key).await
    }

    /// Returns the cached plan for `key`, joining an in-flight computation
    /// or starting one with `compute`.
    ///
    /// `compute` is invoked at most once, under the index lock, and must only
    /// build the future; the work happens when the future is polled. Errors
    /// are handed to every waiter and never cached. With a `deadline`, this
    /// caller gives up with `ComputationTimeout` while the computation goes on
    /// for anyone else still waiting.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &FingerprintKey,
        deadline: Option<Duration>,
        compute: F,
    ) -> DomainResult<Arc<Plan>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DomainResult<Plan>> + Send + 'static,
    {
        let (generation, shared) = {
            let mut index = self.index.lock().await;
            self.drop_if_expired(&mut index, key);

            if let Some(plan) = index.touch(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(plan);
            }

            let joined = match index.slots.get(key) {
                Some(Slot::InFlight { generation, computation }) => {
                    computation.upgrade().map(|shared| (*generation, shared))
                }
                _ => None,
            };

            match joined {
                Some(found) => {
                    tracing::debug!(fingerprint = %key, "joining in-flight plan computation");
                    found
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    self.computations.fetch_add(1, Ordering::Relaxed);
                    index.next_generation += 1;
                    let generation = index.next_generation;
                    let shared: Shared<Computation> = compute().map(|r| r.map(Arc::new)).boxed().shared();
                    match shared.downgrade() {
                        Some(weak) => {
                            index.slots.insert(
                                key.clone(),
                                Slot::InFlight {
                                    generation,
                                    computation: weak,
                                },
                            );
                        }
                        None => {
                            index.slots.remove(key);
                        }
                    }
                    (generation, shared)
                }
            }
        };

        let outcome = match deadline {
            Some(limit) => match tokio::time::timeout(limit, shared).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let waited_ms = limit.as_millis() as u64;
                    tracing::warn!(fingerprint = %key, waited_ms, "gave up waiting for plan computation");
                    return Err(DomainError::ComputationTimeout {
                        key: key.to_string(),
                        waited_ms,
                    });
                }
            },
            None => shared.await,
        };

        self.settle(key, generation, &outcome).await;
        outcome
    }

    /// Adds a plan obtained elsewhere (e.g. loaded from the store).
    /// An existing finished entry wins.
    pub async fn insert(&self, key: FingerprintKey, plan: Arc<Plan>) -> Arc<Plan> {
        let mut index = self.index.lock().await;
        self.drop_if_expired(&mut index, &key);
        match index.slots.get(&key) {
            Some(Slot::Ready(entry)) => entry.plan.clone(),
            Some(Slot::InFlight { computation, .. }) if computation.upgrade().is_some() => plan,
            _ => {
                index.insert_ready(key, plan.clone());
                let evicted = index.enforce(&self.settings);
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
                plan
            }
        }
    }

    /// Exempts a finished plan from eviction for `duration`.
    /// Returns `false` when the plan is not cached.
    pub async fn pin_for(&self, plan_id: &str, duration: Duration) -> bool {
        let mut index = self.index.lock().await;
        let Some(key) = index.by_plan_id.get(plan_id).cloned() else {
            return false;
        };
        match index.slots.get_mut(&key) {
            Some(Slot::Ready(entry)) => {
                let until = Instant::now() + duration;
                entry.pinned_until = Some(entry.pinned_until.map_or(until, |prev| prev.max(until)));
                true
            }
            _ => false,
        }
    }

    pub async fn unpin(&self, plan_id: &str) {
        let mut index = self.index.lock().await;
        if let Some(key) = index.by_plan_id.get(plan_id).cloned() {
            if let Some(Slot::Ready(entry)) = index.slots.get_mut(&key) {
                entry.pinned_until = None;
            }
        }
    }

    /// Removes a finished entry regardless of pins.
    pub async fn invalidate(&self, key: &FingerprintKey) {
        let mut index = self.index.lock().await;
        index.remove_ready(key);
    }

    pub async fn purge_expired(&self) -> u64 {
        let mut index = self.index.lock().await;
        let evicted = index.enforce(&self.settings);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        evicted
    }

    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        let in_flight = index
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::InFlight { computation, .. } if computation.upgrade().is_some()))
            .count();
        CacheStats {
            entries: index.ready_len(),
            in_flight,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Records the outcome of computation `generation`. Later waiters of the
    /// same computation find the slot already settled and leave it alone.
    async fn settle(&self, key: &FingerprintKey, generation: u64, outcome: &DomainResult<Arc<Plan>>) {
        let mut index = self.index.lock().await;
        let current = matches!(
            index.slots.get(key),
            Some(Slot::InFlight { generation: g, .. }) if *g == generation
        );
        if !current {
            return;
        }
        index.slots.remove(key);
        if let Ok(plan) = outcome {
            index.insert_ready(key.clone(), plan.clone());
            let evicted = index.enforce(&self.settings);
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
    }

    fn drop_if_expired(&self, index: &mut Index, key: &FingerprintKey) -> bool {
        let expired = matches!(
            index.slots.get(key),
            Some(Slot::Ready(entry)) if entry.is_expired(Instant::now(), self.settings.ttl)
        );
        if expired {
            index.remove_ready(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        expired
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}
