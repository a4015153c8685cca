use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::algorithm::Connectivity;
use super::grid::GridCell;

/// Ordered cells from start to goal. An empty path with `found == false`
/// means the search completed and no route exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub cells: Vec<GridCell>,
    pub found: bool,
}

impl Path {
    pub fn found(cells: Vec<GridCell>) -> Self {
        Self { cells, found: true }
    }

    pub fn not_found() -> Self {
        Self {
            cells: Vec::new(),
            found: false,
        }
    }

    /// Number of cells, including start and goal.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of moves between consecutive cells.
    pub fn steps(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// Travel cost in grid units: 1 per orthogonal move, sqrt(2) per diagonal.
    pub fn cost(&self) -> f64 {
        self.cells
            .windows(2)
            .map(|w| {
                if w[0].x != w[1].x && w[0].y != w[1].y {
                    std::f64::consts::SQRT_2
                } else {
                    1.0
                }
            })
            .sum()
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        self.cells.contains(&cell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub duration_us: u64,
    pub path_length: usize,
    pub nodes_expanded: usize,
}

/// A computed plan. Created once per fingerprint and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub wall_id: String,
    pub fingerprint: String,
    pub algorithm: String,
    pub path: Path,
    pub metrics: Metrics,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(
        id: String,
        wall_id: String,
        fingerprint: String,
        algorithm: String,
        path: Path,
        metrics: Metrics,
    ) -> Self {
        Self {
            id,
            wall_id,
            fingerprint,
            algorithm,
            path,
            metrics,
            // Postgres keeps microseconds; truncate so stored and cached plans compare equal.
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// Inbound planning request. Missing endpoints default to the grid corners,
/// missing algorithm and connectivity to the configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub wall_id: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub start: Option<GridCell>,
    #[serde(default)]
    pub goal: Option<GridCell>,
    #[serde(default)]
    pub connectivity: Option<Connectivity>,
}

impl PlanRequest {
    pub fn new(wall_id: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            wall_id: wall_id.into(),
            algorithm: algorithm.into(),
            start: None,
            goal: None,
            connectivity: None,
        }
    }

    pub fn with_endpoints(mut self, start: GridCell, goal: GridCell) -> Self {
        self.start = Some(start);
        self.goal = Some(goal);
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }
}
