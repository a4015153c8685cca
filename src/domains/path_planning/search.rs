//! Best-first grid search shared by A*, Dijkstra and greedy best-first.
//!
//! All three run the same loop and differ only in how the open set is
//! weighted: `f = g_weight * g + h_weight * h`. Ties on `f` go to the lower
//! heuristic, then to the earlier insertion, so results are reproducible.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::f64::consts::SQRT_2;
use std::sync::Arc;
use std::time::Instant;

use super::algorithm::{AlgorithmSpec, Connectivity, PlanningAlgorithm};
use super::grid::{GridCell, OccupancyGrid};
use super::plan::{Metrics, Path};
use crate::common::{DomainError, DomainResult};

const ORTHOGONAL_MOVES: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
const DIAGONAL_MOVES: [(i64, i64); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub path: Path,
    pub metrics: Metrics,
}

/// A search algorithm pluggable into the [`StrategyRegistry`].
pub trait SearchStrategy: Send + Sync {
    fn algorithm(&self) -> PlanningAlgorithm;

    fn search(
        &self,
        grid: &OccupancyGrid,
        start: GridCell,
        goal: GridCell,
        connectivity: Connectivity,
    ) -> DomainResult<SearchResult>;
}

/// Best-first search with configurable weights on path cost and heuristic.
#[derive(Debug, Clone, Copy)]
pub struct WeightedSearch {
    algorithm: PlanningAlgorithm,
    g_weight: f64,
    h_weight: f64,
}

impl WeightedSearch {
    pub fn astar() -> Self {
        Self { algorithm: PlanningAlgorithm::AStar, g_weight: 1.0, h_weight: 1.0 }
    }

    pub fn dijkstra() -> Self {
        Self { algorithm: PlanningAlgorithm::Dijkstra, g_weight: 1.0, h_weight: 0.0 }
    }

    pub fn greedy() -> Self {
        Self { algorithm: PlanningAlgorithm::GreedyBestFirst, g_weight: 0.0, h_weight: 1.0 }
    }

    pub fn for_algorithm(algorithm: PlanningAlgorithm) -> Self {
        match algorithm {
            PlanningAlgorithm::AStar => Self::astar(),
            PlanningAlgorithm::Dijkstra => Self::dijkstra(),
            PlanningAlgorithm::GreedyBestFirst => Self::greedy(),
        }
    }
}

impl SearchStrategy for WeightedSearch {
    fn algorithm(&self) -> PlanningAlgorithm {
        self.algorithm
    }

    fn search(
        &self,
        grid: &OccupancyGrid,
        start: GridCell,
        goal: GridCell,
        connectivity: Connectivity,
    ) -> DomainResult<SearchResult> {
        check_endpoints(grid, start, goal)?;

        let started = Instant::now();
        let width = grid.width() as usize;
        let total = width * grid.height() as usize;
        let index = |c: GridCell| c.y as usize * width + c.x as usize;
        let cell_at = |i: usize| GridCell::new((i % width) as u32, (i / width) as u32);

        let mut g_score = vec![f64::INFINITY; total];
        let mut came_from: Vec<Option<usize>> = vec![None; total];
        let mut closed = vec![false; total];
        let mut open = BinaryHeap::new();
        let mut sequence: u64 = 0;
        let mut nodes_expanded = 0usize;

        let goal_idx = index(goal);
        let start_idx = index(start);
        let h_start = heuristic(start, goal, connectivity);
        g_score[start_idx] = 0.0;
        open.push(Reverse((OrderedFloat(self.h_weight * h_start), OrderedFloat(h_start), sequence, start_idx)));

        let mut reached = false;
        while let Some(Reverse((_, _, _, current_idx))) = open.pop() {
            if closed[current_idx] {
                continue;
            }
            closed[current_idx] = true;
            nodes_expanded += 1;

            if current_idx == goal_idx {
                reached = true;
                break;
            }

            let current = cell_at(current_idx);
            for neighbour in neighbours(grid, current, connectivity) {
                let n_idx = index(neighbour.cell);
                if closed[n_idx] {
                    continue;
                }
                let tentative = g_score[current_idx] + neighbour.cost;
                if tentative < g_score[n_idx] {
                    g_score[n_idx] = tentative;
                    came_from[n_idx] = Some(current_idx);
                    let h = heuristic(neighbour.cell, goal, connectivity);
                    let f = self.g_weight * tentative + self.h_weight * h;
                    sequence += 1;
                    open.push(Reverse((OrderedFloat(f), OrderedFloat(h), sequence, n_idx)));
                }
            }
        }

        let path = if reached {
            let mut cells = vec![goal];
            let mut cursor = goal_idx;
            while let Some(prev) = came_from[cursor] {
                cells.push(cell_at(prev));
                cursor = prev;
            }
            cells.reverse();
            Path::found(cells)
        } else {
            Path::not_found()
        };

        let metrics = Metrics {
            duration_us: started.elapsed().as_micros() as u64,
            path_length: path.len(),
            nodes_expanded,
        };
        tracing::debug!(
            algorithm = %self.algorithm,
            %start,
            %goal,
            found = path.found,
            nodes_expanded,
            "grid search finished"
        );
        Ok(SearchResult { path, metrics })
    }
}

/// Maps algorithm identifiers to strategies.
///
/// Requests naming an algorithm with no registered strategy fail with
/// `UnsupportedAlgorithm`.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<PlanningAlgorithm, Arc<dyn SearchStrategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in algorithm.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for algorithm in PlanningAlgorithm::ALL {
            registry.register(Arc::new(WeightedSearch::for_algorithm(algorithm)));
        }
        registry
    }

    /// Registers `strategy`, replacing any previous one for its algorithm.
    pub fn register(&mut self, strategy: Arc<dyn SearchStrategy>) {
        self.strategies.insert(strategy.algorithm(), strategy);
    }

    pub fn supports(&self, algorithm: PlanningAlgorithm) -> bool {
        self.strategies.contains_key(&algorithm)
    }

    pub fn get(&self, algorithm: PlanningAlgorithm) -> DomainResult<Arc<dyn SearchStrategy>> {
        self.strategies
            .get(&algorithm)
            .cloned()
            .ok_or_else(|| DomainError::UnsupportedAlgorithm {
                algorithm: algorithm.to_string(),
            })
    }

    pub fn search(
        &self,
        grid: &OccupancyGrid,
        start: GridCell,
        goal: GridCell,
        spec: AlgorithmSpec,
    ) -> DomainResult<SearchResult> {
        self.get(spec.algorithm)?.search(grid, start, goal, spec.connectivity)
    }
}

/// Run one of the built-in algorithms.
pub fn search(
    grid: &OccupancyGrid,
    start: GridCell,
    goal: GridCell,
    spec: AlgorithmSpec,
) -> DomainResult<SearchResult> {
    WeightedSearch::for_algorithm(spec.algorithm).search(grid, start, goal, spec.connectivity)
}

/// Admissible distance estimate: Manhattan for 4-connectivity, octile for 8.
pub fn heuristic(from: GridCell, to: GridCell, connectivity: Connectivity) -> f64 {
    let dx = from.x.abs_diff(to.x) as f64;
    let dy = from.y.abs_diff(to.y) as f64;
    match connectivity {
        Connectivity::Four => dx + dy,
        Connectivity::Eight => (dx + dy) + (SQRT_2 - 2.0) * dx.min(dy),
    }
}

/// Start and goal must be inside the grid and on free cells.
pub fn check_endpoints(grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> DomainResult<()> {
    validate_endpoint(grid, start, "start")?;
    validate_endpoint(grid, goal, "goal")
}

fn validate_endpoint(grid: &OccupancyGrid, cell: GridCell, role: &str) -> DomainResult<()> {
    if !grid.in_bounds(cell) {
        return Err(DomainError::InvalidEndpoint {
            cell,
            reason: format!(
                "{} is outside the {}x{} grid",
                role,
                grid.width(),
                grid.height()
            ),
        });
    }
    if grid.is_occupied(cell) {
        return Err(DomainError::InvalidEndpoint {
            cell,
            reason: format!("{} cell is occupied", role),
        });
    }
    Ok(())
}

struct Neighbour {
    cell: GridCell,
    cost: f64,
}

fn offset(grid: &OccupancyGrid, cell: GridCell, dx: i64, dy: i64) -> Option<GridCell> {
    let x = cell.x as i64 + dx;
    let y = cell.y as i64 + dy;
    if x < 0 || y < 0 || x >= grid.width() as i64 || y >= grid.height() as i64 {
        return None;
    }
    Some(GridCell::new(x as u32, y as u32))
}

fn neighbours(grid: &OccupancyGrid, cell: GridCell, connectivity: Connectivity) -> Vec<Neighbour> {
    let mut out = Vec::with_capacity(connectivity.neighbours() as usize);
    for (dx, dy) in ORTHOGONAL_MOVES {
        if let Some(n) = offset(grid, cell, dx, dy).filter(|n| grid.is_free(*n)) {
            out.push(Neighbour { cell: n, cost: 1.0 });
        }
    }
    if connectivity.allows_diagonal() {
        for (dx, dy) in DIAGONAL_MOVES {
            let Some(n) = offset(grid, cell, dx, dy).filter(|n| grid.is_free(*n)) else {
                continue;
            };
            // no corner cutting: both orthogonal cells beside the move must be free
            let side_x = offset(grid, cell, dx, 0).is_some_and(|c| grid.is_free(c));
            let side_y = offset(grid, cell, 0, dy).is_some_and(|c| grid.is_free(c));
            if side_x && side_y {
                out.push(Neighbour { cell: n, cost: SQRT_2 });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: u32, y: u32) -> GridCell {
        GridCell::new(x, y)
    }

    fn assert_connected(path: &Path, diagonal: bool) {
        for pair in path.cells.windows(2) {
            assert!(
                pair[0].is_adjacent(&pair[1], diagonal),
                "{} and {} are not adjacent",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_open_grid_four_connected_takes_manhattan_steps() {
        for n in [2u32, 5, 10, 17] {
            let grid = OccupancyGrid::empty(n, n);
            let result = search(&grid, cell(0, 0), cell(n - 1, n - 1), AlgorithmSpec::astar(Connectivity::Four)).unwrap();
            assert!(result.path.found);
            assert_eq!(result.path.steps(), 2 * (n as usize - 1));
            assert_eq!(result.metrics.path_length, result.path.len());
            assert_connected(&result.path, false);
        }
    }

    #[test]
    fn test_open_grid_eight_connected_goes_diagonal() {
        let grid = OccupancyGrid::empty(10, 10);
        let result = search(&grid, cell(0, 0), cell(9, 9), AlgorithmSpec::astar(Connectivity::Eight)).unwrap();
        assert_eq!(result.path.steps(), 9);
        assert!((result.path.cost() - 9.0 * SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_tie_breaking_is_deterministic() {
        let grid = OccupancyGrid::empty(3, 3);
        let result = search(&grid, cell(0, 0), cell(2, 2), AlgorithmSpec::astar(Connectivity::Four)).unwrap();
        assert_eq!(
            result.path.cells,
            vec![cell(0, 0), cell(1, 0), cell(2, 0), cell(2, 1), cell(2, 2)]
        );
        assert_eq!(result.metrics.nodes_expanded, 5);
    }

    #[test]
    fn test_enclosed_goal_reports_not_found() {
        let mut grid = OccupancyGrid::empty(10, 10);
        for c in [cell(8, 8), cell(8, 9), cell(9, 8)] {
            grid.set_occupied(c, true);
        }
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let result = search(&grid, cell(0, 0), cell(9, 9), AlgorithmSpec::astar(connectivity)).unwrap();
            assert!(!result.path.found);
            assert!(result.path.is_empty());
            assert_eq!(result.metrics.path_length, 0);
            // every free cell except the walled-in goal gets expanded
            assert_eq!(result.metrics.nodes_expanded, 96);
        }
    }

    #[test]
    fn test_diagonal_moves_do_not_cut_corners() {
        let mut grid = OccupancyGrid::empty(2, 2);
        grid.set_occupied(cell(1, 0), true);
        grid.set_occupied(cell(0, 1), true);
        let result = search(&grid, cell(0, 0), cell(1, 1), AlgorithmSpec::astar(Connectivity::Eight)).unwrap();
        assert!(!result.path.found);
    }

    #[test]
    fn test_occupied_or_out_of_bounds_endpoints_are_rejected() {
        let mut grid = OccupancyGrid::empty(5, 5);
        grid.set_occupied(cell(2, 2), true);
        let spec = AlgorithmSpec::astar(Connectivity::Four);

        assert!(matches!(
            search(&grid, cell(2, 2), cell(4, 4), spec),
            Err(DomainError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            search(&grid, cell(0, 0), cell(2, 2), spec),
            Err(DomainError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            search(&grid, cell(5, 0), cell(4, 4), spec),
            Err(DomainError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            search(&grid, cell(0, 0), cell(0, 5), spec),
            Err(DomainError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = OccupancyGrid::empty(4, 4);
        let result = search(&grid, cell(1, 1), cell(1, 1), AlgorithmSpec::astar(Connectivity::Eight)).unwrap();
        assert_eq!(result.path.cells, vec![cell(1, 1)]);
        assert_eq!(result.metrics.nodes_expanded, 1);
    }

    #[test]
    fn test_dijkstra_matches_astar_cost_around_a_wall() {
        let mut grid = OccupancyGrid::empty(12, 12);
        for y in 0..10 {
            grid.set_occupied(cell(6, y), true);
        }
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let astar = search(&grid, cell(0, 0), cell(11, 0), AlgorithmSpec::astar(connectivity)).unwrap();
            let dijkstra = search(
                &grid,
                cell(0, 0),
                cell(11, 0),
                AlgorithmSpec::new(PlanningAlgorithm::Dijkstra, connectivity),
            )
            .unwrap();
            assert!((astar.path.cost() - dijkstra.path.cost()).abs() < 1e-9);
            assert!(astar.metrics.nodes_expanded <= dijkstra.metrics.nodes_expanded);
            assert!(!astar.path.cells.iter().any(|c| grid.is_occupied(*c)));
        }
    }

    #[test]
    fn test_greedy_finds_a_valid_path() {
        let mut grid = OccupancyGrid::empty(8, 8);
        for x in 1..8 {
            grid.set_occupied(cell(x, 4), true);
        }
        let result = search(
            &grid,
            cell(7, 0),
            cell(7, 7),
            AlgorithmSpec::new(PlanningAlgorithm::GreedyBestFirst, Connectivity::Four),
        )
        .unwrap();
        assert!(result.path.found);
        assert_eq!(result.path.cells.first(), Some(&cell(7, 0)));
        assert_eq!(result.path.cells.last(), Some(&cell(7, 7)));
        assert!(result.path.contains(cell(0, 4)));
        assert_connected(&result.path, false);
    }

    #[test]
    fn test_registry_rejects_unregistered_algorithm() {
        let mut registry = StrategyRegistry::empty();
        registry.register(Arc::new(WeightedSearch::astar()));
        assert!(registry.supports(PlanningAlgorithm::AStar));

        let grid = OccupancyGrid::empty(3, 3);
        let spec = AlgorithmSpec::new(PlanningAlgorithm::Dijkstra, Connectivity::Four);
        match registry.search(&grid, cell(0, 0), cell(2, 2), spec) {
            Err(DomainError::UnsupportedAlgorithm { algorithm }) => assert_eq!(algorithm, "dijkstra"),
            other => panic!("Expected UnsupportedAlgorithm, got {:?}", other),
        }
    }

    #[test]
    fn test_octile_heuristic_is_admissible_on_open_grid() {
        let grid = OccupancyGrid::empty(9, 9);
        let goal = cell(8, 3);
        for y in 0..9 {
            for x in 0..9 {
                let from = cell(x, y);
                let exact = search(&grid, from, goal, AlgorithmSpec::new(PlanningAlgorithm::Dijkstra, Connectivity::Eight))
                    .unwrap()
                    .path
                    .cost();
                assert!(heuristic(from, goal, Connectivity::Eight) <= exact + 1e-9);
            }
        }
    }
}
