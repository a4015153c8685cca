use sha2::{Digest, Sha256};
use std::fmt;

use super::algorithm::AlgorithmSpec;
use super::grid::{GridCell, OccupancyGrid};

const DOMAIN_TAG: &[u8] = b"wallpath/plan/v1";

/// Content hash identifying a planning request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FingerprintKey(String);

impl FingerprintKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl fmt::Display for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 over grid dimensions, cell size and bitmap, endpoints and algorithm identifier.
/// Every variable-length field is length-prefixed so distinct inputs cannot
/// collide by concatenation.
pub fn fingerprint(grid: &OccupancyGrid, start: GridCell, goal: GridCell, algorithm: &AlgorithmSpec) -> FingerprintKey {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(grid.width().to_le_bytes());
    hasher.update(grid.height().to_le_bytes());
    let (cell_width, cell_height) = grid.cell_size();
    hasher.update(cell_width.to_bits().to_le_bytes());
    hasher.update(cell_height.to_bits().to_le_bytes());
    let bits = grid.packed_bits();
    hasher.update((bits.len() as u64).to_le_bytes());
    hasher.update(&bits);
    for cell in [start, goal] {
        hasher.update(cell.x.to_le_bytes());
        hasher.update(cell.y.to_le_bytes());
    }
    let id = algorithm.identifier();
    hasher.update((id.len() as u64).to_le_bytes());
    hasher.update(id.as_bytes());

    FingerprintKey(format!("{:x}", hasher.finalize()))
}

/// Stable name-based UUID (v3 layout, MD5) for the plan produced by a
/// fingerprint, so the same request always maps to the same plan id.
pub fn plan_id_for(key: &FingerprintKey) -> String {
    let mut input = Vec::new();
    input.extend_from_slice(uuid::Uuid::NAMESPACE_OID.as_bytes());
    input.extend_from_slice(b"plan:");
    input.extend_from_slice(key.as_str().as_bytes());
    let digest = md5::compute(&input);
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[0..16]);

    // version 3, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | (3 << 4);
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::path_planning::algorithm::{Connectivity, PlanningAlgorithm};
    use crate::domains::path_planning::grid::rasterize;
    use crate::domains::path_planning::wall::Wall;

    fn base() -> (OccupancyGrid, GridCell, GridCell, AlgorithmSpec) {
        let mut grid = OccupancyGrid::empty(8, 8);
        grid.set_occupied(GridCell::new(3, 3), true);
        (grid, GridCell::new(0, 0), GridCell::new(7, 7), AlgorithmSpec::astar(Connectivity::Four))
    }

    #[test]
    fn test_equal_inputs_give_equal_keys() {
        let (grid, start, goal, spec) = base();
        let a = fingerprint(&grid, start, goal, &spec);
        let b = fingerprint(&grid.clone(), start, goal, &spec);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_any_changed_input_changes_the_key() {
        let (grid, start, goal, spec) = base();
        let reference = fingerprint(&grid, start, goal, &spec);

        let mut other_grid = grid.clone();
        other_grid.set_occupied(GridCell::new(4, 4), true);
        assert_ne!(reference, fingerprint(&other_grid, start, goal, &spec));

        assert_ne!(reference, fingerprint(&grid, GridCell::new(1, 0), goal, &spec));
        assert_ne!(reference, fingerprint(&grid, start, GridCell::new(7, 6), &spec));
        assert_ne!(
            reference,
            fingerprint(&grid, start, goal, &AlgorithmSpec::astar(Connectivity::Eight))
        );
        assert_ne!(
            reference,
            fingerprint(&grid, start, goal, &AlgorithmSpec::new(PlanningAlgorithm::Dijkstra, Connectivity::Four))
        );
    }

    #[test]
    fn test_grid_shape_is_part_of_identity() {
        // same (empty) bitmap bytes, different dimensions
        let a = OccupancyGrid::empty(4, 2);
        let b = OccupancyGrid::empty(2, 4);
        let spec = AlgorithmSpec::astar(Connectivity::Four);
        let start = GridCell::new(0, 0);
        let goal = GridCell::new(1, 1);
        assert_ne!(fingerprint(&a, start, goal, &spec), fingerprint(&b, start, goal, &spec));
    }

    #[test]
    fn test_cell_size_is_part_of_identity() {
        let big = rasterize(&Wall::new("big", 10.0, 10.0, vec![]), 10).unwrap();
        let small = rasterize(&Wall::new("small", 5.0, 5.0, vec![]), 10).unwrap();
        assert_eq!(big.packed_bits(), small.packed_bits());
        assert_ne!(big, small);

        let spec = AlgorithmSpec::astar(Connectivity::Eight);
        let start = GridCell::new(0, 0);
        let goal = GridCell::new(9, 9);
        let a = fingerprint(&big, start, goal, &spec);
        let b = fingerprint(&small, start, goal, &spec);
        assert_ne!(a, b);
        assert_ne!(plan_id_for(&a), plan_id_for(&b));
    }

    #[test]
    fn test_plan_id_is_stable_uuid() {
        let (grid, start, goal, spec) = base();
        let key = fingerprint(&grid, start, goal, &spec);
        let id = plan_id_for(&key);
        assert_eq!(id, plan_id_for(&key));
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 3);

        let other = fingerprint(&grid, goal, start, &spec);
        assert_ne!(id, plan_id_for(&other));
    }
}
