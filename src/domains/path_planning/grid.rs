use serde::{Deserialize, Serialize};
use std::fmt;

use super::wall::Wall;
use crate::common::{DomainError, DomainResult};

/// Integer cell coordinate: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: u32,
    pub y: u32,
}

impl GridCell {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Whether `other` is reachable in one move under the given connectivity.
    pub fn is_adjacent(&self, other: &GridCell, diagonal: bool) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        match (dx, dy) {
            (1, 0) | (0, 1) => true,
            (1, 1) => diagonal,
            _ => false,
        }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(u32, u32)> for GridCell {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Boolean occupancy matrix derived from a wall, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    cell_width: f64,
    cell_height: f64,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// An obstacle-free grid with unit cells.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cell_width: 1.0,
            cell_height: 1.0,
            cells: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// World size of one cell as `(width, height)`.
    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_width, self.cell_height)
    }

    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    /// Out-of-bounds cells read as occupied.
    pub fn is_occupied(&self, cell: GridCell) -> bool {
        match self.index(cell) {
            Some(i) => self.cells[i],
            None => true,
        }
    }

    pub fn is_free(&self, cell: GridCell) -> bool {
        !self.is_occupied(cell)
    }

    pub fn set_occupied(&mut self, cell: GridCell, occupied: bool) {
        if let Some(i) = self.index(cell) {
            self.cells[i] = occupied;
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    pub fn occupied_cells(&self) -> Vec<GridCell> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = GridCell::new(x, y);
                if self.is_occupied(cell) {
                    out.push(cell);
                }
            }
        }
        out
    }

    /// Cell bitmap packed eight cells per byte in row-major order.
    pub fn packed_bits(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.cells.len().div_ceil(8)];
        for (i, occupied) in self.cells.iter().enumerate() {
            if *occupied {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        bytes
    }

    /// World coordinates of the center of `cell`.
    pub fn cell_center(&self, cell: GridCell) -> (f64, f64) {
        (
            (cell.x as f64 + 0.5) * self.cell_width,
            (cell.y as f64 + 0.5) * self.cell_height,
        )
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        if self.in_bounds(cell) {
            Some(cell.y as usize * self.width as usize + cell.x as usize)
        } else {
            None
        }
    }
}

/// Rasterize a wall into a `resolution x resolution` occupancy grid.
///
/// A cell is occupied when its center lies inside an obstacle (closed shapes,
/// so a center exactly on the boundary counts). Obstacles reaching past the
/// wall edges are clipped.
pub fn rasterize(wall: &Wall, resolution: u32) -> DomainResult<OccupancyGrid> {
    if !(wall.width.is_finite() && wall.height.is_finite()) || wall.width <= 0.0 || wall.height <= 0.0 {
        return Err(DomainError::InvalidWall {
            reason: format!("wall dimensions must be positive, got {}x{}", wall.width, wall.height),
        });
    }
    if resolution == 0 {
        return Err(DomainError::InvalidWall {
            reason: "grid resolution must be positive".to_string(),
        });
    }

    let mut grid = OccupancyGrid {
        width: resolution,
        height: resolution,
        cell_width: wall.width / resolution as f64,
        cell_height: wall.height / resolution as f64,
        cells: vec![false; resolution as usize * resolution as usize],
    };

    for (n, obstacle) in wall.obstacles.iter().enumerate() {
        obstacle.validate().map_err(|reason| DomainError::InvalidWall {
            reason: format!("obstacle {}: {}", n, reason),
        })?;

        let (min_x, min_y, max_x, max_y) = obstacle.bounds();
        let Some((x0, x1)) = cell_span(min_x, max_x, grid.cell_width, grid.width) else {
            continue;
        };
        let Some((y0, y1)) = cell_span(min_y, max_y, grid.cell_height, grid.height) else {
            continue;
        };

        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell = GridCell::new(x, y);
                let (cx, cy) = grid.cell_center(cell);
                if obstacle.contains(cx, cy) {
                    grid.set_occupied(cell, true);
                }
            }
        }
    }

    Ok(grid)
}

/// Inclusive range of cell indices whose centers may fall in `[min, max]`,
/// clipped to `[0, count)`. `None` when the span misses the grid entirely.
fn cell_span(min: f64, max: f64, cell: f64, count: u32) -> Option<(u32, u32)> {
    // center of cell i is (i + 0.5) * cell
    let first = (min / cell - 0.5).ceil();
    let last = (max / cell - 0.5).floor();
    if last < 0.0 || first > (count - 1) as f64 || first > last {
        return None;
    }
    Some((first.max(0.0) as u32, last.min((count - 1) as f64) as u32))
}
