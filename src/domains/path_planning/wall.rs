use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Obstacle on a wall, in wall coordinates.
///
/// `x`/`y` is the circle center, or the lower-left corner of the rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Obstacle {
    Circle { x: f64, y: f64, radius: f64 },
    Rectangle { x: f64, y: f64, width: f64, height: f64 },
}

impl Obstacle {
    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Obstacle::Circle { x, y, radius }
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Obstacle::Rectangle { x, y, width, height }
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        match *self {
            Obstacle::Circle { x, y, radius } => (x - radius, y - radius, x + radius, y + radius),
            Obstacle::Rectangle { x, y, width, height } => (x, y, x + width, y + height),
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        match *self {
            Obstacle::Circle { x, y, radius } => {
                let dx = px - x;
                let dy = py - y;
                dx * dx + dy * dy <= radius * radius
            }
            Obstacle::Rectangle { x, y, width, height } => {
                px >= x && px <= x + width && py >= y && py <= y + height
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match *self {
            Obstacle::Circle { x, y, radius } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err("circle position must be finite".to_string());
                }
                if !radius.is_finite() || radius < 0.0 {
                    return Err(format!("circle radius must be a non-negative number, got {}", radius));
                }
            }
            Obstacle::Rectangle { x, y, width, height } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err("rectangle position must be finite".to_string());
                }
                if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
                    return Err(format!(
                        "rectangle extent must be non-negative, got {}x{}",
                        width, height
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A registered work surface. Only its dimensions and obstacles feed planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub obstacles: Vec<Obstacle>,
    pub created_at: DateTime<Utc>,
}

impl Wall {
    pub fn new(id: impl Into<String>, width: f64, height: f64, obstacles: Vec<Obstacle>) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            obstacles,
            created_at: Utc::now(),
        }
    }
}
