use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::DomainError;

/// Search algorithms known to the planner.
///
/// Parsing is strict: an unknown selector is an error rather than a silent
/// fallback to A*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanningAlgorithm {
    #[serde(rename = "astar")]
    AStar,
    #[serde(rename = "dijkstra")]
    Dijkstra,
    #[serde(rename = "greedy")]
    GreedyBestFirst,
}

impl PlanningAlgorithm {
    pub const ALL: [PlanningAlgorithm; 3] = [
        PlanningAlgorithm::AStar,
        PlanningAlgorithm::Dijkstra,
        PlanningAlgorithm::GreedyBestFirst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningAlgorithm::AStar => "astar",
            PlanningAlgorithm::Dijkstra => "dijkstra",
            PlanningAlgorithm::GreedyBestFirst => "greedy",
        }
    }
}

impl fmt::Display for PlanningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanningAlgorithm {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "astar" | "a*" | "a_star" | "a-star" => Ok(PlanningAlgorithm::AStar),
            "dijkstra" => Ok(PlanningAlgorithm::Dijkstra),
            "greedy" | "greedy_best_first" | "best_first" => Ok(PlanningAlgorithm::GreedyBestFirst),
            _ => Err(DomainError::UnsupportedAlgorithm {
                algorithm: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    pub fn allows_diagonal(&self) -> bool {
        matches!(self, Connectivity::Eight)
    }

    pub fn neighbours(&self) -> u8 {
        match self {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

impl FromStr for Connectivity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4" | "four" => Ok(Connectivity::Four),
            "8" | "eight" => Ok(Connectivity::Eight),
            _ => Err(DomainError::UnsupportedConnectivity {
                connectivity: s.to_string(),
            }),
        }
    }
}

/// Algorithm plus movement model; together they identify how a plan was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    pub algorithm: PlanningAlgorithm,
    pub connectivity: Connectivity,
}

impl AlgorithmSpec {
    pub fn new(algorithm: PlanningAlgorithm, connectivity: Connectivity) -> Self {
        Self { algorithm, connectivity }
    }

    pub fn astar(connectivity: Connectivity) -> Self {
        Self::new(PlanningAlgorithm::AStar, connectivity)
    }

    /// Stable identifier such as `astar/8`, used in fingerprints and plans.
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.algorithm, self.connectivity.neighbours())
    }
}

impl fmt::Display for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}
