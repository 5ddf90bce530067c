//! Post-solve checks and JSON snapshots of resolved levels.
//!
//! Propagation skips cells that are already down to one module, so a grid
//! can in principle finish with adjacent cells that disagree. The checks here
//! look at the finished result only, independent of how it was produced.
//!
//! # Usage
//!
//! ```ignore
//! use level_core::verification::{check_generated_level, LevelSnapshot};
//!
//! let level = generate(config, &catalog)?;
//! assert!(check_generated_level(&level, &catalog).is_empty());
//! LevelSnapshot::from_level(&level, &catalog).save("level_seed42.json")?;
//! ```

use crate::generator::ResolvedLevel;
use crate::grid::Grid;
use crate::loader::LoadError;
use crate::module::{Direction, EdgeConnectionType, ModuleCatalog, ModuleId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Two adjacent cells whose shared edge labels differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeMismatch {
    pub cell: (usize, usize),
    pub neighbor: (usize, usize),
    /// Side of `cell` facing `neighbor`, either Bottom or Right
    pub direction: Direction,
    pub edge: EdgeConnectionType,
    pub neighbor_edge: EdgeConnectionType,
}

impl fmt::Display for EdgeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} edge {:?} does not match {:?} {} edge {:?}",
            self.cell,
            self.direction,
            self.edge,
            self.neighbor,
            self.direction.opposite(),
            self.neighbor_edge
        )
    }
}

/// A rim cell showing something other than the boundary label to the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorderViolation {
    pub cell: (usize, usize),
    pub direction: Direction,
    pub edge: EdgeConnectionType,
}

/// Check every adjacent pair of a resolved level.
pub fn check_generated_level(
    level: &ResolvedLevel,
    catalog: &ModuleCatalog,
) -> Vec<EdgeMismatch> {
    check_pairs(
        level.width,
        level.height,
        |x, y| Some(level.module_at(x, y)),
        catalog,
    )
}

/// Check every adjacent pair of a grid. Cells without a sole module are skipped.
pub fn check_grid(grid: &Grid, catalog: &ModuleCatalog) -> Vec<EdgeMismatch> {
    check_pairs(
        grid.width,
        grid.height,
        |x, y| grid.cell(x, y).sole_module(),
        catalog,
    )
}

// Each pair is examined once, from its upper or left member
fn check_pairs(
    width: usize,
    height: usize,
    module_at: impl Fn(usize, usize) -> Option<ModuleId>,
    catalog: &ModuleCatalog,
) -> Vec<EdgeMismatch> {
    let mut mismatches = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let Some(module) = module_at(x, y) else {
                continue;
            };
            let below_and_right = [(Direction::Bottom, x, y + 1), (Direction::Right, x + 1, y)];
            for (direction, nx, ny) in below_and_right {
                if nx >= width || ny >= height {
                    continue;
                }
                let Some(neighbor) = module_at(nx, ny) else {
                    continue;
                };

                let edge = catalog.get(module).edge(direction);
                let neighbor_edge = catalog.get(neighbor).edge(direction.opposite());
                if edge != neighbor_edge {
                    mismatches.push(EdgeMismatch {
                        cell: (x, y),
                        neighbor: (nx, ny),
                        direction,
                        edge,
                        neighbor_edge,
                    });
                }
            }
        }
    }

    mismatches
}

/// Rim edges of a resolved level that do not show `boundary`.
pub fn border_violations(
    level: &ResolvedLevel,
    catalog: &ModuleCatalog,
    boundary: EdgeConnectionType,
) -> Vec<BorderViolation> {
    let mut violations = Vec::new();

    for y in 0..level.height {
        for x in 0..level.width {
            let module = catalog.get(level.module_at(x, y));
            for direction in Direction::ALL {
                let (dx, dy) = direction.offset();
                let (nx, ny) = (x as i64 + dx as i64, y as i64 + dy as i64);
                let inside =
                    nx >= 0 && ny >= 0 && nx < level.width as i64 && ny < level.height as i64;
                if inside {
                    continue;
                }

                let edge = module.edge(direction);
                if edge != boundary {
                    violations.push(BorderViolation {
                        cell: (x, y),
                        direction,
                        edge,
                    });
                }
            }
        }
    }

    violations
}

/// Resolved level in a form that can be written out and compared across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Seed the run used
    pub seed: i32,
    /// Grid dimensions [width, height]
    pub dimensions: [usize; 2],
    /// Module id per cell, row-major
    pub modules: Vec<String>,
    pub start: (usize, usize),
    pub goal: (usize, usize),
}

impl LevelSnapshot {
    pub fn from_level(level: &ResolvedLevel, catalog: &ModuleCatalog) -> Self {
        Self {
            seed: level.seed,
            dimensions: [level.width, level.height],
            modules: level
                .modules
                .iter()
                .map(|&m| catalog.get(m).id.clone())
                .collect(),
            start: level.start,
            goal: level.goal,
        }
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Positions whose module differs from `other`.
    ///
    /// Empty when the snapshots are identical. If the dimensions differ every
    /// position of `self` is reported.
    pub fn differences(&self, other: &LevelSnapshot) -> Vec<(usize, usize)> {
        let [width, _] = self.dimensions;
        if width == 0 {
            return Vec::new();
        }
        let same_shape = self.dimensions == other.dimensions;

        self.modules
            .iter()
            .enumerate()
            .filter(|(i, m)| !same_shape || other.modules.get(*i) != Some(*m))
            .map(|(i, _)| (i % width, i / width))
            .collect()
    }
}
