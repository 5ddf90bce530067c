//! Tile-based level generation with wave function collapse.
//!
//! This crate provides:
//! - `ModuleCatalog`: tile templates with one edge label per side
//! - `Wave`: per-cell possibility state with edge-filter propagation
//! - `IndexedHeap`: lowest-entropy-first queue over cells
//! - `LevelGenerator`: the collapse loop with border, start and goal placement
//! - Post-solve verification and JSON snapshots
//! - JSON loading of catalogs and configs

pub mod cell;
pub mod config;
pub mod edge_filter;
pub mod generator;
pub mod grid;
pub mod heap;
pub mod loader;
pub mod module;
pub mod rng;
pub mod verification;
pub mod wave;

pub use config::{ConfigError, GeneratorConfig, MismatchPolicy, RANDOM_SEED};
pub use edge_filter::EdgeFilter;
pub use generator::{
    generate, GenerationError, GenerationStats, GeneratorState, LevelGenerator, ResolvedLevel,
};
pub use heap::{IndexedHeap, TieBreak};
pub use loader::{load_catalog, load_config, LoadError};
pub use module::{Direction, EdgeConnectionType, Module, ModuleCatalog, ModuleId};
pub use rng::{LevelRng, StdRandom};
pub use verification::{check_generated_level, EdgeMismatch, LevelSnapshot};
pub use wave::{Contradiction, NeighborMismatch, Wave};
