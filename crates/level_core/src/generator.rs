//! Level generator: the solver control loop.
//!
//! A run goes through these states:
//!
//! ```text
//! Uninitialized -> ConstraintsApplied -> Collapsing -> Resolved
//!                                   \-> Contradiction
//! ```
//!
//! Construction builds the wave and seeds the RNG. Initial constraints keep
//! the outer rim closed and place the start and goal modules. Each collapse
//! step then takes the lowest-entropy cell off the queue and assigns it a
//! module: its sole remaining one if propagation already narrowed it down,
//! otherwise a uniformly random one. A finished grid is verified edge by edge
//! before it is handed out.
//!
//! There is no backtracking. On contradiction the caller may retry with a
//! different seed.

use crate::cell::{Cell, CellId};
use crate::config::{ConfigError, GeneratorConfig};
use crate::edge_filter::EdgeFilter;
use crate::module::{EdgeConnectionType, ModuleCatalog, ModuleId};
use crate::rng::{resolve_seed, LevelRng, StdRandom};
use crate::verification::{check_grid, EdgeMismatch};
use crate::wave::{Contradiction, NeighborMismatch, Wave};
use std::fmt;
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, info, warn};

/// State of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Wave built, no constraints applied yet
    Uninitialized,
    /// Rim closed, start and goal placed
    ConstraintsApplied,
    /// Collapsing cells one by one
    Collapsing,
    /// Every cell holds exactly one final module
    Resolved,
    /// The run failed and cannot continue
    Contradiction,
}

/// Error type for a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Invalid input, nothing was built
    Configuration(ConfigError),
    /// A cell ran out of modules
    Contradiction(Contradiction),
    /// A forced assignment disagreed with a final neighbor
    NeighborMismatch(NeighborMismatch),
    /// A nominally resolved grid has incompatible neighbors
    PostSolveInconsistency(Vec<EdgeMismatch>),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Configuration(e) => write!(f, "configuration error: {}", e),
            GenerationError::Contradiction(c) => write!(f, "contradiction: {}", c),
            GenerationError::NeighborMismatch(m) => write!(f, "neighbor mismatch: {}", m),
            GenerationError::PostSolveInconsistency(mismatches) => {
                write!(
                    f,
                    "resolved level has {} mismatching neighbor pairs",
                    mismatches.len()
                )?;
                if let Some(first) = mismatches.first() {
                    write!(f, " (first: {})", first)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<ConfigError> for GenerationError {
    fn from(e: ConfigError) -> Self {
        GenerationError::Configuration(e)
    }
}

impl From<Contradiction> for GenerationError {
    fn from(c: Contradiction) -> Self {
        GenerationError::Contradiction(c)
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationStats {
    /// Cells assigned a randomly chosen module
    pub collapses: usize,
    /// Cells assigned their sole remaining module
    pub forced_collapses: usize,
    pub removals: usize,
    pub filter_steps: usize,
    pub elapsed_ms: f64,
}

/// A fully resolved level.
#[derive(Debug, Clone)]
pub struct ResolvedLevel {
    pub width: usize,
    pub height: usize,
    /// Seed the run actually used
    pub seed: i32,
    /// Module per cell, row-major
    pub modules: Vec<ModuleId>,
    pub start: (usize, usize),
    pub goal: (usize, usize),
    /// Mismatches let through under `MismatchPolicy::Record`
    pub anomalies: Vec<NeighborMismatch>,
    pub stats: GenerationStats,
}

impl ResolvedLevel {
    pub fn module_at(&self, x: usize, y: usize) -> ModuleId {
        self.modules[x + y * self.width]
    }

    /// Every position holding `module`, row-major.
    pub fn position_of(&self, module: ModuleId) -> Vec<(usize, usize)> {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, &m)| m == module)
            .map(|(i, _)| (i % self.width, i / self.width))
            .collect()
    }

    /// One line of glyphs per row.
    pub fn render_glyphs(&self, catalog: &ModuleCatalog) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.modules.chunks(self.width) {
            out.extend(row.iter().map(|&m| catalog.get(m).glyph()));
            out.push('\n');
        }
        out
    }
}

/// Generates a level using the wave function collapse algorithm.
pub struct LevelGenerator<'a> {
    catalog: &'a ModuleCatalog,
    config: GeneratorConfig,
    seed: i32,
    rng: Box<dyn LevelRng>,
    wave: Wave,
    state: GeneratorState,
    start_cell: Option<CellId>,
    goal_cell: Option<CellId>,
    collapses: usize,
    forced_collapses: usize,
    started: Instant,
    /// Error that ended the run
    failure: Option<GenerationError>,
}

impl<'a> LevelGenerator<'a> {
    /// Validate the config, seed the RNG and build the wave.
    pub fn new(
        config: GeneratorConfig,
        catalog: &'a ModuleCatalog,
    ) -> Result<Self, GenerationError> {
        let seed = resolve_seed(config.seed);
        Self::with_rng(config, catalog, seed, Box::new(StdRandom::from_seed(seed)))
    }

    /// Like [`LevelGenerator::new`] with an explicit RNG.
    ///
    /// `seed` is only reported back; `rng` is used as given.
    pub fn with_rng(
        config: GeneratorConfig,
        catalog: &'a ModuleCatalog,
        seed: i32,
        mut rng: Box<dyn LevelRng>,
    ) -> Result<Self, GenerationError> {
        let (width, height) = config.validate()?;
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog.into());
        }

        let wave = Wave::new(
            width,
            height,
            catalog,
            config.tie_break,
            config.mismatch_policy,
            rng.as_mut(),
        );

        Ok(Self {
            catalog,
            config,
            seed,
            rng,
            wave,
            state: GeneratorState::Uninitialized,
            start_cell: None,
            goal_cell: None,
            collapses: 0,
            forced_collapses: 0,
            started: Instant::now(),
            failure: None,
        })
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn wave(&self) -> &Wave {
        &self.wave
    }

    pub fn start_cell(&self) -> Option<CellId> {
        self.start_cell
    }

    pub fn goal_cell(&self) -> Option<CellId> {
        self.goal_cell
    }

    /// Close the outer rim and place the start and goal modules.
    ///
    /// Does nothing once constraints have been applied.
    pub fn apply_initial_constraints(&mut self) -> Result<(), GenerationError> {
        if self.state != GeneratorState::Uninitialized {
            return Ok(());
        }

        info!(
            "Start level generation {}x{} (seed: {})",
            self.wave.grid().width,
            self.wave.grid().height,
            self.seed
        );
        self.started = Instant::now();

        let result = self
            .border_constraint()
            .and_then(|_| self.start_goal_constraint());
        if let Err(e) = result {
            return Err(self.fail(e));
        }

        self.state = GeneratorState::ConstraintsApplied;
        Ok(())
    }

    /// Collapse one cell.
    ///
    /// Returns `Ok(true)` while cells remain and `Ok(false)` once resolved.
    pub fn step(&mut self) -> Result<bool, GenerationError> {
        match self.state {
            GeneratorState::Uninitialized => self.apply_initial_constraints()?,
            GeneratorState::Resolved | GeneratorState::Contradiction => return Ok(false),
            GeneratorState::ConstraintsApplied | GeneratorState::Collapsing => {}
        }
        self.state = GeneratorState::Collapsing;

        // Remove settled cells from the queue
        while let Some(top) = self.wave.peek() {
            let cell = self.wave.cell(top);
            if cell.is_final && cell.entropy() == 1 {
                self.wave.pop(self.rng.as_mut());
            } else {
                break;
            }
        }

        let Some(top) = self.wave.peek() else {
            self.state = GeneratorState::Resolved;
            return Ok(false);
        };

        let cell = self.wave.cell(top);
        let module = match cell.entropy() {
            0 => {
                let (x, y) = cell.position();
                let contradiction = Contradiction::EmptyCell {
                    x,
                    y,
                    chain: Vec::new(),
                };
                return Err(self.fail(contradiction.into()));
            }
            1 => {
                self.forced_collapses += 1;
                cell.possible_modules[0]
            }
            n => {
                self.collapses += 1;
                cell.possible_modules[self.rng.next_usize_max(n)]
            }
        };

        debug!(
            "Collapse ({}, {}) to '{}' out of {} candidates",
            cell.x,
            cell.y,
            self.catalog.get(module).id,
            cell.entropy()
        );

        if let Err(e) = self
            .wave
            .set_module(top, module, self.catalog, self.rng.as_mut())
        {
            return Err(self.fail(e));
        }
        Ok(true)
    }

    /// Step until the wave is resolved or fails.
    ///
    /// On a run that already failed, returns the error that ended it.
    pub fn run(&mut self) -> Result<(), GenerationError> {
        while self.step()? {}
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Verify the resolved grid and hand it out.
    ///
    /// Runs any remaining steps first. Pairs already recorded as anomalies
    /// under [`MismatchPolicy::Record`](crate::config::MismatchPolicy) are
    /// reported through [`ResolvedLevel::anomalies`] instead of failing the
    /// check.
    pub fn finish(mut self) -> Result<ResolvedLevel, GenerationError> {
        self.run()?;

        let anomalies = self.wave.anomalies();
        let mismatches: Vec<EdgeMismatch> = check_grid(self.wave.grid(), self.catalog)
            .into_iter()
            .filter(|m| !anomalies.iter().any(|a| is_same_pair(a, m)))
            .collect();
        if !mismatches.is_empty() {
            for m in &mismatches {
                warn!("Level check | {}", m);
            }
            return Err(GenerationError::PostSolveInconsistency(mismatches));
        }

        // Cells only leave the queue as final singletons
        let grid = self.wave.grid();
        let modules: Vec<ModuleId> = grid.cells.iter().filter_map(Cell::sole_module).collect();

        let position = |id: Option<CellId>| {
            id.map(|i| grid.cells[i].position()).unwrap_or_default()
        };
        let propagation = self.wave.stats();
        let stats = GenerationStats {
            collapses: self.collapses,
            forced_collapses: self.forced_collapses,
            removals: propagation.removals,
            filter_steps: propagation.filter_steps,
            elapsed_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        };

        info!(
            "Level generation finished in {:.2}ms (seed: {})",
            stats.elapsed_ms, self.seed
        );

        Ok(ResolvedLevel {
            width: grid.width,
            height: grid.height,
            seed: self.seed,
            modules,
            start: position(self.start_cell),
            goal: position(self.goal_cell),
            anomalies: anomalies.to_vec(),
            stats,
        })
    }

    /// Initial constraint: the rim may only expose the boundary edge type.
    fn border_constraint(&mut self) -> Result<(), GenerationError> {
        let boundary = self.config.boundary_edge;

        for id in 0..self.wave.grid().len() {
            for outward in self.wave.grid().rim_directions(id) {
                for edge_type in EdgeConnectionType::ALL {
                    if edge_type == boundary {
                        continue;
                    }
                    // Issued from outside the grid, travelling inwards
                    let filter = EdgeFilter::exclusive(outward.opposite(), edge_type);
                    self.wave
                        .filter_cell(id, filter, self.catalog, self.rng.as_mut())?;
                }
            }
        }
        Ok(())
    }

    /// Initial constraint: place start and goal modules, once each.
    fn start_goal_constraint(&mut self) -> Result<(), GenerationError> {
        let height = self.wave.grid().height;
        let start_module = self.catalog.start();
        let goal_module = self.catalog.goal();

        // Start opens upwards and goal downwards, so neither may sit on the
        // rim its opening would face
        let start = self.pick_cell(start_module, 1..height, None)?;
        let goal = self.pick_cell(goal_module, 0..height - 1, Some(start))?;
        self.start_cell = Some(start);
        self.goal_cell = Some(goal);

        let catalog = self.catalog;
        let reserved: Vec<ModuleId> = catalog
            .ids()
            .filter(|&m| catalog.is_reserved(m))
            .collect();
        for id in 0..self.wave.grid().len() {
            if id == start || id == goal {
                continue;
            }
            for &module in &reserved {
                self.wave
                    .remove_module(id, module, catalog, self.rng.as_mut())?;
            }
        }

        // Stripping and the start assignment may have ruled out a chosen cell
        self.place(start, start_module)?;
        self.place(goal, goal_module)?;
        Ok(())
    }

    fn place(&mut self, id: CellId, module: ModuleId) -> Result<(), GenerationError> {
        if !self.wave.cell(id).contains(module) {
            return Err(Contradiction::NoPlacement {
                module: self.catalog.get(module).id.clone(),
            }
            .into());
        }
        self.wave
            .set_module(id, module, self.catalog, self.rng.as_mut())
    }

    /// Uniformly pick a cell in `rows` that can still host `module`.
    fn pick_cell(
        &mut self,
        module: ModuleId,
        rows: Range<usize>,
        exclude: Option<CellId>,
    ) -> Result<CellId, GenerationError> {
        let grid = self.wave.grid();
        let candidates: Vec<CellId> = (0..grid.len())
            .filter(|&id| {
                let cell = &grid.cells[id];
                rows.contains(&cell.y) && Some(id) != exclude && cell.contains(module)
            })
            .collect();

        if candidates.is_empty() {
            return Err(Contradiction::NoPlacement {
                module: self.catalog.get(module).id.clone(),
            }
            .into());
        }
        Ok(candidates[self.rng.next_usize_max(candidates.len())])
    }

    fn fail(&mut self, error: GenerationError) -> GenerationError {
        self.state = GeneratorState::Contradiction;
        warn!("Level generation failed (seed: {}): {}", self.seed, error);
        self.failure = Some(error.clone());
        error
    }
}

/// Whether a post-solve mismatch is the pair recorded by `anomaly`.
fn is_same_pair(anomaly: &NeighborMismatch, mismatch: &EdgeMismatch) -> bool {
    let pair = (mismatch.cell, mismatch.neighbor);
    pair == (anomaly.cell, anomaly.neighbor) || pair == (anomaly.neighbor, anomaly.cell)
}

/// Run a complete generation.
pub fn generate(
    config: GeneratorConfig,
    catalog: &ModuleCatalog,
) -> Result<ResolvedLevel, GenerationError> {
    LevelGenerator::new(config, catalog)?.finish()
}
