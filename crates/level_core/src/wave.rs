//! Possibility state of the whole grid and constraint propagation.
//!
//! The wave owns every cell and the priority queue over them. Constraint
//! effects travel as `(cell, filter)` pairs through a FIFO worklist:
//!
//! - removing a module from a cell enqueues an exclusive filter on a neighbor
//!   only when the removed module was the last one showing its edge type on
//!   that side, so fan-out is bounded by the number of edge types rather than
//!   by catalog size;
//! - assigning a module enqueues an inclusive filter on every neighbor;
//! - filters reaching a cell with a single remaining module are skipped.
//!
//! Each applied filter is recorded with a link to the step that caused it, so
//! a contradiction can be reported together with the chain that produced it.

use crate::cell::{Cell, CellId};
use crate::config::MismatchPolicy;
use crate::edge_filter::EdgeFilter;
use crate::generator::GenerationError;
use crate::grid::Grid;
use crate::heap::{IndexedHeap, TieBreak};
use crate::module::{Direction, EdgeConnectionType, ModuleCatalog, ModuleId};
use crate::rng::LevelRng;
use std::collections::VecDeque;
use std::fmt;
use tracing::warn;

/// One applied filter, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationStep {
    pub x: usize,
    pub y: usize,
    pub filter: EdgeFilter,
}

impl fmt::Display for PropagationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}", self.x, self.y, self.filter)
    }
}

/// A run can no longer be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contradiction {
    /// A cell's possibility space became empty
    EmptyCell {
        x: usize,
        y: usize,
        /// Filters leading to the empty cell, root cause first
        chain: Vec<PropagationStep>,
    },
    /// No cell is able to host a distinguished module
    NoPlacement { module: String },
}

impl fmt::Display for Contradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contradiction::EmptyCell { x, y, chain } => {
                write!(f, "no module left for cell ({}, {})", x, y)?;
                if !chain.is_empty() {
                    write!(f, " after")?;
                    for step in chain {
                        write!(f, " -> {}", step)?;
                    }
                }
                Ok(())
            }
            Contradiction::NoPlacement { module } => {
                write!(f, "no cell can host module '{}'", module)
            }
        }
    }
}

/// A forced assignment disagreeing with an already final neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborMismatch {
    pub cell: (usize, usize),
    pub neighbor: (usize, usize),
    /// Side of `cell` facing `neighbor`
    pub direction: Direction,
    /// Module that was being assigned
    pub module: String,
    /// Edge the assigned module shows towards the neighbor
    pub edge: EdgeConnectionType,
    /// Edge the neighbor's final module shows back
    pub neighbor_edge: EdgeConnectionType,
}

impl fmt::Display for NeighborMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "setting module '{}' at {:?} would not fit final neighbor {:?}: {} edge {:?} vs {:?}",
            self.module, self.cell, self.neighbor, self.direction, self.edge, self.neighbor_edge
        )
    }
}

/// Counters accumulated over the lifetime of a wave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Modules removed from possibility spaces
    pub removals: usize,
    /// Filters actually evaluated (skipped singleton filters excluded)
    pub filter_steps: usize,
    /// Forced assignments
    pub assignments: usize,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    cell: CellId,
    filter: EdgeFilter,
    /// Trace index of the step that enqueued this filter
    cause: Option<usize>,
}

/// Possibility state for every cell, plus the queue ordering them.
#[derive(Debug, Clone)]
pub struct Wave {
    grid: Grid,
    heap: IndexedHeap,
    pending: VecDeque<Pending>,
    /// Applied steps of the current operation
    trace: Vec<Pending>,
    policy: MismatchPolicy,
    anomalies: Vec<NeighborMismatch>,
    stats: PropagationStats,
}

impl Wave {
    /// Build the grid, give every cell the full catalog and queue all cells.
    pub fn new(
        width: usize,
        height: usize,
        catalog: &ModuleCatalog,
        tie_break: TieBreak,
        policy: MismatchPolicy,
        rng: &mut dyn LevelRng,
    ) -> Self {
        let mut grid = Grid::new(width, height);
        for cell in &mut grid.cells {
            cell.populate(catalog);
        }

        let mut heap = IndexedHeap::with_capacity(grid.len(), tie_break);
        for id in 0..grid.len() {
            let cells = &grid.cells;
            heap.insert(id, |i| cells[i].entropy(), rng);
        }

        Self {
            grid,
            heap,
            pending: VecDeque::new(),
            trace: Vec::new(),
            policy,
            anomalies: Vec::new(),
            stats: PropagationStats::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.grid.cells[id]
    }

    #[cfg(test)]
    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn heap(&self) -> &IndexedHeap {
        &self.heap
    }

    pub fn stats(&self) -> PropagationStats {
        self.stats
    }

    /// Neighbor mismatches recorded under [`MismatchPolicy::Record`].
    pub fn anomalies(&self) -> &[NeighborMismatch] {
        &self.anomalies
    }

    /// Cell at the top of the queue.
    pub fn peek(&self) -> Option<CellId> {
        self.heap.peek()
    }

    /// Remove the top cell from the queue.
    pub fn pop(&mut self, rng: &mut dyn LevelRng) -> Option<CellId> {
        let cells = &self.grid.cells;
        self.heap.pop(|i| cells[i].entropy(), rng)
    }

    /// Filters applied by the most recent operation, in application order.
    pub fn last_propagation(&self) -> Vec<PropagationStep> {
        self.trace.iter().map(|p| self.step(p)).collect()
    }

    /// Apply a filter to a cell and propagate the consequences.
    ///
    /// No-op if the cell has a single module left.
    pub fn filter_cell(
        &mut self,
        id: CellId,
        filter: EdgeFilter,
        catalog: &ModuleCatalog,
        rng: &mut dyn LevelRng,
    ) -> Result<(), Contradiction> {
        self.begin();
        self.pending.push_back(Pending {
            cell: id,
            filter,
            cause: None,
        });
        self.propagate(catalog, rng)
    }

    /// Remove a module from a cell and propagate the consequences.
    ///
    /// Removing a module that is not possible is a no-op.
    pub fn remove_module(
        &mut self,
        id: CellId,
        module: ModuleId,
        catalog: &ModuleCatalog,
        rng: &mut dyn LevelRng,
    ) -> Result<(), Contradiction> {
        self.begin();
        self.remove_one(id, module, None, catalog, rng)?;
        self.propagate(catalog, rng)
    }

    /// Assign a cell a specific module, removing all others, and push the
    /// assigned edges to every neighbor.
    ///
    /// Final neighbors are checked first; a disagreement is handled according
    /// to the wave's [`MismatchPolicy`].
    pub fn set_module(
        &mut self,
        id: CellId,
        module: ModuleId,
        catalog: &ModuleCatalog,
        rng: &mut dyn LevelRng,
    ) -> Result<(), GenerationError> {
        self.begin();

        let assigned = catalog.get(module);
        let cell = &self.grid.cells[id];
        for direction in Direction::ALL {
            let Some(n) = cell.neighbor(direction) else {
                continue;
            };
            let neighbor = &self.grid.cells[n];
            if !neighbor.is_final {
                continue;
            }
            let Some(fixed) = neighbor.sole_module() else {
                continue;
            };

            let edge = assigned.edge(direction);
            let neighbor_edge = catalog.get(fixed).edge(direction.opposite());
            if edge == neighbor_edge {
                continue;
            }

            let mismatch = NeighborMismatch {
                cell: cell.position(),
                neighbor: neighbor.position(),
                direction,
                module: assigned.id.clone(),
                edge,
                neighbor_edge,
            };
            match self.policy {
                MismatchPolicy::Abort => return Err(GenerationError::NeighborMismatch(mismatch)),
                MismatchPolicy::Record => {
                    warn!("{}", mismatch);
                    self.anomalies.push(mismatch);
                }
            }
        }

        let cell = &mut self.grid.cells[id];
        cell.possible_modules.clear();
        cell.possible_modules.push(module);
        self.stats.assignments += 1;
        self.requeue(id, rng);

        for direction in Direction::ALL {
            if let Some(n) = self.grid.cells[id].neighbor(direction) {
                self.pending.push_back(Pending {
                    cell: n,
                    filter: EdgeFilter::inclusive(direction, assigned.edge(direction)),
                    cause: None,
                });
            }
        }
        self.propagate(catalog, rng)?;

        self.grid.cells[id].is_final = true;
        Ok(())
    }

    /// Start a new top-level operation.
    fn begin(&mut self) {
        self.pending.clear();
        self.trace.clear();
    }

    /// Drain the worklist.
    fn propagate(
        &mut self,
        catalog: &ModuleCatalog,
        rng: &mut dyn LevelRng,
    ) -> Result<(), Contradiction> {
        while let Some(pending) = self.pending.pop_front() {
            let cell = &self.grid.cells[pending.cell];
            if cell.entropy() == 1 {
                continue;
            }

            let rejected = cell.rejected_by(&pending.filter, catalog);
            let step = self.trace.len();
            self.trace.push(pending);
            self.stats.filter_steps += 1;

            for module in rejected {
                self.remove_one(pending.cell, module, Some(step), catalog, rng)?;
            }
        }
        Ok(())
    }

    /// Remove one module and enqueue the neighbor filters it implies.
    fn remove_one(
        &mut self,
        id: CellId,
        module: ModuleId,
        cause: Option<usize>,
        catalog: &ModuleCatalog,
        rng: &mut dyn LevelRng,
    ) -> Result<(), Contradiction> {
        if !self.grid.cells[id].remove(module) {
            return Ok(());
        }
        self.stats.removals += 1;
        self.requeue(id, rng);

        let cell = &self.grid.cells[id];
        if cell.entropy() == 0 {
            let (x, y) = cell.position();
            let contradiction = Contradiction::EmptyCell {
                x,
                y,
                chain: self.chain(cause),
            };
            warn!("{}", contradiction);
            return Err(contradiction);
        }

        let removed = catalog.get(module);
        for direction in Direction::ALL {
            let Some(n) = cell.neighbor(direction) else {
                continue;
            };
            let edge_type = removed.edge(direction);
            if !cell.has_edge_type(direction, edge_type, catalog) {
                self.pending.push_back(Pending {
                    cell: n,
                    filter: EdgeFilter::exclusive(direction, edge_type),
                    cause,
                });
            }
        }
        Ok(())
    }

    fn requeue(&mut self, id: CellId, rng: &mut dyn LevelRng) {
        let cells = &self.grid.cells;
        self.heap.reorder(id, |i| cells[i].entropy(), rng);
    }

    /// Follow cause links back to the root, root first.
    fn chain(&self, mut cause: Option<usize>) -> Vec<PropagationStep> {
        let mut chain = Vec::new();
        while let Some(i) = cause {
            let pending = &self.trace[i];
            chain.push(self.step(pending));
            cause = pending.cause;
        }
        chain.reverse();
        chain
    }

    fn step(&self, pending: &Pending) -> PropagationStep {
        let (x, y) = self.grid.cells[pending.cell].position();
        PropagationStep {
            x,
            y,
            filter: pending.filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::EdgeConnectionType::{Block, Open};
    use crate::module::Module;
    use crate::rng::StdRandom;

    fn catalog() -> ModuleCatalog {
        ModuleCatalog::new(
            vec![
                Module::new("open", [Open; 4]),
                Module::new("wall", [Block; 4]),
                Module::new("start", [Block, Block, Open, Block]),
                Module::new("goal", [Open, Block, Block, Block]),
            ],
            "start",
            "goal",
        )
        .unwrap()
    }

    fn wave(width: usize, height: usize, catalog: &ModuleCatalog, rng: &mut StdRandom) -> Wave {
        Wave::new(
            width,
            height,
            catalog,
            TieBreak::StableIndex,
            MismatchPolicy::Abort,
            rng,
        )
    }

    #[test]
    fn test_new_wave_is_fully_open() {
        let catalog = catalog();
        let mut rng = StdRandom::from_seed(1);
        let wave = wave(3, 2, &catalog, &mut rng);
        assert_eq!(wave.heap().len(), 6);
        assert!(wave.grid().cells.iter().all(|c| c.entropy() == 4));
        assert!(wave.heap().is_valid(|i| wave.cell(i).entropy()));
    }

    #[test]
    fn test_removing_last_edge_type_propagates() {
        let catalog = catalog();
        let mut rng = StdRandom::from_seed(1);
        let mut wave = wave(2, 1, &catalog, &mut rng);
        let open = catalog.find("open").unwrap();

        // "open" is the only module with an open right edge
        wave.remove_module(0, open, &catalog, &mut rng).unwrap();

        let right = wave.cell(1);
        assert!(!right.contains(open), "neighbor must lose its open left edge");
        assert_eq!(right.entropy(), 3);

        // The filter on the right cell, then the echo back to the left one
        let steps = wave.last_propagation();
        assert_eq!(steps.len(), 2);
        assert_eq!((steps[0].x, steps[0].y), (1, 0));
        assert_eq!(steps[0].filter, EdgeFilter::exclusive(Direction::Right, Open));
        assert!(wave.heap().is_valid(|i| wave.cell(i).entropy()));
    }

    #[test]
    fn test_removal_without_lost_edge_type_stays_local() {
        let catalog = catalog();
        let mut rng = StdRandom::from_seed(1);
        let mut wave = wave(1, 2, &catalog, &mut rng);
        let goal = catalog.find("goal").unwrap();

        // "open" still shows Open at the bottom, "wall" still shows Block everywhere
        wave.remove_module(0, goal, &catalog, &mut rng).unwrap();

        assert_eq!(wave.cell(0).entropy(), 3);
        assert_eq!(wave.cell(1).entropy(), 4);
        assert!(wave.last_propagation().is_empty());
    }

    #[test]
    fn test_filter_on_singleton_is_noop() {
        let catalog = catalog();
        let mut rng = StdRandom::from_seed(1);
        let mut wave = wave(2, 2, &catalog, &mut rng);

        for name in ["open", "start", "goal"] {
            let id = catalog.find(name).unwrap();
            wave.remove_module(3, id, &catalog, &mut rng).unwrap();
        }
        assert_eq!(wave.cell(3).entropy(), 1);

        let cells_before = wave.grid().cells.clone();
        let heap_before = wave.heap().as_slice().to_vec();
        let stats_before = wave.stats();

        let filter = EdgeFilter::inclusive(Direction::Right, Open);
        wave.filter_cell(3, filter, &catalog, &mut rng).unwrap();

        assert_eq!(wave.grid().cells, cells_before);
        assert_eq!(wave.heap().as_slice(), heap_before.as_slice());
        assert_eq!(wave.stats(), stats_before);
        assert!(wave.last_propagation().is_empty());
    }

    #[test]
    fn test_set_module_filters_neighbors_inclusively() {
        let catalog = catalog();
        let mut rng = StdRandom::from_seed(1);
        let mut wave = wave(3, 3, &catalog, &mut rng);
        let wall = catalog.find("wall").unwrap();

        wave.set_module(4, wall, &catalog, &mut rng).unwrap();

        let center = wave.cell(4);
        assert!(center.is_final);
        assert_eq!(center.sole_module(), Some(wall));

        // Above: needs a Block bottom edge, so "open" and "goal" are gone
        let above = wave.cell(1);
        assert!(!above.contains(catalog.find("open").unwrap()));
        assert!(!above.contains(catalog.find("goal").unwrap()));

        // Below: needs a Block top edge, so "open" and "start" are gone
        let below = wave.cell(7);
        assert!(!below.contains(catalog.find("open").unwrap()));
        assert!(!below.contains(catalog.find("start").unwrap()));
        assert!(wave.heap().is_valid(|i| wave.cell(i).entropy()));
    }

    #[test]
    fn test_possibility_spaces_never_grow() {
        let catalog = catalog();
        let mut rng = StdRandom::from_seed(9);
        let mut wave = wave(3, 3, &catalog, &mut rng);
        let mut sizes: Vec<usize> = wave.grid().cells.iter().map(Cell::entropy).collect();

        let wall = catalog.find("wall").unwrap();
        for id in [0, 4, 8, 2] {
            wave.set_module(id, wall, &catalog, &mut rng).unwrap();
            for (i, cell) in wave.grid().cells.iter().enumerate() {
                assert!(cell.entropy() <= sizes[i]);
                sizes[i] = cell.entropy();
            }
        }
    }

    #[test]
    fn test_contradiction_reports_cell_and_chain() {
        // Every module is open on the right and closed on the left, so no
        // horizontal neighbors can ever agree.
        let catalog = ModuleCatalog::new(
            vec![
                Module::new("a", [Open, Open, Open, Block]),
                Module::new("b", [Block, Open, Block, Block]),
            ],
            "a",
            "b",
        )
        .unwrap();
        let mut rng = StdRandom::from_seed(1);
        let mut wave = wave(2, 1, &catalog, &mut rng);

        let err = wave
            .filter_cell(1, EdgeFilter::inclusive(Direction::Right, Open), &catalog, &mut rng)
            .unwrap_err();
        match err {
            Contradiction::EmptyCell { x, y, chain } => {
                assert_eq!((x, y), (1, 0));
                assert_eq!(chain.len(), 1);
                assert_eq!((chain[0].x, chain[0].y), (1, 0));
                assert!(chain[0].filter.inclusive);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_neighbor_mismatch_policies() {
        let catalog = catalog();
        let open = catalog.find("open").unwrap();
        let wall = catalog.find("wall").unwrap();

        // Abort: refuse the assignment
        let mut rng = StdRandom::from_seed(1);
        let mut wave = wave(2, 1, &catalog, &mut rng);
        wave.set_module(0, wall, &catalog, &mut rng).unwrap();
        let err = wave.set_module(1, open, &catalog, &mut rng).unwrap_err();
        match err {
            GenerationError::NeighborMismatch(m) => {
                assert_eq!(m.cell, (1, 0));
                assert_eq!(m.neighbor, (0, 0));
                assert_eq!(m.direction, Direction::Left);
                assert_eq!(m.edge, Open);
                assert_eq!(m.neighbor_edge, Block);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_ne!(wave.cell(1).sole_module(), Some(open));

        // Record: keep going and remember the anomaly
        let mut rng = StdRandom::from_seed(1);
        let mut wave = Wave::new(
            2,
            1,
            &catalog,
            TieBreak::StableIndex,
            MismatchPolicy::Record,
            &mut rng,
        );
        wave.set_module(0, wall, &catalog, &mut rng).unwrap();
        wave.set_module(1, open, &catalog, &mut rng).unwrap();
        assert_eq!(wave.anomalies().len(), 1);
        assert_eq!(wave.cell(1).sole_module(), Some(open));
    }
}
