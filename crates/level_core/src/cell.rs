//! A single grid cell and its possibility space.
//!
//! Cells only know their own state. Everything that touches neighbors or the
//! priority queue (filtering, removal with propagation, forced assignment)
//! lives in [`Wave`](crate::wave::Wave), which owns all cells.

use crate::edge_filter::EdgeFilter;
use crate::module::{Direction, EdgeConnectionType, ModuleCatalog, ModuleId};

/// Index of a cell in the grid arena (`x + y * width`).
pub type CellId = usize;

/// A cell inside the level's grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Modules still considered valid here (possibility space)
    pub possible_modules: Vec<ModuleId>,

    /// Has the decision for the final module already been propagated.
    ///
    /// Differs from having a single possible module: a cell can be narrowed
    /// down to one module by its neighbors before that module was ever
    /// assigned and pushed outwards.
    pub is_final: bool,

    /// Adjacent cells, `[bottom, right, top, left]`; `None` at the grid edge
    pub neighbors: [Option<CellId>; 4],

    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self {
            possible_modules: Vec::new(),
            is_final: false,
            neighbors: [None; 4],
            x,
            y,
        }
    }

    /// Make every catalog module possible.
    pub fn populate(&mut self, catalog: &ModuleCatalog) {
        self.possible_modules.clear();
        self.possible_modules.extend(catalog.ids());
        self.is_final = false;
    }

    /// Size of the possibility space, the heap key.
    #[inline]
    pub fn entropy(&self) -> usize {
        self.possible_modules.len()
    }

    #[inline]
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    #[inline]
    pub fn neighbor(&self, direction: Direction) -> Option<CellId> {
        self.neighbors[direction.index()]
    }

    pub fn contains(&self, module: ModuleId) -> bool {
        self.possible_modules.contains(&module)
    }

    /// The remaining module if exactly one is left.
    pub fn sole_module(&self) -> Option<ModuleId> {
        match self.possible_modules.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Remove a module from the possibility space.
    ///
    /// Returns false if it was not there; two propagation paths may try to
    /// remove the same module.
    pub fn remove(&mut self, module: ModuleId) -> bool {
        match self.possible_modules.iter().position(|&m| m == module) {
            Some(i) => {
                self.possible_modules.remove(i);
                true
            }
            None => false,
        }
    }

    /// Whether any remaining module shows `edge_type` on its `direction` edge.
    pub fn has_edge_type(
        &self,
        direction: Direction,
        edge_type: EdgeConnectionType,
        catalog: &ModuleCatalog,
    ) -> bool {
        self.possible_modules
            .iter()
            .any(|&m| catalog.get(m).edge(direction) == edge_type)
    }

    /// Modules that fail `filter`.
    pub fn rejected_by(&self, filter: &EdgeFilter, catalog: &ModuleCatalog) -> Vec<ModuleId> {
        self.possible_modules
            .iter()
            .copied()
            .filter(|&m| !filter.matches(catalog.get(m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::EdgeConnectionType::{Block, Open};
    use crate::module::Module;

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

    #[test]
    fn test_populate_uses_whole_catalog() {
        let catalog = catalog();
        let mut cell = Cell::new(1, 2);
        cell.populate(&catalog);
        assert_eq!(cell.entropy(), 4);
        assert_eq!(cell.position(), (1, 2));
        assert!(!cell.is_final);
        assert_eq!(cell.sole_module(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let catalog = catalog();
        let mut cell = Cell::new(0, 0);
        cell.populate(&catalog);

        assert!(cell.remove(ModuleId(1)));
        assert!(!cell.remove(ModuleId(1)));
        assert_eq!(cell.entropy(), 3);
        assert!(!cell.contains(ModuleId(1)));
    }

    #[test]
    fn test_has_edge_type() {
        let catalog = catalog();
        let mut cell = Cell::new(0, 0);
        cell.populate(&catalog);
        cell.remove(ModuleId(0));

        // Only "goal" still opens downwards
        assert!(cell.has_edge_type(Direction::Bottom, Open, &catalog));
        cell.remove(ModuleId(3));
        assert!(!cell.has_edge_type(Direction::Bottom, Open, &catalog));
        assert!(cell.has_edge_type(Direction::Top, Open, &catalog));
    }

    #[test]
    fn test_rejected_by_filter() {
        let catalog = catalog();
        let mut cell = Cell::new(0, 0);
        cell.populate(&catalog);

        // Neighbor above is fixed with an open bottom edge: keep open top edges
        let filter = EdgeFilter::inclusive(Direction::Bottom, Open);
        let rejected = cell.rejected_by(&filter, &catalog);
        assert_eq!(rejected, vec![ModuleId(1), ModuleId(3)]);
    }
}
