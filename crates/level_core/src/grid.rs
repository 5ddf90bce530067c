//! Grid topology: the cell arena and its neighbor links.
//!
//! Cells are stored row-major (`id = x + y * width`). Neighbor links are
//! indices into the same arena, so the cyclic cell graph needs no shared
//! ownership. Topology is fixed after construction; a new run builds a new
//! grid.

use crate::cell::{Cell, CellId};
use crate::module::Direction;

/// A `width x height` arena of cells wired to their four neighbors.
#[derive(Debug, Clone)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
}

impl Grid {
    /// Build the grid and assign neighbors for every cell.
    pub fn new(width: usize, height: usize) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell::new(x, y));
            }
        }

        let mut grid = Self {
            width,
            height,
            cells,
        };

        for id in 0..grid.cells.len() {
            let (x, y) = grid.cells[id].position();
            for direction in Direction::ALL {
                let (dx, dy) = direction.offset();
                grid.cells[id].neighbors[direction.index()] =
                    grid.index_of(x as i64 + dx as i64, y as i64 + dy as i64);
            }
        }

        grid
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Arena index for signed coordinates, `None` outside the grid.
    pub fn index_of(&self, x: i64, y: i64) -> Option<CellId> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(x as usize + y as usize * self.width)
    }

    #[inline]
    pub fn id(&self, x: usize, y: usize) -> CellId {
        x + y * self.width
    }

    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.cells[self.id(x, y)]
    }

    /// Directions in which a cell faces the outside of the grid.
    pub fn rim_directions(&self, id: CellId) -> Vec<Direction> {
        let cell = &self.cells[id];
        Direction::ALL
            .into_iter()
            .filter(|&d| cell.neighbor(d).is_none())
            .collect()
    }

    /// Whether a cell lies on the outer rim.
    pub fn is_rim(&self, id: CellId) -> bool {
        self.cells[id].neighbors.iter().any(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid = Grid::new(3, 2);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.cell(2, 1).position(), (2, 1));
        assert_eq!(grid.id(2, 1), 5);
    }

    #[test]
    fn test_neighbor_wiring() {
        let grid = Grid::new(3, 3);
        let center = grid.cell(1, 1);
        assert_eq!(center.neighbor(Direction::Bottom), Some(grid.id(1, 2)));
        assert_eq!(center.neighbor(Direction::Right), Some(grid.id(2, 1)));
        assert_eq!(center.neighbor(Direction::Top), Some(grid.id(1, 0)));
        assert_eq!(center.neighbor(Direction::Left), Some(grid.id(0, 1)));
        assert!(!grid.is_rim(grid.id(1, 1)));
    }

    #[test]
    fn test_links_are_symmetric() {
        let grid = Grid::new(4, 3);
        for (id, cell) in grid.cells.iter().enumerate() {
            for d in Direction::ALL {
                if let Some(n) = cell.neighbor(d) {
                    assert_eq!(grid.cells[n].neighbor(d.opposite()), Some(id));
                }
            }
        }
    }

    #[test]
    fn test_rim_directions() {
        let grid = Grid::new(3, 3);
        assert_eq!(
            grid.rim_directions(grid.id(0, 0)),
            vec![Direction::Top, Direction::Left]
        );
        assert_eq!(
            grid.rim_directions(grid.id(2, 2)),
            vec![Direction::Bottom, Direction::Right]
        );
        assert_eq!(grid.rim_directions(grid.id(1, 0)), vec![Direction::Top]);
        assert!(grid.rim_directions(grid.id(1, 1)).is_empty());
    }

    #[test]
    fn test_single_column_has_no_side_neighbors() {
        let grid = Grid::new(1, 2);
        let top = grid.cell(0, 0);
        assert_eq!(top.neighbor(Direction::Bottom), Some(1));
        assert_eq!(top.neighbor(Direction::Left), None);
        assert_eq!(top.neighbor(Direction::Right), None);
        assert_eq!(top.neighbor(Direction::Top), None);
    }
}
