//! Edge filters: the unit of constraint passed between neighboring cells.

use crate::module::{Direction, EdgeConnectionType, Module};
use std::fmt;

/// A compatibility test against the edge of a module.
///
/// `direction` is the direction the constraint travels in, seen from the cell
/// that issued it. The receiving cell therefore tests the edge on the
/// opposite side, the one facing back towards the issuer.
///
/// An inclusive filter keeps only modules whose facing edge equals
/// `edge_type`; an exclusive filter discards exactly those modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeFilter {
    pub direction: Direction,
    pub edge_type: EdgeConnectionType,
    pub inclusive: bool,
}

impl EdgeFilter {
    pub fn new(direction: Direction, edge_type: EdgeConnectionType, inclusive: bool) -> Self {
        Self {
            direction,
            edge_type,
            inclusive,
        }
    }

    /// Keep only modules presenting `edge_type` back towards the issuer.
    pub fn inclusive(direction: Direction, edge_type: EdgeConnectionType) -> Self {
        Self::new(direction, edge_type, true)
    }

    /// Discard modules presenting `edge_type` back towards the issuer.
    pub fn exclusive(direction: Direction, edge_type: EdgeConnectionType) -> Self {
        Self::new(direction, edge_type, false)
    }

    /// The edge of the receiving module that this filter inspects.
    #[inline]
    pub fn tested_edge(&self) -> Direction {
        self.direction.opposite()
    }

    /// Whether `module` survives this filter.
    #[inline]
    pub fn matches(&self, module: &Module) -> bool {
        let same = module.edge(self.tested_edge()) == self.edge_type;
        if self.inclusive {
            same
        } else {
            !same
        }
    }
}

impl fmt::Display for EdgeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} on {} edge",
            if self.inclusive { "require" } else { "forbid" },
            self.edge_type,
            self.tested_edge()
        )
    }
}
