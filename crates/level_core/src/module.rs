//! Module templates and the catalog they are drawn from.
//!
//! A module is an immutable tile template carrying one edge-connection label
//! per direction. Edges are stored starting with the bottom one and going
//! counter clockwise: `[bottom, right, top, left]`.
//!
//! Modules are addressed inside a run by dense [`ModuleId`] indices into the
//! [`ModuleCatalog`]; the string id is only used at the loading boundary.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The four edges of a grid cell, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Towards `y + 1`
    Bottom,
    /// Towards `x + 1`
    Right,
    /// Towards `y - 1`
    Top,
    /// Towards `x - 1`
    Left,
}

impl Direction {
    /// All directions in cyclic index order.
    pub const ALL: [Direction; 4] = [
        Direction::Bottom,
        Direction::Right,
        Direction::Top,
        Direction::Left,
    ];

    /// Index into an edge array.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Direction for a (cyclic) index.
    #[inline]
    pub fn from_index(index: usize) -> Direction {
        Self::ALL[index % 4]
    }

    /// The direction pointing back, `(d + 2) mod 4`.
    #[inline]
    pub fn opposite(self) -> Direction {
        Self::from_index(self.index() + 2)
    }

    /// Grid offset `(dx, dy)` of the neighbor in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Bottom => (0, 1),
            Direction::Right => (1, 0),
            Direction::Top => (0, -1),
            Direction::Left => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Bottom => "bottom",
            Direction::Right => "right",
            Direction::Top => "top",
            Direction::Left => "left",
        };
        f.write_str(name)
    }
}

/// What kind of boundary a module presents on one of its edges.
///
/// Two adjacent modules are compatible when the edges they share carry the
/// same label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeConnectionType {
    None,
    Block,
    Open,
    BorderLeft,
    BorderRight,
    BorderBoth,
}

impl EdgeConnectionType {
    /// Every label, used when a constraint has to exclude "everything but X".
    pub const ALL: [EdgeConnectionType; 6] = [
        EdgeConnectionType::None,
        EdgeConnectionType::Block,
        EdgeConnectionType::Open,
        EdgeConnectionType::BorderLeft,
        EdgeConnectionType::BorderRight,
        EdgeConnectionType::BorderBoth,
    ];
}

/// Dense index of a module inside its [`ModuleCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

impl ModuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// An immutable tile template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Identifier supplied by the catalog source
    pub id: String,
    /// Edge labels, `[bottom, right, top, left]`
    pub edges: [EdgeConnectionType; 4],
    /// Optional one-character hint for text output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph: Option<char>,
}

impl Module {
    pub fn new(id: impl Into<String>, edges: [EdgeConnectionType; 4]) -> Self {
        Self {
            id: id.into(),
            edges,
            glyph: None,
        }
    }

    pub fn with_glyph(mut self, glyph: char) -> Self {
        self.glyph = Some(glyph);
        self
    }

    /// The label on the edge facing `direction`.
    #[inline]
    pub fn edge(&self, direction: Direction) -> EdgeConnectionType {
        self.edges[direction.index()]
    }

    /// Character used when printing a resolved level.
    pub fn glyph(&self) -> char {
        self.glyph
            .unwrap_or_else(|| self.id.chars().next().unwrap_or('?'))
    }
}

/// The immutable set of modules a level is built from.
///
/// Besides the modules themselves the catalog designates one start and one
/// goal module; the generator places each of them exactly once.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: Vec<Module>,
    by_name: HashMap<String, ModuleId>,
    start: ModuleId,
    goal: ModuleId,
}

impl ModuleCatalog {
    /// Build a validated catalog.
    ///
    /// Fails if the module list is empty, contains duplicate ids, or does not
    /// contain distinct start and goal modules.
    pub fn new(modules: Vec<Module>, start: &str, goal: &str) -> Result<Self, ConfigError> {
        if modules.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut by_name = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            if by_name.insert(module.id.clone(), ModuleId(i)).is_some() {
                return Err(ConfigError::DuplicateModule(module.id.clone()));
            }
        }

        let start_id = *by_name
            .get(start)
            .ok_or_else(|| ConfigError::MissingStartModule(start.to_string()))?;
        let goal_id = *by_name
            .get(goal)
            .ok_or_else(|| ConfigError::MissingGoalModule(goal.to_string()))?;
        if start_id == goal_id {
            return Err(ConfigError::StartIsGoal(start.to_string()));
        }

        Ok(Self {
            modules,
            by_name,
            start: start_id,
            goal: goal_id,
        })
    }

    /// Built-in maze tileset.
    ///
    /// Contains every combination of `Open`/`Block` over the four edges, plus
    /// a start module opening towards the top and a goal module opening
    /// towards the bottom.
    pub fn maze() -> Self {
        use EdgeConnectionType::{Block, Open};

        // Indexed by opening mask: bit 0 bottom, bit 1 right, bit 2 top, bit 3 left
        const GLYPHS: [char; 16] = [
            // left closed
            ' ', '╷', '╶', '┌', '╵', '│', '└', '├',
            // left open
            '╴', '┐', '─', '┬', '┘', '┤', '┴', '┼',
        ];

        let mut modules: Vec<Module> = (0..16usize)
            .map(|mask| {
                let mut edges = [Block; 4];
                let mut name = String::from("maze_");
                for (d, edge) in edges.iter_mut().enumerate() {
                    let open = mask & (1 << d) != 0;
                    if open {
                        *edge = Open;
                    }
                    name.push(if open { '1' } else { '0' });
                }
                Module::new(name, edges).with_glyph(GLYPHS[mask])
            })
            .collect();

        modules.push(Module::new("start", [Block, Block, Open, Block]).with_glyph('S'));
        modules.push(Module::new("goal", [Open, Block, Block, Block]).with_glyph('G'));

        let start = ModuleId(modules.len() - 2);
        let goal = ModuleId(modules.len() - 1);
        let by_name = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), ModuleId(i)))
            .collect();

        Self {
            modules,
            by_name,
            start,
            goal,
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Look up a module by index.
    #[inline]
    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    /// Find a module by its string id.
    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    pub fn start(&self) -> ModuleId {
        self.start
    }

    pub fn goal(&self) -> ModuleId {
        self.goal
    }

    /// Whether `id` is one of the reserved start/goal modules.
    pub fn is_reserved(&self, id: ModuleId) -> bool {
        id == self.start || id == self.goal
    }

    /// All module ids in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        (0..self.modules.len()).map(ModuleId)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }
}
