//! Board topology.
//!
//! Positions keep their declaration order, which is also the order move
//! generation visits them. Links are directed `(position, direction) →
//! position` edges; `opposite` is precomputed once when the board is sealed.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::compile::grid_indices;
use crate::core::{Interner, Sym};
use crate::error::ExecError;

/// Screen rectangle of a position, in image pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDef {
    pub name: Sym,
    pub rect: Option<Rect>,
}

/// One directed edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkDef {
    pub from: Sym,
    pub direction: Sym,
    pub to: Sym,
}

/// A named set of positions, optionally owned by some players.
///
/// Several `ZoneDef`s may share a name with different players; an empty
/// player list means every player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDef {
    pub name: Sym,
    pub players: Vec<Sym>,
    pub positions: Vec<Sym>,
}

impl ZoneDef {
    fn applies_to(&self, player: Sym) -> bool {
        self.players.is_empty() || self.players.contains(&player)
    }
}

/// Sealed board definition.
#[derive(Clone, Debug, Default)]
pub struct BoardDef {
    images: Vec<String>,
    positions: Vec<PositionDef>,
    index: FxHashMap<Sym, usize>,
    links: Vec<LinkDef>,
    link_map: FxHashMap<(Sym, Sym), Sym>,
    directions: Vec<Sym>,
    opposites: FxHashMap<Sym, Sym>,
    zones: Vec<ZoneDef>,
    symmetries: FxHashMap<(Sym, Sym), Sym>,
}

impl BoardDef {
    #[must_use]
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Positions in declaration order.
    #[must_use]
    pub fn positions(&self) -> &[PositionDef] {
        &self.positions
    }

    #[must_use]
    pub fn position(&self, name: Sym) -> Option<&PositionDef> {
        self.index.get(&name).map(|&i| &self.positions[i])
    }

    #[must_use]
    pub fn contains(&self, name: Sym) -> bool {
        self.index.contains_key(&name)
    }

    /// Declaration index of a position.
    #[must_use]
    pub fn position_index(&self, name: Sym) -> Option<usize> {
        self.index.get(&name).copied()
    }

    #[must_use]
    pub fn links(&self) -> &[LinkDef] {
        &self.links
    }

    /// Follow one link.
    #[must_use]
    pub fn link(&self, from: Sym, direction: Sym) -> Option<Sym> {
        self.link_map.get(&(from, direction)).copied()
    }

    #[must_use]
    pub fn directions(&self) -> &[Sym] {
        &self.directions
    }

    /// The direction that undoes every link of `direction`, if one exists.
    #[must_use]
    pub fn opposite(&self, direction: Sym) -> Option<Sym> {
        self.opposites.get(&direction).copied()
    }

    #[must_use]
    pub fn zones(&self) -> &[ZoneDef] {
        &self.zones
    }

    /// Whether `position` lies in `zone` as seen by `player`.
    #[must_use]
    pub fn in_zone(&self, zone: Sym, player: Sym, position: Sym) -> bool {
        self.zones
            .iter()
            .any(|z| z.name == zone && z.applies_to(player) && z.positions.contains(&position))
    }

    /// Positions of `zone` as seen by `player`, without duplicates.
    #[must_use]
    pub fn zone_positions(&self, zone: Sym, player: Sym) -> Vec<Sym> {
        let mut out: Vec<Sym> = Vec::new();
        for z in self.zones.iter().filter(|z| z.name == zone && z.applies_to(player)) {
            for p in &z.positions {
                if !out.contains(p) {
                    out.push(*p);
                }
            }
        }
        out
    }

    /// Direction as seen by `player` after symmetry mapping.
    #[must_use]
    pub fn symmetric(&self, player: Sym, direction: Sym) -> Sym {
        self.symmetries
            .get(&(player, direction))
            .copied()
            .unwrap_or(direction)
    }
}

/// Grid description collected from a `(grid ...)` block.
#[derive(Clone, Debug, Default)]
pub struct GridSpec {
    pub start: Rect,
    /// Labels and pixel offset per dimension.
    pub dimensions: Vec<(Vec<String>, Vec<i32>)>,
    /// Direction name and index offset per dimension.
    pub directions: Vec<(Sym, Vec<i32>)>,
}

/// Accumulates board clauses and seals them into a [`BoardDef`].
#[derive(Debug, Default)]
pub struct BoardBuilder {
    def: BoardDef,
    unlinked: Vec<Sym>,
    killed: Vec<Sym>,
}

impl BoardBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_images(&mut self, images: impl IntoIterator<Item = String>) {
        self.def.images.extend(images);
    }

    /// Declare a position; a repeated declaration only updates its rectangle.
    pub fn add_position(&mut self, name: Sym, rect: Option<Rect>) {
        match self.def.index.get(&name) {
            Some(&i) => {
                if rect.is_some() {
                    self.def.positions[i].rect = rect;
                }
            }
            None => {
                self.def.index.insert(name, self.def.positions.len());
                self.def.positions.push(PositionDef { name, rect });
            }
        }
    }

    fn add_direction(&mut self, direction: Sym) {
        if !self.def.directions.contains(&direction) {
            self.def.directions.push(direction);
        }
    }

    /// Add or replace one link.
    pub fn add_link(&mut self, from: Sym, direction: Sym, to: Sym) {
        self.add_direction(direction);
        if self.def.link_map.insert((from, direction), to).is_some() {
            self.def
                .links
                .retain(|l| !(l.from == from && l.direction == direction));
        }
        self.def.links.push(LinkDef { from, direction, to });
    }

    pub fn add_zone(&mut self, zone: ZoneDef) {
        self.def.zones.push(zone);
    }

    pub fn add_symmetry(&mut self, player: Sym, from: Sym, to: Sym) {
        self.def.symmetries.insert((player, from), to);
    }

    pub fn unlink(&mut self, positions: impl IntoIterator<Item = Sym>) {
        self.unlinked.extend(positions);
    }

    pub fn kill(&mut self, positions: impl IntoIterator<Item = Sym>) {
        self.killed.extend(positions);
    }

    /// Expand a grid into positions and links.
    ///
    /// Position names must already be interned by the compiler.
    pub fn add_grid(&mut self, grid: &GridSpec, interner: &Interner) -> Result<(), ExecError> {
        let sizes: Vec<usize> = grid.dimensions.iter().map(|(labels, _)| labels.len()).collect();
        let indices = grid_indices(&sizes);
        let mut names: FxHashMap<Vec<usize>, Sym> = FxHashMap::default();

        for index in &indices {
            let name: String = grid
                .dimensions
                .iter()
                .zip(index)
                .map(|((labels, _), &i)| labels[i].as_str())
                .collect();
            let sym = interner.get(&name).ok_or_else(|| ExecError::UnknownSymbol {
                kind: "position",
                name: name.clone(),
            })?;
            let (mut dx, mut dy) = (0, 0);
            for ((_, offset), &i) in grid.dimensions.iter().zip(index) {
                let i = i as i32;
                dx += offset.first().copied().unwrap_or(0) * i;
                dy += offset.get(1).copied().unwrap_or(0) * i;
            }
            self.add_position(sym, Some(grid.start.offset(dx, dy)));
            names.insert(index.clone(), sym);
        }

        for (direction, offsets) in &grid.directions {
            self.add_direction(*direction);
            for index in &indices {
                let target: Option<Vec<usize>> = index
                    .iter()
                    .enumerate()
                    .map(|(d, &i)| {
                        let moved = i as i64 + i64::from(offsets.get(d).copied().unwrap_or(0));
                        usize::try_from(moved).ok().filter(|&m| m < sizes[d])
                    })
                    .collect();
                if let (Some(from), Some(to)) = (
                    names.get(index),
                    target.as_ref().and_then(|t| names.get(t)),
                ) {
                    self.add_link(*from, *direction, *to);
                }
            }
        }
        Ok(())
    }

    /// Apply `unlink` and `kill-positions`, then precompute opposites.
    #[must_use]
    pub fn finish(mut self) -> BoardDef {
        let mut def = std::mem::take(&mut self.def);

        if !self.killed.is_empty() {
            def.positions.retain(|p| !self.killed.contains(&p.name));
            def.index = def
                .positions
                .iter()
                .enumerate()
                .map(|(i, p)| (p.name, i))
                .collect();
            for zone in &mut def.zones {
                zone.positions.retain(|p| !self.killed.contains(p));
            }
        }
        let removed = |p: &Sym| self.unlinked.contains(p) || self.killed.contains(p);
        def.links.retain(|l| !removed(&l.from) && !removed(&l.to));
        def.link_map = def
            .links
            .iter()
            .map(|l| ((l.from, l.direction), l.to))
            .collect();

        def.opposites = compute_opposites(&def);
        def
    }
}

/// `o` is the opposite of `d` when `d` has links and every `p -d-> q` has a
/// matching `q -o-> p`. The first qualifying direction wins.
fn compute_opposites(def: &BoardDef) -> FxHashMap<Sym, Sym> {
    let mut out = FxHashMap::default();
    for &d in &def.directions {
        let edges: Vec<&LinkDef> = def.links.iter().filter(|l| l.direction == d).collect();
        if edges.is_empty() {
            continue;
        }
        let found = def.directions.iter().copied().find(|&o| {
            o != d && edges.iter().all(|l| def.link_map.get(&(l.to, o)) == Some(&l.from))
        });
        if let Some(o) = found {
            out.insert(d, o);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_3x2(interner: &mut Interner) -> (GridSpec, Sym, Sym) {
        for name in ["a2", "b2", "c2", "a1", "b1", "c1"] {
            interner.intern(name);
        }
        let n = interner.intern("n");
        let e = interner.intern("e");
        let w = interner.intern("w");
        let s = interner.intern("s");
        let grid = GridSpec {
            start: Rect::new(0, 0, 10, 10),
            dimensions: vec![
                (vec!["a".into(), "b".into(), "c".into()], vec![10, 0]),
                (vec!["2".into(), "1".into()], vec![0, 10]),
            ],
            directions: vec![
                (n, vec![0, -1]),
                (e, vec![1, 0]),
                (w, vec![-1, 0]),
                (s, vec![0, 1]),
            ],
        };
        (grid, n, e)
    }

    #[test]
    fn test_grid_positions_and_links() {
        let mut interner = Interner::new();
        let (grid, n, e) = grid_3x2(&mut interner);
        let mut builder = BoardBuilder::new();
        builder.add_grid(&grid, &interner).unwrap();
        let board = builder.finish();

        let a1 = interner.get("a1").unwrap();
        let a2 = interner.get("a2").unwrap();
        let b1 = interner.get("b1").unwrap();
        let c1 = interner.get("c1").unwrap();
        assert_eq!(board.positions().len(), 6);
        assert_eq!(board.position_index(a2), Some(0));
        assert_eq!(board.link(a1, n), Some(a2));
        assert_eq!(board.link(a1, e), Some(b1));
        assert_eq!(board.link(c1, e), None);
        assert_eq!(board.position(b1).unwrap().rect, Some(Rect::new(10, 10, 20, 20)));
    }

    #[test]
    fn test_opposites() {
        let mut interner = Interner::new();
        let (grid, n, e) = grid_3x2(&mut interner);
        let mut builder = BoardBuilder::new();
        builder.add_grid(&grid, &interner).unwrap();
        let board = builder.finish();
        assert_eq!(board.opposite(n), interner.get("s"));
        assert_eq!(board.opposite(e), interner.get("w"));
    }

    #[test]
    fn test_kill_and_unlink() {
        let mut interner = Interner::new();
        let (grid, n, e) = grid_3x2(&mut interner);
        let b1 = interner.get("b1").unwrap();
        let a1 = interner.get("a1").unwrap();
        let c2 = interner.get("c2").unwrap();
        let mut builder = BoardBuilder::new();
        builder.add_grid(&grid, &interner).unwrap();
        builder.kill([b1]);
        builder.unlink([c2]);
        let board = builder.finish();

        assert!(!board.contains(b1));
        assert_eq!(board.link(a1, e), None);
        assert_eq!(board.link(interner.get("c1").unwrap(), n), None);
        assert_eq!(board.positions().len(), 5);
        assert_eq!(board.position_index(a1), Some(3));
    }

    #[test]
    fn test_zones_and_symmetry() {
        let mut interner = Interner::new();
        let zone = interner.intern("goal");
        let white = interner.intern("White");
        let black = interner.intern("Black");
        let a1 = interner.intern("a1");
        let n = interner.intern("n");
        let s = interner.intern("s");
        let mut builder = BoardBuilder::new();
        builder.add_position(a1, None);
        builder.add_zone(ZoneDef {
            name: zone,
            players: vec![white],
            positions: vec![a1],
        });
        builder.add_symmetry(black, n, s);
        let board = builder.finish();

        assert!(board.in_zone(zone, white, a1));
        assert!(!board.in_zone(zone, black, a1));
        assert_eq!(board.symmetric(black, n), s);
        assert_eq!(board.symmetric(white, n), n);
    }
}
