//! Sub-parsers for argument lists that the generic parameter kinds cannot
//! describe. Each one consumes every remaining argument and leaves exactly
//! one list operand on the stack.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::builtins::{Aggregate, Context};
use super::bytecode::{BlockId, Instr};
use super::compiler::Compiler;
use crate::core::{DataType, Sym, Value};
use crate::error::{LoadError, SourcePos};
use crate::lang::parser::Node;
use crate::lang::symbols::Keyword;

/// Occupier class in a configuration goal, pushed as its number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occupant {
    Friend = 0,
    Enemy = 1,
    AnyOwner = 2,
    Empty = 3,
}

impl Occupant {
    #[must_use]
    pub fn from_number(n: Decimal) -> Option<Self> {
        match n.to_u8()? {
            0 => Some(Occupant::Friend),
            1 => Some(Occupant::Enemy),
            2 => Some(Occupant::AnyOwner),
            3 => Some(Occupant::Empty),
            _ => None,
        }
    }
}

/// Index tuples of a grid with the given dimension sizes. The first
/// dimension varies fastest.
#[must_use]
pub fn grid_indices(sizes: &[usize]) -> Vec<Vec<usize>> {
    if sizes.is_empty() || sizes.contains(&0) {
        return Vec::new();
    }
    let total: usize = sizes.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut index = vec![0usize; sizes.len()];
    for _ in 0..total {
        out.push(index.clone());
        for (d, &size) in sizes.iter().enumerate() {
            index[d] += 1;
            if index[d] < size {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

/// Position names of a grid: one label per dimension, concatenated in
/// dimension order, enumerated as by [`grid_indices`].
#[must_use]
pub fn grid_position_names(dimensions: &[Vec<String>]) -> Vec<String> {
    let sizes: Vec<usize> = dimensions.iter().map(Vec::len).collect();
    grid_indices(&sizes)
        .into_iter()
        .map(|index| {
            dimensions
                .iter()
                .zip(&index)
                .map(|(labels, &i)| labels[i].as_str())
                .collect()
        })
        .collect()
}

fn number(n: i64) -> Value {
    Value::Number(Decimal::from(n))
}

impl Compiler<'_> {
    pub(super) fn aggregate(
        &mut self,
        block: BlockId,
        aggregate: Aggregate,
        args: &[Node],
        pos: &SourcePos,
    ) -> Result<(), LoadError> {
        let count = match aggregate {
            Aggregate::TurnOrder => self.turn_order(block, args)?,
            Aggregate::Setup => self.setup(block, args)?,
            Aggregate::Positions => self.positions(block, args)?,
            Aggregate::GridDims => self.grid_dimensions(block, args)?,
            Aggregate::GridDirs => self.grid_directions(block, args)?,
            Aggregate::PieceImages => self.piece_images(block, args, pos)?,
            Aggregate::MoveBlocks => self.move_blocks(block, args, None, None)?,
            Aggregate::RelativeConfig => self.relative_config(block, args)?,
            Aggregate::AbsoluteConfig => {
                self.absolute_config(block, args, pos)?;
                1
            }
        };
        self.make_list(block, count, pos)
    }

    fn list_items<'n>(&self, node: &'n Node, what: &str) -> Result<&'n [Node], LoadError> {
        node.items()
            .ok_or_else(|| LoadError::syntax(node.pos(), format!("expected a parenthesised {what}")))
    }

    fn ident_of(&self, node: &Node, what: &str) -> Result<Sym, LoadError> {
        node.ident()
            .ok_or_else(|| LoadError::syntax(node.pos(), format!("expected {what}")))
    }

    fn push_typed(&mut self, block: BlockId, node: &Node, t: DataType) -> Result<Value, LoadError> {
        let sym = self.ident_of(node, t.name())?;
        let value = self.typed_ident(sym, t, node.pos())?;
        self.literal(block, value.clone());
        Ok(value)
    }

    fn push_number(&mut self, block: BlockId, node: &Node) -> Result<(), LoadError> {
        match node {
            Node::Literal { value: value @ Value::Number(_), .. } => {
                self.literal(block, value.clone());
                Ok(())
            }
            other => Err(LoadError::type_error(other.pos(), "expected a number")),
        }
    }

    /// `(turn-order A B (A move-type) (A B) repeat C)`
    ///
    /// Each entry becomes `[turn player, move player?, move type?]`; the
    /// repeat marker becomes an empty list.
    fn turn_order(&mut self, block: BlockId, args: &[Node]) -> Result<usize, LoadError> {
        for node in args {
            match node {
                Node::Ident { sym, pos } => {
                    if self.keyword(node) == Some(Keyword::Repeat) {
                        self.make_list(block, 0, pos)?;
                    } else {
                        let player = self.typed_ident(*sym, DataType::Player, pos)?;
                        self.literal(block, player);
                        self.make_list(block, 1, pos)?;
                    }
                }
                Node::List { items, pos } => {
                    let [turn, rest @ ..] = items.as_slice() else {
                        return Err(LoadError::syntax(pos, "empty turn-order entry"));
                    };
                    if rest.len() > 2 {
                        return Err(LoadError::syntax(pos, "turn-order entry has too many parts"));
                    }
                    self.push_typed(block, turn, DataType::Player)?;
                    for part in rest {
                        let sym = self.ident_of(part, "a player or move type")?;
                        let t = if self.value_type(sym) == Some(DataType::Player) {
                            DataType::Player
                        } else {
                            DataType::MoveType
                        };
                        self.push_typed(block, part, t)?;
                    }
                    self.make_list(block, items.len(), pos)?;
                }
                Node::Literal { pos, .. } => {
                    return Err(LoadError::syntax(pos, "unexpected literal in turn-order"));
                }
            }
        }
        Ok(args.len())
    }

    /// `(board-setup (White (Pawn a2 b2) (Man off 3)) ...)`
    ///
    /// One entry per piece group: `[player, piece, [positions], off count]`.
    fn setup(&mut self, block: BlockId, args: &[Node]) -> Result<usize, LoadError> {
        let mut groups = 0;
        for node in args {
            let items = self.list_items(node, "player setup")?;
            let [player, pieces @ ..] = items else {
                return Err(LoadError::syntax(node.pos(), "empty board-setup entry"));
            };
            let player_sym = self.ident_of(player, "a player")?;
            let player_value = self.typed_ident(player_sym, DataType::Player, player.pos())?;
            for group in pieces {
                let group_items = self.list_items(group, "piece setup")?;
                let [piece, placements @ ..] = group_items else {
                    return Err(LoadError::syntax(group.pos(), "empty piece setup"));
                };
                self.literal(block, player_value.clone());
                self.push_typed(block, piece, DataType::Piece)?;

                let mut off = Decimal::ZERO;
                let mut positions = 0;
                let mut iter = placements.iter();
                while let Some(item) = iter.next() {
                    if self.keyword(item) == Some(Keyword::Off) {
                        off = match iter.next() {
                            Some(Node::Literal { value: Value::Number(n), .. }) => *n,
                            _ => return Err(LoadError::syntax(item.pos(), "off needs a count")),
                        };
                    } else {
                        self.push_typed(block, item, DataType::Position)?;
                        positions += 1;
                    }
                }
                self.make_list(block, positions, group.pos())?;
                self.literal(block, Value::Number(off));
                self.make_list(block, 4, group.pos())?;
                groups += 1;
            }
        }
        Ok(groups)
    }

    /// `(positions (a1 0 0 50 50) ...)`
    fn positions(&mut self, block: BlockId, args: &[Node]) -> Result<usize, LoadError> {
        for node in args {
            let items = self.list_items(node, "position")?;
            let [name, coords @ ..] = items else {
                return Err(LoadError::syntax(node.pos(), "empty position entry"));
            };
            if !coords.is_empty() && coords.len() != 4 {
                return Err(LoadError::syntax(node.pos(), "position rectangle needs four numbers"));
            }
            self.push_typed(block, name, DataType::Position)?;
            for coord in coords {
                self.push_number(block, coord)?;
            }
            self.make_list(block, items.len(), node.pos())?;
        }
        Ok(args.len())
    }

    /// `(dimensions ("a/b/c" (50 0)) ("3/2/1" (0 50)))`
    ///
    /// Defines every grid position name as the labels are seen.
    fn grid_dimensions(&mut self, block: BlockId, args: &[Node]) -> Result<usize, LoadError> {
        let mut dimensions = Vec::with_capacity(args.len());
        for node in args {
            let items = self.list_items(node, "dimension")?;
            let (labels, offsets) = match items {
                [Node::Literal { value: Value::Text(labels), .. }, offsets] => (labels, Some(offsets)),
                [Node::Literal { value: Value::Text(labels), .. }] => (labels, None),
                _ => return Err(LoadError::syntax(node.pos(), "expected (\"labels\" (dx dy))")),
            };
            self.literal(block, Value::Text(labels.clone()));
            let offset_items = match offsets {
                Some(offsets) => self.list_items(offsets, "offset")?,
                None => &[],
            };
            for offset in offset_items {
                self.push_number(block, offset)?;
            }
            self.make_list(block, offset_items.len(), node.pos())?;
            self.make_list(block, 2, node.pos())?;
            dimensions.push(labels.split('/').map(str::to_string).collect::<Vec<_>>());
        }

        let pos = args.first().map(Node::pos);
        if let Some(pos) = pos {
            for name in grid_position_names(&dimensions) {
                let sym = self.interner.intern(&name);
                self.typed_ident(sym, DataType::Position, pos)?;
            }
        }
        Ok(args.len())
    }

    /// `(directions (n 0 -1) (e 1 0))`
    fn grid_directions(&mut self, block: BlockId, args: &[Node]) -> Result<usize, LoadError> {
        for node in args {
            let items = self.list_items(node, "direction")?;
            let [name, offsets @ ..] = items else {
                return Err(LoadError::syntax(node.pos(), "empty direction entry"));
            };
            self.push_typed(block, name, DataType::Direction)?;
            for offset in offsets {
                self.push_number(block, offset)?;
            }
            self.make_list(block, items.len(), node.pos())?;
        }
        Ok(args.len())
    }

    /// `(image White "w.bmp" Black "b.bmp" "b2.bmp")`
    fn piece_images(&mut self, block: BlockId, args: &[Node], pos: &SourcePos) -> Result<usize, LoadError> {
        let mut groups = 0;
        let mut pending = 0;
        for node in args {
            match node {
                Node::Ident { .. } => {
                    if groups > 0 {
                        self.make_list(block, pending, node.pos())?;
                    }
                    self.push_typed(block, node, DataType::Player)?;
                    groups += 1;
                    pending = 1;
                }
                Node::Literal { value: value @ Value::Text(_), .. } if groups > 0 => {
                    self.literal(block, value.clone());
                    pending += 1;
                }
                _ => return Err(LoadError::syntax(node.pos(), "expected a player followed by image names")),
            }
        }
        if groups > 0 {
            self.make_list(block, pending, pos)?;
        }
        Ok(groups)
    }

    /// Move programs with their `move-type` and `start-in` markers.
    ///
    /// Each program becomes `[move type | false, start restriction | false,
    /// block]`. A marker applies to the programs after it; a marker with
    /// programs inside applies only to those.
    fn move_blocks(
        &mut self,
        block: BlockId,
        args: &[Node],
        mut move_type: Option<Value>,
        mut restrict: Option<Value>,
    ) -> Result<usize, LoadError> {
        let mut count = 0;
        for node in args {
            let items = self.list_items(node, "move program")?;
            let marker = node.head().map(|h| self.name(h).to_string());
            match (marker.as_deref(), items) {
                (Some("move-type"), [_, kind, nested @ ..]) => {
                    let sym = self.ident_of(kind, "a move type")?;
                    let value = self.typed_ident(sym, DataType::MoveType, kind.pos())?;
                    if nested.is_empty() {
                        move_type = Some(value);
                    } else {
                        count += self.move_blocks(block, nested, Some(value), restrict.clone())?;
                    }
                }
                (Some("start-in"), [_, place, nested @ ..]) => {
                    let sym = self.ident_of(place, "a position or zone")?;
                    let t = match self.value_type(sym) {
                        Some(DataType::Zone) => DataType::Zone,
                        _ => DataType::Position,
                    };
                    let value = self.typed_ident(sym, t, place.pos())?;
                    if nested.is_empty() {
                        restrict = Some(value);
                    } else {
                        count += self.move_blocks(block, nested, move_type.clone(), Some(value))?;
                    }
                }
                _ => {
                    self.literal(block, move_type.clone().unwrap_or(Value::Bool(false)));
                    self.literal(block, restrict.clone().unwrap_or(Value::Bool(false)));
                    let program = self.compile_block(Context::Move, items, node.pos())?;
                    self.emit(block, Instr::NewScope { context: Context::Move, block: program });
                    self.make_list(block, 3, node.pos())?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Occupier list: `[kind, pieces...]`.
    fn occupant(&mut self, block: BlockId, node: &Node) -> Result<(), LoadError> {
        let pos = node.pos();
        let (kind, pieces): (Occupant, &[Node]) = match node {
            Node::Ident { .. } if self.keyword(node) == Some(Keyword::Empty) => (Occupant::Empty, &[]),
            Node::Ident { .. } => (Occupant::Friend, std::slice::from_ref(node)),
            Node::List { items, .. } => match items.first().and_then(|h| self.keyword(h)) {
                Some(Keyword::Opponent) => (Occupant::Enemy, &items[1..]),
                Some(Keyword::Friend) => (Occupant::Friend, &items[1..]),
                Some(Keyword::AnyOwner) => (Occupant::AnyOwner, &items[1..]),
                _ => (Occupant::Friend, items.as_slice()),
            },
            Node::Literal { .. } => return Err(LoadError::syntax(pos, "expected a piece or occupier")),
        };
        self.literal(block, number(kind as i64));
        for piece in pieces {
            self.push_typed(block, piece, DataType::Piece)?;
        }
        self.make_list(block, pieces.len() + 1, pos)
    }

    /// `(relative-config Man n Man n Man)`: occupiers alternate with
    /// directions.
    fn relative_config(&mut self, block: BlockId, args: &[Node]) -> Result<usize, LoadError> {
        if args.len() % 2 == 0 {
            let pos = args.last().map(Node::pos);
            return Err(match pos {
                Some(pos) => LoadError::syntax(pos, "relative-config must end with an occupier"),
                None => LoadError::definition("empty relative-config"),
            });
        }
        for (i, node) in args.iter().enumerate() {
            if i % 2 == 0 {
                self.occupant(block, node)?;
            } else {
                self.push_typed(block, node, DataType::Direction)?;
            }
        }
        Ok(args.len())
    }

    /// `(absolute-config Man (a8 b8 promotion-zone))` as `[occupier,
    /// [positions and zones]]`.
    fn absolute_config(&mut self, block: BlockId, args: &[Node], pos: &SourcePos) -> Result<(), LoadError> {
        let [occupant, places @ ..] = args else {
            return Err(LoadError::syntax(pos, "absolute-config needs an occupier"));
        };
        self.occupant(block, occupant)?;
        let mut count = 0;
        for place in places {
            let targets = match place {
                Node::List { items, .. } => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            for target in targets {
                let sym = self.ident_of(target, "a position or zone")?;
                let t = match self.value_type(sym) {
                    Some(DataType::Zone) => DataType::Zone,
                    _ => DataType::Position,
                };
                self.push_typed(block, target, t)?;
                count += 1;
            }
        }
        self.make_list(block, count, pos)?;
        self.make_list(block, 2, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_names_first_dimension_fastest() {
        let dims = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["2".to_string(), "1".to_string()],
        ];
        assert_eq!(grid_position_names(&dims), vec!["a2", "b2", "a1", "b1"]);
    }

    #[test]
    fn test_grid_names_empty_dimension() {
        assert!(grid_position_names(&[vec![], vec!["1".to_string()]]).is_empty());
        assert!(grid_position_names(&[]).is_empty());
    }

    #[test]
    fn test_occupant_numbers() {
        assert_eq!(Occupant::from_number(Decimal::from(1)), Some(Occupant::Enemy));
        assert_eq!(Occupant::from_number(Decimal::from(9)), None);
    }
}
