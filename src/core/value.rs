//! Tagged values and interned identifiers.
//!
//! ## Value
//!
//! Every value a rule program can mention is one `Value`. Scalar kinds
//! (`Bool`, `Number`, `Text`, `Time`, `Binary`) carry their payload;
//! identifier kinds (`Player`, `Piece`, `Position`, ...) carry a `Sym`.
//!
//! Equality is type-tagged: `Player(x) != Piece(x)` even when both name the
//! same interned string. Conversion between tags is never implicit.
//!
//! ## Sym
//!
//! Identifiers are interned once per compilation by an `Interner`. Two
//! symbols compare equal exactly when they were interned from the same
//! name, so runtime comparisons are integer comparisons.

use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Interned identifier.
///
/// Ids are assigned in interning order, so ordering by `Sym` is stable for
/// a given program text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sym(pub u32);

impl Sym {
    /// Get the raw id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sym({})", self.0)
    }
}

/// Per-compilation string interner.
///
/// ```
/// use rust_abg::core::Interner;
///
/// let mut interner = Interner::new();
/// let a = interner.intern("man");
/// let b = interner.intern("man");
/// assert_eq!(a, b);
/// assert_eq!(interner.name(a), "man");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Interner {
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, Sym>,
}

impl Interner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning its id.
    pub fn intern(&mut self, name: &str) -> Sym {
        if let Some(&sym) = self.index.get(name) {
            return sym;
        }
        let sym = Sym(self.names.len() as u32);
        let shared: Arc<str> = Arc::from(name);
        self.names.push(shared.clone());
        self.index.insert(shared, sym);
        sym
    }

    /// Look up a name without interning it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Sym> {
        self.index.get(name).copied()
    }

    /// Resolve an id back to its name.
    ///
    /// Ids from a different interner resolve to `"?"`.
    #[must_use]
    pub fn name(&self, sym: Sym) -> &str {
        self.names.get(sym.0 as usize).map_or("?", |s| s)
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Declared type of a value, a symbol, or a built-in parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// No value (statements).
    Nothing,
    Bool,
    Number,
    Text,
    Time,
    Binary,
    /// Bare identifier, not bound to any domain kind.
    Ident,
    Attribute,
    Direction,
    MoveType,
    Player,
    Piece,
    Position,
    Zone,
    /// Either a direction or a position (step target).
    Locator,
    /// Accepts any value.
    Any,
}

impl DataType {
    /// Check whether a value of type `other` may fill a slot of this type.
    #[must_use]
    pub fn accepts(self, other: DataType) -> bool {
        match self {
            DataType::Any => other != DataType::Nothing,
            DataType::Locator => matches!(other, DataType::Direction | DataType::Position),
            DataType::Ident => other.is_identifier(),
            _ => self == other,
        }
    }

    /// Identifier-like types carry a `Sym`.
    #[must_use]
    pub fn is_identifier(self) -> bool {
        matches!(
            self,
            DataType::Ident
                | DataType::Attribute
                | DataType::Direction
                | DataType::MoveType
                | DataType::Player
                | DataType::Piece
                | DataType::Position
                | DataType::Zone
        )
    }

    /// Types whose first sight in a typed slot defines the symbol.
    #[must_use]
    pub fn is_definable(self) -> bool {
        self.is_identifier() && self != DataType::Ident
    }

    /// Lowercase name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataType::Nothing => "nothing",
            DataType::Bool => "boolean",
            DataType::Number => "number",
            DataType::Text => "text",
            DataType::Time => "time",
            DataType::Binary => "binary",
            DataType::Ident => "identifier",
            DataType::Attribute => "attribute",
            DataType::Direction => "direction",
            DataType::MoveType => "move type",
            DataType::Player => "player",
            DataType::Piece => "piece",
            DataType::Position => "position",
            DataType::Zone => "zone",
            DataType::Locator => "position or direction",
            DataType::Any => "any",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged, immutable value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Number(Decimal),
    Text(String),
    /// Time of day or duration in seconds.
    Time(u32),
    Binary(Vec<u8>),
    Ident(Sym),
    Attribute(Sym),
    Direction(Sym),
    MoveType(Sym),
    Player(Sym),
    Piece(Sym),
    Position(Sym),
    Zone(Sym),
}

impl Value {
    /// Build an identifier value of the given type.
    ///
    /// Returns `None` when `data_type` is not an identifier type.
    #[must_use]
    pub fn identifier(data_type: DataType, sym: Sym) -> Option<Self> {
        Some(match data_type {
            DataType::Ident => Value::Ident(sym),
            DataType::Attribute => Value::Attribute(sym),
            DataType::Direction => Value::Direction(sym),
            DataType::MoveType => Value::MoveType(sym),
            DataType::Player => Value::Player(sym),
            DataType::Piece => Value::Piece(sym),
            DataType::Position => Value::Position(sym),
            DataType::Zone => Value::Zone(sym),
            _ => return None,
        })
    }

    /// The single tag this value reports.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Number(_) => DataType::Number,
            Value::Text(_) => DataType::Text,
            Value::Time(_) => DataType::Time,
            Value::Binary(_) => DataType::Binary,
            Value::Ident(_) => DataType::Ident,
            Value::Attribute(_) => DataType::Attribute,
            Value::Direction(_) => DataType::Direction,
            Value::MoveType(_) => DataType::MoveType,
            Value::Player(_) => DataType::Player,
            Value::Piece(_) => DataType::Piece,
            Value::Position(_) => DataType::Position,
            Value::Zone(_) => DataType::Zone,
        }
    }

    /// Symbol of an identifier-like value.
    #[must_use]
    pub fn sym(&self) -> Option<Sym> {
        match self {
            Value::Ident(s)
            | Value::Attribute(s)
            | Value::Direction(s)
            | Value::MoveType(s)
            | Value::Player(s)
            | Value::Piece(s)
            | Value::Position(s)
            | Value::Zone(s) => Some(*s),
            _ => None,
        }
    }

    /// Get as bool if this is a Bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as decimal if this is a Number value.
    #[must_use]
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string reference if this is a Text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Compare two values of the same ordered kind.
    ///
    /// Identifier kinds and mismatched tags are unordered.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Render for diagnostics, resolving symbols through `interner`.
    #[must_use]
    pub fn display(&self, interner: &Interner) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => format!("{s:?}"),
            Value::Time(t) => format!("{}:{:02}:{:02}", t / 3600, (t / 60) % 60, t % 60),
            Value::Binary(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                format!("{{{hex}}}")
            }
            other => other
                .sym()
                .map_or_else(String::new, |s| interner.name(s).to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
