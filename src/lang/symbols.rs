//! Symbol table and scope arena.
//!
//! ## Layout
//!
//! ```text
//!   root (punctuation, true/false, if/else/while/and/or/not, keywords)
//!    ├── menu built-ins
//!    ├── game built-ins
//!    ├── ...               one predefined scope per Context
//!    └── goal built-ins
//!
//!   user scope (one per compiled game), parent = the active context scope
//!   macro scope (names captured by `define`), no parent
//! ```
//!
//! Scopes live in a `Vec` and refer to their parent by `ScopeId`, so the
//! chain is a strict tree. `push_context` reparents the user scope onto a
//! context's predefined scope and `pop_context` restores the previous
//! parent; built-ins therefore resolve per context without leaking into
//! other contexts.

use rustc_hash::FxHashMap;

use crate::compile::builtins::{builtins_for, BuiltinId, Context};
use crate::core::{DataType, Interner, Sym, Value};
use crate::error::{LoadError, SourcePos};

/// Index into the scope arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Lexical class of a symbol's name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomClass {
    Ident,
    Literal,
    Punctuation,
    Macro,
}

/// Control and shared keywords held by the root scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    While,
    And,
    Or,
    Not,
    Repeat,
    Off,
    Empty,
    Opponent,
    Friend,
    AnyOwner,
}

impl Keyword {
    const ALL: [(&'static str, Keyword); 12] = [
        ("if", Keyword::If),
        ("else", Keyword::Else),
        ("while", Keyword::While),
        ("and", Keyword::And),
        ("or", Keyword::Or),
        ("not", Keyword::Not),
        ("repeat", Keyword::Repeat),
        ("off", Keyword::Off),
        ("empty", Keyword::Empty),
        ("opponent", Keyword::Opponent),
        ("friend", Keyword::Friend),
        ("any-owner", Keyword::AnyOwner),
    ];
}

/// What a name denotes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// Seen but not yet given a meaning.
    Undefined,
    /// Literal constant (`true`, `false`).
    Literal(Value),
    /// User-defined identifier value (position, piece, player, ...).
    Value,
    /// Flag set with `set-flag`.
    Variable,
    Builtin(BuiltinId),
    Keyword(Keyword),
}

/// One scope entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: Sym,
    pub class: AtomClass,
    pub kind: SymbolKind,
    pub data_type: DataType,
}

#[derive(Clone, Debug, Default)]
struct Scope {
    symbols: FxHashMap<Sym, Symbol>,
    parent: Option<ScopeId>,
}

/// Arena of scopes plus the active user scope.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    root: ScopeId,
    contexts: [ScopeId; 8],
    macros: ScopeId,
    user: ScopeId,
    saved_parents: Vec<Option<ScopeId>>,
}

impl SymbolTable {
    /// Build the predefined scopes, interning every built-in and keyword.
    pub fn new(interner: &mut Interner) -> Self {
        let mut table = Self {
            scopes: Vec::new(),
            root: ScopeId(0),
            contexts: [ScopeId(0); 8],
            macros: ScopeId(0),
            user: ScopeId(0),
            saved_parents: Vec::new(),
        };

        table.root = table.alloc(None);
        for punct in ["(", ")"] {
            let sym = interner.intern(punct);
            table.insert(table.root, sym, AtomClass::Punctuation, SymbolKind::Undefined, DataType::Nothing);
        }
        for (name, value) in [("true", true), ("false", false)] {
            let sym = interner.intern(name);
            table.insert(
                table.root,
                sym,
                AtomClass::Literal,
                SymbolKind::Literal(Value::Bool(value)),
                DataType::Bool,
            );
        }
        for (name, keyword) in Keyword::ALL {
            let sym = interner.intern(name);
            table.insert(table.root, sym, AtomClass::Ident, SymbolKind::Keyword(keyword), DataType::Nothing);
        }

        for context in Context::ALL {
            let scope = table.alloc(Some(table.root));
            table.contexts[context.index()] = scope;
            for (id, spec) in builtins_for(context) {
                let sym = interner.intern(spec.name);
                table.insert(scope, sym, AtomClass::Ident, SymbolKind::Builtin(id), spec.result);
            }
        }

        table.macros = table.alloc(None);
        table.user = table.alloc(Some(table.root));
        table
    }

    fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            symbols: FxHashMap::default(),
            parent,
        });
        id
    }

    fn insert(&mut self, scope: ScopeId, name: Sym, class: AtomClass, kind: SymbolKind, data_type: DataType) {
        self.scopes[scope.0 as usize].symbols.insert(
            name,
            Symbol {
                name,
                class,
                kind,
                data_type,
            },
        );
    }

    /// Start a fresh user scope for the next game.
    pub fn new_user_scope(&mut self) -> ScopeId {
        let parent = self.scopes[self.user.0 as usize].parent;
        self.user = self.alloc(parent);
        self.user
    }

    /// The active user scope.
    #[must_use]
    pub fn user_scope(&self) -> ScopeId {
        self.user
    }

    /// Make `context`'s built-ins visible from the user scope.
    pub fn push_context(&mut self, context: Context) {
        let user = &mut self.scopes[self.user.0 as usize];
        self.saved_parents.push(user.parent);
        user.parent = Some(self.contexts[context.index()]);
    }

    /// Undo the most recent `push_context`.
    pub fn pop_context(&mut self) {
        if let Some(parent) = self.saved_parents.pop() {
            self.scopes[self.user.0 as usize].parent = parent;
        }
    }

    /// Resolve a name from the user scope outward.
    #[must_use]
    pub fn lookup(&self, name: Sym) -> Option<&Symbol> {
        let mut scope = Some(self.user);
        while let Some(id) = scope {
            let entry = &self.scopes[id.0 as usize];
            if let Some(symbol) = entry.symbols.get(&name) {
                return Some(symbol);
            }
            scope = entry.parent;
        }
        None
    }

    /// Give `name` a type in the user scope.
    ///
    /// Re-defining with the same type is a no-op. A different type, or a
    /// name that already denotes a built-in or keyword, is a type error.
    pub fn define(
        &mut self,
        name: Sym,
        kind: SymbolKind,
        data_type: DataType,
        interner: &Interner,
        pos: &SourcePos,
    ) -> Result<(), LoadError> {
        if let Some(existing) = self.lookup(name) {
            match existing.kind {
                SymbolKind::Undefined => {}
                SymbolKind::Value | SymbolKind::Variable if existing.data_type == data_type => return Ok(()),
                _ => {
                    return Err(LoadError::type_error(
                        pos,
                        format!(
                            "'{}' redefined with incompatible type {} (was {})",
                            interner.name(name),
                            data_type,
                            existing.data_type
                        ),
                    ));
                }
            }
        }
        self.insert(self.user, name, AtomClass::Ident, kind, data_type);
        Ok(())
    }

    /// Record a macro name.
    pub fn define_macro(&mut self, name: Sym) {
        self.insert(self.macros, name, AtomClass::Macro, SymbolKind::Undefined, DataType::Nothing);
    }

    #[must_use]
    pub fn is_macro(&self, name: Sym) -> bool {
        self.scopes[self.macros.0 as usize].symbols.contains_key(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pos() -> SourcePos {
        SourcePos::new(Arc::from("test"), 1)
    }

    #[test]
    fn test_builtins_resolve_per_context() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new(&mut interner);
        let add = interner.get("add").unwrap();
        let title = interner.get("title").unwrap();

        assert!(table.lookup(add).is_none());

        table.push_context(Context::Move);
        assert!(matches!(table.lookup(add).unwrap().kind, SymbolKind::Builtin(_)));
        assert!(table.lookup(title).is_none());

        table.push_context(Context::Game);
        assert!(table.lookup(add).is_none());
        assert!(table.lookup(title).is_some());

        table.pop_context();
        assert!(table.lookup(add).is_some());
        table.pop_context();
        assert!(table.lookup(add).is_none());
    }

    #[test]
    fn test_same_name_differs_by_context() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new(&mut interner);
        let name = interner.get("name").unwrap();

        table.push_context(Context::Zone);
        let zone_name = table.lookup(name).cloned().unwrap();
        table.pop_context();
        table.push_context(Context::Piece);
        let piece_name = table.lookup(name).cloned().unwrap();

        assert_ne!(zone_name.kind, piece_name.kind);
    }

    #[test]
    fn test_redefinition_with_incompatible_type() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new(&mut interner);
        let a1 = interner.intern("a1");

        table
            .define(a1, SymbolKind::Value, DataType::Position, &interner, &pos())
            .unwrap();
        table
            .define(a1, SymbolKind::Value, DataType::Position, &interner, &pos())
            .unwrap();
        let err = table
            .define(a1, SymbolKind::Value, DataType::Piece, &interner, &pos())
            .unwrap_err();
        assert!(err.to_string().contains("redefined with incompatible type"));
    }

    #[test]
    fn test_user_scope_per_game() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new(&mut interner);
        let man = interner.intern("man");

        table
            .define(man, SymbolKind::Value, DataType::Piece, &interner, &pos())
            .unwrap();
        table.new_user_scope();
        assert!(table.lookup(man).is_none());
    }

    #[test]
    fn test_keywords_and_literals() {
        let mut interner = Interner::new();
        let table = SymbolTable::new(&mut interner);
        let t = table.lookup(interner.get("true").unwrap()).unwrap();
        assert_eq!(t.kind, SymbolKind::Literal(Value::Bool(true)));
        let repeat = table.lookup(interner.get("repeat").unwrap()).unwrap();
        assert_eq!(repeat.kind, SymbolKind::Keyword(Keyword::Repeat));
    }
}
