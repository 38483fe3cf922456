//! The menu: every game and variant of one loaded program.

use std::sync::Arc;

use super::builder::{run_block, GameBuilder};
use super::game::GameDef;
use crate::compile::builtins::Op;
use crate::compile::bytecode::{BlockId, Program};
use crate::core::diag::LEVEL_SUMMARY;
use crate::core::Diagnostics;
use crate::error::{ExecError, LoadError};
use crate::vm::{Args, Flow, Host, Operand};

/// One selectable game or variant.
#[derive(Clone, Debug)]
pub struct MenuEntry {
    pub title: String,
    pub thumbnail: Option<String>,
    pub default: bool,
    pub variant: bool,
    pub game: Arc<GameDef>,
}

/// Ordered list of menu entries.
#[derive(Clone, Debug, Default)]
pub struct Menu {
    entries: Vec<MenuEntry>,
}

impl Menu {
    #[must_use]
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MenuEntry> {
        self.entries.get(index)
    }

    /// First entry flagged `default`, otherwise the first entry.
    #[must_use]
    pub fn default_index(&self) -> usize {
        self.entries.iter().position(|e| e.default).unwrap_or(0)
    }
}

#[derive(Default)]
struct MenuHost {
    games: Vec<(BlockId, bool)>,
}

impl Host for MenuHost {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        match op {
            Op::Game => self.games.push((args.block(0)?, false)),
            Op::Variant => self.games.push((args.block(0)?, true)),
            other => {
                return Err(ExecError::Unsupported {
                    op: other.name(),
                    context: "menu",
                })
            }
        }
        Ok(Flow::Continue)
    }
}

/// Run a compiled program's menu block and build every game it declares.
pub fn build_menu(program: Arc<Program>, diag: Diagnostics) -> Result<Menu, LoadError> {
    let mut host = MenuHost::default();
    run_block(&program, diag, program.entry(), &mut host)?;

    let mut entries = Vec::with_capacity(host.games.len());
    for (block, variant) in host.games {
        let game = GameBuilder::new(&program, diag).build(block, variant)?;
        entries.push(MenuEntry {
            title: game.title.clone(),
            thumbnail: game.thumbnail.clone(),
            default: game.default,
            variant,
            game: Arc::new(game),
        });
    }
    if entries.is_empty() {
        return Err(LoadError::definition("program declares no games"));
    }
    if diag.enabled(LEVEL_SUMMARY) {
        tracing::info!(entries = entries.len(), "menu built");
    }
    Ok(Menu { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::load_program;
    use crate::core::EngineConfig;
    use crate::lang::preprocess::MemoryLoader;

    fn menu(text: &str) -> Result<Menu, LoadError> {
        let loader = MemoryLoader::new().with_file("m.zrf", text);
        let mut diag = Diagnostics::quiet();
        let program = load_program(&loader, "m.zrf", &EngineConfig::default(), &mut diag)?;
        build_menu(Arc::new(program), diag)
    }

    #[test]
    fn test_variants_follow_base() {
        let menu = menu(
            r#"
            (game (title "Base") (players A B))
            (variant (title "Fast"))
            (variant (title "Slow") (default))
            "#,
        )
        .unwrap();
        let titles: Vec<&str> = menu.entries().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Base", "Fast", "Slow"]);
        assert!(!menu.entries()[0].variant);
        assert!(menu.entries()[1].variant);
        assert_eq!(menu.entries()[1].game.players.len(), 2);
        assert_eq!(menu.default_index(), 2);
    }

    #[test]
    fn test_default_index_falls_back_to_first() {
        let menu = menu("(game (title \"Only\") (players A))").unwrap();
        assert_eq!(menu.len(), 1);
        assert_eq!(menu.default_index(), 0);
    }

    #[test]
    fn test_empty_program_is_rejected() {
        assert!(menu("; nothing here\n").is_err());
    }
}
