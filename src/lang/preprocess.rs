//! Directive pass: `#include`, `#noisy`, `#stop`.
//!
//! Runs after tokenizing and before parsing. Directives act immediately and
//! are removed from the stream:
//!
//! - `#include "path"` splices the included file's (already preprocessed)
//!   tokens in place of the directive.
//! - `#noisy n` sets the diagnostics level for the rest of the load
//!   (`#noisy` alone means level 1).
//! - `#stop` discards everything after it, including the remainder of any
//!   file that included the current one.
//!
//! Files are read through a [`SourceLoader`], so tests can run entirely in
//! memory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::lexer::tokenize;
use super::token::{Token, TokenKind};
use crate::core::{Diagnostics, EngineConfig};
use crate::core::diag::LEVEL_SUMMARY;
use crate::error::{LexDiagnostic, LoadError, SourcePos};

/// Source of program text for the top-level file and its includes.
pub trait SourceLoader {
    /// Read `path` as included from the file `from` (`None` for the
    /// top-level file). Returns the resolved path and its contents.
    fn load(&self, path: &str, from: Option<&Path>) -> io::Result<(PathBuf, String)>;
}

/// Reads files from disk.
///
/// Include paths resolve against the including file's directory first, then
/// each configured include directory, then the working directory.
#[derive(Clone, Debug, Default)]
pub struct FsLoader {
    include_dirs: Vec<PathBuf>,
}

impl FsLoader {
    #[must_use]
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str, from: Option<&Path>) -> io::Result<(PathBuf, String)> {
        let relative = Path::new(path);
        let candidates = from
            .and_then(Path::parent)
            .map(|dir| dir.join(relative))
            .into_iter()
            .chain(self.include_dirs.iter().map(|dir| dir.join(relative)))
            .chain(std::iter::once(relative.to_path_buf()));

        for candidate in candidates {
            if candidate.is_file() {
                let text = std::fs::read_to_string(&candidate)?;
                return Ok((candidate, text));
            }
        }
        Err(io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")))
    }
}

/// In-memory file set, keyed by the exact include path.
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    files: FxHashMap<String, String>,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(name.into(), text.into());
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str, _from: Option<&Path>) -> io::Result<(PathBuf, String)> {
        self.files
            .get(path)
            .map(|text| (PathBuf::from(path), text.clone()))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")))
    }
}

/// Tokenize and preprocess one program.
///
/// Every lexical error from every file is collected; if there are any, the
/// load fails with all of them.
pub fn load_tokens(
    loader: &dyn SourceLoader,
    path: &str,
    config: &EngineConfig,
    diag: &mut Diagnostics,
) -> Result<Vec<Token>, LoadError> {
    let (resolved, text) = loader.load(path, None).map_err(|source| LoadError::Include {
        path: PathBuf::from(path),
        source,
    })?;
    preprocess_source(loader, &resolved, &text, config, diag)
}

/// Tokenize and preprocess text that is already in memory.
pub fn preprocess_source(
    loader: &dyn SourceLoader,
    name: &Path,
    text: &str,
    config: &EngineConfig,
    diag: &mut Diagnostics,
) -> Result<Vec<Token>, LoadError> {
    let mut pass = Preprocessor {
        loader,
        max_depth: config.max_include_depth,
        diag,
        errors: Vec::new(),
        stopped: false,
    };
    let tokens = pass.file(name, text, 0)?;
    if !pass.errors.is_empty() {
        return Err(LoadError::Lexical { errors: pass.errors });
    }
    if pass.diag.enabled(LEVEL_SUMMARY) {
        tracing::debug!(file = %name.display(), tokens = tokens.len(), "preprocessed");
    }
    Ok(tokens)
}

struct Preprocessor<'a> {
    loader: &'a dyn SourceLoader,
    max_depth: usize,
    diag: &'a mut Diagnostics,
    errors: Vec<LexDiagnostic>,
    stopped: bool,
}

impl Preprocessor<'_> {
    fn file(&mut self, path: &Path, text: &str, depth: usize) -> Result<Vec<Token>, LoadError> {
        let file: Arc<str> = Arc::from(path.display().to_string());
        let lexed = tokenize(text, &file);
        self.errors.extend(lexed.errors);

        let mut out = Vec::with_capacity(lexed.tokens.len());
        for token in lexed.tokens {
            let TokenKind::Directive { name, rest } = &token.kind else {
                out.push(token);
                continue;
            };
            match name.as_str() {
                "include" => {
                    let target = rest.trim().trim_matches('"');
                    if depth >= self.max_depth {
                        return Err(LoadError::syntax(
                            &token.pos,
                            format!("#include nested deeper than {}", self.max_depth),
                        ));
                    }
                    let (resolved, included) =
                        self.loader
                            .load(target, Some(path))
                            .map_err(|source| LoadError::Include {
                                path: PathBuf::from(target),
                                source,
                            })?;
                    out.extend(self.file(&resolved, &included, depth + 1)?);
                }
                "noisy" => match parse_level(rest) {
                    Some(level) => self.diag.set_level(level),
                    None => self.error(&token.pos, format!("invalid #noisy level {rest:?}")),
                },
                "stop" => self.stopped = true,
                other => self.error(&token.pos, format!("unknown directive #{other}")),
            }
            if self.stopped {
                break;
            }
        }
        Ok(out)
    }

    fn error(&mut self, pos: &SourcePos, message: String) {
        tracing::warn!(%pos, %message, "bad directive");
        self.errors.push(LexDiagnostic {
            pos: pos.clone(),
            message,
        });
    }
}

fn parse_level(rest: &str) -> Option<u8> {
    let rest = rest.trim();
    if rest.is_empty() {
        Some(LEVEL_SUMMARY)
    } else {
        rest.parse().ok()
    }
}
