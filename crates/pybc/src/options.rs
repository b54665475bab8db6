//! Compiler configuration (spec.md §6 "Inputs").
//!
//! Mirrors the teacher's small config-struct pattern (see `sandbox::Limits`
//! in `examples/chonkie-inc-littrs/crates/littrs/src/sandbox.rs`): a plain
//! `Default`-able struct passed by value.

/// Optimization level, spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizeLevel {
    /// Level 0: nothing is stripped.
    #[default]
    None,
    /// Level 1: `assert` statements compile to no bytecode.
    StripAsserts,
    /// Level 2: level 1, plus docstrings compile to no constant.
    StripDocstrings,
}

impl OptimizeLevel {
    pub fn from_u8(level: u8) -> Self {
        match level {
            0 => OptimizeLevel::None,
            1 => OptimizeLevel::StripAsserts,
            _ => OptimizeLevel::StripDocstrings,
        }
    }

    pub fn strips_asserts(self) -> bool {
        !matches!(self, OptimizeLevel::None)
    }

    pub fn strips_docstrings(self) -> bool {
        matches!(self, OptimizeLevel::StripDocstrings)
    }
}

/// Future-feature bits recognized from `from __future__ import ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FutureFlags {
    /// PEP 563 / PEP 649 deferred annotations: when true, annotation
    /// expressions are evaluated eagerly instead of wrapped in `__annotate__`.
    pub annotations: bool,
}

/// Top-level compiler inputs beyond the AST itself.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub filename: String,
    pub future: FutureFlags,
    pub optimize: OptimizeLevel,
    /// Whether top-level `await` is permitted (interactive/REPL-like hosts).
    pub allow_top_level_await: bool,
    /// Whether this is an interactive compile (affects the implicit result
    /// of the last top-level expression statement).
    pub interactive: bool,
    /// Promote [`crate::error::CodegenWarning`]s to hard errors.
    pub warnings_as_errors: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            filename: "<string>".to_string(),
            future: FutureFlags::default(),
            optimize: OptimizeLevel::None,
            allow_top_level_await: false,
            interactive: false,
            warnings_as_errors: false,
        }
    }
}
