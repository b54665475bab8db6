//! Error kinds produced by the code generator.
//!
//! Mirrors spec.md §7: codegen-rule violations become [`Error::CodegenSyntax`],
//! promotable warnings become [`Error::Warning`], internal invariant failures
//! become [`Error::Internal`]. A thin `Error::Parse` covers the upstream
//! parser, which is not itself part of the code generator but is the only
//! way `compile(source)` can fail before codegen ever runs.

use thiserror::Error;

use crate::diagnostic::Span;

/// A code-generation-time warning (spec.md §7's `SyntaxWarning` kind).
///
/// These never abort compilation on their own; [`crate::options::CompileOptions::warnings_as_errors`]
/// controls whether they are promoted to [`Error::CodegenSyntax`] in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenWarning {
    /// `x is "literal"` — identity comparison against a literal.
    IdentityWithLiteral,
    /// `42(...)` — calling a non-callable literal.
    CallOnLiteral,
    /// `42[...]` — subscripting a non-subscriptable literal.
    SubscriptOnLiteral,
    /// `[1, 2][1.0]` — subscripting with a literal of the wrong index type.
    SubscriptWrongIndexType,
    /// `assert (1, 2)` — an assert whose test is a non-empty tuple literal (always true).
    AssertOnTuple,
}

impl CodegenWarning {
    pub fn message(&self) -> &'static str {
        match self {
            CodegenWarning::IdentityWithLiteral => {
                "\"is\" with a literal. Did you mean \"==\"?"
            }
            CodegenWarning::CallOnLiteral => "calling a literal, which is never callable",
            CodegenWarning::SubscriptOnLiteral => "subscripting a literal that is not subscriptable",
            CodegenWarning::SubscriptWrongIndexType => {
                "subscripting a sequence with a non-integer literal"
            }
            CodegenWarning::AssertOnTuple => {
                "assertion is always true, perhaps remove parentheses?"
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    /// A code-generation rule violation: `return` outside a function,
    /// `break`/`continue` outside a loop, duplicate pattern capture, etc.
    #[error("{0}")]
    CodegenSyntax(String, Span),

    /// A warning promoted to a hard error by [`crate::options::CompileOptions::warnings_as_errors`].
    #[error("{}", .0.message())]
    Warning(CodegenWarning),

    /// An internal invariant failure: unknown scope, unknown node kind,
    /// missing symbol-table entry. These indicate a bug in `pybc` itself.
    #[error("internal compiler error: {0}")]
    Internal(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::CodegenSyntax(_, span) => Some(*span),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
