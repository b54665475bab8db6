//! Minimal assembler: label resolution + code-object construction.
//!
//! spec.md places CFG construction, peephole optimization, and final
//! assembly out of scope, as external collaborators (§1, §6). This module
//! is the thin, deliberately non-optimizing stand-in described in
//! SPEC_FULL.md §6: it resolves [`crate::instr_seq::InstrSeq`] labels to
//! instruction offsets and packages the unit's metadata into a
//! [`CodeObject`], and does nothing else — no dead-code elimination, no
//! jump-threading, matching the Non-goal "optimizing generated bytecode".

use std::rc::Rc;

use bitflags::bitflags;

use crate::constant::ConstValue;
use crate::diagnostic::Span;
use crate::error::Result;
use crate::instr_seq::InstrSeq;
use crate::op::Op;
use crate::unit::UnitMetadata;

bitflags! {
    /// Code flags on the produced code object, spec.md §6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct CodeFlags: u32 {
        const NEWLOCALS      = 1 << 0;
        const OPTIMIZED      = 1 << 1;
        const NESTED         = 1 << 2;
        const GENERATOR      = 1 << 3;
        const COROUTINE      = 1 << 4;
        const ASYNC_GENERATOR = 1 << 5;
        const VARARGS        = 1 << 6;
        const VARKEYWORDS    = 1 << 7;
    }
}

/// The assembled artifact handed back to the caller (spec.md §6 "Outputs").
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CodeObject {
    pub name: String,
    pub qualname: String,
    pub first_line: u32,
    pub arg_count: u32,
    pub posonly_count: u32,
    pub kwonly_count: u32,
    pub flags: CodeFlags,

    pub consts: Vec<ConstValue>,
    pub names: Vec<String>,
    pub varnames: Vec<String>,
    pub cellvars: Vec<String>,
    pub freevars: Vec<String>,

    pub instructions: Vec<Op>,
    pub spans: Vec<Span>,
}

#[cfg(feature = "serde")]
impl CodeObject {
    /// Dump this code object as JSON, for tooling that wants to inspect a
    /// compiled unit outside the process (debug dumps, golden-file tests).
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl PartialEq for CodeObject {
    fn eq(&self, other: &Self) -> bool {
        // Code objects are compared by identity at the constant-pool level
        // (see `constant::ConstKey::Code`); structural equality is only
        // used by tests, so a name+qualname match is sufficient there.
        self.name == other.name && self.qualname == other.qualname
    }
}

/// Turn a finished unit (its instruction sequence + metadata) into a
/// [`CodeObject`], resolving every label to a concrete instruction offset.
pub fn assemble(seq: &InstrSeq, meta: UnitMetadata, flags: CodeFlags) -> Result<Rc<CodeObject>> {
    let resolved = seq.resolve_labels()?;
    let mut instructions = Vec::with_capacity(resolved.len());
    let mut spans = Vec::with_capacity(resolved.len());
    for instr in resolved {
        instructions.push(instr.op);
        spans.push(instr.span);
    }

    Ok(Rc::new(CodeObject {
        name: meta.name,
        qualname: meta.qualname,
        first_line: meta.first_line,
        arg_count: meta.arg_count,
        posonly_count: meta.posonly_count,
        kwonly_count: meta.kwonly_count,
        flags,
        consts: meta.consts.into_values(),
        names: meta.names.into_keys(),
        varnames: meta.varnames.into_keys(),
        cellvars: meta.cellvars,
        freevars: meta.freevars,
        instructions,
        spans,
    }))
}
