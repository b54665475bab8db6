//! Name Resolver (spec.md §4.4): `nameop(name, ctx)`.
//!
//! Generalizes the teacher's `compile_store_target`/name-load dispatch
//! (`compiler.rs`, which only ever emits `LoadName`/`StoreName` since the
//! teacher's subset has no closures or class scopes) into the full
//! four-family classification spec.md's table describes, consulting
//! [`crate::symtable::ScopeAnalysis`] instead of guessing from syntax alone.

use crate::op::{NameFamily, Op};
use crate::symtable::{Binding, ScopeAnalysis, ScopeId};
use crate::unit::{CompilationUnit, UnitMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctx {
    Load,
    Store,
    Delete,
}

/// Mangle `name` per spec.md §4.4 step 1: a dunder-prefixed, non-dunder-
/// suffixed identifier inside a class (or a scope whose `private` is
/// inherited from one) becomes `_<ClassName><name>`, leading underscores of
/// the class name stripped.
pub fn mangle(name: &str, private: Option<&str>) -> String {
    let Some(class_name) = private else {
        return name.to_string();
    };
    if !name.starts_with("__") || name.ends_with("__") {
        return name.to_string();
    }
    let stripped = class_name.trim_start_matches('_');
    if stripped.is_empty() {
        return name.to_string();
    }
    format!("_{stripped}{name}")
}

fn family_for(binding: Binding, function_like: bool, fast_hidden: bool) -> NameFamily {
    match binding {
        Binding::Free | Binding::Cell => NameFamily::Deref,
        Binding::Local if function_like && !fast_hidden => NameFamily::Fast,
        Binding::Local => NameFamily::NameLookup,
        Binding::GlobalImplicit if function_like => NameFamily::Global,
        Binding::GlobalImplicit => NameFamily::NameLookup,
        Binding::GlobalExplicit => NameFamily::Global,
        Binding::Unknown => NameFamily::NameLookup,
    }
}

/// Resolve `(name, ctx)` against `scope_id`'s classification and emit the
/// corresponding opcode into `unit`'s table-allocation bookkeeping, per
/// spec.md §4.4 steps 2-5. Returns the `Op` to emit; callers still push it
/// onto the active [`crate::instr_seq::InstrSeq`] along with its span.
pub fn resolve(
    analysis: &dyn ScopeAnalysis,
    scope_id: ScopeId,
    unit: &mut CompilationUnit,
    raw_name: &str,
    ctx: Ctx,
) -> Op {
    let mangled = mangle(raw_name, unit.private.as_deref());
    let binding = analysis.classify(scope_id, &mangled);
    let function_like = unit.kind.is_function_like();
    let fast_hidden = unit.meta.is_fast_hidden(&mangled);
    let family = family_for(binding, function_like, fast_hidden);

    match family {
        NameFamily::Fast => {
            let idx = unit.meta.varnames.intern(&mangled);
            match ctx {
                Ctx::Load => Op::LoadFast(idx),
                Ctx::Store => Op::StoreFast(idx),
                Ctx::Delete => Op::DeleteFast(idx),
            }
        }
        NameFamily::Deref => {
            let idx = deref_index(&mut unit.meta, &mangled, binding);
            if unit.kind == crate::unit::ScopeKind::Class {
                match ctx {
                    Ctx::Load => return Op::LoadClassDeref(idx),
                    _ => {}
                }
            }
            match ctx {
                Ctx::Load => Op::LoadDeref(idx),
                Ctx::Store => Op::StoreDeref(idx),
                Ctx::Delete => Op::DeleteDeref(idx),
            }
        }
        NameFamily::Global => {
            let idx = unit.meta.names.intern(&mangled);
            if unit.kind == crate::unit::ScopeKind::Class && ctx == Ctx::Load {
                return Op::LoadClassGlobal(idx);
            }
            match ctx {
                Ctx::Load => Op::LoadGlobal(idx),
                Ctx::Store => Op::StoreGlobal(idx),
                Ctx::Delete => Op::DeleteGlobal(idx),
            }
        }
        NameFamily::NameLookup => {
            let idx = unit.meta.names.intern(&mangled);
            match ctx {
                Ctx::Load => Op::LoadName(idx),
                Ctx::Store => Op::StoreName(idx),
                Ctx::Delete => Op::DeleteName(idx),
            }
        }
    }
}

/// `cellvars` and `freevars` share one logical index space at the VM level
/// (cellvars first, then freevars, per CPython's own layout) but are kept
/// as two separate `Vec`s here for clarity; this computes the combined
/// deref index spec.md's opcodes expect.
fn deref_index(meta: &mut UnitMetadata, name: &str, binding: Binding) -> u32 {
    if binding == Binding::Cell {
        if let Some(pos) = meta.cellvars.iter().position(|n| n == name) {
            return pos as u32;
        }
        meta.cellvars.push(name.to_string());
        (meta.cellvars.len() - 1) as u32
    } else {
        if let Some(pos) = meta.freevars.iter().position(|n| n == name) {
            return (meta.cellvars.len() + pos) as u32;
        }
        meta.freevars.push(name.to_string());
        (meta.cellvars.len() + meta.freevars.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_dunder_names_in_class() {
        assert_eq!(mangle("__secret", Some("Foo")), "_Foo__secret");
        assert_eq!(mangle("__secret", Some("__Foo")), "_Foo__secret");
        assert_eq!(mangle("__secret__", Some("Foo")), "__secret__");
        assert_eq!(mangle("plain", Some("Foo")), "plain");
    }

    #[test]
    fn no_mangling_outside_class() {
        assert_eq!(mangle("__secret", None), "__secret");
    }

    #[test]
    fn family_classification_matches_table() {
        assert_eq!(family_for(Binding::Free, true, false), NameFamily::Deref);
        assert_eq!(family_for(Binding::Cell, false, false), NameFamily::Deref);
        assert_eq!(family_for(Binding::Local, true, false), NameFamily::Fast);
        assert_eq!(
            family_for(Binding::Local, true, true),
            NameFamily::NameLookup
        );
        assert_eq!(
            family_for(Binding::Local, false, false),
            NameFamily::NameLookup
        );
        assert_eq!(
            family_for(Binding::GlobalImplicit, true, false),
            NameFamily::Global
        );
        assert_eq!(
            family_for(Binding::GlobalImplicit, false, false),
            NameFamily::NameLookup
        );
        assert_eq!(
            family_for(Binding::GlobalExplicit, false, false),
            NameFamily::Global
        );
        assert_eq!(
            family_for(Binding::Unknown, true, false),
            NameFamily::NameLookup
        );
    }
}
