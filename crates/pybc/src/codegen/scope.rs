//! Scope-Transition Driver (spec.md §4.3).
//!
//! Generalizes the teacher's by-hand `sub_compiler` construction in
//! `compile_function_def`/`compile_lambda` (`compiler.rs`) — which builds a
//! brand new `Compiler`, recurses, then folds the produced `CodeObject`
//! into `self.code.functions` — into `enter_scope`/`exit_scope`/
//! `produce_code_object` operating on the shared [`crate::unit::UnitStack`].

use crate::assemble::{self, CodeFlags, CodeObject};
use crate::constant::ConstValue;
use crate::diagnostic::Span;
use crate::error::Result;
use crate::op::Op;
use crate::symtable::{ScopeAnalysis, ScopeId};
use crate::unit::{CompilationUnit, ScopeKind, UnitMetadata};

use super::Compiler;

impl Compiler {
    /// Push a fresh unit for `kind`, becoming the new current unit (spec.md
    /// §4.3 `enter_scope`).
    pub fn enter_scope(&mut self, kind: ScopeKind, name: &str, scope_id: ScopeId, first_line: u32) {
        let qualname = self.compute_qualname(kind, name);
        let private = match kind {
            ScopeKind::Class => Some(name.to_string()),
            _ => self.units.all().last().and_then(|u| u.private.clone()),
        };

        let mut meta = UnitMetadata::new(name.to_string(), qualname, first_line);
        self.seed_cell_and_free_vars(scope_id, &mut meta, kind);

        if kind == ScopeKind::Class {
            meta.static_attributes = Some(Vec::new());
        }

        let mut unit = CompilationUnit::new(kind, meta, private, scope_id);
        unit.is_generator = self.symbols.is_generator(scope_id);
        unit.is_coroutine = self.symbols.is_coroutine(scope_id);
        unit.is_async_generator = self.symbols.is_async_generator(scope_id);

        self.units.push(unit);
        self.emit(Op::ResumeAtFuncStart, Span::artificial());
    }

    fn seed_cell_and_free_vars(&self, scope_id: ScopeId, meta: &mut UnitMetadata, kind: ScopeKind) {
        // Cellvars/freevars are discovered lazily as `nameres::resolve` runs
        // into FREE/CELL-classified names (see `nameres::deref_index`), so
        // this only injects the implicit cells classes may need up front.
        if kind == ScopeKind::Class {
            let _ = scope_id;
            meta.cellvars.push("__class__".to_string());
        }
    }

    fn compute_qualname(&self, kind: ScopeKind, name: &str) -> String {
        // Annotation and type-param scopes are transparent to qualname
        // construction (spec.md §4.3: "skip annotation parents
        // transparently").
        let parent = self
            .units
            .all()
            .iter()
            .rev()
            .find(|u| !matches!(u.kind, ScopeKind::Annotation | ScopeKind::TypeParams));

        match parent {
            None => name.to_string(),
            Some(parent) if parent.kind.is_function_like() && parent.kind != ScopeKind::Comprehension => {
                format!("{}.<locals>.{}", parent.meta.qualname, name)
            }
            Some(parent) => format!("{}.{}", parent.meta.qualname, name),
        }
    }

    /// Pop the current unit and assemble it into a [`CodeObject`] (spec.md
    /// §4.3 `produce_code_object` + `exit_scope`).
    pub fn produce_code_object(&mut self, add_trailing_none: bool) -> Result<std::rc::Rc<CodeObject>> {
        if add_trailing_none {
            self.load_const(ConstValue::None, Span::artificial());
        }
        self.emit(Op::ReturnValue, Span::artificial());

        let unit = self.units.pop().expect("produce_code_object on empty stack");
        let flags = self.code_flags(&unit);
        assemble::assemble(&unit.seq, unit.meta, flags)
    }

    fn code_flags(&self, unit: &CompilationUnit) -> CodeFlags {
        let mut flags = CodeFlags::empty();
        if unit.kind.is_function_like() {
            flags |= CodeFlags::NEWLOCALS | CodeFlags::OPTIMIZED;
        }
        if self.units.depth() > 0 {
            flags |= CodeFlags::NESTED;
        }
        if unit.is_generator && !unit.is_coroutine {
            flags |= CodeFlags::GENERATOR;
        }
        if unit.is_coroutine && !unit.is_generator {
            flags |= CodeFlags::COROUTINE;
        }
        if unit.is_async_generator {
            flags |= CodeFlags::ASYNC_GENERATOR;
        }
        if unit.has_varargs {
            flags |= CodeFlags::VARARGS;
        }
        if unit.has_varkeywords {
            flags |= CodeFlags::VARKEYWORDS;
        }
        flags
    }

    /// Load the just-produced child as a constant and wrap it per spec.md
    /// §4.12, returning control to the caller to finish with
    /// `MAKE_FUNCTION`/closure attributes.
    pub fn load_code_constant(&mut self, code: std::rc::Rc<CodeObject>, span: Span) {
        self.load_const(ConstValue::Code(code), span);
    }
}
