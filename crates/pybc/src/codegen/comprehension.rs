//! Comprehension Codegen (spec.md §4.9).
//!
//! The teacher has no comprehensions at all; this is new functionality
//! grounded directly in spec.md's two-path description. `symtable.rs`
//! computes `inlineable_comprehension` per the CPython rule (enclosing
//! scope is a function, not async, not a generator expression, no bound
//! name collides with an already-live cell/free variable), so either path
//! below may run depending on the comprehension's shape.

use ruff_python_ast as ast;
use ruff_python_ast::Expr;

use crate::diagnostic::Span;
use crate::error::{Error, Result};
use crate::nameres::Ctx;
use crate::op::Op;
use crate::symtable::ScopeAnalysis;
use crate::unit::ScopeKind;

use super::Compiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompKind {
    List,
    Set,
    Dict,
    Generator,
}

struct CompParts<'a> {
    kind: CompKind,
    elt: &'a Expr,
    value: Option<&'a Expr>,
    generators: &'a [ast::Comprehension],
}

impl Compiler {
    pub fn compile_comprehension(&mut self, expr: &Expr, span: Span) -> Result<()> {
        let parts = match expr {
            Expr::ListComp(c) => CompParts {
                kind: CompKind::List,
                elt: &c.elt,
                value: None,
                generators: &c.generators,
            },
            Expr::SetComp(c) => CompParts {
                kind: CompKind::Set,
                elt: &c.elt,
                value: None,
                generators: &c.generators,
            },
            Expr::DictComp(c) => CompParts {
                kind: CompKind::Dict,
                elt: &c.key,
                value: Some(&c.value),
                generators: &c.generators,
            },
            Expr::Generator(c) => CompParts {
                kind: CompKind::Generator,
                elt: &c.elt,
                value: None,
                generators: &c.generators,
            },
            _ => return Err(Error::Internal("not a comprehension expr".into())),
        };

        let scope_id = self.next_child_scope();
        let first_gen = parts
            .generators
            .first()
            .ok_or_else(|| Error::Internal("comprehension with no generators".into()))?;

        if self.symbols.is_inlineable_comprehension(scope_id) {
            self.compile_inlined(&parts, first_gen, scope_id, span)
        } else {
            self.compile_lifted(&parts, first_gen, scope_id, span)
        }
    }

    fn compile_lifted(
        &mut self,
        parts: &CompParts,
        first_gen: &ast::Comprehension,
        scope_id: crate::symtable::ScopeId,
        span: Span,
    ) -> Result<()> {
        // The outermost iterable is evaluated in the enclosing scope
        // (spec.md §4.9), then swapped under the freshly-made function
        // below so it can be passed as its sole argument.
        self.compile_expr(&first_gen.iter)?;

        let name = comp_name(parts.kind);
        self.enter_scope(ScopeKind::Comprehension, name, scope_id, 0);
        self.units.current_mut().meta.arg_count = 1;
        self.units.current_mut().meta.posonly_count = 1;
        let dot0 = self.units.current_mut().meta.varnames.intern(".0");

        match parts.kind {
            CompKind::List => self.emit(Op::BuildList(0), Span::artificial()),
            CompKind::Set => self.emit(Op::BuildSet(0), Span::artificial()),
            CompKind::Dict => self.emit(Op::BuildMap(0), Span::artificial()),
            CompKind::Generator => {}
        }

        self.emit(Op::LoadFast(dot0), Span::artificial());
        self.emit_nested_loop(parts, 0, parts.kind, span)?;

        self.emit(Op::ReturnValue, Span::artificial());

        let code = self.units.pop().expect("compile_lifted on empty stack");
        let mut flags = crate::assemble::CodeFlags::NEWLOCALS | crate::assemble::CodeFlags::OPTIMIZED;
        if parts.kind == CompKind::Generator {
            flags |= crate::assemble::CodeFlags::GENERATOR;
        }
        let code = crate::assemble::assemble(&code.seq, code.meta, flags)?;

        let mut pushed = super::closure::PushedAttrs::default();
        pushed.closure = self.emit_closure_tuple(&code, span);
        self.make_function(code, pushed, span);

        // The outermost iterable is already on the enclosing stack (from
        // `compile_comprehension`); swap it under the freshly-made function
        // and call it with one argument.
        self.emit(Op::Swap(2), span);
        let is_async = parts
            .generators
            .iter()
            .any(|g| g.is_async);
        self.emit(Op::Call(1), span);
        if is_async {
            self.emit(Op::GetAwaitable, span);
            self.emit(Op::YieldFromNone, span);
        }
        Ok(())
    }

    /// Recursively emit one nested `for`/`if` level, bottoming out in the
    /// append/yield at `depth == generators.len()`.
    fn emit_nested_loop(
        &mut self,
        parts: &CompParts,
        depth: usize,
        kind: CompKind,
        span: Span,
    ) -> Result<()> {
        if depth == parts.generators.len() {
            return self.emit_comp_body(parts, kind, span);
        }

        let gen = &parts.generators[depth];
        if depth > 0 {
            self.compile_expr(&gen.iter)?;
        }
        if gen.is_async {
            self.emit(Op::GetAIter, span);
        } else {
            self.emit(Op::GetIter, span);
        }

        let start = self.new_label();
        let cleanup = self.new_label();
        let end = self.new_label();
        self.place_label(start)?;

        if gen.is_async {
            self.emit(Op::GetANext, span);
            self.emit(Op::YieldFromNone, span);
        } else {
            self.emit_jump(Op::ForIter, cleanup, span);
        }
        self.compile_store_target(&gen.target)?;

        for cond in &gen.ifs {
            self.jump_if_false(cond, start)?;
        }

        self.emit_nested_loop(parts, depth + 1, kind, span)?;
        self.emit_jump(Op::Jump, start, span);

        self.place_label(cleanup)?;
        if gen.is_async {
            self.emit(Op::EndAsyncFor, span);
        } else {
            self.emit(Op::EndFor, span);
            self.emit(Op::Pop, span);
        }
        self.place_label(end)?;
        Ok(())
    }

    fn emit_comp_body(&mut self, parts: &CompParts, kind: CompKind, span: Span) -> Result<()> {
        match kind {
            CompKind::List => {
                self.compile_expr(parts.elt)?;
                self.emit(Op::ListAppend, span);
            }
            CompKind::Set => {
                self.compile_expr(parts.elt)?;
                self.emit(Op::SetAdd, span);
            }
            CompKind::Dict => {
                self.compile_expr(parts.elt)?;
                let value = parts
                    .value
                    .ok_or_else(|| Error::Internal("dict comprehension missing value".into()))?;
                self.compile_expr(value)?;
                self.emit(Op::MapAdd, span);
            }
            CompKind::Generator => {
                self.compile_expr(parts.elt)?;
                self.emit(Op::Yield, span);
                self.emit(Op::Pop, span);
            }
        }
        Ok(())
    }

    /// Inlined path (spec.md §4.9): executes in the enclosing frame rather
    /// than a nested code object. Stashes locally-bound comprehension names
    /// via `LOAD_FAST_AND_CLEAR`, marks them fast-hidden so
    /// [`crate::nameres::resolve`] skips them in the enclosing scope for the
    /// comprehension's duration, then restores them afterward.
    fn compile_inlined(
        &mut self,
        parts: &CompParts,
        first_gen: &ast::Comprehension,
        scope_id: crate::symtable::ScopeId,
        span: Span,
    ) -> Result<()> {
        let bound = self.symbols.bound_names(scope_id);
        let mut stashed = Vec::new();
        for name in &bound {
            let idx = self.units.current_mut().meta.varnames.intern(name);
            self.units.current_mut().meta.hide_fast(name);
            stashed.push((name.clone(), idx));
            self.emit(Op::LoadFastAndClear(idx), Span::artificial());
        }

        // Stack is now [..stashed.., acc, iterable] going into the loop, so
        // the restore below can swap each stash up from under the result.
        match parts.kind {
            CompKind::List => self.emit(Op::BuildList(0), Span::artificial()),
            CompKind::Set => self.emit(Op::BuildSet(0), Span::artificial()),
            CompKind::Dict => self.emit(Op::BuildMap(0), Span::artificial()),
            CompKind::Generator => {}
        }
        self.compile_expr(&first_gen.iter)?;

        self.emit_nested_loop(parts, 0, parts.kind, span)?;

        for (name, idx) in stashed.iter().rev() {
            self.emit(Op::Swap(2), span);
            self.emit(Op::StoreFastMaybeNull(*idx), Span::artificial());
            self.units.current_mut().meta.unhide_fast(name);
        }
        Ok(())
    }
}

fn comp_name(kind: CompKind) -> &'static str {
    match kind {
        CompKind::List => "<listcomp>",
        CompKind::Set => "<setcomp>",
        CompKind::Dict => "<dictcomp>",
        CompKind::Generator => "<genexpr>",
    }
}
