//! Deferred Annotations, PEP 649 (spec.md §4.10).
//!
//! No analog in the teacher (`compiler.rs` has no annotation support at
//! all); grounded directly in spec.md's own description since this is new
//! functionality rather than a generalization of existing teacher code.

use ruff_python_ast as ast;

use crate::constant::ConstValue;
use crate::diagnostic::Span;
use crate::error::Result;
use crate::nameres::Ctx;
use crate::op::Op;
use crate::unit::ScopeKind;

use super::closure::PushedAttrs;
use super::Compiler;

impl Compiler {
    /// Push a function's eager annotation map (or nothing) and the
    /// `__annotate__` closure, setting the matching [`PushedAttrs`] bits.
    pub fn emit_annotations_if_any(
        &mut self,
        params: &ast::Parameters,
        returns: &Option<Box<ast::Expr>>,
        span: Span,
        pushed: &mut PushedAttrs,
    ) -> Result<()> {
        let mut annotated: Vec<(String, ast::Expr, bool)> = Vec::new();
        for param in params.iter() {
            if let Some(ann) = param.annotation() {
                annotated.push((param.name().to_string(), ann.clone(), false));
            }
        }
        if let Some(vararg) = &params.vararg {
            if let Some(ann) = &vararg.annotation {
                annotated.push((vararg.name.to_string(), (**ann).clone(), true));
            }
        }
        if let Some(kwarg) = &params.kwarg {
            if let Some(ann) = &kwarg.annotation {
                annotated.push((kwarg.name.to_string(), (**ann).clone(), false));
            }
        }
        if let Some(ret) = returns {
            annotated.push(("return".to_string(), (**ret).clone(), false));
        }

        if annotated.is_empty() {
            return Ok(());
        }

        if self.options.future.annotations {
            // Eager evaluation still goes through the same deferred-list
            // machinery so `emit_deferred_annotations` has one code path;
            // the enclosing scope's `__annotate__` is produced immediately
            // rather than postponed.
            for (name, expr, starred) in annotated {
                self.units
                    .current_mut()
                    .meta
                    .deferred_annotations
                    .push(crate::unit::DeferredAnnotation {
                        target_name: name,
                        expr,
                        starred,
                    });
            }
            self.emit_deferred_annotations(Span::artificial())?;
            pushed.annotations = true;
            return Ok(());
        }

        for (name, expr, starred) in annotated {
            self.units
                .current_mut()
                .meta
                .deferred_annotations
                .push(crate::unit::DeferredAnnotation {
                    target_name: name,
                    expr,
                    starred,
                });
        }
        if let Some(code) = self.produce_annotate_scope(span)? {
            self.load_code_constant(code, span);
            self.emit(Op::MakeFunction, span);
            pushed.annotate = true;
        }
        Ok(())
    }

    /// Drain the current unit's `deferred_annotations` into a direct
    /// annotations dict, pushed and popped immediately — used by
    /// `from __future__ import annotations` eager mode, where there's
    /// nothing to defer, and by a function body's own local annotated
    /// assignments, which never get a `__annotate__` closure of their own.
    pub fn emit_deferred_annotations(&mut self, span: Span) -> Result<()> {
        let deferred = std::mem::take(&mut self.units.current_mut().meta.deferred_annotations);
        if deferred.is_empty() {
            return Ok(());
        }
        for entry in &deferred {
            self.load_const(ConstValue::Str(entry.target_name.clone()), span);
            self.compile_expr(&entry.expr)?;
        }
        self.emit(Op::BuildMap(deferred.len() as u32), span);
        self.name_op("__annotations__", Ctx::Store, span);
        Ok(())
    }

    /// Drain a class or module scope's `deferred_annotations`, the way
    /// `emit_annotations_if_any` does for a function's parameters: eager
    /// mode stores `__annotations__` directly, otherwise a `__annotate__`
    /// closure is built and stored.
    pub fn emit_scope_annotations(&mut self, span: Span) -> Result<()> {
        if self.units.current().meta.deferred_annotations.is_empty() {
            return Ok(());
        }
        if self.options.future.annotations {
            return self.emit_deferred_annotations(span);
        }
        if let Some(code) = self.produce_annotate_scope(span)? {
            self.load_code_constant(code, span);
            self.emit(Op::MakeFunction, span);
            self.name_op("__annotate__", Ctx::Store, span);
        }
        Ok(())
    }

    /// spec.md §4.10 steps 1-5: a nested scope whose single argument is
    /// `.format`, guarded so only format 1 (string-free) is supported, that
    /// evaluates each deferred annotation and returns a mapping.
    fn produce_annotate_scope(
        &mut self,
        span: Span,
    ) -> Result<Option<std::rc::Rc<crate::assemble::CodeObject>>> {
        let deferred = std::mem::take(&mut self.units.current_mut().meta.deferred_annotations);
        if deferred.is_empty() {
            return Ok(None);
        }

        let scope_id = self.next_child_scope();
        self.enter_scope(ScopeKind::Annotation, "__annotate__", scope_id, 0);
        self.units.current_mut().meta.arg_count = 1;
        self.units.current_mut().meta.posonly_count = 1;
        let format_idx = self.units.current_mut().meta.varnames.intern(".format");

        self.emit(Op::LoadFast(format_idx), Span::artificial());
        self.load_const(ConstValue::Int(1), Span::artificial());
        self.emit(
            Op::CompareOp(crate::op::CmpOp::NotEq),
            Span::artificial(),
        );
        self.emit(Op::ToBool, Span::artificial());
        let ok = self.new_label();
        self.emit_jump(Op::PopJumpIfFalse, ok, Span::artificial());
        self.name_op("NotImplementedError", Ctx::Load, Span::artificial());
        self.emit(Op::Raise(1), Span::artificial());
        self.place_label(ok)?;

        for entry in &deferred {
            self.load_const(ConstValue::Str(entry.target_name.clone()), span);
            if entry.starred {
                self.compile_expr(&entry.expr)?;
                self.emit(Op::UnpackSequence(1), span);
            } else {
                self.compile_expr(&entry.expr)?;
            }
        }
        self.emit(Op::BuildMap(deferred.len() as u32), span);

        let code = self.produce_code_object(false)?;
        Ok(Some(code))
    }
}
