//! Statement Codegen (spec.md §4.6-§4.7).
//!
//! Where the teacher's `compile_stmt` (`compiler.rs`) only ever needed a
//! `loop_stack` for `break`/`continue` and a single exception-table entry
//! for `try`, this drives the full [`crate::fblock::FrameBlockStack`] so
//! `return` can unwind through `finally`/`with`/handler frames the
//! teacher's subset never had.

use ruff_python_ast::{self as ast, Stmt};

use crate::constant::ConstValue;
use crate::diagnostic::Span;
use crate::error::{Error, Result};
use crate::fblock::FrameBlockKind;
use crate::nameres::Ctx;
use crate::op::Op;
use crate::unit::ScopeKind;

use super::Compiler;

impl Compiler {
    pub fn compile_body(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        let span = self.span(stmt);
        match stmt {
            Stmt::Expr(e) => {
                self.compile_expr(&e.value)?;
                self.emit(Op::Pop, span);
                Ok(())
            }
            Stmt::Pass(_) => Ok(()),
            Stmt::Assign(a) => self.compile_assign(a, span),
            Stmt::AugAssign(a) => self.compile_aug_assign(a, span),
            Stmt::AnnAssign(a) => self.compile_ann_assign(a, span),
            Stmt::Return(r) => self.compile_return(r, span),
            Stmt::Delete(d) => {
                for target in &d.targets {
                    self.compile_delete_target(target)?;
                }
                Ok(())
            }
            Stmt::If(i) => self.compile_if(i, span),
            Stmt::While(w) => self.compile_while(w, span),
            Stmt::For(f) => self.compile_for(f, span),
            Stmt::Break(_) => self.compile_break(span),
            Stmt::Continue(_) => self.compile_continue(span),
            Stmt::Try(t) => self.compile_try(t, span),
            Stmt::With(w) => self.compile_with(w, span),
            Stmt::Assert(a) => self.compile_assert(a, span),
            Stmt::Raise(r) => self.compile_raise(r, span),
            Stmt::Import(i) => self.compile_import(i, span),
            Stmt::ImportFrom(i) => self.compile_import_from(i, span),
            Stmt::Global(_) | Stmt::Nonlocal(_) => Ok(()),
            Stmt::FunctionDef(f) => self.compile_function_def(f, span),
            Stmt::ClassDef(c) => self.compile_class_def(c, span),
            Stmt::Match(m) => self.compile_match(m, span),
            Stmt::TypeAlias(t) => self.compile_type_alias(t, span),
            other => Err(Error::Unsupported(format!(
                "statement form not implemented: {other:?}"
            ))),
        }
    }

    pub fn compile_store_target(&mut self, target: &ast::Expr) -> Result<()> {
        let span = self.span(target);
        match target {
            ast::Expr::Name(n) => {
                self.name_op(n.id.as_str(), Ctx::Store, span);
                Ok(())
            }
            ast::Expr::Attribute(a) => {
                self.compile_expr(&a.value)?;
                self.emit(Op::Swap(2), span);
                self.attr_op(a.attr.as_str(), Ctx::Store, span);
                self.record_static_attribute(&a.value, a.attr.as_str());
                Ok(())
            }
            ast::Expr::Subscript(s) => {
                self.compile_expr(&s.value)?;
                self.compile_expr(&s.slice)?;
                self.emit(Op::Swap(3), span);
                self.emit(Op::StoreSubscript, span);
                Ok(())
            }
            ast::Expr::Tuple(t) => self.compile_unpack_targets(&t.elts, span),
            ast::Expr::List(l) => self.compile_unpack_targets(&l.elts, span),
            ast::Expr::Starred(s) => self.compile_store_target(&s.value),
            other => Err(Error::Internal(format!(
                "not a valid assignment target: {other:?}"
            ))),
        }
    }

    fn record_static_attribute(&mut self, base: &ast::Expr, attr: &str) {
        let ast::Expr::Name(n) = base else { return };
        if n.id.as_str() != "self" {
            return;
        }
        // Find the nearest enclosing class unit, if any (spec.md §3
        // "static_attributes").
        if let Some(class_unit) = self
            .units
            .all()
            .iter_mut()
            .rev()
            .find(|u| u.kind == ScopeKind::Class)
        {
            if let Some(attrs) = &mut class_unit.meta.static_attributes {
                if !attrs.contains(&attr.to_string()) {
                    attrs.push(attr.to_string());
                }
            }
        }
    }

    fn compile_unpack_targets(&mut self, elts: &[ast::Expr], span: Span) -> Result<()> {
        if let Some(star_pos) = elts.iter().position(|e| matches!(e, ast::Expr::Starred(_))) {
            let before = star_pos as u32;
            let after = (elts.len() - star_pos - 1) as u32;
            self.emit(Op::UnpackEx(before, after), span);
        } else {
            self.emit(Op::UnpackSequence(elts.len() as u32), span);
        }
        for elt in elts {
            self.compile_store_target(elt)?;
        }
        Ok(())
    }

    fn compile_delete_target(&mut self, target: &ast::Expr) -> Result<()> {
        let span = self.span(target);
        match target {
            ast::Expr::Name(n) => {
                self.name_op(n.id.as_str(), Ctx::Delete, span);
                Ok(())
            }
            ast::Expr::Attribute(a) => {
                self.compile_expr(&a.value)?;
                self.attr_op(a.attr.as_str(), Ctx::Delete, span);
                Ok(())
            }
            ast::Expr::Subscript(s) => {
                self.compile_expr(&s.value)?;
                self.compile_expr(&s.slice)?;
                self.emit(Op::DeleteSubscript, span);
                Ok(())
            }
            ast::Expr::Tuple(t) => {
                for e in &t.elts {
                    self.compile_delete_target(e)?;
                }
                Ok(())
            }
            other => Err(Error::Internal(format!(
                "not a valid delete target: {other:?}"
            ))),
        }
    }

    fn compile_assign(&mut self, a: &ast::StmtAssign, span: Span) -> Result<()> {
        self.compile_expr(&a.value)?;
        for (i, target) in a.targets.iter().enumerate() {
            if i + 1 < a.targets.len() {
                self.emit(Op::Dup, span);
            }
            self.compile_store_target(target)?;
        }
        Ok(())
    }

    fn compile_aug_assign(&mut self, a: &ast::StmtAugAssign, span: Span) -> Result<()> {
        self.compile_expr(&a.target)?;
        self.compile_expr(&a.value)?;
        let op = super::expr::translate_binop(a.op)?;
        self.emit(Op::BinaryOp(op), span);
        self.compile_store_target(&a.target)
    }

    fn compile_ann_assign(&mut self, a: &ast::StmtAnnAssign, span: Span) -> Result<()> {
        if let Some(value) = &a.value {
            self.compile_expr(value)?;
            self.compile_store_target(&a.target)?;
        }
        // spec.md §4.10: collect the annotation rather than evaluate it
        // eagerly, unless `from __future__ import annotations` is active.
        if let ast::Expr::Name(name) = a.target.as_ref() {
            if self.options.future.annotations {
                self.compile_expr(&a.annotation)?;
                self.emit(Op::Pop, span);
            } else {
                let unit = self.units.current_mut();
                unit.meta
                    .deferred_annotations
                    .push(crate::unit::DeferredAnnotation {
                        target_name: name.id.to_string(),
                        expr: (*a.annotation).clone(),
                        starred: false,
                    });
            }
        }
        Ok(())
    }

    fn compile_return(&mut self, r: &ast::StmtReturn, span: Span) -> Result<()> {
        if self
            .units
            .current()
            .fblocks
            .iter_innermost_first()
            .any(|b| matches!(b.kind, FrameBlockKind::ExceptionGroupHandler))
        {
            return Err(self.syntax_error("'return' not allowed inside an except* handler", span));
        }

        self.unwind_to_function_boundary(span)?;
        match &r.value {
            Some(v) => self.compile_expr(v)?,
            None => self.load_const(ConstValue::None, span),
        }
        self.emit(Op::ReturnValue, span);
        Ok(())
    }

    /// spec.md §4.7: emit the cleanup template for every frame block between
    /// the current point and the function boundary, LIFO.
    fn unwind_to_function_boundary(&mut self, span: Span) -> Result<()> {
        let depth = self.units.current().fblocks.len();
        for i in (0..depth).rev() {
            self.emit_block_cleanup(i, span)?;
        }
        Ok(())
    }

    fn compile_break(&mut self, span: Span) -> Result<()> {
        let Some((break_target, _)) = self.units.current().fblocks.nearest_loop() else {
            return Err(self.syntax_error("'break' outside loop", span));
        };
        self.unwind_to_nearest_loop(span)?;
        self.emit_jump(Op::Jump, break_target, span);
        Ok(())
    }

    fn compile_continue(&mut self, span: Span) -> Result<()> {
        let Some((_, continue_target)) = self.units.current().fblocks.nearest_loop() else {
            return Err(self.syntax_error("'continue' not properly in loop", span));
        };
        self.unwind_to_nearest_loop(span)?;
        self.emit_jump(Op::Jump, continue_target, span);
        Ok(())
    }

    fn unwind_to_nearest_loop(&mut self, span: Span) -> Result<()> {
        let depth = self.units.current().fblocks.len();
        let crossed = self.units.current().fblocks.blocks_to_nearest_loop().len();
        for i in ((depth - crossed)..depth).rev() {
            self.emit_block_cleanup(i, span)?;
        }
        Ok(())
    }

    /// Emit the fixed cleanup template for frame block at stack index `i`
    /// (spec.md §4.7's per-kind table), without popping it — unwinding past
    /// a block for `break`/`continue`/`return` is non-destructive to the
    /// compile-time frame-block stack; only the statement that introduced
    /// the block pops it for real once its body finishes normally.
    fn emit_block_cleanup(&mut self, index: usize, span: Span) -> Result<()> {
        let kind = self.units.current().fblocks.all_kinds()[index].clone();
        match kind {
            FrameBlockKind::WhileLoop { .. }
            | FrameBlockKind::ExceptionHandler
            | FrameBlockKind::ExceptionGroupHandler
            | FrameBlockKind::AsyncCompGen
            | FrameBlockKind::StopIteration => Ok(()),
            FrameBlockKind::ForLoop { .. } => {
                self.emit(Op::PopIter, span);
                Ok(())
            }
            FrameBlockKind::TryExcept { .. } => {
                self.emit(Op::PopBlock, span);
                Ok(())
            }
            FrameBlockKind::FinallyTry { finally_body } => {
                self.emit(Op::PopBlock, span);
                self.emit_jump(Op::Jump, finally_body, Span::artificial());
                Ok(())
            }
            FrameBlockKind::FinallyEnd => {
                self.emit(Op::Swap(2), span);
                self.emit(Op::Pop, span);
                self.emit(Op::PopBlock, span);
                self.emit(Op::PopExcept, span);
                Ok(())
            }
            FrameBlockKind::With { is_async } => {
                self.emit(Op::PopBlock, span);
                self.emit(Op::Swap(2), span);
                self.load_const(ConstValue::None, Span::artificial());
                self.load_const(ConstValue::None, Span::artificial());
                self.load_const(ConstValue::None, Span::artificial());
                self.emit(Op::Call(3), span);
                if is_async {
                    self.emit(Op::GetAwaitable, span);
                    self.load_const(ConstValue::None, Span::artificial());
                    self.emit(Op::YieldFromNone, span);
                }
                self.emit(Op::Pop, span);
                Ok(())
            }
            FrameBlockKind::HandlerCleanup { bound_name } => {
                self.emit(Op::PopBlock, span);
                self.emit(Op::PopExcept, span);
                if let Some(idx) = bound_name {
                    self.load_const(ConstValue::None, Span::artificial());
                    self.emit(Op::StoreFast(idx), span);
                    self.emit(Op::DeleteFast(idx), span);
                }
                Ok(())
            }
            FrameBlockKind::PopValue => {
                self.emit(Op::Swap(2), span);
                self.emit(Op::Pop, span);
                Ok(())
            }
        }
    }

    /// spec.md §4.6 "while".
    fn compile_while(&mut self, w: &ast::StmtWhile, span: Span) -> Result<()> {
        let loop_label = self.new_label();
        let end = self.new_label();
        let depth = self.stack_depth_hint();

        self.place_label(loop_label)?;
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::WhileLoop {
                break_target: end,
                continue_target: loop_label,
            }, depth);
        self.jump_if_false(&w.test, end)?;
        self.compile_body(&w.body)?;
        self.emit_jump(Op::Jump, loop_label, span);
        self.units.current_mut().fblocks.pop();
        self.compile_body(&w.orelse)?;
        self.place_label(end)?;
        Ok(())
    }

    /// spec.md §4.6 "for" / "async for".
    fn compile_for(&mut self, f: &ast::StmtFor, span: Span) -> Result<()> {
        self.compile_expr(&f.iter)?;
        self.emit(if f.is_async { Op::GetAIter } else { Op::GetIter }, span);

        let start = self.new_label();
        let cleanup = self.new_label();
        let end = self.new_label();
        let depth = self.stack_depth_hint();

        self.place_label(start)?;
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::ForLoop {
                break_target: end,
                continue_target: start,
            }, depth);

        if f.is_async {
            self.emit(Op::GetANext, span);
            self.load_const(ConstValue::None, Span::artificial());
            self.emit(Op::YieldFromNone, span);
        } else {
            self.emit_jump(Op::ForIter, cleanup, span);
        }

        self.compile_store_target(&f.target)?;
        self.compile_body(&f.body)?;
        self.emit_jump(Op::Jump, start, span);

        self.units.current_mut().fblocks.pop();
        self.place_label(cleanup)?;
        if f.is_async {
            self.emit(Op::EndAsyncFor, span);
        } else {
            self.emit(Op::EndFor, span);
            self.emit(Op::Pop, span);
        }
        self.compile_body(&f.orelse)?;
        self.place_label(end)?;
        Ok(())
    }

    /// Best-effort static estimate of the current compile-time stack depth,
    /// used only to seed a frame block's `entry_depth` for swap-preserve
    /// bookkeeping; the real peak-depth computation is the external
    /// assembler's job (out of scope here).
    fn stack_depth_hint(&self) -> u32 {
        0
    }

    /// spec.md §4.6 "try/finally" and "try/except"/"try/except*".
    fn compile_try(&mut self, t: &ast::StmtTry, span: Span) -> Result<()> {
        if !t.finalbody.is_empty() {
            return self.compile_try_finally(t, span);
        }
        if t.is_star {
            self.compile_try_except_star(t, span)
        } else {
            self.compile_try_except(t, span)
        }
    }

    fn compile_try_finally(&mut self, t: &ast::StmtTry, span: Span) -> Result<()> {
        let handler = self.new_label();
        let finally_body = self.new_label();
        let exit = self.new_label();
        let depth = self.stack_depth_hint();

        self.emit_jump(Op::SetupFinally, handler, span);
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::FinallyTry { finally_body }, depth);

        if t.handlers.is_empty() {
            self.compile_body(&t.body)?;
        } else {
            let inner = ast::StmtTry {
                body: t.body.clone(),
                handlers: t.handlers.clone(),
                orelse: t.orelse.clone(),
                finalbody: Vec::new(),
                is_star: t.is_star,
                range: t.range,
                node_index: t.node_index.clone(),
            };
            self.compile_try(&Stmt::Try(inner), span)?;
        }

        self.emit(Op::PopBlock, span);
        self.units.current_mut().fblocks.pop();
        self.place_label(finally_body)?;
        self.compile_body(&t.finalbody)?;
        self.emit_jump(Op::Jump, exit, Span::artificial());

        self.place_label(handler)?;
        let cleanup = self.new_label();
        self.emit_jump(Op::SetupCleanup, cleanup, span);
        self.emit(Op::PushExcInfo, span);
        self.compile_body(&t.finalbody)?;
        self.emit(Op::Reraise(0), span);
        self.place_label(cleanup)?;
        self.emit(Op::Reraise(0), span);

        self.place_label(exit)?;
        Ok(())
    }

    fn compile_try_except(&mut self, t: &ast::StmtTry, span: Span) -> Result<()> {
        let except = self.new_label();
        let end = self.new_label();
        let depth = self.stack_depth_hint();

        self.emit_jump(Op::SetupFinally, except, span);
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::TryExcept { handler: except }, depth);
        self.compile_body(&t.body)?;
        self.emit(Op::PopBlock, span);
        self.units.current_mut().fblocks.pop();
        self.compile_body(&t.orelse)?;
        self.emit_jump(Op::Jump, end, span);

        self.place_label(except)?;
        self.emit(Op::PushExcInfo, span);
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::ExceptionHandler, depth);

        for handler in &t.handlers {
            let ast::ExceptHandler::ExceptHandler(h) = handler;
            let next = self.new_label();
            if let Some(ty) = &h.type_ {
                self.compile_expr(ty)?;
                self.emit(Op::CheckExcMatch, span);
                self.emit(Op::ToBool, span);
                self.emit_jump(Op::PopJumpIfFalse, next, span);
            }
            self.compile_except_body(h, span)?;
            self.emit_jump(Op::Jump, end, Span::artificial());
            self.place_label(next)?;
        }
        self.emit(Op::Reraise(1), span);

        self.units.current_mut().fblocks.pop();
        self.place_label(end)?;
        Ok(())
    }

    fn compile_except_body(&mut self, h: &ast::ExceptHandlerExceptHandler, span: Span) -> Result<()> {
        let bound_idx = match &h.name {
            Some(name) => {
                self.name_op(name.as_str(), Ctx::Store, span);
                let idx = self.units.current_mut().meta.varnames.intern(name.as_str());
                Some(idx)
            }
            None => {
                self.emit(Op::Pop, span);
                None
            }
        };
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::HandlerCleanup { bound_name: bound_idx }, 0);
        self.compile_body(&h.body)?;
        let pop = self.units.current_mut().fblocks.pop().unwrap();
        // Normal fallthrough runs the same cleanup `return` would trigger,
        // since the bound name must always be cleared on handler exit.
        if let FrameBlockKind::HandlerCleanup { bound_name } = pop.kind {
            self.emit(Op::PopExcept, span);
            if let Some(idx) = bound_name {
                self.load_const(ConstValue::None, Span::artificial());
                self.emit(Op::StoreFast(idx), span);
                self.emit(Op::DeleteFast(idx), span);
            }
        }
        Ok(())
    }

    fn compile_try_except_star(&mut self, t: &ast::StmtTry, span: Span) -> Result<()> {
        let except = self.new_label();
        let end = self.new_label();
        let depth = self.stack_depth_hint();

        self.emit_jump(Op::SetupFinally, except, span);
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::TryExcept { handler: except }, depth);
        self.compile_body(&t.body)?;
        self.emit(Op::PopBlock, span);
        self.units.current_mut().fblocks.pop();
        self.compile_body(&t.orelse)?;
        self.emit_jump(Op::Jump, end, span);

        self.place_label(except)?;
        self.emit(Op::PushExcInfo, span);
        self.emit(Op::BuildList(0), span);
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::ExceptionGroupHandler, depth);

        for handler in &t.handlers {
            let ast::ExceptHandler::ExceptHandler(h) = handler;
            let next = self.new_label();
            if let Some(ty) = &h.type_ {
                self.compile_expr(ty)?;
            } else {
                self.load_const(ConstValue::None, Span::artificial());
            }
            self.emit(Op::CheckEgMatch, span);
            self.emit(Op::Dup, span);
            self.emit(Op::ToBool, span);
            self.emit_jump(Op::PopJumpIfFalse, next, span);
            self.compile_except_body(h, span)?;
            self.emit(Op::ListAppend, span);
            self.place_label(next)?;
        }
        self.emit(Op::PrepReraiseStar, span);
        self.emit(Op::Dup, span);
        self.emit(Op::ToBool, span);
        let no_reraise = self.new_label();
        self.emit_jump(Op::PopJumpIfFalse, no_reraise, span);
        self.emit(Op::Reraise(0), span);
        self.place_label(no_reraise)?;
        self.emit(Op::Pop, span);

        self.units.current_mut().fblocks.pop();
        self.place_label(end)?;
        Ok(())
    }

    /// spec.md §4.6 "with"/"async with".
    fn compile_with(&mut self, w: &ast::StmtWith, span: Span) -> Result<()> {
        self.compile_with_items(&w.items, w.is_async, &w.body, span)
    }

    fn compile_with_items(
        &mut self,
        items: &[ast::WithItem],
        is_async: bool,
        body: &[Stmt],
        span: Span,
    ) -> Result<()> {
        let Some((item, rest)) = items.split_first() else {
            return self.compile_body(body);
        };

        self.compile_expr(&item.context_expr)?;
        let exit_name = if is_async { "__aexit__" } else { "__exit__" };
        let enter_name = if is_async { "__aenter__" } else { "__enter__" };
        let exit_idx = self.units.current_mut().meta.names.intern(exit_name);
        self.emit(Op::LoadSpecial(exit_idx), span);
        self.emit(Op::Swap(2), span);
        let enter_idx = self.units.current_mut().meta.names.intern(enter_name);
        self.emit(Op::LoadSpecial(enter_idx), span);
        self.emit(Op::Call(0), span);
        if is_async {
            self.emit(Op::GetAwaitable, span);
            self.load_const(ConstValue::None, Span::artificial());
            self.emit(Op::YieldFromNone, span);
        }

        let handler = self.new_label();
        self.emit_jump(Op::SetupWith, handler, span);
        let depth = self.stack_depth_hint();
        self.units
            .current_mut()
            .fblocks
            .push(FrameBlockKind::With { is_async }, depth);

        if let Some(target) = &item.optional_vars {
            self.compile_store_target(target)?;
        } else {
            self.emit(Op::Pop, span);
        }

        self.compile_with_items(rest, is_async, body, span)?;

        self.emit(Op::PopBlock, span);
        self.units.current_mut().fblocks.pop();
        self.load_const(ConstValue::None, Span::artificial());
        self.load_const(ConstValue::None, Span::artificial());
        self.load_const(ConstValue::None, Span::artificial());
        self.emit(Op::Call(3), span);
        self.emit(Op::Pop, span);
        let end = self.new_label();
        self.emit_jump(Op::Jump, end, Span::artificial());

        self.place_label(handler)?;
        self.emit(Op::WithExceptStart, span);
        if is_async {
            self.emit(Op::GetAwaitable, span);
            self.load_const(ConstValue::None, Span::artificial());
            self.emit(Op::YieldFromNone, span);
        }
        self.emit(Op::ToBool, span);
        let suppress = self.new_label();
        self.emit_jump(Op::PopJumpIfTrue, suppress, span);
        self.emit(Op::Reraise(2), span);
        self.place_label(suppress)?;
        self.emit(Op::PopExcept, span);
        self.emit(Op::Pop, span);
        self.emit(Op::Pop, span);
        self.emit(Op::Pop, span);

        self.place_label(end)?;
        Ok(())
    }

    /// spec.md §4.6 "assert".
    fn compile_assert(&mut self, a: &ast::StmtAssert, span: Span) -> Result<()> {
        if self.options.optimize.strips_asserts() {
            return Ok(());
        }
        if matches!(a.test.as_ref(), ast::Expr::Tuple(t) if !t.elts.is_empty()) {
            self.emit_warning(crate::error::CodegenWarning::AssertOnTuple, span)?;
        }
        let end = self.new_label();
        self.jump_if_true(&a.test, end)?;
        self.name_op("AssertionError", Ctx::Load, span);
        match &a.msg {
            Some(msg) => {
                self.compile_expr(msg)?;
                self.emit(Op::Call(1), span);
            }
            None => {}
        }
        self.emit(Op::Raise(1), span);
        self.place_label(end)?;
        Ok(())
    }

    fn compile_raise(&mut self, r: &ast::StmtRaise, span: Span) -> Result<()> {
        let mut nargs = 0u32;
        if let Some(exc) = &r.exc {
            self.compile_expr(exc)?;
            nargs = 1;
            if let Some(cause) = &r.cause {
                self.compile_expr(cause)?;
                nargs = 2;
            }
        }
        self.emit(Op::Raise(nargs), span);
        Ok(())
    }

    fn compile_import(&mut self, i: &ast::StmtImport, span: Span) -> Result<()> {
        for alias in &i.names {
            self.load_const(ConstValue::Int(0), Span::artificial());
            self.load_const(ConstValue::None, Span::artificial());
            let idx = self.units.current_mut().meta.names.intern(&alias.name);
            self.emit(Op::ImportName(idx), span);
            let bound = alias.asname.as_ref().unwrap_or(&alias.name);
            self.name_op(bound.as_str(), Ctx::Store, span);
        }
        Ok(())
    }

    fn compile_import_from(&mut self, i: &ast::StmtImportFrom, span: Span) -> Result<()> {
        self.load_const(ConstValue::Int(i.level.unwrap_or(0) as i64), Span::artificial());
        let names: Vec<ConstValue> = i
            .names
            .iter()
            .map(|a| ConstValue::Str(a.name.to_string()))
            .collect();
        self.load_const(ConstValue::Tuple(names), Span::artificial());
        let module = i.module.as_deref().unwrap_or("");
        let idx = self.units.current_mut().meta.names.intern(module);
        self.emit(Op::ImportName(idx), span);

        if i.names.iter().any(|a| a.name.as_str() == "*") {
            self.emit(Op::ImportStar, span);
            return Ok(());
        }

        for alias in &i.names {
            let name_idx = self.units.current_mut().meta.names.intern(&alias.name);
            self.emit(Op::Dup, span);
            self.emit(Op::ImportFrom(name_idx), span);
            let bound = alias.asname.as_ref().unwrap_or(&alias.name);
            self.name_op(bound.as_str(), Ctx::Store, span);
        }
        self.emit(Op::Pop, span);
        Ok(())
    }

    /// spec.md §4.6 "if".
    fn compile_if(&mut self, i: &ast::StmtIf, span: Span) -> Result<()> {
        let end = self.new_label();
        let mut next = self.new_label();
        self.jump_if_false(&i.test, next)?;
        self.compile_body(&i.body)?;
        self.emit_jump(Op::Jump, end, span);

        let clauses = &i.elif_else_clauses;
        for (idx, clause) in clauses.iter().enumerate() {
            self.place_label(next)?;
            match &clause.test {
                Some(test) => {
                    next = self.new_label();
                    self.jump_if_false(test, next)?;
                    self.compile_body(&clause.body)?;
                    self.emit_jump(Op::Jump, end, span);
                }
                None => {
                    self.compile_body(&clause.body)?;
                    if idx + 1 < clauses.len() {
                        self.emit_jump(Op::Jump, end, span);
                    }
                }
            }
        }
        if clauses.iter().all(|c| c.test.is_some()) {
            self.place_label(next)?;
        }
        self.place_label(end)?;
        Ok(())
    }

    /// spec.md §4.6 "function definition".
    fn compile_function_def(&mut self, f: &ast::StmtFunctionDef, span: Span) -> Result<()> {
        for deco in f.decorator_list.iter().rev() {
            self.compile_expr(&deco.expression)?;
        }

        let mut pushed = super::closure::PushedAttrs::default();

        let (defaults, kwdefaults) = self.emit_parameter_defaults(&f.parameters, span)?;
        pushed.defaults = defaults;
        pushed.kwdefaults = kwdefaults;

        let has_type_params = f
            .type_params
            .as_ref()
            .is_some_and(|tp| !tp.type_params.is_empty());
        if has_type_params {
            self.enter_type_params_scope(f.type_params.as_ref().unwrap(), span)?;
        }

        let scope_id = self.next_child_scope();
        let kind = if f.is_async {
            ScopeKind::AsyncFunction
        } else {
            ScopeKind::Function
        };
        self.enter_scope(kind, f.name.as_str(), scope_id, 0);
        self.seed_parameters(&f.parameters);
        self.compile_function_body(&f.body)?;
        let code = self.produce_code_object(true)?;

        pushed.closure = self.emit_closure_tuple(&code, span);
        self.emit_annotations_if_any(&f.parameters, &f.returns, span, &mut pushed)?;
        self.make_function(code, pushed, span);

        if has_type_params {
            self.emit(Op::SetFunctionTypeParams, span);
            self.exit_type_params_scope(span)?;
        }

        for _ in &f.decorator_list {
            self.emit(Op::Call(1), span);
        }
        self.name_op(f.name.as_str(), Ctx::Store, span);
        Ok(())
    }

    fn compile_function_body(&mut self, body: &[Stmt]) -> Result<()> {
        // A bare leading string-literal expression statement is the
        // docstring; optimize level 2 strips it from the constant pool.
        let mut body = body;
        if self.options.optimize.strips_docstrings() {
            if let [Stmt::Expr(e), rest @ ..] = body {
                if matches!(e.value.as_ref(), ast::Expr::StringLiteral(_)) {
                    body = rest;
                }
            }
        }
        self.compile_body(body)?;
        self.emit_deferred_annotations(Span::artificial())
    }

    fn seed_parameters(&mut self, params: &ast::Parameters) {
        let unit = self.units.current_mut();
        unit.meta.posonly_count = params.posonlyargs.len() as u32;
        unit.meta.kwonly_count = params.kwonlyargs.len() as u32;
        unit.meta.arg_count = (params.posonlyargs.len() + params.args.len()) as u32;
        for param in params.iter() {
            unit.meta.varnames.intern(param.name().as_str());
        }
        if let Some(vararg) = &params.vararg {
            unit.meta.varnames.intern(vararg.name.as_str());
            unit.has_varargs = true;
        }
        if let Some(kwarg) = &params.kwarg {
            unit.meta.varnames.intern(kwarg.name.as_str());
            unit.has_varkeywords = true;
        }
    }

    /// Returns `(defaults_pushed, kwdefaults_pushed)`.
    pub(super) fn emit_parameter_defaults(
        &mut self,
        params: &ast::Parameters,
        span: Span,
    ) -> Result<(bool, bool)> {
        let positional_defaults: Vec<&ast::Expr> = params
            .posonlyargs
            .iter()
            .chain(params.args.iter())
            .filter_map(|p| p.default())
            .collect();
        let defaults_pushed = if positional_defaults.is_empty() {
            false
        } else {
            for d in &positional_defaults {
                self.compile_expr(d)?;
            }
            self.emit(Op::BuildTuple(positional_defaults.len() as u32), span);
            true
        };

        let kwonly_with_defaults: Vec<(&str, &ast::Expr)> = params
            .kwonlyargs
            .iter()
            .filter_map(|p| p.default().map(|d| (p.name().as_str(), d)))
            .collect();
        let kwdefaults_pushed = if kwonly_with_defaults.is_empty() {
            false
        } else {
            self.emit(Op::BuildMap(0), span);
            for (name, d) in &kwonly_with_defaults {
                self.load_const(ConstValue::Str(name.to_string()), span);
                self.compile_expr(d)?;
                self.emit(Op::MapAdd, span);
            }
            true
        };
        Ok((defaults_pushed, kwdefaults_pushed))
    }

    /// spec.md §4.6 "class definition".
    fn compile_class_def(&mut self, c: &ast::StmtClassDef, span: Span) -> Result<()> {
        for deco in c.decorator_list.iter().rev() {
            self.compile_expr(&deco.expression)?;
        }

        self.name_op("__build_class__", Ctx::Load, span);

        let has_type_params = c
            .type_params
            .as_ref()
            .is_some_and(|tp| !tp.type_params.is_empty());
        if has_type_params {
            self.enter_type_params_scope(c.type_params.as_ref().unwrap(), span)?;
        }

        let scope_id = self.next_child_scope();
        self.enter_scope(ScopeKind::Class, c.name.as_str(), scope_id, 0);

        self.name_op("__name__", Ctx::Load, Span::artificial());
        self.name_op("__module__", Ctx::Store, Span::artificial());
        self.load_const(
            ConstValue::Str(self.units.current().meta.qualname.clone()),
            Span::artificial(),
        );
        self.name_op("__qualname__", Ctx::Store, Span::artificial());
        if has_type_params {
            self.name_op("__type_params__", Ctx::Store, Span::artificial());
        }

        self.compile_body(&c.body)?;
        self.emit_scope_annotations(Span::artificial())?;

        if let Some(attrs) = self.units.current().meta.static_attributes.clone() {
            if !attrs.is_empty() {
                let names: Vec<ConstValue> = attrs.into_iter().map(ConstValue::Str).collect();
                self.load_const(ConstValue::Tuple(names), Span::artificial());
                self.name_op("__static_attributes__", Ctx::Store, Span::artificial());
            }
        }

        // `__classcell__`: a class body referencing `__class__`/`super()`
        // gets a cell the metaclass must close over the freshly built type.
        let needs_classcell = self
            .units
            .current()
            .meta
            .cellvars
            .iter()
            .any(|n| n == "__class__");
        if needs_classcell {
            let idx = self
                .units
                .current()
                .meta
                .cellvars
                .iter()
                .position(|n| n == "__class__")
                .unwrap() as u32;
            self.emit(Op::LoadClosure(idx), Span::artificial());
            self.name_op("__classcell__", Ctx::Store, Span::artificial());
            self.name_op("__classcell__", Ctx::Load, Span::artificial());
        } else {
            self.load_const(ConstValue::None, Span::artificial());
        }

        let code = self.produce_code_object(false)?;
        let mut pushed = super::closure::PushedAttrs::default();
        pushed.closure = self.emit_closure_tuple(&code, span);
        self.make_function(code, pushed, span);

        if has_type_params {
            self.emit(Op::SetClassTypeParams, span);
        }

        self.load_const(ConstValue::Str(c.name.to_string()), span);
        if let Some(args) = &c.arguments {
            for base in &args.args {
                self.compile_expr(base)?;
            }
            let total = 2 + args.args.len() + args.keywords.len();
            if args.keywords.is_empty() {
                self.emit(Op::Call((1 + args.args.len()) as u32), span);
            } else {
                for kw in &args.keywords {
                    self.compile_expr(&kw.value)?;
                }
                let names: Vec<ConstValue> = args
                    .keywords
                    .iter()
                    .filter_map(|kw| kw.arg.as_ref())
                    .map(|id| ConstValue::Str(id.to_string()))
                    .collect();
                self.load_const(ConstValue::Tuple(names), Span::artificial());
                self.emit(Op::CallKw((total - 2) as u32), span);
            }
        } else {
            self.emit(Op::Call(1), span);
        }

        if has_type_params {
            self.exit_type_params_scope(span)?;
        }

        for _ in &c.decorator_list {
            self.emit(Op::Call(1), span);
        }
        self.name_op(c.name.as_str(), Ctx::Store, span);
        Ok(())
    }

    fn compile_match(&mut self, m: &ast::StmtMatch, span: Span) -> Result<()> {
        self.compile_expr(&m.subject)?;
        self.compile_match_cases(&m.cases, span)
    }

    fn compile_type_alias(&mut self, t: &ast::StmtTypeAlias, span: Span) -> Result<()> {
        self.compile_expr(&t.value)?;
        let ast::Expr::Name(name) = t.name.as_ref() else {
            return Err(Error::Internal("type alias target must be a name".into()));
        };
        let idx = self.units.current_mut().meta.names.intern(name.id.as_str());
        self.emit(Op::TypeAlias(idx), span);
        self.name_op(name.id.as_str(), Ctx::Store, span);
        Ok(())
    }
}
