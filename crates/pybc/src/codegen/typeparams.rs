//! Type Parameters, PEP 695 (spec.md §4.11).
//!
//! New functionality with no teacher analog; grounded directly in spec.md's
//! description of the generic function/class/type-alias wrapper scope.

use ruff_python_ast as ast;

use crate::constant::ConstValue;
use crate::diagnostic::Span;
use crate::error::{Error, Result};
use crate::nameres::Ctx;
use crate::op::{Op, TypeParamKind};
use crate::unit::ScopeKind;

use super::Compiler;

impl Compiler {
    /// Enter a type-params scope wrapping a generic function/class/alias
    /// definition (spec.md §4.11): binds each parameter, builds
    /// `__type_params__`, and leaves the inner definition to be compiled by
    /// the caller before [`Compiler::exit_type_params_scope`] closes it out.
    pub fn enter_type_params_scope(
        &mut self,
        type_params: &ast::TypeParams,
        span: Span,
    ) -> Result<()> {
        let scope_id = self.next_child_scope();
        self.enter_scope(ScopeKind::TypeParams, "<generic>", scope_id, 0);

        let mut seen_default = false;
        for param in &type_params.type_params {
            let (name, kind, bound, default) = match param {
                ast::TypeParam::TypeVar(t) => (
                    t.name.as_str(),
                    TypeParamKind::TypeVar,
                    t.bound.as_deref(),
                    t.default.as_deref(),
                ),
                ast::TypeParam::TypeVarTuple(t) => (
                    t.name.as_str(),
                    TypeParamKind::TypeVarTuple,
                    None,
                    t.default.as_deref(),
                ),
                ast::TypeParam::ParamSpec(p) => (
                    p.name.as_str(),
                    TypeParamKind::ParamSpec,
                    None,
                    p.default.as_deref(),
                ),
            };

            if default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(self.syntax_error(
                    "non-default type parameter follows default type parameter",
                    span,
                ));
            }

            self.load_const(ConstValue::Str(name.to_string()), span);
            match (kind, bound) {
                (TypeParamKind::TypeVar, Some(ast::Expr::Tuple(t))) => {
                    for elt in &t.elts {
                        self.compile_expr(elt)?;
                    }
                    self.emit(Op::BuildTuple(t.elts.len() as u32), span);
                    self.emit(Op::TypeVarWithConstraints(0), span);
                }
                (TypeParamKind::TypeVar, Some(bound_expr)) => {
                    self.compile_expr(bound_expr)?;
                    self.emit(Op::TypeVarWithBound(0), span);
                }
                (TypeParamKind::TypeVar, None) => self.emit(Op::TypeVar(0), span),
                (TypeParamKind::TypeVarTuple, _) => self.emit(Op::TypeVarTuple(0), span),
                (TypeParamKind::ParamSpec, _) => self.emit(Op::ParamSpec(0), span),
            }

            if let Some(default_expr) = default {
                self.emit(Op::Dup, span);
                self.compile_expr(default_expr)?;
                self.emit(Op::SetTypeParamDefault, span);
            }

            self.emit(Op::Dup, span);
            self.name_op(name, Ctx::Store, span);
        }

        self.emit(
            Op::BuildTuple(type_params.type_params.len() as u32),
            span,
        );
        self.name_op("__type_params__", Ctx::Store, span);
        Ok(())
    }

    /// Close the type-params scope, leaving the inner
    /// function/class/type-alias value on the enclosing stack.
    pub fn exit_type_params_scope(&mut self, span: Span) -> Result<()> {
        self.emit(Op::ReturnValue, span);
        let unit = self.units.pop().expect("exit_type_params_scope on empty stack");
        let code = crate::assemble::assemble(&unit.seq, unit.meta, crate::assemble::CodeFlags::NEWLOCALS)?;
        let mut pushed = super::closure::PushedAttrs::default();
        pushed.closure = self.emit_closure_tuple(&code, span);
        self.make_function(code, pushed, span);
        self.emit(Op::Call(0), span);
        Ok(())
    }
}
