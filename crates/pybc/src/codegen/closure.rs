//! Closure / function construction (spec.md §4.12).
//!
//! The teacher never builds closures (its functions carry no free
//! variables — see `compile_function_def` in `compiler.rs`, which always
//! emits a bare `MakeFunction`); this generalizes that single call into the
//! full free-variable-closure plus attribute-bit sequence.

use ruff_python_ast as ast;

use crate::assemble::CodeObject;
use crate::diagnostic::Span;
use crate::error::Result;
use crate::op::Op;
use crate::unit::ScopeKind;

use super::Compiler;

bitflags::bitflags! {
    /// `SET_FUNCTION_ATTRIBUTE` flag bits, spec.md §4.6 "function definition".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FuncAttr: u8 {
        const DEFAULTS   = 1 << 0;
        const KWDEFAULTS = 1 << 1;
        const ANNOTATIONS = 1 << 2;
        const ANNOTATE   = 1 << 3;
        const CLOSURE    = 1 << 4;
    }
}

/// Attribute values the caller has already pushed onto the stack, in the
/// fixed order spec.md §4.12 step 4 names: closure, annotations map,
/// annotate callable, kwdefaults map, defaults tuple.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushedAttrs {
    pub closure: bool,
    pub annotations: bool,
    pub annotate: bool,
    pub kwdefaults: bool,
    pub defaults: bool,
}

impl Compiler {
    /// Emit the free-variable closure tuple for `code`, if it has any free
    /// variables, per spec.md §4.12 steps 1-2. Returns whether a closure
    /// tuple was pushed (so the caller can set [`PushedAttrs::closure`]).
    pub fn emit_closure_tuple(&mut self, code: &CodeObject, span: Span) -> bool {
        if code.freevars.is_empty() {
            return false;
        }
        let unit = self.units.current();
        for name in &code.freevars {
            // A name free in the child is either a cell or an inherited
            // free variable in this (enclosing) unit's own tables.
            let idx = if let Some(pos) = unit.meta.cellvars.iter().position(|n| n == name) {
                pos as u32
            } else if let Some(pos) = unit.meta.freevars.iter().position(|n| n == name) {
                (unit.meta.cellvars.len() + pos) as u32
            } else {
                // Not yet referenced in the enclosing unit; becomes a free
                // variable there too, propagating the closure upward.
                let cellvars_len = unit.meta.cellvars.len();
                self.units.current_mut().meta.freevars.push(name.clone());
                (cellvars_len + self.units.current().meta.freevars.len() - 1) as u32
            };
            self.emit(Op::LoadClosure(idx), span);
        }
        self.emit(Op::BuildTuple(code.freevars.len() as u32), span);
        true
    }

    /// spec.md §4.12 steps 3-4: load the code object, `MAKE_FUNCTION`, then
    /// one `SET_FUNCTION_ATTRIBUTE` per attribute the caller already pushed,
    /// in the fixed order.
    pub fn make_function(
        &mut self,
        code: std::rc::Rc<CodeObject>,
        pushed: PushedAttrs,
        span: Span,
    ) {
        self.load_code_constant(code, span);
        self.emit(Op::MakeFunction, span);

        if pushed.closure {
            self.emit(Op::SetFunctionAttribute(FuncAttr::CLOSURE.bits()), span);
        }
        if pushed.annotations {
            self.emit(
                Op::SetFunctionAttribute(FuncAttr::ANNOTATIONS.bits()),
                span,
            );
        }
        if pushed.annotate {
            self.emit(Op::SetFunctionAttribute(FuncAttr::ANNOTATE.bits()), span);
        }
        if pushed.kwdefaults {
            self.emit(
                Op::SetFunctionAttribute(FuncAttr::KWDEFAULTS.bits()),
                span,
            );
        }
        if pushed.defaults {
            self.emit(Op::SetFunctionAttribute(FuncAttr::DEFAULTS.bits()), span);
        }
    }

    /// `lambda` has no statement body, no decorators, no annotations, and
    /// can never carry type parameters — a stripped-down sibling of
    /// `compile_function_def`.
    pub fn compile_lambda(&mut self, l: &ast::ExprLambda, span: Span) -> Result<()> {
        let mut pushed = PushedAttrs::default();
        let (defaults, kwdefaults) = match &l.parameters {
            Some(params) => self.emit_parameter_defaults(params, span)?,
            None => (false, false),
        };
        pushed.defaults = defaults;
        pushed.kwdefaults = kwdefaults;

        let scope_id = self.next_child_scope();
        self.enter_scope(ScopeKind::Lambda, "<lambda>", scope_id, 0);
        if let Some(params) = &l.parameters {
            self.seed_lambda_parameters(params);
        }
        self.compile_expr(&l.body)?;
        self.emit(Op::ReturnValue, Span::artificial());
        let unit = self.units.pop().expect("compile_lambda on empty stack");
        let code = crate::assemble::assemble(
            &unit.seq,
            unit.meta,
            crate::assemble::CodeFlags::NEWLOCALS | crate::assemble::CodeFlags::OPTIMIZED,
        )?;

        pushed.closure = self.emit_closure_tuple(&code, span);
        self.make_function(code, pushed, span);
        Ok(())
    }

    fn seed_lambda_parameters(&mut self, params: &ast::Parameters) {
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
}
