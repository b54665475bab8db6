//! Pattern Codegen (spec.md §4.8): PEP 634 structural pattern matching.
//!
//! No teacher analog (the teacher's subset has no `match` statement); built
//! directly from spec.md's per-kind sketch. Simplified relative to the
//! full `fail_pop` dispatcher: each case attempt discards its subject copy
//! and falls through to the next case on any sub-pattern mismatch, rather
//! than threading a shared pop-count dispatcher — captures are still only
//! visible once their whole case pattern has matched.

use std::collections::HashSet;

use ruff_python_ast as ast;

use crate::constant::ConstValue;
use crate::diagnostic::Span;
use crate::error::{Error, Result};
use crate::instr_seq::Label;
use crate::nameres::Ctx;
use crate::op::Op;

use super::Compiler;

/// Per-case bookkeeping (spec.md §3 "Pattern Context", simplified: capture
/// names and the single jump target taken on any mismatch within the case).
struct PatternCtx {
    fail: Label,
    captures: Vec<String>,
}

impl Compiler {
    /// Subject already on TOS. Tries each case in order; the last case
    /// falls through to `end` whether or not it had a guard.
    pub fn compile_match_cases(&mut self, cases: &[ast::MatchCase], span: Span) -> Result<()> {
        let end = self.new_label();

        for (i, case) in cases.iter().enumerate() {
            let is_last = i + 1 == cases.len();
            let irrefutable = is_irrefutable(&case.pattern) && case.guard.is_none();

            if irrefutable && !is_last {
                return Err(self.syntax_error(
                    "wildcard makes remaining patterns unreachable",
                    span,
                ));
            }

            let fail = self.new_label();
            let mut ctx = PatternCtx {
                fail,
                captures: Vec::new(),
            };

            if irrefutable {
                self.emit(Op::Pop, span);
                self.compile_pattern(&case.pattern, &mut ctx)?;
                self.store_captures(&ctx, span)?;
                self.compile_body(&case.body)?;
                break;
            }

            self.emit(Op::Dup, span);
            self.compile_pattern(&case.pattern, &mut ctx)?;

            if let Some(guard) = &case.guard {
                self.jump_if_false(guard, fail)?;
            }

            self.store_captures(&ctx, span)?;
            self.emit(Op::Pop, span);
            self.compile_body(&case.body)?;
            self.emit_jump(Op::Jump, end, span);

            self.place_label(fail)?;
            self.emit(Op::Pop, span);
        }

        self.place_label(end)?;
        self.emit(Op::Pop, span);
        Ok(())
    }

    fn store_captures(&mut self, ctx: &PatternCtx, span: Span) -> Result<()> {
        let mut seen = HashSet::new();
        for name in &ctx.captures {
            if !seen.insert(name.clone()) {
                return Err(self.syntax_error(
                    format!("multiple assignments to name '{name}' in pattern"),
                    span,
                ));
            }
        }
        Ok(())
    }

    /// Subject at TOS; on success leaves it there (captures already stored
    /// by name as they're bound), on failure jumps to `ctx.fail` having
    /// balanced the stack back to just-the-subject.
    fn compile_pattern(&mut self, pattern: &ast::Pattern, ctx: &mut PatternCtx) -> Result<()> {
        let span = self.span(pattern);
        match pattern {
            ast::Pattern::MatchValue(v) => {
                self.compile_expr(&v.value)?;
                self.emit(Op::CompareOp(crate::op::CmpOp::Eq), span);
                self.emit(Op::ToBool, span);
                self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);
                Ok(())
            }
            ast::Pattern::MatchSingleton(s) => {
                let value = match s.value {
                    ast::Singleton::None => ConstValue::None,
                    ast::Singleton::True => ConstValue::Bool(true),
                    ast::Singleton::False => ConstValue::Bool(false),
                };
                self.load_const(value, span);
                self.emit(Op::IsOp(0), span);
                self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);
                Ok(())
            }
            ast::Pattern::MatchSequence(seq) => self.compile_sequence_pattern(seq, ctx, span),
            ast::Pattern::MatchMapping(m) => self.compile_mapping_pattern(m, ctx, span),
            ast::Pattern::MatchClass(c) => self.compile_class_pattern(c, ctx, span),
            ast::Pattern::MatchStar(s) => {
                match &s.name {
                    Some(name) => ctx.captures.push(name.to_string()),
                    None => {}
                }
                Ok(())
            }
            ast::Pattern::MatchAs(a) => {
                match &a.pattern {
                    Some(inner) => {
                        self.emit(Op::Dup, span);
                        self.compile_pattern(inner, ctx)?;
                    }
                    None => {}
                }
                if let Some(name) = &a.name {
                    ctx.captures.push(name.to_string());
                    self.name_op(name.as_str(), Ctx::Store, span);
                } else if a.pattern.is_none() {
                    self.emit(Op::Pop, span);
                }
                Ok(())
            }
            ast::Pattern::MatchOr(or) => self.compile_or_pattern(or, ctx, span),
        }
    }

    fn compile_sequence_pattern(
        &mut self,
        seq: &ast::PatternMatchSequence,
        ctx: &mut PatternCtx,
        span: Span,
    ) -> Result<()> {
        self.emit(Op::MatchSequence, span);
        self.emit(Op::ToBool, span);
        self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);

        let star_pos = seq.patterns.iter().position(|p| matches!(p, ast::Pattern::MatchStar(_)));

        self.emit(Op::GetLen, span);
        let expected = seq.patterns.len() as i64 - if star_pos.is_some() { 1 } else { 0 };
        self.load_const(ConstValue::Int(expected), Span::artificial());
        let cmp = if star_pos.is_some() {
            crate::op::CmpOp::GtE
        } else {
            crate::op::CmpOp::Eq
        };
        self.emit(Op::CompareOp(cmp), span);
        self.emit(Op::ToBool, span);
        self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);

        match star_pos {
            None => {
                self.emit(Op::UnpackSequence(seq.patterns.len() as u32), span);
                for p in &seq.patterns {
                    self.compile_pattern(p, ctx)?;
                }
            }
            Some(star_pos) => {
                let before = star_pos as u32;
                let after = (seq.patterns.len() - star_pos - 1) as u32;
                self.emit(Op::UnpackEx(before, after), span);
                for p in &seq.patterns {
                    self.compile_pattern(p, ctx)?;
                }
            }
        }
        Ok(())
    }

    fn compile_mapping_pattern(
        &mut self,
        m: &ast::PatternMatchMapping,
        ctx: &mut PatternCtx,
        span: Span,
    ) -> Result<()> {
        self.emit(Op::MatchMapping, span);
        self.emit(Op::ToBool, span);
        self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);

        let mut seen_keys = HashSet::new();
        for key in &m.keys {
            let literal = key_literal_repr(key)?;
            if !seen_keys.insert(literal) {
                return Err(self.syntax_error("mapping pattern checks duplicate key", span));
            }
        }

        for key in &m.keys {
            self.compile_expr(key)?;
        }
        self.emit(Op::BuildTuple(m.keys.len() as u32), span);
        self.emit(Op::MatchKeys, span);
        self.emit(Op::ToBool, span);
        self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);
        self.emit(Op::UnpackSequence(m.patterns.len() as u32), span);
        for p in &m.patterns {
            self.compile_pattern(p, ctx)?;
        }

        if let Some(rest) = &m.rest {
            ctx.captures.push(rest.to_string());
            self.name_op(rest.as_str(), Ctx::Store, span);
        }
        Ok(())
    }

    fn compile_class_pattern(
        &mut self,
        c: &ast::PatternMatchClass,
        ctx: &mut PatternCtx,
        span: Span,
    ) -> Result<()> {
        self.compile_expr(&c.cls)?;

        let mut seen = HashSet::new();
        for kw in &c.arguments.keywords {
            if !seen.insert(kw.attr.to_string()) {
                return Err(self.syntax_error(
                    format!("attribute name repeated in class pattern: '{}'", kw.attr),
                    span,
                ));
            }
        }
        let names: Vec<ConstValue> = c
            .arguments
            .keywords
            .iter()
            .map(|kw| ConstValue::Str(kw.attr.to_string()))
            .collect();
        self.load_const(ConstValue::Tuple(names), Span::artificial());

        self.emit(Op::MatchClass(c.arguments.patterns.len() as u32), span);
        self.emit(Op::Dup, span);
        self.load_const(ConstValue::None, Span::artificial());
        self.emit(Op::IsOp(1), span);
        self.emit_jump(Op::PopJumpIfFalse, ctx.fail, span);

        let total = c.arguments.patterns.len() + c.arguments.keywords.len();
        self.emit(Op::UnpackSequence(total as u32), span);
        for p in &c.arguments.patterns {
            self.compile_pattern(p, ctx)?;
        }
        for kw in &c.arguments.keywords {
            self.compile_pattern(&kw.pattern, ctx)?;
        }
        Ok(())
    }

    fn compile_or_pattern(
        &mut self,
        or: &ast::PatternMatchOr,
        ctx: &mut PatternCtx,
        span: Span,
    ) -> Result<()> {
        let end = self.new_label();
        let (last, init) = or
            .patterns
            .split_last()
            .ok_or_else(|| Error::Internal("MatchOr with no alternatives".into()))?;

        for alt in init {
            if is_irrefutable(alt) {
                return Err(self.syntax_error(
                    "wildcard makes remaining alternatives unreachable",
                    span,
                ));
            }
        }

        let mut first_names: Option<Vec<String>> = None;
        for alt in init {
            self.emit(Op::Dup, span);
            let mut alt_ctx = PatternCtx {
                fail: self.new_label(),
                captures: Vec::new(),
            };
            self.compile_pattern(alt, &mut alt_ctx)?;
            check_or_binds_same_names(&mut first_names, &alt_ctx.captures, span, self)?;
            ctx.captures.extend(alt_ctx.captures);
            self.emit_jump(Op::Jump, end, span);
            self.place_label(alt_ctx.fail)?;
            self.emit(Op::Pop, span);
        }

        let mut last_ctx = PatternCtx {
            fail: ctx.fail,
            captures: Vec::new(),
        };
        self.compile_pattern(last, &mut last_ctx)?;
        check_or_binds_same_names(&mut first_names, &last_ctx.captures, span, self)?;
        ctx.captures.extend(last_ctx.captures);

        self.place_label(end)?;
        Ok(())
    }
}

fn check_or_binds_same_names(
    first: &mut Option<Vec<String>>,
    these: &[String],
    span: Span,
    compiler: &Compiler,
) -> Result<()> {
    let mut sorted = these.to_vec();
    sorted.sort();
    match first {
        None => *first = Some(sorted),
        Some(expected) => {
            if *expected != sorted {
                return Err(compiler.syntax_error(
                    "alternative patterns bind different names",
                    span,
                ));
            }
        }
    }
    Ok(())
}

fn is_irrefutable(pattern: &ast::Pattern) -> bool {
    matches!(pattern, ast::Pattern::MatchAs(a) if a.pattern.is_none())
}

fn key_literal_repr(expr: &ast::Expr) -> Result<String> {
    Ok(match expr {
        ast::Expr::StringLiteral(s) => format!("s:{}", s.value.to_str()),
        ast::Expr::NumberLiteral(n) => format!("{n:?}"),
        ast::Expr::BooleanLiteral(b) => format!("b:{}", b.value),
        ast::Expr::NoneLiteral(_) => "none".to_string(),
        ast::Expr::Attribute(_) => format!("{expr:?}"),
        other => {
            return Err(Error::Internal(format!(
                "unsupported mapping pattern key: {other:?}"
            )))
        }
    })
}
