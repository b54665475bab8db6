//! Instruction Sequence Buffer (spec.md §4.1).
//!
//! Generalizes the teacher's placeholder/patch jump style (`compiler.rs`'s
//! `emit_jump`/`patch_jump`, which patches a *known* instruction index
//! immediately) into genuine labels: a label can be allocated long before
//! it is placed, which the nesting of scopes, `try`/`except*` handler
//! chains, and pattern `fail_pop` ladders all require.

use crate::diagnostic::Span;
use crate::op::Op;

/// An opaque jump target within one [`InstrSeq`]. Per spec.md §3: a label is
/// either unplaced or placed exactly once; all references resolve at
/// assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// One emitted instruction plus the source span it corresponds to.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Op,
    pub span: Span,
}

/// An append-only, label-addressable instruction stream for a single
/// compilation unit (spec.md §4.1).
#[derive(Debug, Default)]
pub struct InstrSeq {
    instructions: Vec<Instruction>,
    /// `label_places[i]` is `Some(instruction_index)` once label `i` has
    /// been placed, `None` while it is still pending.
    label_places: Vec<Option<usize>>,
    /// Nested sequences attached via [`InstrSeq::attach_nested`], kept only
    /// for diagnostic/test "debug capture" mode (spec.md §4.1); never
    /// consulted by [`crate::assemble::assemble`].
    nested: Vec<InstrSeq>,
}

impl InstrSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Allocate a fresh, unplaced label.
    pub fn new_label(&mut self) -> Label {
        let id = self.label_places.len() as u32;
        self.label_places.push(None);
        Label(id)
    }

    /// Bind `label` to the next instruction that will be appended. Returns
    /// an internal error if `label` was already placed — spec.md's label
    /// invariant ("placed exactly once").
    pub fn place_label(&mut self, label: Label) -> crate::error::Result<()> {
        let slot = &mut self.label_places[label.0 as usize];
        if slot.is_some() {
            return Err(crate::error::Error::Internal(format!(
                "label {:?} placed twice",
                label
            )));
        }
        *slot = Some(self.instructions.len());
        Ok(())
    }

    pub fn emit(&mut self, op: Op, span: Span) {
        self.instructions.push(Instruction { op, span });
    }

    /// Emit a jump-bearing opcode targeting `label`, storing the label id as
    /// the (not-yet-resolved) operand.
    pub fn emit_jump(&mut self, make_op: fn(u32) -> Op, label: Label, span: Span) {
        self.emit(make_op(label.0), span);
    }

    /// O(n) prepend, used exactly once per generator/coroutine body to wrap
    /// it with a cleanup handler at offset 0 (spec.md §4.1).
    pub fn insert_front(&mut self, op: Op, span: Span) {
        self.instructions.insert(0, Instruction { op, span });
        for place in self.label_places.iter_mut().flatten() {
            *place += 1;
        }
    }

    /// Attach a child sequence verbatim; only consulted in diagnostic/test
    /// "debug capture" mode, never by [`crate::assemble`].
    pub fn attach_nested(&mut self, child: InstrSeq) {
        self.nested.push(child);
    }

    pub fn nested(&self) -> &[InstrSeq] {
        &self.nested
    }

    /// Resolve every label-carrying instruction's operand to the placed
    /// instruction index of its label. Called by [`crate::assemble::assemble`].
    ///
    /// Every jump operand must refer to a label placed exactly once in this
    /// sequence (spec.md §8 property 3); violating that is an internal
    /// error, not a user-facing one, since it can only result from a codegen
    /// bug.
    pub fn resolve_labels(&self) -> crate::error::Result<Vec<Instruction>> {
        let mut out = Vec::with_capacity(self.instructions.len());
        for instr in &self.instructions {
            let op = if let Some(label_id) = instr.op.jump_target() {
                let offset = self.label_places[label_id as usize].ok_or_else(|| {
                    crate::error::Error::Internal(format!(
                        "label {label_id} referenced but never placed"
                    ))
                })?;
                instr.op.with_jump_target(offset as u32)
            } else {
                instr.op.clone()
            };
            out.push(Instruction {
                op,
                span: instr.span,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_must_be_placed_before_resolve() {
        let mut seq = InstrSeq::new();
        let l = seq.new_label();
        seq.emit_jump(Op::Jump, l, Span::artificial());
        assert!(seq.resolve_labels().is_err());
    }

    #[test]
    fn placing_twice_errors() {
        let mut seq = InstrSeq::new();
        let l = seq.new_label();
        seq.place_label(l).unwrap();
        seq.emit(Op::Nop, Span::artificial());
        assert!(seq.place_label(l).is_err());
    }

    #[test]
    fn jump_resolves_to_placement_offset() {
        let mut seq = InstrSeq::new();
        let l = seq.new_label();
        seq.emit_jump(Op::Jump, l, Span::artificial());
        seq.emit(Op::Nop, Span::artificial());
        seq.place_label(l).unwrap();
        seq.emit(Op::Nop, Span::artificial());
        let resolved = seq.resolve_labels().unwrap();
        match resolved[0].op {
            Op::Jump(target) => assert_eq!(target, 2),
            _ => panic!("expected Jump"),
        }
    }
}
