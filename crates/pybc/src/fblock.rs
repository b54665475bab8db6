//! Frame-Block Stack (spec.md §4.7): per-unit LIFO of syntactic contexts
//! requiring cleanup on non-local exit.
//!
//! Generalizes the teacher's ad hoc `loop_stack: Vec<LoopContext>` (used only
//! to resolve `break`/`continue` targets in `compiler.rs`) into the full kind
//! set spec.md names, since `return`/`break`/`continue` here must unwind
//! through `try`/`finally`, `with`, and exception-handler frames the
//! teacher's subset never had to cross.

use crate::instr_seq::Label;

/// One frame block kind, spec.md §4.7's cleanup-action table.
#[derive(Debug, Clone)]
pub enum FrameBlockKind {
    WhileLoop {
        break_target: Label,
        continue_target: Label,
    },
    ForLoop {
        break_target: Label,
        continue_target: Label,
    },
    TryExcept {
        handler: Label,
    },
    /// A `try`/`finally` guarded region; `finally_body` is the label of the
    /// inlined finally body re-emitted at every non-local exit.
    FinallyTry {
        finally_body: Label,
    },
    /// The handler half of `try`/`finally`: reached when the guarded body
    /// itself raised.
    FinallyEnd,
    ExceptionHandler,
    ExceptionGroupHandler,
    With {
        is_async: bool,
    },
    /// Installed while compiling one `except`/`except*` handler body, so a
    /// `return`/`break`/`continue` inside it clears the bound exception name.
    HandlerCleanup {
        bound_name: Option<u32>,
    },
    AsyncCompGen,
    StopIteration,
    /// A value sitting below the frame on the compile-time stack that must
    /// be preserved across the cleanup (spec.md's "swap-preserve").
    PopValue,
}

impl FrameBlockKind {
    /// Whether unwinding through this block requires a `POP_BLOCK`.
    pub fn emits_pop_block(&self) -> bool {
        matches!(
            self,
            FrameBlockKind::TryExcept { .. }
                | FrameBlockKind::FinallyTry { .. }
                | FrameBlockKind::FinallyEnd
                | FrameBlockKind::With { .. }
                | FrameBlockKind::HandlerCleanup { .. }
        )
    }

    /// Whether this block is a loop that `break`/`continue` can target.
    pub fn loop_targets(&self) -> Option<(Label, Label)> {
        match *self {
            FrameBlockKind::WhileLoop {
                break_target,
                continue_target,
            }
            | FrameBlockKind::ForLoop {
                break_target,
                continue_target,
            } => Some((break_target, continue_target)),
            _ => None,
        }
    }
}

/// One entry on the stack: its kind plus the compile-time stack depth in
/// effect when the block was entered (needed to compute how many
/// swap-preserve rotations a crossing unwind must perform).
#[derive(Debug, Clone)]
pub struct FrameBlock {
    pub kind: FrameBlockKind,
    pub entry_depth: u32,
}

/// Per-unit LIFO of frame blocks (spec.md §3 "Frame-Block Stack").
#[derive(Debug, Default)]
pub struct FrameBlockStack {
    blocks: Vec<FrameBlock>,
}

impl FrameBlockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: FrameBlockKind, entry_depth: u32) {
        self.blocks.push(FrameBlock { kind, entry_depth });
    }

    pub fn pop(&mut self) -> Option<FrameBlock> {
        self.blocks.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks from innermost to outermost, for unwind-target resolution.
    pub fn iter_innermost_first(&self) -> impl Iterator<Item = &FrameBlock> {
        self.blocks.iter().rev()
    }

    /// Find the nearest enclosing loop's break/continue targets (spec.md
    /// §4.7: "`break`/`continue` stops at the nearest loop frame").
    pub fn nearest_loop(&self) -> Option<(Label, Label)> {
        self.blocks
            .iter()
            .rev()
            .find_map(|b| b.kind.loop_targets())
    }

    /// All blocks above (and including) the nearest loop, innermost first —
    /// the set a `break`/`continue` must unwind through.
    pub fn blocks_to_nearest_loop(&self) -> Vec<&FrameBlock> {
        let mut out = Vec::new();
        for block in self.blocks.iter().rev() {
            out.push(block);
            if block.kind.loop_targets().is_some() {
                break;
            }
        }
        out
    }

    /// Every block, innermost first — the set a `return` must unwind through
    /// (spec.md §4.7: "`return` unwinds to function boundary").
    pub fn blocks_to_function_boundary(&self) -> Vec<&FrameBlock> {
        self.blocks.iter().rev().collect()
    }

    /// All kinds in stack order (bottom to top), indexable by the same
    /// index used when pushing — used by unwind emission to look up a
    /// specific block without taking ownership of the stack.
    pub fn all_kinds(&self) -> Vec<FrameBlockKind> {
        self.blocks.iter().map(|b| b.kind.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr_seq::InstrSeq;

    fn two_labels() -> (Label, Label) {
        let mut seq = InstrSeq::new();
        (seq.new_label(), seq.new_label())
    }

    #[test]
    fn nearest_loop_skips_non_loop_blocks() {
        let mut stack = FrameBlockStack::new();
        let (brk, cont) = two_labels();
        stack.push(
            FrameBlockKind::WhileLoop {
                break_target: brk,
                continue_target: cont,
            },
            0,
        );
        stack.push(FrameBlockKind::TryExcept { handler: brk }, 0);
        let found = stack.nearest_loop().unwrap();
        assert_eq!(found.0, brk);
        assert_eq!(found.1, cont);
    }

    #[test]
    fn blocks_to_nearest_loop_stops_at_loop() {
        let mut stack = FrameBlockStack::new();
        let (brk, cont) = two_labels();
        stack.push(
            FrameBlockKind::ForLoop {
                break_target: brk,
                continue_target: cont,
            },
            0,
        );
        stack.push(FrameBlockKind::With { is_async: false }, 0);
        stack.push(FrameBlockKind::HandlerCleanup { bound_name: None }, 0);
        let crossed = stack.blocks_to_nearest_loop();
        assert_eq!(crossed.len(), 3);
        assert!(crossed[2].kind.loop_targets().is_some());
    }
}
