//! Constant cache and per-unit constant pool (spec.md §4.2).
//!
//! Two levels, same shape as the teacher's `add_const` (see `compiler.rs`)
//! generalized from "linear scan over `Vec<PyValue>`" to "structural-key
//! cache with recursive merge for tuples/frozensets", per spec.md §3-§4.2.

use std::collections::HashMap;

/// A compile-time constant value, as it is stored in a [`crate::unit::UnitMetadata::consts`]
/// pool. This is deliberately smaller than a full runtime value type (no
/// lists/dicts — those are always *built* by bytecode, never loaded as a
/// single constant) except for the all-constant tuple/frozenset folding case
/// spec.md §4.5 calls out.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ConstValue {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<ConstValue>),
    FrozenSet(Vec<ConstValue>),
    /// An already-assembled child code object, loaded via `LoadConst` and
    /// turned into a function/class by `MakeFunction`/`__build_class__`.
    Code(std::rc::Rc<crate::assemble::CodeObject>),
}

/// Structural key used to decide whether two constants are "the same
/// constant" for interning purposes. Mirrors spec.md §4.2 step 1: `None`/
/// `Ellipsis` map to themselves; tuples/frozensets recursively canonicalize
/// their elements; other immutables map to a `(type-tag, value)` pair so
/// `True`/`1` and `False`/`0` never collide (unlike Python's own `==`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    /// Floats are keyed on their bit pattern so `-0.0`/`0.0` and `NaN`
    /// payloads are each distinct constants, matching CPython's
    /// `co_consts` identity behavior.
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<ConstKey>),
    FrozenSet(Vec<ConstKey>),
    /// Code objects are never interned across call sites; each gets a
    /// unique key derived from its allocation order.
    Code(usize),
}

fn key_of(value: &ConstValue, code_seq: &mut usize) -> ConstKey {
    match value {
        ConstValue::None => ConstKey::None,
        ConstValue::Ellipsis => ConstKey::Ellipsis,
        ConstValue::Bool(b) => ConstKey::Bool(*b),
        ConstValue::Int(i) => ConstKey::Int(*i),
        ConstValue::Float(f) => ConstKey::Float(f.to_bits()),
        ConstValue::Str(s) => ConstKey::Str(s.clone()),
        ConstValue::Bytes(b) => ConstKey::Bytes(b.clone()),
        ConstValue::Tuple(items) => {
            ConstKey::Tuple(items.iter().map(|v| key_of(v, code_seq)).collect())
        }
        ConstValue::FrozenSet(items) => {
            let mut keys: Vec<ConstKey> = items.iter().map(|v| key_of(v, code_seq)).collect();
            keys.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
            ConstKey::FrozenSet(keys)
        }
        ConstValue::Code(_) => {
            *code_seq += 1;
            ConstKey::Code(*code_seq)
        }
    }
}

/// Process/compile-scoped interning table (spec.md §3 "Constant Cache").
///
/// Two syntactically distinct but structurally equal immutable literals
/// anywhere in one compile resolve to the same canonical [`ConstValue`]
/// (testable property 2 in spec.md §8).
#[derive(Debug, Default)]
pub struct ConstantCache {
    canonical: HashMap<ConstKey, ConstValue>,
    code_seq: usize,
}

impl ConstantCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning the canonical value that should actually be
    /// stored in a unit's constant pool.
    pub fn intern(&mut self, value: ConstValue) -> ConstValue {
        let key = key_of(&value, &mut self.code_seq);
        self.canonical.entry(key).or_insert(value).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_and_int_do_not_collide() {
        let mut cache = ConstantCache::new();
        let one = cache.intern(ConstValue::Int(1));
        let truth = cache.intern(ConstValue::Bool(true));
        assert_ne!(one, truth);
    }

    #[test]
    fn equal_tuples_share_identity() {
        let mut cache = ConstantCache::new();
        let a = cache.intern(ConstValue::Tuple(vec![ConstValue::Int(1), ConstValue::Str("x".into())]));
        let b = cache.intern(ConstValue::Tuple(vec![ConstValue::Int(1), ConstValue::Str("x".into())]));
        assert_eq!(a, b);
    }

    #[test]
    fn none_and_ellipsis_are_stable() {
        let mut cache = ConstantCache::new();
        assert_eq!(cache.intern(ConstValue::None), cache.intern(ConstValue::None));
        assert_eq!(cache.intern(ConstValue::Ellipsis), cache.intern(ConstValue::Ellipsis));
    }
}
