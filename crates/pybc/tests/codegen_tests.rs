use pretty_assertions::assert_eq;

use pybc::{compile, CodeFlags, CompileOptions, ConstValue, Error, OptimizeLevel};

fn compile_src(source: &str) -> std::rc::Rc<pybc::CodeObject> {
    compile(source, CompileOptions::default()).expect("compilation should succeed")
}

fn compile_with(source: &str, options: CompileOptions) -> std::rc::Rc<pybc::CodeObject> {
    compile(source, options).expect("compilation should succeed")
}

// Scenario A: empty module.
#[test]
fn empty_module_returns_none() {
    let code = compile_src("");
    assert_eq!(code.name, "<module>");
    assert!(matches!(code.consts.last(), Some(ConstValue::None) | None));
}

// Scenario B: a simple function with one parameter and an arithmetic body.
#[test]
fn simple_function_has_one_fast_local_and_closes_over_nothing() {
    let code = compile_src("def f(x):\n    return x + 1\n");
    let func_code = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .expect("function body should be a nested code object");

    assert_eq!(func_code.name, "f");
    assert_eq!(func_code.arg_count, 1);
    assert_eq!(func_code.varnames, vec!["x".to_string()]);
    assert!(func_code.freevars.is_empty());
    assert!(func_code.flags.contains(CodeFlags::NEWLOCALS | CodeFlags::OPTIMIZED));
    assert!(func_code.consts.contains(&ConstValue::Int(1)));
}

// Determinism (invariant 1): compiling the same source twice yields
// structurally identical code objects.
#[test]
fn compiling_twice_is_deterministic() {
    let source = "def f(x, y=1):\n    return x * y\n";
    let a = compile_src(source);
    let b = compile_src(source);
    assert_eq!(a.name, b.name);
    assert_eq!(a.varnames, b.varnames);
    assert_eq!(a.names, b.names);
}

// Invariant 2: structurally equal literals share a canonical constant.
#[test]
fn equal_tuple_literals_share_identity() {
    let code = compile_src("a = (1, 2)\nb = (1, 2)\n");
    let tuples: Vec<_> = code
        .consts
        .iter()
        .filter(|c| matches!(c, ConstValue::Tuple(_)))
        .collect();
    // Both assignments fold to the same constant-pool entry.
    assert_eq!(tuples.len(), 1);
}

// Invariant 5: name mangling in class scope.
#[test]
fn dunder_name_is_mangled_in_class_scope() {
    let code = compile_src("class C:\n    def m(self):\n        return self.__x\n");
    let method = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(class_body) => class_body.consts.iter().find_map(|c| match c {
                ConstValue::Code(method) => Some(method.clone()),
                _ => None,
            }),
            _ => None,
        })
        .expect("class body should contain method m");
    assert!(method.names.iter().any(|n| n == "_C__x"));
}

// Invariant 8: optimize level 1 strips `assert`.
#[test]
fn optimize_level_one_strips_asserts() {
    let mut options = CompileOptions::default();
    options.optimize = OptimizeLevel::StripAsserts;
    let code = compile_with("assert 1 == 1, 'never raised'\n", options);
    assert!(!code
        .consts
        .iter()
        .any(|c| matches!(c, ConstValue::Str(s) if s == "never raised")));
}

// Invariant 8: optimize level 2 strips docstrings.
#[test]
fn optimize_level_two_strips_docstrings() {
    let mut options = CompileOptions::default();
    options.optimize = OptimizeLevel::StripDocstrings;
    let code = compile_with(
        "def f():\n    \"\"\"a docstring\"\"\"\n    return 1\n",
        options,
    );
    let func = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .unwrap();
    assert!(!func
        .consts
        .iter()
        .any(|c| matches!(c, ConstValue::Str(s) if s == "a docstring")));
}

// Invariant 9: a PEP 649 `__annotate__` is produced for an annotated
// class when `from __future__ import annotations` is absent.
#[test]
fn class_with_annotation_gets_annotate_closure() {
    let code = compile_src("class C:\n    x: int = 1\n");
    let class_body = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .expect("class body code object");
    assert!(class_body.names.iter().any(|n| n == "__annotate__"));
}

// Scenario C: a module-scope comprehension is never inlineable (only a
// function body qualifies), so it still takes the lifted path and produces
// a nested code object.
#[test]
fn module_scope_comprehension_is_lifted() {
    let code = compile_src("xs = [1, 2, 3]\nys = [x * x for x in xs if x > 0]\n");
    assert!(code.names.iter().any(|n| n == "ys"));
    assert!(code.consts.iter().any(|c| matches!(c, ConstValue::Code(_))));
}

// Scenario C: a comprehension inside a function body with no cell/free
// collisions is inlined — no nested `<listcomp>` code object is produced.
#[test]
fn inlineable_comprehension_in_function_body_is_inlined() {
    let code = compile_src("def f():\n    xs = [1, 2, 3]\n    return [x * x for x in xs]\n");
    let func = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .expect("function body code object");
    assert!(!func
        .consts
        .iter()
        .any(|c| matches!(c, ConstValue::Code(_))));
}

// A generator expression is never inlined even inside a function body.
#[test]
fn generator_expression_in_function_body_is_lifted() {
    let code = compile_src("def f():\n    xs = [1, 2, 3]\n    return sum(x for x in xs)\n");
    let func = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .expect("function body code object");
    assert!(func.consts.iter().any(|c| matches!(c, ConstValue::Code(_))));
}

// PEP 695: a parameter annotation referencing the enclosing function's own
// type parameter must not panic `Compiler::next_child_scope` — the symbol
// table creates a matching `TypeParams` scope for the codegen-side wrapper.
#[test]
fn generic_function_with_type_param_compiles() {
    let code = compile_src("def f[T](x: T) -> T:\n    return x\n");
    let wrapper = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .expect("type-param wrapper code object");
    assert!(wrapper.cellvars.iter().any(|n| n == "T"));
    assert!(wrapper
        .consts
        .iter()
        .any(|c| matches!(c, ConstValue::Code(_))));
}

// PEP 695: same, for a generic class.
#[test]
fn generic_class_with_type_param_compiles() {
    let code = compile_src("class C[T]:\n    x: T\n");
    let wrapper = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .expect("type-param wrapper code object");
    assert!(wrapper.cellvars.iter().any(|n| n == "T"));
}

// A bare parameter/return annotation with no type parameters must not panic
// either — the original repro for the out-of-bounds `next_child_scope`.
#[test]
fn annotated_function_without_type_params_compiles() {
    let code = compile_src("def f(x: int) -> int:\n    return x\n");
    assert!(code.consts.iter().any(|c| matches!(c, ConstValue::Code(_))));
}

// Module-level deferred annotations also get an `__annotate__` closure.
#[test]
fn module_with_annotation_gets_annotate_closure() {
    let code = compile_src("x: int = 1\n");
    assert!(code.names.iter().any(|n| n == "__annotate__"));
}

// Scenario D: return from inside a nested try/finally compiles cleanly
// and produces a function whose body returns a value.
#[test]
fn return_inside_try_finally_compiles() {
    let code = compile_src(
        "def f():\n    try:\n        return 1\n    finally:\n        cleanup()\n",
    );
    let func = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .unwrap();
    assert!(func.names.iter().any(|n| n == "cleanup"));
}

// Scenario E: a sequence pattern with a star binds all three names.
#[test]
fn star_sequence_pattern_compiles() {
    let code = compile_src(
        "def f(x):\n    match x:\n        case [a, *_, b]:\n            return a + b\n        case _:\n            return None\n",
    );
    assert!(code
        .consts
        .iter()
        .any(|c| matches!(c, ConstValue::Code(_))));
}

// Invariant 7 / error path: `return` outside a function is rejected.
#[test]
fn return_outside_function_is_rejected() {
    let err = compile("return 1\n", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::CodegenSyntax(_, _)));
}

// Invariant 7 / error path: `break` outside a loop is rejected.
#[test]
fn break_outside_loop_is_rejected() {
    let err = compile("break\n", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::CodegenSyntax(_, _)));
}

// `except*` (exception groups) may not contain a bare `return`.
#[test]
fn return_inside_except_star_is_rejected() {
    let source = "def f():\n    try:\n        pass\n    except* ValueError:\n        return 1\n";
    let err = compile(source, CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::CodegenSyntax(_, _)));
}

// MatchOr alternatives binding different names is a compile-time error.
#[test]
fn match_or_with_mismatched_captures_is_rejected() {
    let source =
        "def f(x):\n    match x:\n        case [a] | [a, b]:\n            return a\n";
    let err = compile(source, CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::CodegenSyntax(_, _)));
}

// A wildcard/capture pattern that precedes another case makes that case
// unreachable and must be rejected, not silently compiled away.
#[test]
fn irrefutable_case_before_last_is_rejected() {
    let source =
        "def f(x):\n    match x:\n        case _:\n            return 1\n        case 2:\n            return 2\n";
    let err = compile(source, CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::CodegenSyntax(_, _)));
}

// Same rule inside an `or`-pattern: an irrefutable alternative before the
// last one shadows whatever follows it.
#[test]
fn irrefutable_or_alternative_before_last_is_rejected() {
    let source =
        "def f(x):\n    match x:\n        case _ | 1:\n            return 1\n";
    let err = compile(source, CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::CodegenSyntax(_, _)));
}

// A trailing wildcard is still fine — only non-last irrefutable patterns
// are rejected.
#[test]
fn irrefutable_case_as_last_arm_is_accepted() {
    let code = compile_src(
        "def f(x):\n    match x:\n        case 1:\n            return 1\n        case _:\n            return 2\n",
    );
    assert!(code.consts.iter().any(|c| matches!(c, ConstValue::Code(_))));
}

// Closures: a nested function reading an enclosing local produces a
// freevar/cellvar pair across the two code objects.
#[test]
fn nested_function_closes_over_enclosing_local() {
    let code = compile_src(
        "def outer():\n    x = 1\n    def inner():\n        return x\n    return inner\n",
    );
    let outer = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .unwrap();
    assert!(outer.cellvars.iter().any(|n| n == "x"));

    let inner = outer
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .unwrap();
    assert!(inner.freevars.iter().any(|n| n == "x"));
}

// Generators: a function containing `yield` is flagged as a generator.
#[test]
fn function_with_yield_is_a_generator() {
    let code = compile_src("def gen():\n    yield 1\n");
    let func = code
        .consts
        .iter()
        .find_map(|c| match c {
            ConstValue::Code(inner) => Some(inner.clone()),
            _ => None,
        })
        .unwrap();
    assert!(func.flags.contains(CodeFlags::GENERATOR));
}

// spec.md §7: warnings are promotable to hard errors via
// `warnings_as_errors`, covering identity-vs-literal, literal calls, and
// always-true tuple asserts.
#[test]
fn identity_compare_with_literal_is_rejected_when_promoted() {
    let mut options = CompileOptions::default();
    options.warnings_as_errors = true;
    let err = compile("x is 1\n", options).unwrap_err();
    assert!(matches!(err, Error::Warning(_)));
}

#[test]
fn call_on_literal_is_rejected_when_promoted() {
    let mut options = CompileOptions::default();
    options.warnings_as_errors = true;
    let err = compile("(1)(2)\n", options).unwrap_err();
    assert!(matches!(err, Error::Warning(_)));
}

#[test]
fn assert_on_nonempty_tuple_is_rejected_when_promoted() {
    let mut options = CompileOptions::default();
    options.warnings_as_errors = true;
    let err = compile("assert (1, 2)\n", options).unwrap_err();
    assert!(matches!(err, Error::Warning(_)));
}

#[cfg(feature = "serde")]
#[test]
fn code_object_round_trips_through_json() {
    let code = compile_src("def f(x):\n    return x + 1\n");
    let json = code.to_json_string().expect("code object should serialize");
    assert!(json.contains("\"name\": \"<module>\""));
}
