//! A bytecode code generator for a Python-family AST.
//!
//! Takes a parsed module plus a symbol table and produces a tree of
//! [`assemble::CodeObject`]s, mirroring the teacher's `compiler::compile`
//! entry point (`examples/chonkie-inc-littrs/crates/littrs/src/compiler.rs`)
//! generalized from a flat single-function compile to the full nested-scope
//! driver in [`codegen`].

mod assemble;
mod codegen;
mod constant;
mod diagnostic;
mod error;
mod fblock;
mod instr_seq;
mod nameres;
mod op;
mod options;
mod symtable;
mod unit;

pub use assemble::{CodeFlags, CodeObject};
pub use constant::ConstValue;
pub use diagnostic::{Diagnostic, Span};
pub use error::{CodegenWarning, Error, Result};
pub use op::{BinOp, CmpOp, Op};
pub use options::{CompileOptions, FutureFlags, OptimizeLevel};

use std::rc::Rc;

use codegen::Compiler;
use diagnostic::Span;
use symtable::{ScopeId, SymbolTableBuilder};
use unit::ScopeKind;

/// Parse `source` and compile it to a module-level [`CodeObject`], spec.md
/// §6's top-level orchestrator: `compile(ast, filename, flags, optimize)`.
pub fn compile(source: &str, options: CompileOptions) -> Result<Rc<CodeObject>> {
    let parsed = ruff_python_parser::parse_module(source)
        .map_err(|err| Error::Parse(err.to_string()))?;
    let module = parsed.into_syntax();
    compile_module(&module, options)
}

/// Compile an already-parsed module, skipping the parse step — used by
/// callers that parse once and want to reuse the AST (e.g. tooling that
/// also needs the raw tree for linting).
pub fn compile_module(
    module: &ruff_python_ast::ModModule,
    options: CompileOptions,
) -> Result<Rc<CodeObject>> {
    let symbols = SymbolTableBuilder::new(options.future.annotations).build(module);
    let mut compiler = Compiler::new(options, symbols);

    compiler.enter_scope(ScopeKind::Module, "<module>", ScopeId(0), 0);
    compiler.compile_body(&module.body)?;
    compiler.emit_scope_annotations(Span::artificial())?;
    compiler.produce_code_object(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> Rc<CodeObject> {
        compile(source, CompileOptions::default()).expect("compilation should succeed")
    }

    #[test]
    fn compiles_empty_module() {
        let code = compile_ok("");
        assert_eq!(code.name, "<module>");
        assert!(!code.flags.contains(CodeFlags::NEWLOCALS));
    }

    #[test]
    fn compiles_simple_assignment() {
        let code = compile_ok("x = 1\n");
        assert!(code.names.contains(&"x".to_string()));
    }

    #[test]
    fn compiles_function_def() {
        let code = compile_ok("def f(x):\n    return x + 1\n");
        assert!(code.consts.iter().any(|c| matches!(c, ConstValue::Code(_))));
    }

    #[test]
    fn rejects_return_outside_function() {
        let err = compile("return 1\n", CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CodegenSyntax(_, _)));
    }

    #[test]
    fn rejects_break_outside_loop() {
        let err = compile("break\n", CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CodegenSyntax(_, _)));
    }
}
