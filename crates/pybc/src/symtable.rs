//! Symbol table: the scope-analysis collaborator spec.md treats as an
//! external input to the Name Resolver (§4.4) and Scope-Transition Driver
//! (§4.3).
//!
//! spec.md deliberately does not specify *how* scopes are classified — only
//! that codegen consults one. No crate in the surrounding ecosystem exists
//! to fill that role for this AST family, so this module supplies a concrete
//! implementation behind the [`ScopeAnalysis`] trait, grounded in the same
//! two-pass shape CPython's `symtable.c` uses (collect bindings top-down,
//! then propagate free/cell status bottom-up) but considerably smaller: it
//! tracks exactly the facts `codegen` consults and nothing else.

use std::collections::{HashMap, HashSet};

use ruff_python_ast as ast;

use crate::unit::ScopeKind;

/// The classification spec.md §4.4 step 2 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Free,
    Cell,
    Local,
    GlobalImplicit,
    GlobalExplicit,
    Unknown,
}

/// Opaque handle to one scope, stable for the lifetime of a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug, Default)]
struct ScopeInfo {
    kind: Option<ScopeKind>,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    /// Names bound somewhere in this scope (assignment target, `def`/`class`
    /// name, parameter, `for` target, `with ... as`, `except ... as`,
    /// `import`, walrus target, comprehension target).
    bound: HashSet<String>,
    /// Names appearing in a `global` statement in this scope.
    globals: HashSet<String>,
    /// Names appearing in a `nonlocal` statement in this scope.
    nonlocals: HashSet<String>,
    /// Names loaded (read) anywhere in this scope, whether or not bound.
    used: HashSet<String>,
    /// Final classification, computed in [`SymbolTable::resolve`].
    classification: HashMap<String, Binding>,
    is_generator: bool,
    is_coroutine: bool,
    is_async_generator: bool,
    /// Set on a `Comprehension` scope that's a generator expression —
    /// always lazy, never inlineable.
    is_generator_expr: bool,
    /// Set on a `Comprehension` scope with an `async for` clause.
    has_async_clause: bool,
    /// Comprehension scopes the analysis determined can execute inline in
    /// the parent frame (spec.md §4.9) rather than as a nested code object.
    inlineable_comprehension: bool,
}

/// The decoupling seam between codegen and scope analysis (SPEC_FULL.md
/// §1's ambient addition): codegen only ever calls through this trait, never
/// touches [`SymbolTable`]'s internals directly.
pub trait ScopeAnalysis {
    fn classify(&self, scope: ScopeId, name: &str) -> Binding;
    fn kind(&self, scope: ScopeId) -> ScopeKind;
    fn is_generator(&self, scope: ScopeId) -> bool;
    fn is_coroutine(&self, scope: ScopeId) -> bool;
    fn is_async_generator(&self, scope: ScopeId) -> bool;
    fn is_inlineable_comprehension(&self, scope: ScopeId) -> bool;
    fn parent(&self, scope: ScopeId) -> Option<ScopeId>;
    /// Every name bound in this scope, in first-binding order — used to seed
    /// a function unit's `varnames` before any codegen has run, and class
    /// unit's `static_attributes` collection.
    fn bound_names(&self, scope: ScopeId) -> Vec<String>;

    /// Child scopes in creation order. The scope-transition driver consumes
    /// these in lockstep with its own traversal, which visits function/
    /// class/lambda/comprehension nodes in exactly the order the builder
    /// did, so the Nth child encountered during codegen is `children(p)[n]`.
    fn children(&self, scope: ScopeId) -> Vec<ScopeId>;
}

/// A fully resolved symbol table for one `compile()` call.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<ScopeInfo>,
}

impl ScopeAnalysis for SymbolTable {
    fn classify(&self, scope: ScopeId, name: &str) -> Binding {
        self.scopes[scope.0 as usize]
            .classification
            .get(name)
            .copied()
            .unwrap_or(Binding::Unknown)
    }

    fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope.0 as usize]
            .kind
            .expect("scope kind set during construction")
    }

    fn is_generator(&self, scope: ScopeId) -> bool {
        self.scopes[scope.0 as usize].is_generator
    }

    fn is_coroutine(&self, scope: ScopeId) -> bool {
        self.scopes[scope.0 as usize].is_coroutine
    }

    fn is_async_generator(&self, scope: ScopeId) -> bool {
        self.scopes[scope.0 as usize].is_async_generator
    }

    fn is_inlineable_comprehension(&self, scope: ScopeId) -> bool {
        self.scopes[scope.0 as usize].inlineable_comprehension
    }

    fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    fn bound_names(&self, scope: ScopeId) -> Vec<String> {
        self.scopes[scope.0 as usize].bound.iter().cloned().collect()
    }

    fn children(&self, scope: ScopeId) -> Vec<ScopeId> {
        self.scopes[scope.0 as usize].children.clone()
    }
}

/// Builds a [`SymbolTable`] over a module's top-level statements in one pass
/// (binding/use collection), then resolves free/cell/global classification
/// in a second pass (spec.md §4.4 "consulting symbol-table scope flags").
pub struct SymbolTableBuilder {
    scopes: Vec<ScopeInfo>,
    stack: Vec<ScopeId>,
    /// Mirrors `CompileOptions.future.annotations`: when set, parameter,
    /// return, and variable annotations are evaluated in place rather than
    /// deferred into a sibling `Annotation` scope, matching
    /// `codegen::annotations`'s eager branch.
    eager_annotations: bool,
}

impl SymbolTableBuilder {
    pub fn new(eager_annotations: bool) -> Self {
        Self {
            scopes: Vec::new(),
            stack: Vec::new(),
            eager_annotations,
        }
    }

    pub fn build(mut self, module: &ast::ModModule) -> SymbolTable {
        let root = self.push_scope(ScopeKind::Module, None);
        self.enter(root);
        for stmt in &module.body {
            self.visit_stmt(stmt);
        }
        self.create_deferred_annotation_scope(&module.body, root);
        self.leave();
        self.resolve();
        SymbolTable {
            scopes: self.scopes,
        }
    }

    /// Create the `Annotation` child scope a class/module body's own
    /// deferred annotated assignments get drained into at scope exit
    /// (`Compiler::emit_scope_annotations`), and attribute the annotation
    /// expressions' uses to it rather than to `owner` itself — matching
    /// `compile_ann_assign`'s non-eager branch, which never compiles the
    /// annotation expression in the owning scope directly.
    fn create_deferred_annotation_scope(&mut self, body: &[ast::Stmt], owner: ScopeId) {
        if self.eager_annotations {
            return;
        }
        let mut exprs = Vec::new();
        collect_deferred_annotation_exprs(body, &mut exprs);
        if exprs.is_empty() {
            return;
        }
        let scope = self.push_scope(ScopeKind::Annotation, Some(owner));
        self.enter(scope);
        for expr in exprs {
            self.visit_expr(expr);
        }
        self.leave();
    }

    fn push_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeInfo {
            kind: Some(kind),
            parent,
            ..Default::default()
        });
        if let Some(parent) = parent {
            self.scopes[parent.0 as usize].children.push(id);
        }
        id
    }

    fn enter(&mut self, id: ScopeId) {
        self.stack.push(id);
    }

    fn leave(&mut self) {
        self.stack.pop();
    }

    fn current(&mut self) -> &mut ScopeInfo {
        let id = *self.stack.last().expect("scope stack non-empty");
        &mut self.scopes[id.0 as usize]
    }

    fn bind(&mut self, name: &str) {
        self.current().bound.insert(name.to_string());
    }

    fn used(&mut self, name: &str) {
        self.current().used.insert(name.to_string());
    }

    fn current_scope_kind(&self) -> ScopeKind {
        let id = *self.stack.last().expect("scope stack non-empty");
        self.scopes[id.0 as usize]
            .kind
            .expect("scope kind set during construction")
    }

    /// Bind a PEP 695 type-parameter name in the current (`TypeParams`)
    /// scope and visit its bound/default expressions, matching
    /// `enter_type_params_scope`'s own per-parameter handling.
    fn bind_type_param(&mut self, param: &ast::TypeParam) {
        match param {
            ast::TypeParam::TypeVar(t) => {
                self.bind(t.name.as_str());
                if let Some(bound) = &t.bound {
                    self.visit_expr(bound);
                }
                if let Some(default) = &t.default {
                    self.visit_expr(default);
                }
            }
            ast::TypeParam::TypeVarTuple(t) => {
                self.bind(t.name.as_str());
                if let Some(default) = &t.default {
                    self.visit_expr(default);
                }
            }
            ast::TypeParam::ParamSpec(p) => {
                self.bind(p.name.as_str());
                if let Some(default) = &p.default {
                    self.visit_expr(default);
                }
            }
        }
    }

    fn bind_target(&mut self, expr: &ast::Expr) {
        match expr {
            ast::Expr::Name(n) => self.bind(n.id.as_str()),
            ast::Expr::Tuple(t) => t.elts.iter().for_each(|e| self.bind_target(e)),
            ast::Expr::List(l) => l.elts.iter().for_each(|e| self.bind_target(e)),
            ast::Expr::Starred(s) => self.bind_target(&s.value),
            // Attribute/subscript targets don't bind a name; the base is a use.
            ast::Expr::Attribute(a) => self.visit_expr(&a.value),
            ast::Expr::Subscript(s) => {
                self.visit_expr(&s.value);
                self.visit_expr(&s.slice);
            }
            other => self.visit_expr(other),
        }
    }

    fn visit_stmt(&mut self, stmt: &ast::Stmt) {
        use ast::Stmt::*;
        match stmt {
            FunctionDef(f) => {
                self.bind(f.name.as_str());
                for deco in &f.decorator_list {
                    self.visit_expr(&deco.expression);
                }
                for default in f
                    .parameters
                    .iter_non_variadic_params()
                    .filter_map(|p| p.default())
                {
                    self.visit_expr(default);
                }

                let has_type_params = f
                    .type_params
                    .as_ref()
                    .is_some_and(|tp| !tp.type_params.is_empty());
                let enclosing = *self.stack.last().unwrap();
                // `enter_type_params_scope` (codegen/typeparams.rs) pushes
                // its wrapper unit before the function's own, so the
                // function scope must be a symbol-table child of the
                // type-params scope, not of `enclosing`, for
                // `next_child_scope` to line up.
                let parent_for_body = if has_type_params {
                    let tp_scope = self.push_scope(ScopeKind::TypeParams, Some(enclosing));
                    self.enter(tp_scope);
                    for param in &f.type_params.as_ref().unwrap().type_params {
                        self.bind_type_param(param);
                    }
                    tp_scope
                } else {
                    enclosing
                };

                // Parameter/return annotations are evaluated in the scope
                // enclosing the function (spec.md §4.10), never inside it —
                // `emit_annotations_if_any` compiles them either in place
                // (eager) or inside a sibling `Annotation` scope created
                // right after the function body below, matching
                // `produce_annotate_scope`'s `next_child_scope` call after
                // the function unit has already been popped.
                let annotated = function_annotation_exprs(f);
                if self.eager_annotations {
                    for expr in &annotated {
                        self.visit_expr(expr);
                    }
                }

                let kind = if f.is_async {
                    ScopeKind::AsyncFunction
                } else {
                    ScopeKind::Function
                };
                let scope = self.push_scope(kind, Some(parent_for_body));
                self.enter(scope);
                for param in f.parameters.iter() {
                    self.bind(param.name().as_str());
                }
                for s in &f.body {
                    self.visit_stmt(s);
                }
                self.leave();

                if !self.eager_annotations && !annotated.is_empty() {
                    let ann_scope = self.push_scope(ScopeKind::Annotation, Some(parent_for_body));
                    self.enter(ann_scope);
                    for expr in &annotated {
                        self.visit_expr(expr);
                    }
                    self.leave();
                }

                if has_type_params {
                    self.leave();
                }
            }
            ClassDef(c) => {
                self.bind(c.name.as_str());
                for deco in &c.decorator_list {
                    self.visit_expr(&deco.expression);
                }
                if let Some(args) = &c.arguments {
                    for arg in args.args.iter() {
                        self.visit_expr(arg);
                    }
                    for kw in args.keywords.iter() {
                        self.visit_expr(&kw.value);
                    }
                }

                let has_type_params = c
                    .type_params
                    .as_ref()
                    .is_some_and(|tp| !tp.type_params.is_empty());
                let enclosing = *self.stack.last().unwrap();
                let parent_for_body = if has_type_params {
                    let tp_scope = self.push_scope(ScopeKind::TypeParams, Some(enclosing));
                    self.enter(tp_scope);
                    for param in &c.type_params.as_ref().unwrap().type_params {
                        self.bind_type_param(param);
                    }
                    tp_scope
                } else {
                    enclosing
                };

                let scope = self.push_scope(ScopeKind::Class, Some(parent_for_body));
                self.enter(scope);
                for s in &c.body {
                    self.visit_stmt(s);
                }
                self.create_deferred_annotation_scope(&c.body, scope);
                self.leave();

                if has_type_params {
                    self.leave();
                }
            }
            Return(r) => {
                if let Some(v) = &r.value {
                    self.visit_expr(v);
                }
            }
            Delete(d) => d.targets.iter().for_each(|t| self.bind_target(t)),
            Assign(a) => {
                self.visit_expr(&a.value);
                a.targets.iter().for_each(|t| self.bind_target(t));
            }
            AugAssign(a) => {
                self.visit_expr(&a.value);
                self.bind_target(&a.target);
            }
            AnnAssign(a) => {
                // A function body's own local annotations are always
                // compiled in place (`compile_function_body`'s
                // unconditional `emit_deferred_annotations` call), but a
                // class/module scope's annotations defer to a sibling
                // `Annotation` scope unless future-annotations eager mode
                // is on (see `create_deferred_annotation_scope`).
                // Codegen never evaluates the annotation expression at all
                // for a non-`Name` target (`compile_ann_assign`'s guard),
                // so neither does the symbol table.
                let target_is_name = matches!(a.target.as_ref(), ast::Expr::Name(_));
                let current_kind = self.current_scope_kind();
                let defers_to_annotation_scope =
                    matches!(current_kind, ScopeKind::Module | ScopeKind::Class)
                        && !self.eager_annotations;
                if target_is_name && !defers_to_annotation_scope {
                    self.visit_expr(&a.annotation);
                }
                if let Some(v) = &a.value {
                    self.visit_expr(v);
                }
                self.bind_target(&a.target);
            }
            For(f) => {
                self.visit_expr(&f.iter);
                self.bind_target(&f.target);
                f.body.iter().for_each(|s| self.visit_stmt(s));
                f.orelse.iter().for_each(|s| self.visit_stmt(s));
            }
            While(w) => {
                self.visit_expr(&w.test);
                w.body.iter().for_each(|s| self.visit_stmt(s));
                w.orelse.iter().for_each(|s| self.visit_stmt(s));
            }
            If(i) => {
                self.visit_expr(&i.test);
                i.body.iter().for_each(|s| self.visit_stmt(s));
                for clause in &i.elif_else_clauses {
                    if let Some(test) = &clause.test {
                        self.visit_expr(test);
                    }
                    clause.body.iter().for_each(|s| self.visit_stmt(s));
                }
            }
            With(w) => {
                for item in &w.items {
                    self.visit_expr(&item.context_expr);
                    if let Some(target) = &item.optional_vars {
                        self.bind_target(target);
                    }
                }
                w.body.iter().for_each(|s| self.visit_stmt(s));
            }
            Try(t) => {
                t.body.iter().for_each(|s| self.visit_stmt(s));
                for handler in &t.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    if let Some(ty) = &h.type_ {
                        self.visit_expr(ty);
                    }
                    if let Some(name) = &h.name {
                        self.bind(name.as_str());
                    }
                    h.body.iter().for_each(|s| self.visit_stmt(s));
                }
                t.orelse.iter().for_each(|s| self.visit_stmt(s));
                t.finalbody.iter().for_each(|s| self.visit_stmt(s));
            }
            Assert(a) => {
                self.visit_expr(&a.test);
                if let Some(msg) = &a.msg {
                    self.visit_expr(msg);
                }
            }
            Import(i) => {
                for alias in &i.names {
                    let bound = alias
                        .asname
                        .as_ref()
                        .map(|n| n.as_str())
                        .unwrap_or_else(|| alias.name.split('.').next().unwrap_or(&alias.name));
                    self.bind(bound);
                }
            }
            ImportFrom(i) => {
                for alias in &i.names {
                    let bound = alias.asname.as_ref().unwrap_or(&alias.name);
                    self.bind(bound.as_str());
                }
            }
            Global(g) => {
                for name in &g.names {
                    self.current().globals.insert(name.to_string());
                }
            }
            Nonlocal(n) => {
                for name in &n.names {
                    self.current().nonlocals.insert(name.to_string());
                }
            }
            Expr(e) => self.visit_expr(&e.value),
            Pass(_) | Break(_) | Continue(_) => {}
            Match(m) => {
                self.visit_expr(&m.subject);
                for case in &m.cases {
                    self.bind_pattern(&case.pattern);
                    if let Some(guard) = &case.guard {
                        self.visit_expr(guard);
                    }
                    case.body.iter().for_each(|s| self.visit_stmt(s));
                }
            }
            Raise(r) => {
                if let Some(exc) = &r.exc {
                    self.visit_expr(exc);
                }
                if let Some(cause) = &r.cause {
                    self.visit_expr(cause);
                }
            }
            TypeAlias(t) => {
                self.bind_target(&t.name);
                self.visit_expr(&t.value);
            }
            IpyEscapeCommand(_) => {}
        }
    }

    fn bind_pattern(&mut self, pattern: &ast::Pattern) {
        use ast::Pattern::*;
        match pattern {
            MatchValue(_) | MatchSingleton(_) => {}
            MatchSequence(s) => s.patterns.iter().for_each(|p| self.bind_pattern(p)),
            MatchMapping(m) => {
                for p in &m.patterns {
                    self.bind_pattern(p);
                }
                if let Some(rest) = &m.rest {
                    self.bind(rest.as_str());
                }
            }
            MatchClass(c) => {
                c.arguments
                    .patterns
                    .iter()
                    .for_each(|p| self.bind_pattern(p));
                c.arguments
                    .keywords
                    .iter()
                    .for_each(|kw| self.bind_pattern(&kw.pattern));
            }
            MatchStar(s) => {
                if let Some(name) = &s.name {
                    self.bind(name.as_str());
                }
            }
            MatchAs(a) => {
                if let Some(inner) = &a.pattern {
                    self.bind_pattern(inner);
                }
                if let Some(name) = &a.name {
                    self.bind(name.as_str());
                }
            }
            MatchOr(o) => o.patterns.iter().for_each(|p| self.bind_pattern(p)),
        }
    }

    fn visit_expr(&mut self, expr: &ast::Expr) {
        use ast::Expr::*;
        match expr {
            Name(n) => self.used(n.id.as_str()),
            Named(n) => {
                // walrus: `(x := ...)` binds in the nearest enclosing
                // function/module scope, never in a comprehension scope
                // (PEP 572); approximated here by binding directly since
                // comprehension inlining already folds into the parent.
                self.visit_expr(&n.value);
                self.bind_target(&n.target);
            }
            Lambda(l) => {
                for default in l
                    .parameters
                    .iter()
                    .flatten()
                    .filter_map(|p| p.default())
                {
                    self.visit_expr(default);
                }
                let parent = *self.stack.last().unwrap();
                let scope = self.push_scope(ScopeKind::Lambda, Some(parent));
                self.enter(scope);
                if let Some(params) = &l.parameters {
                    for param in params.iter() {
                        self.bind(param.name().as_str());
                    }
                }
                self.visit_expr(&l.body);
                self.leave();
            }
            ListComp(c) => self.visit_comprehension_owner(&c.elt, None, &c.generators, false),
            SetComp(c) => self.visit_comprehension_owner(&c.elt, None, &c.generators, false),
            DictComp(c) => {
                self.visit_comprehension_owner(&c.key, Some(&c.value), &c.generators, false)
            }
            Generator(c) => self.visit_comprehension_owner(&c.elt, None, &c.generators, true),
            Await(a) => self.visit_expr(&a.value),
            Yield(y) => {
                self.current().is_generator = true;
                if let Some(v) = &y.value {
                    self.visit_expr(v);
                }
            }
            YieldFrom(y) => {
                self.current().is_generator = true;
                self.visit_expr(&y.value);
            }
            Call(c) => {
                self.visit_expr(&c.func);
                c.arguments.args.iter().for_each(|a| self.visit_expr(a));
                c.arguments
                    .keywords
                    .iter()
                    .for_each(|kw| self.visit_expr(&kw.value));
            }
            BoolOp(b) => b.values.iter().for_each(|v| self.visit_expr(v)),
            BinOp(b) => {
                self.visit_expr(&b.left);
                self.visit_expr(&b.right);
            }
            UnaryOp(u) => self.visit_expr(&u.operand),
            Compare(c) => {
                self.visit_expr(&c.left);
                c.comparators.iter().for_each(|e| self.visit_expr(e));
            }
            If(i) => {
                self.visit_expr(&i.test);
                self.visit_expr(&i.body);
                self.visit_expr(&i.orelse);
            }
            Attribute(a) => self.visit_expr(&a.value),
            Subscript(s) => {
                self.visit_expr(&s.value);
                self.visit_expr(&s.slice);
            }
            Starred(s) => self.visit_expr(&s.value),
            Tuple(t) => t.elts.iter().for_each(|e| self.visit_expr(e)),
            List(l) => l.elts.iter().for_each(|e| self.visit_expr(e)),
            Set(s) => s.elts.iter().for_each(|e| self.visit_expr(e)),
            Dict(d) => {
                for item in &d.items {
                    if let Some(k) = &item.key {
                        self.visit_expr(k);
                    }
                    self.visit_expr(&item.value);
                }
            }
            Slice(s) => {
                if let Some(l) = &s.lower {
                    self.visit_expr(l);
                }
                if let Some(u) = &s.upper {
                    self.visit_expr(u);
                }
                if let Some(st) = &s.step {
                    self.visit_expr(st);
                }
            }
            FString(f) => {
                for part in f.value.elements() {
                    if let ast::FStringElement::Expression(e) = part {
                        self.visit_expr(&e.expression);
                    }
                }
            }
            StringLiteral(_)
            | BytesLiteral(_)
            | NumberLiteral(_)
            | BooleanLiteral(_)
            | NoneLiteral(_)
            | EllipsisLiteral(_) => {}
            IpyEscapeCommand(_) => {}
        }
    }

    fn visit_comprehension_owner(
        &mut self,
        elt: &ast::Expr,
        value: Option<&ast::Expr>,
        generators: &[ast::Comprehension],
        is_generator_expr: bool,
    ) {
        // The outermost iterable is evaluated in the *enclosing* scope
        // (spec.md §4.9), every subsequent clause inside the comprehension
        // scope itself.
        if let Some(first) = generators.first() {
            self.visit_expr(&first.iter);
        }
        let parent = *self.stack.last().unwrap();
        let scope = self.push_scope(ScopeKind::Comprehension, Some(parent));
        self.scopes[scope.0 as usize].is_generator_expr = is_generator_expr;
        self.scopes[scope.0 as usize].has_async_clause = generators.iter().any(|g| g.is_async);
        self.enter(scope);
        for (i, gen) in generators.iter().enumerate() {
            self.bind_target(&gen.target);
            if i > 0 {
                self.visit_expr(&gen.iter);
            }
            for cond in &gen.ifs {
                self.visit_expr(cond);
            }
        }
        self.visit_expr(elt);
        if let Some(value) = value {
            self.visit_expr(value);
        }
        self.leave();
    }

    /// Bottom-up classification pass (spec.md §4.4 step 2).
    fn resolve(&mut self) {
        // First, any name explicitly declared `global` is GLOBAL_EXPLICIT
        // and never a candidate for CELL/FREE propagation.
        let explicit_globals: Vec<(usize, HashSet<String>)> = self
            .scopes
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.globals.clone()))
            .collect();
        for (i, globals) in &explicit_globals {
            for name in globals {
                self.scopes[*i]
                    .classification
                    .insert(name.clone(), Binding::GlobalExplicit);
            }
        }

        // Compute, per scope, the set of names used-but-unresolved-locally —
        // candidates to search outward for (spec.md's FREE classification).
        let free_candidates: Vec<(usize, Vec<String>)> = self
            .scopes
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let candidates = s
                    .used
                    .iter()
                    .filter(|n| {
                        !s.bound.contains(*n)
                            && !s.globals.contains(*n)
                            && s.classification.get(*n).is_none()
                    })
                    .cloned()
                    .collect();
                (i, candidates)
            })
            .collect();

        for (i, candidates) in &free_candidates {
            for name in candidates {
                if self.resolves_in_enclosing_function_scope(ScopeId(*i as u32), name) {
                    self.scopes[*i]
                        .classification
                        .insert(name.clone(), Binding::Free);
                    self.mark_cell_on_owner(ScopeId(*i as u32), name);
                } else {
                    self.scopes[*i]
                        .classification
                        .insert(name.clone(), Binding::GlobalImplicit);
                }
            }
        }

        // Everything bound locally and not already classified is LOCAL
        // (nonlocal-declared names resolve the same way free candidates do,
        // but must find a binding — treated identically here since a
        // `nonlocal` with no enclosing binding is a compile error codegen
        // surfaces, not the table).
        for scope in &mut self.scopes {
            for name in scope.bound.clone() {
                scope
                    .classification
                    .entry(name)
                    .or_insert(Binding::Local);
            }
            for name in scope.nonlocals.clone() {
                scope
                    .classification
                    .entry(name)
                    .or_insert(Binding::Free);
            }
        }

        self.resolve_inlineable_comprehensions();
    }

    /// CPython's comprehension-inlining rule (spec.md §4.9): eligible when
    /// the enclosing scope is a function, the comprehension is neither a
    /// generator expression (always lazy) nor has an `async for` clause,
    /// and none of the names it binds collides with a cell/free variable
    /// already live in the enclosing scope (which an inlined `LOAD_FAST`
    /// slot can't shadow correctly).
    fn resolve_inlineable_comprehensions(&mut self) {
        let comprehensions: Vec<(usize, Option<usize>, bool, bool, Vec<String>)> = self
            .scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == Some(ScopeKind::Comprehension))
            .map(|(i, s)| {
                (
                    i,
                    s.parent.map(|p| p.0 as usize),
                    s.is_generator_expr,
                    s.has_async_clause,
                    s.bound.iter().cloned().collect(),
                )
            })
            .collect();

        for (i, parent, is_generator_expr, has_async_clause, bound) in comprehensions {
            let eligible_parent = parent.is_some_and(|p| {
                matches!(
                    self.scopes[p].kind,
                    Some(ScopeKind::Function) | Some(ScopeKind::AsyncFunction)
                )
            });
            let no_collision = parent.is_some_and(|p| {
                bound.iter().all(|name| {
                    !matches!(
                        self.scopes[p].classification.get(name),
                        Some(Binding::Cell) | Some(Binding::Free)
                    )
                })
            });
            self.scopes[i].inlineable_comprehension =
                eligible_parent && !is_generator_expr && !has_async_clause && no_collision;
        }
    }

    fn resolves_in_enclosing_function_scope(&self, scope: ScopeId, name: &str) -> bool {
        let mut cur = self.scopes[scope.0 as usize].parent;
        while let Some(id) = cur {
            let info = &self.scopes[id.0 as usize];
            // Class scopes are skipped when searching for a free variable
            // binding, matching CPython: a nested function does not see its
            // enclosing class's locals implicitly.
            if info.kind != Some(ScopeKind::Class) && info.bound.contains(name) {
                return true;
            }
            cur = info.parent;
        }
        false
    }

    /// Walk outward from `scope` marking the first enclosing binder of
    /// `name` as needing a CELL for it.
    fn mark_cell_on_owner(&mut self, scope: ScopeId, name: &str) {
        let mut cur = self.scopes[scope.0 as usize].parent;
        while let Some(id) = cur {
            let info = &self.scopes[id.0 as usize];
            if info.kind != Some(ScopeKind::Class) && info.bound.contains(name) {
                self.scopes[id.0 as usize]
                    .classification
                    .insert(name.to_string(), Binding::Cell);
                return;
            }
            cur = self.scopes[id.0 as usize].parent;
        }
    }
}

/// Every annotation expression attached to `f`'s signature (parameter,
/// vararg, kwarg, return), matching `emit_annotations_if_any`'s own
/// gathering in `codegen/annotations.rs`.
fn function_annotation_exprs(f: &ast::StmtFunctionDef) -> Vec<&ast::Expr> {
    let mut out = Vec::new();
    for param in f.parameters.iter() {
        if let Some(ann) = param.annotation() {
            out.push(ann);
        }
    }
    if let Some(vararg) = &f.parameters.vararg {
        if let Some(ann) = &vararg.annotation {
            out.push(ann);
        }
    }
    if let Some(kwarg) = &f.parameters.kwarg {
        if let Some(ann) = &kwarg.annotation {
            out.push(ann);
        }
    }
    if let Some(ret) = &f.returns {
        out.push(ret);
    }
    out
}

/// Every annotated-assignment annotation expression reachable from `body`
/// without crossing into a nested function/class — mirrors exactly which
/// statements `compile_body`'s recursion reaches before a nested scope
/// boundary, since `compile_ann_assign` pushes into the *current* unit's
/// `deferred_annotations` regardless of how deeply the `AnnAssign` is
/// nested in control flow.
fn collect_deferred_annotation_exprs<'a>(body: &'a [ast::Stmt], out: &mut Vec<&'a ast::Expr>) {
    for stmt in body {
        collect_deferred_annotation_exprs_stmt(stmt, out);
    }
}

fn collect_deferred_annotation_exprs_stmt<'a>(stmt: &'a ast::Stmt, out: &mut Vec<&'a ast::Expr>) {
    use ast::Stmt::*;
    match stmt {
        AnnAssign(a) if matches!(a.target.as_ref(), ast::Expr::Name(_)) => {
            out.push(&a.annotation);
        }
        If(i) => {
            collect_deferred_annotation_exprs(&i.body, out);
            for clause in &i.elif_else_clauses {
                collect_deferred_annotation_exprs(&clause.body, out);
            }
        }
        While(w) => {
            collect_deferred_annotation_exprs(&w.body, out);
            collect_deferred_annotation_exprs(&w.orelse, out);
        }
        For(f) => {
            collect_deferred_annotation_exprs(&f.body, out);
            collect_deferred_annotation_exprs(&f.orelse, out);
        }
        Try(t) => {
            collect_deferred_annotation_exprs(&t.body, out);
            for handler in &t.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                collect_deferred_annotation_exprs(&h.body, out);
            }
            collect_deferred_annotation_exprs(&t.orelse, out);
            collect_deferred_annotation_exprs(&t.finalbody, out);
        }
        With(w) => collect_deferred_annotation_exprs(&w.body, out),
        Match(m) => {
            for case in &m.cases {
                collect_deferred_annotation_exprs(&case.body, out);
            }
        }
        _ => {}
    }
}

impl Default for SymbolTableBuilder {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruff_python_parser::parse_module;

    fn build(src: &str) -> SymbolTable {
        let parsed = parse_module(src).expect("parses");
        SymbolTableBuilder::new(false).build(parsed.syntax())
    }

    #[test]
    fn module_level_name_is_global_explicit_or_local() {
        let table = build("x = 1\n");
        assert_eq!(table.classify(ScopeId(0), "x"), Binding::Local);
    }

    #[test]
    fn nested_function_reads_enclosing_local_as_free() {
        let table = build(
            "def outer():\n    x = 1\n    def inner():\n        return x\n    return inner\n",
        );
        // scope 0 = module, 1 = outer, 2 = inner
        assert_eq!(table.classify(ScopeId(2), "x"), Binding::Free);
        assert_eq!(table.classify(ScopeId(1), "x"), Binding::Cell);
    }

    #[test]
    fn class_scope_does_not_supply_free_variables() {
        let table = build(
            "class C:\n    x = 1\n    def m(self):\n        return x\n",
        );
        // `x` in `m` cannot see the class body's `x`, so it must be
        // classified as implicit global, not free/cell.
        let method_scope = ScopeId(2);
        assert_eq!(table.classify(method_scope, "x"), Binding::GlobalImplicit);
    }

    #[test]
    fn global_statement_marks_explicit() {
        let table = build("def f():\n    global x\n    x = 1\n");
        assert_eq!(table.classify(ScopeId(1), "x"), Binding::GlobalExplicit);
    }
}
