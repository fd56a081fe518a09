use std::collections::HashMap;

use crate::ast::*;
use crate::error::{CompileError, ErrorLocation, offset_to_line};
use crate::scanner::token::Span;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Per-name record inside one lexical scope. `declare` registers the name as
/// not yet initialized, `define` flips it, and any later reference marks it
/// used; names still unused when the scope ends are reported.
#[derive(Debug)]
struct VarState {
    span: Span,
    defined: bool,
    used: bool,
}

pub struct Resolver<'a> {
    source: &'a str,
    scopes: Vec<HashMap<String, VarState>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<CompileError>,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Resolve the whole program, producing the node-identity → scope
    /// distance table the evaluator consumes. Expressions with no entry
    /// resolve through the global environment by name at run time.
    pub fn resolve(mut self, program: &Program) -> Result<HashMap<ExprId, usize>, Vec<CompileError>> {
        for stmt in &program.statements {
            self.resolve_stmt(stmt);
        }
        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    fn error(&mut self, span: Span, lexeme: &str, message: impl Into<String>) {
        let line = offset_to_line(self.source, span.offset);
        self.errors.push(CompileError::resolve(
            message,
            line,
            ErrorLocation::At(lexeme.to_string()),
            span,
        ));
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the scope and report every name that was never read, in
    /// declaration order. The top-level scope never gets here: globals are
    /// exempt by construction.
    fn end_scope(&mut self) {
        let scope = self.scopes.pop().expect("scope stack underflow");
        let mut unused: Vec<(String, Span)> = scope
            .into_iter()
            .filter(|(_, state)| !state.used)
            .map(|(name, state)| (name, state.span))
            .collect();
        unused.sort_by_key(|&(_, span)| span.offset);
        for (name, span) in unused {
            self.error(span, &name, format!("Variable '{name}' declared but not used."));
        }
    }

    fn declare(&mut self, name: &str, span: Span) {
        if self.scopes.is_empty() {
            return;
        }
        let already_defined = self
            .scopes
            .last()
            .and_then(|scope| scope.get(name))
            .is_some_and(|state| state.defined);
        if already_defined {
            self.error(span, name, "Already a variable with this name in this scope");
        }
        self.scopes
            .last_mut()
            .expect("checked non-empty above")
            .insert(
                name.to_string(),
                VarState {
                    span,
                    defined: false,
                    used: false,
                },
            );
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut()
            && let Some(state) = scope.get_mut(name)
        {
            state.defined = true;
        }
    }

    /// Synthetic `this`/`super` bindings: defined up front and exempt from
    /// the unused-variable check.
    fn define_synthetic(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .expect("synthetic names only go into freshly pushed scopes")
            .insert(
                name.to_string(),
                VarState {
                    span: Span::new(0, 0),
                    defined: true,
                    used: true,
                },
            );
    }

    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (distance, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(state) = scope.get_mut(name)
                && state.defined
            {
                state.used = true;
                self.locals.insert(id, distance);
                return;
            }
        }
        // Not found in any lexical scope: global/dynamic lookup at run time.
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(b) => {
                self.begin_scope();
                for stmt in &b.statements {
                    self.resolve_stmt(stmt);
                }
                self.end_scope();
            }
            Stmt::Class(c) => self.resolve_class(c),
            Stmt::Expression(e) => self.resolve_expr(&e.expression),
            Stmt::Function(f) => {
                self.declare(&f.function.name, f.function.name_span);
                self.define(&f.function.name);
                self.resolve_function(&f.function, FunctionType::Function);
            }
            Stmt::If(i) => {
                self.resolve_expr(&i.condition);
                self.resolve_stmt(&i.then_branch);
                if let Some(ref else_branch) = i.else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Print(p) => self.resolve_expr(&p.expression),
            Stmt::Return(r) => {
                if self.current_function == FunctionType::None {
                    self.error(r.span, "return", "Can't return from top-level code.");
                }
                if let Some(ref value) = r.value {
                    self.resolve_expr(value);
                }
            }
            Stmt::While(w) => {
                self.resolve_expr(&w.condition);
                self.resolve_stmt(&w.body);
                if let Some(ref increment) = w.increment {
                    self.resolve_expr(increment);
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {}
            Stmt::Var(v) => {
                self.declare(&v.name, v.name_span);
                if let Some(ref initializer) = v.initializer {
                    self.resolve_expr(initializer);
                }
                self.define(&v.name);
            }
        }
    }

    fn resolve_class(&mut self, class: &ClassDecl) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(&class.name, class.name_span);
        self.define(&class.name);

        if let Some(ref superclass) = class.superclass
            && superclass.name == class.name
        {
            self.error(
                superclass.span,
                &superclass.name,
                "A class can't inherit from itself.",
            );
        }

        if let Some(ref superclass) = class.superclass {
            self.current_class = ClassType::Subclass;
            // Resolved before the synthetic scopes are pushed.
            self.resolve_expr_variable(superclass);
            self.begin_scope();
            self.define_synthetic("super");
        }

        self.begin_scope();
        self.define_synthetic("this");

        for method in &class.methods {
            let function_type = if method.name == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, function_type);
        }

        self.end_scope();
        if class.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, function: &Function, function_type: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in function.params.iter().flatten() {
            self.declare(&param.name, param.span);
            self.define(&param.name);
        }
        for stmt in &function.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    fn resolve_expr_variable(&mut self, variable: &VariableExpr) {
        if let Some(scope) = self.scopes.last()
            && let Some(state) = scope.get(&variable.name)
            && !state.defined
        {
            self.error(
                variable.span,
                &variable.name,
                "Can't read local variable in its own initializer.",
            );
        }
        self.resolve_local(variable.id, &variable.name);
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Assign(a) => {
                self.resolve_expr(&a.value);
                self.resolve_local(a.id, &a.name);
            }
            Expr::Binary(b) => {
                self.resolve_expr(&b.left);
                self.resolve_expr(&b.right);
            }
            Expr::Call(c) => {
                self.resolve_expr(&c.callee);
                for argument in &c.arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Function(f) => {
                let enclosing = self.current_function;
                self.current_function = FunctionType::Function;

                // Outer scope holds the literal's own name, if any, so the
                // function can recurse; the inner scope holds parameters.
                self.begin_scope();
                if let Some(ref name) = f.name {
                    self.declare(&name.name, name.span);
                    self.define(&name.name);
                }
                self.begin_scope();
                for param in &f.params {
                    self.declare(&param.name, param.span);
                    self.define(&param.name);
                }
                for stmt in &f.body {
                    self.resolve_stmt(stmt);
                }
                self.end_scope();
                self.end_scope();

                self.current_function = enclosing;
            }
            Expr::Get(g) => self.resolve_expr(&g.object),
            Expr::Grouping(g) => self.resolve_expr(&g.expression),
            Expr::Literal(_) => {}
            Expr::Logical(l) => {
                self.resolve_expr(&l.left);
                self.resolve_expr(&l.right);
            }
            Expr::Set(s) => {
                self.resolve_expr(&s.value);
                self.resolve_expr(&s.object);
            }
            Expr::Super(s) => {
                match self.current_class {
                    ClassType::None => {
                        self.error(s.span, "super", "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.error(
                            s.span,
                            "super",
                            "Can't use 'super' in a class with no superclass.",
                        );
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(s.id, "super");
            }
            Expr::Ternary(t) => {
                self.resolve_expr(&t.condition);
                self.resolve_expr(&t.then_branch);
                self.resolve_expr(&t.else_branch);
            }
            Expr::This(t) => {
                if self.current_class == ClassType::None {
                    self.error(t.span, "this", "Can't use 'this' outside of a class.");
                }
                self.resolve_local(t.id, "this");
            }
            Expr::Unary(u) => self.resolve_expr(&u.operand),
            Expr::Variable(v) => self.resolve_expr_variable(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner;

    fn resolve_source(source: &str) -> Result<HashMap<ExprId, usize>, Vec<CompileError>> {
        let (tokens, errors) = scanner::scan(source);
        assert!(errors.is_empty(), "scan errors: {errors:?}");
        let program = Parser::new(tokens).parse().expect("parse should succeed");
        Resolver::new(source).resolve(&program)
    }

    fn resolve_err(source: &str) -> Vec<String> {
        resolve_source(source)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn globals_get_no_table_entries() {
        let locals = resolve_source("var a = 1; print a;").expect("resolves");
        assert!(locals.is_empty());
    }

    #[test]
    fn shadowed_reference_gets_hop_count() {
        let source = "{ var b = 1; { print b; } }";
        let (tokens, _) = scanner::scan(source);
        let program = Parser::new(tokens).parse().expect("parse");
        let locals = Resolver::new(source).resolve(&program).expect("resolves");

        // dig out the `b` reference inside the inner block's print
        let Stmt::Block(ref outer) = program.statements[0] else {
            panic!("expected block")
        };
        let Stmt::Block(ref inner) = outer.statements[1] else {
            panic!("expected inner block")
        };
        let Stmt::Print(ref print) = inner.statements[0] else {
            panic!("expected print")
        };
        let Expr::Variable(ref var) = print.expression else {
            panic!("expected variable")
        };
        assert_eq!(locals.get(&var.id), Some(&1));
    }

    #[test]
    fn unused_local_variable_is_reported() {
        let errors = resolve_err("{\n  var a = \"global\";\n}");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            "[line 1] Error at 'a': Variable 'a' declared but not used."
        );
    }

    #[test]
    fn redeclaration_reports_both_errors() {
        let errors = resolve_err("{\nvar a = 1;\nvar a = 2;\n}");
        assert_eq!(
            errors,
            vec![
                "[line 2] Error at 'a': Already a variable with this name in this scope",
                "[line 2] Error at 'a': Variable 'a' declared but not used.",
            ]
        );
    }

    #[test]
    fn reading_a_variable_in_its_own_initializer() {
        let errors = resolve_err("{ var a = a; }");
        assert!(
            errors[0].contains("Can't read local variable in its own initializer."),
            "got: {errors:?}"
        );
    }

    #[test]
    fn unused_parameter_is_reported() {
        let errors = resolve_err("fun f(a, b) { print a; } f(1, 2);");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Variable 'b' declared but not used."));
    }

    #[test]
    fn duplicate_parameters_are_reported() {
        let errors = resolve_err("fun f(a, a) { print a; } f(1, 2);");
        assert!(
            errors[0].contains("Already a variable with this name in this scope"),
            "got: {errors:?}"
        );
    }

    #[test]
    fn return_at_top_level_is_an_error() {
        let errors = resolve_err("return 1;");
        assert_eq!(
            errors[0],
            "[line 0] Error at 'return': Can't return from top-level code."
        );
    }

    #[test]
    fn return_inside_function_is_fine() {
        assert!(resolve_source("fun f() { return 1; } f();").is_ok());
    }

    #[test]
    fn initializer_may_return_a_value() {
        // construction discards it; the resolver does not reject it
        assert!(resolve_source("class C { init() { return 7; } } C();").is_ok());
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let errors = resolve_err("print this;");
        assert_eq!(
            errors[0],
            "[line 0] Error at 'this': Can't use 'this' outside of a class."
        );
    }

    #[test]
    fn super_outside_class_is_an_error() {
        let errors = resolve_err("super.hello();");
        assert_eq!(
            errors[0],
            "[line 0] Error at 'super': Can't use 'super' outside of a class."
        );
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        let errors = resolve_err("class Doughnut {\n  cook() {\n    super.cook();\n  }\n}");
        assert_eq!(
            errors[0],
            "[line 2] Error at 'super': Can't use 'super' in a class with no superclass."
        );
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        let errors = resolve_err("class Oops < Oops {}");
        assert_eq!(
            errors[0],
            "[line 0] Error at 'Oops': A class can't inherit from itself."
        );
    }

    #[test]
    fn methods_resolve_this_through_the_synthetic_scope() {
        assert!(resolve_source("class C { m() { return this; } } C().m();").is_ok());
    }

    #[test]
    fn super_resolves_in_a_subclass() {
        let source = "class A { m() { return 1; } } class B < A { m() { return super.m(); } } B().m();";
        assert!(resolve_source(source).is_ok());
    }

    #[test]
    fn named_function_literal_can_recurse() {
        assert!(resolve_source("var f = fun again(n) { return n < 1 ? n : again(n - 1); }; f(3);").is_ok());
    }

    #[test]
    fn unused_named_function_literal_is_reported() {
        let errors = resolve_err("var f = fun lonely(n) { return n; }; f(1);");
        assert!(
            errors[0].contains("Variable 'lonely' declared but not used."),
            "got: {errors:?}"
        );
    }

    #[test]
    fn assignment_counts_as_use() {
        // the original marks a name used when it is assigned through
        assert!(resolve_source("{ var a = 1; a = 2; }").is_ok());
    }

    #[test]
    fn forward_reference_to_global_function_resolves_dynamically() {
        let locals =
            resolve_source("fun a() { return b(); }\nfun b() { return 1; }\nprint a();")
                .expect("resolves");
        // `b` inside `a` has no lexical binding: left to the global lookup
        assert!(locals.values().all(|&distance| distance < 2));
    }
}
