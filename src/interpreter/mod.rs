pub mod callable;
pub mod environment;
pub mod resolver;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::ast::*;
use crate::error::RuntimeError;
use crate::interpreter::callable::{Callable, ExprFunction, LoxFunction, NativeFunction};
use crate::interpreter::environment::Environment;
use crate::interpreter::value::{LoxClass, LoxInstance, Value};
use crate::scanner::token::Span;

/// Call frames beyond this raise a normal runtime error instead of
/// exhausting the host stack.
const MAX_CALL_DEPTH: usize = 128;

/// The result of executing one statement. Loops consume `Break` and
/// `Continue`; the nearest call frame consumes `Return`.
#[derive(Debug)]
enum ControlFlow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Vec<String>,
    /// Writer for print output (allows testing without stdout).
    writer: Box<dyn Write>,
    call_depth: usize,
    /// Source code, retained for line attribution in runtime errors.
    source: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Value::Function(Callable::Native(NativeFunction::Clock)),
        );

        Self {
            globals: Rc::clone(&globals),
            environment: globals,
            locals: HashMap::new(),
            output: Vec::new(),
            writer,
            call_depth: 0,
            source: String::new(),
        }
    }

    /// Set the source code for line attribution in runtime errors.
    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Run a program against previously merged resolution tables, yielding
    /// the value of the last top-level expression statement. The environment
    /// persists across calls, which is what gives the REPL its memory;
    /// expression ids are globally unique so tables from separate runs
    /// never collide.
    pub fn interpret(
        &mut self,
        program: &Program,
        locals: HashMap<ExprId, usize>,
    ) -> Result<Value, RuntimeError> {
        self.locals.extend(locals);
        let mut last = Value::Nil;
        for stmt in &program.statements {
            match stmt {
                Stmt::Expression(e) => last = self.evaluate_expr(&e.expression)?,
                _ => {
                    self.execute_stmt(stmt)?;
                }
            }
        }
        Ok(last)
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<ControlFlow, RuntimeError> {
        match stmt {
            Stmt::Block(b) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));
                self.execute_block(&b.statements, env)
            }
            Stmt::Class(c) => {
                self.execute_class(c)?;
                Ok(ControlFlow::Normal)
            }
            Stmt::Expression(e) => {
                self.evaluate_expr(&e.expression)?;
                Ok(ControlFlow::Normal)
            }
            Stmt::Function(f) => {
                let function = LoxFunction {
                    declaration: Rc::new(f.function.clone()),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                    is_getter: false,
                };
                self.environment.borrow_mut().define(
                    f.function.name.clone(),
                    Value::Function(Callable::User(function)),
                );
                Ok(ControlFlow::Normal)
            }
            Stmt::If(i) => {
                if self.evaluate_expr(&i.condition)?.is_truthy() {
                    self.execute_stmt(&i.then_branch)
                } else if let Some(ref else_branch) = i.else_branch {
                    self.execute_stmt(else_branch)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }
            Stmt::Print(p) => {
                let value = self.evaluate_expr(&p.expression)?;
                let text = value.to_string();
                writeln!(self.writer, "{text}").expect("write to output sink should succeed");
                self.output.push(text);
                Ok(ControlFlow::Normal)
            }
            Stmt::Return(r) => {
                let value = match r.value {
                    Some(ref value) => self.evaluate_expr(value)?,
                    None => Value::Nil,
                };
                Ok(ControlFlow::Return(value))
            }
            Stmt::While(w) => {
                while self.evaluate_expr(&w.condition)?.is_truthy() {
                    match self.execute_stmt(&w.body)? {
                        ControlFlow::Break => break,
                        ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                        // The desugared for-loop increment runs after normal
                        // iterations and after continue, never after break.
                        ControlFlow::Normal | ControlFlow::Continue => {
                            if let Some(ref increment) = w.increment {
                                self.evaluate_expr(increment)?;
                            }
                        }
                    }
                }
                Ok(ControlFlow::Normal)
            }
            Stmt::Break(_) => Ok(ControlFlow::Break),
            Stmt::Continue(_) => Ok(ControlFlow::Continue),
            Stmt::Var(v) => {
                let value = match v.initializer {
                    Some(ref initializer) => self.evaluate_expr(initializer)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(v.name.clone(), value);
                Ok(ControlFlow::Normal)
            }
        }
    }

    fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<ControlFlow, RuntimeError> {
        let previous = Rc::clone(&self.environment);
        self.environment = env;
        let mut result = Ok(ControlFlow::Normal);
        for stmt in statements {
            match self.execute_stmt(stmt) {
                Ok(ControlFlow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }
        self.environment = previous;
        result
    }

    fn execute_class(&mut self, class: &ClassDecl) -> Result<(), RuntimeError> {
        let superclass = match class.superclass {
            Some(ref expr) => {
                let value = self.look_up_variable(&expr.name, expr.id, expr.span)?;
                match value {
                    Value::Class(sc) => Some(sc),
                    _ => {
                        return Err(RuntimeError::with_span(
                            "Superclass must be a class.",
                            expr.span,
                        ));
                    }
                }
            }
            None => None,
        };

        // Pre-declare the name so method bodies that mention the class see a
        // binding even before the class value exists.
        self.environment
            .borrow_mut()
            .define(class.name.clone(), Value::Nil);

        let enclosing = if let Some(ref sc) = superclass {
            let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                &self.environment,
            ))));
            env.borrow_mut()
                .define("super".to_string(), Value::Class(Rc::clone(sc)));
            let previous = Rc::clone(&self.environment);
            self.environment = env;
            Some(previous)
        } else {
            None
        };

        let mut methods = HashMap::new();
        for method in &class.methods {
            let function = LoxFunction {
                declaration: Rc::new(method.clone()),
                closure: Rc::clone(&self.environment),
                is_initializer: method.name == "init",
                is_getter: method.is_getter(),
            };
            methods.insert(method.name.clone(), function);
        }

        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        log::debug!("class '{}' defined with {} methods", class.name, methods.len());

        let class_value = Value::Class(Rc::new(LoxClass {
            name: class.name.clone(),
            superclass,
            methods,
        }));
        self.environment.borrow_mut().assign(&class.name, class_value);
        Ok(())
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Assign(a) => {
                let value = self.evaluate_expr(&a.value)?;
                if let Some(&distance) = self.locals.get(&a.id) {
                    Environment::assign_at(&self.environment, distance, &a.name, value.clone());
                } else if !self.globals.borrow_mut().assign(&a.name, value.clone()) {
                    return Err(RuntimeError::with_span(
                        format!("Undefined variable name '{}'", a.name),
                        a.name_span,
                    ));
                }
                Ok(value)
            }
            Expr::Binary(b) => self.evaluate_binary(b),
            Expr::Call(c) => self.evaluate_call(c),
            Expr::Function(f) => {
                let closure = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));
                let function = ExprFunction {
                    declaration: Rc::new(f.clone()),
                    closure: Rc::clone(&closure),
                };
                let value = Value::Function(Callable::Expression(function));
                if let Some(ref name) = f.name {
                    // a named literal can recurse through its own closure
                    closure.borrow_mut().define(name.name.clone(), value.clone());
                }
                Ok(value)
            }
            Expr::Get(g) => self.evaluate_get(g),
            Expr::Grouping(g) => self.evaluate_expr(&g.expression),
            Expr::Literal(l) => Ok(match l.value {
                LiteralValue::Number(n) => Value::Number(n),
                LiteralValue::String(ref s) => Value::Str(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(b),
                LiteralValue::Nil => Value::Nil,
            }),
            Expr::Logical(l) => {
                let left = self.evaluate_expr(&l.left)?;
                match l.operator {
                    LogicalOp::Or if left.is_truthy() => Ok(left),
                    LogicalOp::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate_expr(&l.right),
                }
            }
            Expr::Set(s) => {
                let object = self.evaluate_expr(&s.object)?;
                let Value::Instance(instance) = object else {
                    return Err(RuntimeError::with_span(
                        "Only instances have fields.",
                        s.name_span,
                    ));
                };
                let value = self.evaluate_expr(&s.value)?;
                instance.borrow_mut().set(s.name.clone(), value);
                // a set expression itself yields no value
                Ok(Value::Nil)
            }
            Expr::Super(s) => self.evaluate_super(s),
            Expr::Ternary(t) => {
                if self.evaluate_expr(&t.condition)?.is_truthy() {
                    self.evaluate_expr(&t.then_branch)
                } else {
                    self.evaluate_expr(&t.else_branch)
                }
            }
            Expr::This(t) => self.look_up_variable("this", t.id, t.span),
            Expr::Unary(u) => {
                let operand = self.evaluate_expr(&u.operand)?;
                match u.operator {
                    UnaryOp::Negate => match operand {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::with_span("Operand must be a number.", u.span)),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                }
            }
            Expr::Variable(v) => self.look_up_variable(&v.name, v.id, v.span),
        }
    }

    fn evaluate_binary(&mut self, b: &BinaryExpr) -> Result<Value, RuntimeError> {
        let left = self.evaluate_expr(&b.left)?;
        let right = self.evaluate_expr(&b.right)?;

        match b.operator {
            BinaryOp::Add => match (&left, &right) {
                (Value::Number(a), Value::Number(c)) => Ok(Value::Number(a + c)),
                (Value::Str(a), Value::Str(c)) => Ok(Value::Str(format!("{a}{c}"))),
                _ => Err(RuntimeError::with_span(
                    "Operands must be two numbers or two strings.",
                    b.op_span,
                )),
            },
            BinaryOp::Subtract => number_binop(&left, &right, |a, c| a - c, b.op_span),
            BinaryOp::Multiply => number_binop(&left, &right, |a, c| a * c, b.op_span),
            BinaryOp::Divide => number_binop(&left, &right, |a, c| a / c, b.op_span),
            BinaryOp::Greater => number_cmp(&left, &right, |a, c| a > c, b.op_span),
            BinaryOp::GreaterEqual => number_cmp(&left, &right, |a, c| a >= c, b.op_span),
            BinaryOp::Less => number_cmp(&left, &right, |a, c| a < c, b.op_span),
            BinaryOp::LessEqual => number_cmp(&left, &right, |a, c| a <= c, b.op_span),
            BinaryOp::Equal => Ok(Value::Bool(left.is_equal(&right))),
            BinaryOp::NotEqual => Ok(Value::Bool(!left.is_equal(&right))),
            // both operands evaluate; the sequence yields the right one
            BinaryOp::Comma => Ok(right),
        }
    }

    fn evaluate_call(&mut self, c: &CallExpr) -> Result<Value, RuntimeError> {
        let callee = self.evaluate_expr(&c.callee)?;

        let mut arguments = Vec::with_capacity(c.arguments.len());
        for argument in &c.arguments {
            arguments.push(self.evaluate_expr(argument)?);
        }

        match callee {
            Value::Function(callable) => {
                check_arity(callable.arity(), arguments.len(), c.close_span)?;
                self.call_callable(&callable, arguments, c.close_span)
            }
            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), c.close_span)?;
                self.instantiate(class, arguments, c.close_span)
            }
            _ => Err(RuntimeError::with_span(
                "Can only call functions and classes.",
                c.close_span,
            )),
        }
    }

    fn call_callable(
        &mut self,
        callable: &Callable,
        arguments: Vec<Value>,
        call_span: Span,
    ) -> Result<Value, RuntimeError> {
        match callable {
            Callable::Native(native) => Ok(native.call(&arguments)),
            Callable::User(function) => self.call_user_function(function, arguments, call_span),
            Callable::Expression(function) => {
                self.call_expr_function(function, arguments, call_span)
            }
        }
    }

    fn call_user_function(
        &mut self,
        function: &LoxFunction,
        arguments: Vec<Value>,
        call_span: Span,
    ) -> Result<Value, RuntimeError> {
        self.enter_call(call_span)?;

        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &function.closure,
        ))));
        for (param, argument) in function.declaration.params.iter().flatten().zip(arguments) {
            env.borrow_mut().define(param.name.clone(), argument);
        }

        let result = self.execute_block(&function.declaration.body, env);
        self.call_depth -= 1;
        let flow = result?;

        if function.is_initializer {
            // construction always yields the instance, whatever the body
            // returned
            return Ok(Environment::get_at(&function.closure, 0, "this").unwrap_or(Value::Nil));
        }
        match flow {
            ControlFlow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    fn call_expr_function(
        &mut self,
        function: &ExprFunction,
        arguments: Vec<Value>,
        call_span: Span,
    ) -> Result<Value, RuntimeError> {
        self.enter_call(call_span)?;

        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &function.closure,
        ))));
        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            env.borrow_mut().define(param.name.clone(), argument);
        }

        let result = self.execute_block(&function.declaration.body, env);
        self.call_depth -= 1;

        match result? {
            ControlFlow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    fn enter_call(&mut self, span: Span) -> Result<(), RuntimeError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::with_span("Stack overflow.", span));
        }
        self.call_depth += 1;
        Ok(())
    }

    fn instantiate(
        &mut self,
        class: Rc<LoxClass>,
        arguments: Vec<Value>,
        call_span: Span,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&class))));
        if let Some(init) = class.find_method("init") {
            let bound = init.bind(Rc::clone(&instance));
            // the initializer's return value is discarded; construction
            // yields the instance
            self.call_user_function(&bound, arguments, call_span)?;
        }
        Ok(Value::Instance(instance))
    }

    fn evaluate_get(&mut self, g: &GetExpr) -> Result<Value, RuntimeError> {
        let object = self.evaluate_expr(&g.object)?;
        match object {
            Value::Instance(instance) => {
                let field = instance.borrow().field(&g.name);
                if let Some(value) = field {
                    return Ok(value);
                }
                let method = instance.borrow().class.find_method(&g.name);
                match method {
                    Some(method) => {
                        let bound = method.bind(Rc::clone(&instance));
                        if bound.is_getter {
                            // getters have no call syntax at the use site
                            self.call_user_function(&bound, Vec::new(), g.name_span)
                        } else {
                            Ok(Value::Function(Callable::User(bound)))
                        }
                    }
                    None => Err(RuntimeError::with_span(
                        format!("Undefined property '{}'.", g.name),
                        g.name_span,
                    )),
                }
            }
            // property access on a class value yields the method unbound
            Value::Class(class) => match class.find_method(&g.name) {
                Some(method) => Ok(Value::Function(Callable::User(method))),
                None => Err(RuntimeError::with_span(
                    format!("Undefined property '{}'", g.name),
                    g.name_span,
                )),
            },
            _ => Err(RuntimeError::with_span(
                "Only instances have properties.",
                g.name_span,
            )),
        }
    }

    fn evaluate_super(&mut self, s: &SuperExpr) -> Result<Value, RuntimeError> {
        let distance = *self
            .locals
            .get(&s.id)
            .expect("resolver records a distance for every legal 'super'");
        let superclass = Environment::get_at(&self.environment, distance, "super");
        let object = Environment::get_at(&self.environment, distance - 1, "this");

        if let (Some(Value::Class(superclass)), Some(Value::Instance(instance))) =
            (superclass, object)
        {
            match superclass.find_method(&s.method) {
                Some(method) => Ok(Value::Function(Callable::User(method.bind(instance)))),
                None => Err(RuntimeError::with_span(
                    format!("Undefined property '{}'.", s.method),
                    s.method_span,
                )),
            }
        } else {
            Err(RuntimeError::with_span("Superclass lookup failed.", s.span))
        }
    }

    fn look_up_variable(
        &self,
        name: &str,
        id: ExprId,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if let Some(&distance) = self.locals.get(&id) {
            // A resolved slot can be absent at run time when a method runs
            // unbound off a class value; mirror the dynamic lookup and
            // yield nil.
            Ok(Environment::get_at(&self.environment, distance, name).unwrap_or(Value::Nil))
        } else {
            self.globals.borrow().get(name).ok_or_else(|| {
                RuntimeError::with_span(format!("Undefined variable name '{name}'"), span)
            })
        }
    }
}

fn check_arity(expected: usize, got: usize, span: Span) -> Result<(), RuntimeError> {
    if expected != got {
        return Err(RuntimeError::with_span(
            format!("Expected {expected} arguments but got {got}."),
            span,
        ));
    }
    Ok(())
}

fn number_binop(
    left: &Value,
    right: &Value,
    op: fn(f64, f64) -> f64,
    span: Span,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(c)) => Ok(Value::Number(op(*a, *c))),
        _ => Err(RuntimeError::with_span("Operands must be numbers.", span)),
    }
}

fn number_cmp(
    left: &Value,
    right: &Value,
    op: fn(f64, f64) -> bool,
    span: Span,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(c)) => Ok(Value::Bool(op(*a, *c))),
        _ => Err(RuntimeError::with_span("Operands must be numbers.", span)),
    }
}
