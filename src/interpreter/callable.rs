use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Function, FunctionExpr};
use crate::interpreter::environment::Environment;
use crate::interpreter::value::{LoxInstance, Value};

/// Every invocable runtime value: an arity plus a call operation (the call
/// itself lives in the evaluator, which owns the environment plumbing).
#[derive(Debug, Clone)]
pub enum Callable {
    Native(NativeFunction),
    User(LoxFunction),
    Expression(ExprFunction),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Self::Native(n) => n.arity(),
            Self::User(f) => f.arity(),
            Self::Expression(f) => f.declaration.params.len(),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(n) => write!(f, "<fn {}>", n.name()),
            Self::User(func) => write!(f, "<fn {}>", func.declaration.name),
            Self::Expression(func) => match func.declaration.name {
                Some(ref name) => write!(f, "<fn {}>", name.name),
                None => write!(f, "<fn>"),
            },
        }
    }
}

/// A declared function or method: its declaration plus the environment that
/// was active where it was declared (its closure).
#[derive(Debug, Clone)]
pub struct LoxFunction {
    pub declaration: Rc<Function>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
    pub is_getter: bool,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.arity()
    }

    /// A new function sharing the declaration, wrapped in a fresh frame that
    /// binds `this`. This is how property access produces bound methods.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> Self {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.closure,
        ))));
        env.borrow_mut()
            .define("this".to_string(), Value::Instance(instance));
        Self {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
            is_getter: self.is_getter,
        }
    }
}

/// A function literal value. If the literal was named, the name is defined
/// inside its own closure so the function can recurse.
#[derive(Debug, Clone)]
pub struct ExprFunction {
    pub declaration: Rc<FunctionExpr>,
    pub closure: Rc<RefCell<Environment>>,
}

#[derive(Debug, Clone, Copy)]
pub enum NativeFunction {
    Clock,
}

impl NativeFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clock => "clock",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Clock => 0,
        }
    }

    pub fn call(&self, _args: &[Value]) -> Value {
        match self {
            Self::Clock => {
                use std::time::{SystemTime, UNIX_EPOCH};
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .expect("system clock should be after the unix epoch")
                    .as_millis();
                Value::Number(millis as f64)
            }
        }
    }
}
