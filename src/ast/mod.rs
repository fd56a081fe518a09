pub mod printer;

use serde::Serialize;

use crate::scanner::token::Span;

/// A unique identifier for each expression node, used by the resolver to
/// store scope distances. Two structurally identical expressions have
/// distinct ids and resolve independently.
pub type ExprId = usize;

/// Top-level program: a list of statements.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Stmt {
    Block(BlockStmt),
    Class(ClassDecl),
    Expression(ExprStmt),
    Function(FunctionDecl),
    If(IfStmt),
    Print(PrintStmt),
    Return(ReturnStmt),
    While(WhileStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Var(VarDecl),
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockStmt {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub name_span: Span,
    /// Parsed as a variable reference, resolved and evaluated like any other.
    pub superclass: Option<VariableExpr>,
    pub methods: Vec<Function>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExprStmt {
    pub expression: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDecl {
    pub function: Function,
    pub span: Span,
}

/// Shared shape for named function declarations and class methods.
/// `params: None` marks a getter: a method declared without a parameter
/// list, invoked automatically on property access.
#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub name: String,
    pub name_span: Span,
    pub params: Option<Vec<Param>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Function {
    pub fn is_getter(&self) -> bool {
        self.params.is_none()
    }

    pub fn arity(&self) -> usize {
        self.params.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrintStmt {
    pub expression: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

/// `increment` is populated only by the `for` desugar; it runs after every
/// iteration that did not `break`, including ones ended by `continue`.
#[derive(Debug, Clone, Serialize)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub increment: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakStmt {
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinueStmt {
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarDecl {
    pub name: String,
    pub name_span: Span,
    pub initializer: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Expr {
    Assign(AssignExpr),
    Binary(BinaryExpr),
    Call(CallExpr),
    Function(FunctionExpr),
    Get(GetExpr),
    Grouping(GroupingExpr),
    Literal(LiteralExpr),
    Logical(LogicalExpr),
    Set(SetExpr),
    Super(SuperExpr),
    Ternary(TernaryExpr),
    This(ThisExpr),
    Unary(UnaryExpr),
    Variable(VariableExpr),
}

impl Expr {
    pub fn id(&self) -> ExprId {
        match self {
            Self::Assign(e) => e.id,
            Self::Binary(e) => e.id,
            Self::Call(e) => e.id,
            Self::Function(e) => e.id,
            Self::Get(e) => e.id,
            Self::Grouping(e) => e.id,
            Self::Literal(e) => e.id,
            Self::Logical(e) => e.id,
            Self::Set(e) => e.id,
            Self::Super(e) => e.id,
            Self::Ternary(e) => e.id,
            Self::This(e) => e.id,
            Self::Unary(e) => e.id,
            Self::Variable(e) => e.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Assign(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Call(e) => e.span,
            Self::Function(e) => e.span,
            Self::Get(e) => e.span,
            Self::Grouping(e) => e.span,
            Self::Literal(e) => e.span,
            Self::Logical(e) => e.span,
            Self::Set(e) => e.span,
            Self::Super(e) => e.span,
            Self::Ternary(e) => e.span,
            Self::This(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Variable(e) => e.span,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignExpr {
    pub id: ExprId,
    pub name: String,
    pub name_span: Span,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinaryExpr {
    pub id: ExprId,
    pub left: Box<Expr>,
    pub operator: BinaryOp,
    /// Span of the operator token, for line-accurate runtime errors.
    pub op_span: Span,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = ",")]
    Comma,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallExpr {
    pub id: ExprId,
    pub callee: Box<Expr>,
    pub arguments: Vec<Expr>,
    /// Span of the closing parenthesis; arity and call errors attach here.
    pub close_span: Span,
    pub span: Span,
}

/// A function literal in expression position. The optional name lets the
/// literal recurse by referring to itself inside its own closure.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionExpr {
    pub id: ExprId,
    pub name: Option<Param>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetExpr {
    pub id: ExprId,
    pub object: Box<Expr>,
    pub name: String,
    pub name_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupingExpr {
    pub id: ExprId,
    pub expression: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiteralExpr {
    pub id: ExprId,
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogicalExpr {
    pub id: ExprId,
    pub left: Box<Expr>,
    pub operator: LogicalOp,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetExpr {
    pub id: ExprId,
    pub object: Box<Expr>,
    pub name: String,
    pub name_span: Span,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuperExpr {
    pub id: ExprId,
    pub method: String,
    pub method_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct TernaryExpr {
    pub id: ExprId,
    pub condition: Box<Expr>,
    pub then_branch: Box<Expr>,
    pub else_branch: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThisExpr {
    pub id: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum UnaryOp {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "!")]
    Not,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnaryExpr {
    pub id: ExprId,
    pub operator: UnaryOp,
    pub operand: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableExpr {
    pub id: ExprId,
    pub name: String,
    pub span: Span,
}
