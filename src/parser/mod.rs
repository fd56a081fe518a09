use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ast::*;
use crate::error::{CompileError, ErrorLocation};
use crate::scanner::token::{Literal, Span, Token, TokenKind};

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

fn next_id() -> ExprId {
    NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<CompileError>,
    loop_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            loop_depth: 0,
        }
    }

    /// Parse the whole token stream. A syntax error aborts the statement it
    /// occurred in; the parser then synchronizes to the next statement
    /// boundary and keeps going, so independent errors each get a diagnostic.
    pub fn parse(mut self) -> Result<Program, Vec<CompileError>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        if self.errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(self.errors)
        }
    }

    fn declaration(&mut self) -> Result<Stmt, CompileError> {
        if self.check(TokenKind::Class) {
            self.class_declaration()
        } else if self.check(TokenKind::Fun) {
            self.fun_declaration()
        } else if self.check(TokenKind::Var) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'class'
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.match_token(TokenKind::Less) {
            let sup = self.consume(TokenKind::Identifier, "Expect superclass name.")?;
            Some(VariableExpr {
                id: next_id(),
                name: sup.lexeme,
                span: sup.span,
            })
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;

        let span = self.span_from(start);
        Ok(Stmt::Class(ClassDecl {
            name: name.lexeme,
            name_span: name.span,
            superclass,
            methods,
            span,
        }))
    }

    fn fun_declaration(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'fun'
        let function = self.function("function")?;
        let span = self.span_from(start);
        Ok(Stmt::Function(FunctionDecl { function, span }))
    }

    /// Parse a named function or method. A method without a parameter list
    /// is a getter; every other kind requires `()` even with no parameters.
    fn function(&mut self, kind: &str) -> Result<Function, CompileError> {
        let start = self.current_span();
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;

        let params = if kind != "method" || self.check(TokenKind::LeftParen) {
            self.consume(
                TokenKind::LeftParen,
                &format!("Expect '(' after {kind} name."),
            )?;
            let params = self.parameter_list()?;
            self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
            Some(params)
        } else {
            None
        };

        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
        )?;
        let body = self.block_statements()?;
        let span = self.span_from(start);

        Ok(Function {
            name: name.lexeme,
            name_span: name.span,
            params,
            body,
            span,
        })
    }

    fn parameter_list(&mut self) -> Result<Vec<Param>, CompileError> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= 255 {
                    // Recoverable: report and keep parsing the list.
                    let token = self.peek().clone();
                    let error = self.error_at(&token, "Can't have more than 255 parameters.");
                    self.errors.push(error);
                }
                let param = self.consume(TokenKind::Identifier, "Expect parameter name.")?;
                params.push(Param {
                    name: param.lexeme,
                    span: param.span,
                });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(params)
    }

    fn var_declaration(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'var'
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;

        let initializer = if self.match_token(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        let span = self.span_from(start);
        Ok(Stmt::Var(VarDecl {
            name: name.lexeme,
            name_span: name.span,
            initializer,
            span,
        }))
    }

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        if self.check(TokenKind::Print) {
            self.print_statement()
        } else if self.check(TokenKind::LeftBrace) {
            self.block_statement()
        } else if self.check(TokenKind::If) {
            self.if_statement()
        } else if self.check(TokenKind::While) {
            self.loop_depth += 1;
            let statement = self.while_statement();
            self.loop_depth -= 1;
            statement
        } else if self.check(TokenKind::For) {
            self.loop_depth += 1;
            let statement = self.for_statement();
            self.loop_depth -= 1;
            statement
        } else if self.check(TokenKind::Break) {
            self.break_statement()
        } else if self.check(TokenKind::Continue) {
            self.continue_statement()
        } else if self.check(TokenKind::Return) {
            self.return_statement()
        } else {
            self.expression_statement()
        }
    }

    fn print_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'print'
        let expression = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value")?;
        let span = self.span_from(start);
        Ok(Stmt::Print(PrintStmt { expression, span }))
    }

    fn block_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume '{'
        let statements = self.block_statements()?;
        let span = self.span_from(start);
        Ok(Stmt::Block(BlockStmt { statements, span }))
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'if'
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch,
            span,
        }))
    }

    fn while_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'while'
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after while condition.")?;
        let body = Box::new(self.statement()?);
        let span = self.span_from(start);
        Ok(Stmt::While(WhileStmt {
            condition,
            body,
            increment: None,
            span,
        }))
    }

    /// Desugar `for` into `while`. The increment rides on the while node so
    /// that `continue` still runs it before the condition is re-tested; an
    /// initializer wraps the loop in its own block, which is what scopes the
    /// loop variable.
    fn for_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'for'
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(TokenKind::Semicolon) {
            None
        } else if self.check(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            self.expression()?
        } else {
            Expr::Literal(LiteralExpr {
                id: next_id(),
                value: LiteralValue::Bool(true),
                span: self.current_span(),
            })
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let body = self.statement()?;

        let while_span = self.span_from(start);
        let mut stmt = Stmt::While(WhileStmt {
            condition,
            body: Box::new(body),
            increment,
            span: while_span,
        });

        if let Some(init) = initializer {
            let block_span = self.span_from(start);
            stmt = Stmt::Block(BlockStmt {
                statements: vec![init, stmt],
                span: block_span,
            });
        }

        Ok(stmt)
    }

    fn break_statement(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance().clone();
        if self.loop_depth == 0 {
            return Err(self.error_at(&keyword, "Break outside loop."));
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after break.")?;
        Ok(Stmt::Break(BreakStmt { span: keyword.span }))
    }

    fn continue_statement(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance().clone();
        if self.loop_depth == 0 {
            return Err(self.error_at(&keyword, "Continue outside loop."));
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after continue.")?;
        Ok(Stmt::Continue(ContinueStmt { span: keyword.span }))
    }

    fn return_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.current_span();
        self.advance(); // consume 'return'
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        let span = self.span_from(start);
        Ok(Stmt::Return(ReturnStmt { value, span }))
    }

    fn expression_statement(&mut self) -> Result<Stmt, CompileError> {
        let expression = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        let span = expression.span();
        Ok(Stmt::Expression(ExprStmt { expression, span }))
    }

    // --- Expressions, loosest to tightest ---

    fn expression(&mut self) -> Result<Expr, CompileError> {
        self.series()
    }

    /// The comma sequence operator; shares the binary node shape.
    fn series(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.assignment()?;
        while self.match_token(TokenKind::Comma) {
            let op_span = self.previous_span();
            let right = self.assignment()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Binary(BinaryExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: BinaryOp::Comma,
                op_span,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn assignment(&mut self) -> Result<Expr, CompileError> {
        let expr = self.ternary()?;

        if self.match_token(TokenKind::Equal) {
            let equals = self.tokens[self.current - 1].clone();
            let value = self.assignment()?;
            let span = join_spans(expr.span(), value.span());

            return match expr {
                Expr::Variable(v) => Ok(Expr::Assign(AssignExpr {
                    id: next_id(),
                    name: v.name,
                    name_span: v.span,
                    value: Box::new(value),
                    span,
                })),
                Expr::Get(g) => Ok(Expr::Set(SetExpr {
                    id: next_id(),
                    object: g.object,
                    name: g.name,
                    name_span: g.name_span,
                    value: Box::new(value),
                    span,
                })),
                _ => Err(self.error_at(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    /// Right-associative `?:`; each branch is itself a ternary.
    fn ternary(&mut self) -> Result<Expr, CompileError> {
        let expr = self.or()?;
        if self.match_token(TokenKind::Question) {
            let then_branch = self.ternary()?;
            self.consume(TokenKind::Colon, "Expect ':' after conditional.")?;
            let else_branch = self.ternary()?;
            let span = join_spans(expr.span(), else_branch.span());
            return Ok(Expr::Ternary(TernaryExpr {
                id: next_id(),
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
                span,
            }));
        }
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.and()?;
        while self.match_token(TokenKind::Or) {
            let right = self.and()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Logical(LogicalExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.equality()?;
        while self.match_token(TokenKind::And) {
            let right = self.equality()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Logical(LogicalExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.comparison()?;
        while let Some((op, op_span)) = self.match_binary_op(&[
            (TokenKind::BangEqual, BinaryOp::NotEqual),
            (TokenKind::EqualEqual, BinaryOp::Equal),
        ]) {
            let right = self.comparison()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Binary(BinaryExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: op,
                op_span,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.term()?;
        while let Some((op, op_span)) = self.match_binary_op(&[
            (TokenKind::Greater, BinaryOp::Greater),
            (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
            (TokenKind::Less, BinaryOp::Less),
            (TokenKind::LessEqual, BinaryOp::LessEqual),
        ]) {
            let right = self.term()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Binary(BinaryExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: op,
                op_span,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.factor()?;
        while let Some((op, op_span)) = self.match_binary_op(&[
            (TokenKind::Minus, BinaryOp::Subtract),
            (TokenKind::Plus, BinaryOp::Add),
        ]) {
            let right = self.factor()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Binary(BinaryExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: op,
                op_span,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.unary()?;
        while let Some((op, op_span)) = self.match_binary_op(&[
            (TokenKind::Slash, BinaryOp::Divide),
            (TokenKind::Star, BinaryOp::Multiply),
        ]) {
            let right = self.unary()?;
            let span = join_spans(expr.span(), right.span());
            expr = Expr::Binary(BinaryExpr {
                id: next_id(),
                left: Box::new(expr),
                operator: op,
                op_span,
                right: Box::new(right),
                span,
            });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        if self.check(TokenKind::Bang) || self.check(TokenKind::Minus) {
            let op_token = self.advance().clone();
            let operator = if op_token.kind == TokenKind::Bang {
                UnaryOp::Not
            } else {
                UnaryOp::Negate
            };
            let operand = self.unary()?;
            let span = join_spans(op_token.span, operand.span());
            return Ok(Expr::Unary(UnaryExpr {
                id: next_id(),
                operator,
                operand: Box::new(operand),
                span,
            }));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(TokenKind::Dot) {
                let name =
                    self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                let span = join_spans(expr.span(), name.span);
                expr = Expr::Get(GetExpr {
                    id: next_id(),
                    object: Box::new(expr),
                    name: name.lexeme,
                    name_span: name.span,
                    span,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, CompileError> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    // Recoverable: report and keep parsing the list.
                    let token = self.peek().clone();
                    let error = self.error_at(&token, "Can't have more than 255 arguments.");
                    self.errors.push(error);
                }
                // Assignment level: a bare comma separates arguments here,
                // it is not the sequence operator.
                arguments.push(self.assignment()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        let span = join_spans(callee.span(), paren.span);
        Ok(Expr::Call(CallExpr {
            id: next_id(),
            callee: Box::new(callee),
            arguments,
            close_span: paren.span,
            span,
        }))
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let Some(Literal::Number(value)) = token.literal else {
                    unreachable!("number tokens carry their parsed literal")
                };
                Ok(Expr::Literal(LiteralExpr {
                    id: next_id(),
                    value: LiteralValue::Number(value),
                    span: token.span,
                }))
            }
            TokenKind::String => {
                self.advance();
                let Some(Literal::Str(value)) = token.literal else {
                    unreachable!("string tokens carry their parsed literal")
                };
                Ok(Expr::Literal(LiteralExpr {
                    id: next_id(),
                    value: LiteralValue::String(value),
                    span: token.span,
                }))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    id: next_id(),
                    value: LiteralValue::Bool(true),
                    span: token.span,
                }))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    id: next_id(),
                    value: LiteralValue::Bool(false),
                    span: token.span,
                }))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Literal(LiteralExpr {
                    id: next_id(),
                    value: LiteralValue::Nil,
                    span: token.span,
                }))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::This(ThisExpr {
                    id: next_id(),
                    span: token.span,
                }))
            }
            TokenKind::Super => {
                self.advance();
                self.consume(TokenKind::Dot, "Expect '.' after 'super'.")?;
                let method =
                    self.consume(TokenKind::Identifier, "Expect superclass method name.")?;
                let span = join_spans(token.span, method.span);
                Ok(Expr::Super(SuperExpr {
                    id: next_id(),
                    method: method.lexeme,
                    method_span: method.span,
                    span,
                }))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Variable(VariableExpr {
                    id: next_id(),
                    name: token.lexeme,
                    span: token.span,
                }))
            }
            TokenKind::Fun => {
                self.advance();
                self.function_expression(token.span)
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                let close = self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
                let span = join_spans(token.span, close.span);
                Ok(Expr::Grouping(GroupingExpr {
                    id: next_id(),
                    expression: Box::new(expr),
                    span,
                }))
            }
            _ => Err(self.error_at(&token, "Expect expression.")),
        }
    }

    /// A function literal: `fun (a) { ... }` or, named for self-recursion,
    /// `fun count(n) { ... }`.
    fn function_expression(&mut self, start: Span) -> Result<Expr, CompileError> {
        let name = if !self.check(TokenKind::LeftParen) {
            let token = self.consume(TokenKind::Identifier, "Expect function name.")?;
            Some(Param {
                name: token.lexeme,
                span: token.span,
            })
        } else {
            None
        };

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
        let params = self.parameter_list()?;
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block_statements()?;
        let span = self.span_from(start);

        Ok(Expr::Function(FunctionExpr {
            id: next_id(),
            name,
            params,
            body,
            span,
        }))
    }

    // --- Helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_binary_op(&mut self, pairs: &[(TokenKind, BinaryOp)]) -> Option<(BinaryOp, Span)> {
        for &(kind, op) in pairs {
            if self.check(kind) {
                let span = self.peek().span;
                self.advance();
                return Some((op, span));
            }
        }
        None
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, CompileError> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(&token, message))
        }
    }

    fn error_at(&self, token: &Token, message: &str) -> CompileError {
        CompileError::parse(message, token.line, ErrorLocation::of(token), token.span)
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.current - 1].span
    }

    fn span_from(&self, start: Span) -> Span {
        let prev = self.previous_span();
        Span::new(start.offset, prev.offset + prev.len - start.offset)
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.tokens[self.current - 1].kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn join_spans(start: Span, end: Span) -> Span {
    Span::new(start.offset, end.offset + end.len - start.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner;

    fn parse_ok(source: &str) -> Program {
        let (tokens, errors) = scanner::scan(source);
        assert!(errors.is_empty(), "scan errors: {errors:?}");
        Parser::new(tokens).parse().expect("parse should succeed")
    }

    fn parse_err(source: &str) -> Vec<CompileError> {
        let (tokens, errors) = scanner::scan(source);
        assert!(errors.is_empty(), "scan errors: {errors:?}");
        Parser::new(tokens).parse().unwrap_err()
    }

    fn parse_sexp(source: &str) -> String {
        let program = parse_ok(source);
        crate::ast::printer::to_sexp(&program).trim().to_string()
    }

    #[test]
    fn precedence_add_mul() {
        assert_eq!(parse_sexp("1 + 2 * 3;"), "(+ 1 (* 2 3))");
    }

    #[test]
    fn precedence_group() {
        assert_eq!(parse_sexp("(1 + 2) * 3;"), "(* (group (+ 1 2)) 3)");
    }

    #[test]
    fn unary_binds_tighter_than_factor() {
        assert_eq!(parse_sexp("-1 * 2;"), "(* (- 1) 2)");
    }

    #[test]
    fn ternary_after_comparison() {
        assert_eq!(parse_sexp("3 < 4 ? 1 : 2;"), "(?: (< 3 4) 1 2)");
    }

    #[test]
    fn ternary_is_right_associative() {
        assert_eq!(
            parse_sexp("a ? b : c ? d : e;"),
            "(?: a b (?: c d e))"
        );
    }

    #[test]
    fn ternary_branch_can_nest_without_parens() {
        assert_eq!(
            parse_sexp("a ? b ? c : d : e;"),
            "(?: a (?: b c d) e)"
        );
    }

    #[test]
    fn comma_sequences_are_left_associative() {
        assert_eq!(parse_sexp("1, 2, 3;"), "(, (, 1 2) 3)");
    }

    #[test]
    fn comma_binds_looser_than_assignment() {
        assert_eq!(parse_sexp("a = 1, b = 2;"), "(, (= a 1) (= b 2))");
    }

    #[test]
    fn call_arguments_are_not_comma_sequences() {
        assert_eq!(parse_sexp("f(1, 2);"), "(call f 1 2)");
        assert_eq!(parse_sexp("f((1, 2));"), "(call f (group (, 1 2)))");
    }

    #[test]
    fn assignment() {
        assert_eq!(parse_sexp("x = 42;"), "(= x 42)");
    }

    #[test]
    fn set_property() {
        assert_eq!(parse_sexp("obj.field = 42;"), "(.= obj field 42)");
    }

    #[test]
    fn invalid_assignment_target() {
        let errors = parse_err("1 = 2;");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[line 0] Error at '=': Invalid assignment target."
        );
    }

    #[test]
    fn logical_operators() {
        assert_eq!(
            parse_sexp("true and false or true;"),
            "(or (and true false) true)"
        );
    }

    #[test]
    fn for_desugars_to_while_with_increment() {
        assert_eq!(
            parse_sexp("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i 0) (while (< i 3) (print i) (= i (+ i 1))))"
        );
    }

    #[test]
    fn for_without_clauses_defaults_condition_to_true() {
        assert_eq!(parse_sexp("for (;;) print 1;"), "(while true (print 1))");
    }

    #[test]
    fn for_with_expression_initializer() {
        assert_eq!(
            parse_sexp("for (i = 0; i < 3;) print i;"),
            "(block (= i 0) (while (< i 3) (print i)))"
        );
    }

    #[test]
    fn break_and_continue_inside_loops() {
        assert_eq!(
            parse_sexp("while (true) { break; }"),
            "(while true (block (break)))"
        );
        assert_eq!(
            parse_sexp("for (;;) { continue; }"),
            "(while true (block (continue)))"
        );
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let errors = parse_err("break;");
        assert_eq!(
            errors[0].to_string(),
            "[line 0] Error at 'break': Break outside loop."
        );
    }

    #[test]
    fn continue_outside_loop_is_an_error() {
        let errors = parse_err("continue;");
        assert_eq!(
            errors[0].to_string(),
            "[line 0] Error at 'continue': Continue outside loop."
        );
    }

    #[test]
    fn function_decl() {
        assert_eq!(
            parse_sexp("fun foo(a, b) { return a + b; }"),
            "(fun foo (a b) (return (+ a b)))"
        );
    }

    #[test]
    fn named_function_requires_parens() {
        let errors = parse_err("fun foo { return 1; }");
        assert_eq!(
            errors[0].to_string(),
            "[line 0] Error at '{': Expect '(' after function name."
        );
    }

    #[test]
    fn function_literal() {
        assert_eq!(
            parse_sexp("var f = fun (x) { return x; };"),
            "(var f (fun (x) (return x)))"
        );
    }

    #[test]
    fn named_function_literal() {
        assert_eq!(
            parse_sexp("var f = fun again(x) { return again(x); };"),
            "(var f (fun again (x) (return (call again x))))"
        );
    }

    #[test]
    fn class_with_methods() {
        let sexp = parse_sexp("class Foo { bar() { return 1; } }");
        assert!(sexp.starts_with("(class Foo"));
        assert!(sexp.contains("(fun bar ()"));
    }

    #[test]
    fn class_getter_has_no_parameter_list() {
        let sexp = parse_sexp("class Circle { area { return 1; } }");
        assert!(sexp.contains("(get area"), "got: {sexp}");
    }

    #[test]
    fn class_with_superclass() {
        let sexp = parse_sexp("class Foo < Bar { }");
        assert!(sexp.contains("< Bar"));
    }

    #[test]
    fn super_method_access() {
        let sexp = parse_sexp("class B < A { m() { return super.m(); } }");
        assert!(sexp.contains("(call (super m))"), "got: {sexp}");
    }

    #[test]
    fn expect_expression_at_end() {
        let errors = parse_err("print");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[line 0] Error at end: Expect expression."
        );
    }

    #[test]
    fn print_missing_semicolon_message_has_no_period() {
        let errors = parse_err("print 1");
        assert_eq!(
            errors[0].to_string(),
            "[line 0] Error at end: Expect ';' after value"
        );
    }

    #[test]
    fn error_recovery_reports_each_statement_once() {
        let errors = parse_err("var x = ;\nvar y = ;\nvar z = 1;");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("[line 0]"));
        assert!(errors[1].to_string().contains("[line 1]"));
    }

    #[test]
    fn argument_cap_reports_but_keeps_parsing() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));
        let errors = parse_err(&source);
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("Can't have more than 255 arguments."))
        );
    }

    #[test]
    fn parameter_cap_reports_but_keeps_parsing() {
        let params: Vec<String> = (0..256).map(|i| format!("p{i}")).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));
        let errors = parse_err(&source);
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("Can't have more than 255 parameters."))
        );
    }

    #[test]
    fn expression_ids_are_unique_per_node() {
        let program = parse_ok("1 + 1;");
        let Stmt::Expression(ref stmt) = program.statements[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary(ref binary) = stmt.expression else {
            panic!("expected binary expression");
        };
        // two syntactically identical literals are distinct nodes
        assert_ne!(binary.left.id(), binary.right.id());
    }

    #[test]
    fn json_output_is_valid() {
        let program = parse_ok("var x = 42;");
        let json = crate::ast::printer::to_json(&program);
        let _: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    }
}
