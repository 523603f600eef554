pub mod ast;

use crate::diagnostic::{self, SourceFile, Span};
use crate::scanner::{Keyword, Token, TokenDiscriminant, TokenKind, Tokens};
use ast::{
    BinaryOperator, CallNode, ElseCase, ForNode, FunctionDefinitionNode, IfCase, IfNode, ListNode,
    Literal, Node, Program, ReturnNode, StatementsNode, UnaryOperator, VariableAccessNode,
    VariableAssignmentNode, WhileNode,
};
use std::fmt::Write;
use std::rc::Rc;
use std::sync::Arc;

/// Expressions nested deeper than this (parentheses, blocks, operator chains) are rejected.
/// Both the parser and the tree-walker recurse once per level.
pub const MAX_NESTING: usize = 100;

type ParseResult<T> = Result<T, SyntaxError>;

/// Parse a token sequence into a program.
pub fn parse(tokens: Tokens) -> ParseResult<Program> {
    Parser::parse(tokens)
}

pub struct Parser {
    tokens: Vec<Token>,
    file: Arc<SourceFile>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    pub fn parse(tokens: Tokens) -> ParseResult<Program> {
        let Tokens { file, tokens } = tokens;
        let mut parser = Self {
            tokens,
            file,
            cursor: 0,
            depth: 0,
        };
        let root = parser.statements()?;
        if parser.current().discriminant() != TokenDiscriminant::Eof {
            return Err(parser.error_here("Token cannot appear after previous tokens"));
        }
        Ok(Program {
            root,
            file: parser.file,
        })
    }

    fn statements(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        let mut statements = vec![];

        self.skip_newlines();
        if !self.at_block_end() {
            statements.push(self.statement()?);
            while self.skip_newlines() > 0 && !self.at_block_end() {
                statements.push(self.statement()?);
            }
        }
        Ok(Node::Statements(StatementsNode {
            statements,
            span: start.to(self.previous_span()),
        }))
    }

    fn statement(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        if self.advance_on_keyword(Keyword::Return) {
            let value = if self.starts_expression() {
                Some(Box::new(self.expr()?))
            } else {
                None
            };
            return Ok(Node::Return(ReturnNode {
                value,
                span: start.to(self.previous_span()),
            }));
        }
        if self.advance_on_keyword(Keyword::Continue) {
            return Ok(Node::Continue(start));
        }
        if self.advance_on_keyword(Keyword::Break) {
            return Ok(Node::Break(start));
        }
        if !self.starts_expression() {
            return Err(self.error_here(
                "Expected 'RETURN', 'CONTINUE', 'BREAK', 'VAR', 'IF', 'FOR', 'WHILE', 'FUN', \
                 int, float, string, identifier, '+', '-', '(', '[' or 'NOT'",
            ));
        }
        self.expr()
    }

    fn expr(&mut self) -> ParseResult<Node> {
        self.nested(Self::assignment_or_logical)
    }

    fn assignment_or_logical(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        if self.advance_on_keyword(Keyword::Var) {
            let name = self.expect_identifier()?;
            self.expect(TokenDiscriminant::Equal, "Expected '='")?;
            let value = self.expr()?;
            let span = start.to(value.span());
            return Ok(Node::VariableAssignment(VariableAssignmentNode {
                name,
                value: Box::new(value),
                span,
            }));
        }
        self.binary_operation(Self::comparison, Self::comparison, |kind| match kind {
            TokenKind::Keyword(Keyword::And) => Some(BinaryOperator::And),
            TokenKind::Keyword(Keyword::Or) => Some(BinaryOperator::Or),
            _ => None,
        })
    }

    fn comparison(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        if self.advance_on_keyword(Keyword::Not) {
            let operand = self.nested(Self::comparison)?;
            let span = start.to(operand.span());
            return Ok(Node::unary(UnaryOperator::Not, operand, span));
        }
        self.binary_operation(Self::arithmetic, Self::arithmetic, |kind| match kind {
            TokenKind::EqualEqual => Some(BinaryOperator::Equal),
            TokenKind::BangEqual => Some(BinaryOperator::NotEqual),
            TokenKind::Less => Some(BinaryOperator::Less),
            TokenKind::Greater => Some(BinaryOperator::Greater),
            TokenKind::LessEqual => Some(BinaryOperator::LessEqual),
            TokenKind::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        })
    }

    fn arithmetic(&mut self) -> ParseResult<Node> {
        self.binary_operation(Self::term, Self::term, |kind| match kind {
            TokenKind::Plus => Some(BinaryOperator::Add),
            TokenKind::Minus => Some(BinaryOperator::Subtract),
            _ => None,
        })
    }

    fn term(&mut self) -> ParseResult<Node> {
        self.binary_operation(Self::factor, Self::factor, |kind| match kind {
            TokenKind::Mul => Some(BinaryOperator::Multiply),
            TokenKind::Div => Some(BinaryOperator::Divide),
            _ => None,
        })
    }

    fn factor(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        let operator = match self.current().kind {
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Minus => Some(UnaryOperator::Negate),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let operand = self.nested(Self::factor)?;
            let span = start.to(operand.span());
            return Ok(Node::unary(operator, operand, span));
        }
        self.power()
    }

    fn power(&mut self) -> ParseResult<Node> {
        self.binary_operation(Self::call, Self::factor, |kind| match kind {
            TokenKind::Pow => Some(BinaryOperator::Power),
            _ => None,
        })
    }

    fn call(&mut self) -> ParseResult<Node> {
        let depth = self.depth;
        let mut callee = self.atom()?;

        while self.advance_on(TokenDiscriminant::LeftParen) {
            self.descend()?;
            let mut arguments = vec![];
            if self.current().discriminant() != TokenDiscriminant::RightParen {
                arguments.push(self.expr()?);
                while self.advance_on(TokenDiscriminant::Comma) {
                    arguments.push(self.expr()?);
                }
            }
            self.expect(TokenDiscriminant::RightParen, "Expected ',' or ')'")?;
            let span = callee.span().to(self.previous_span());
            callee = Node::Call(CallNode {
                callee: Box::new(callee),
                arguments,
                span,
            });
        }
        self.depth = depth;
        Ok(callee)
    }

    fn atom(&mut self) -> ParseResult<Node> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Node::literal(Literal::Int(n), token.span))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Node::literal(Literal::Float(n), token.span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Node::literal(Literal::String(s.into()), token.span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Node::VariableAccess(VariableAccessNode {
                    name,
                    span: token.span,
                }))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expr()?;
                self.expect(TokenDiscriminant::RightParen, "Expected ')'")?;
                Ok(expr)
            }
            TokenKind::LeftSquare => self.list(),
            TokenKind::Keyword(Keyword::If) => self.if_expression(),
            TokenKind::Keyword(Keyword::For) => self.for_expression(),
            TokenKind::Keyword(Keyword::While) => self.while_expression(),
            TokenKind::Keyword(Keyword::Fun) => self.function_definition(),
            _ => Err(self.error_here(
                "Expected int, float, string, identifier, '+', '-', '(', '[', \
                 'IF', 'FOR', 'WHILE', 'FUN' or 'NOT'",
            )),
        }
    }

    fn list(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        self.expect(TokenDiscriminant::LeftSquare, "Expected '['")?;
        let mut elements = vec![];
        if self.current().discriminant() != TokenDiscriminant::RightSquare {
            elements.push(self.expr()?);
            while self.advance_on(TokenDiscriminant::Comma) {
                elements.push(self.expr()?);
            }
        }
        self.expect(TokenDiscriminant::RightSquare, "Expected ',' or ']'")?;
        Ok(Node::List(ListNode {
            elements,
            span: start.to(self.previous_span()),
        }))
    }

    fn if_expression(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        let (cases, else_case) = self.if_cases(Keyword::If)?;
        Ok(Node::If(IfNode {
            cases,
            else_case,
            span: start.to(self.previous_span()),
        }))
    }

    /// Parse an `IF` (or `ELIF`) branch and everything chained after it.
    fn if_cases(&mut self, keyword: Keyword) -> ParseResult<(Vec<IfCase>, Option<Box<ElseCase>>)> {
        self.expect_keyword(keyword)?;
        let condition = self.expr()?;
        self.expect_keyword(Keyword::Then)?;

        if self.advance_on(TokenDiscriminant::Newline) {
            let body = self.statements()?;
            let mut cases = vec![IfCase {
                condition,
                body,
                returns_null: true,
            }];
            if self.advance_on_keyword(Keyword::End) {
                return Ok((cases, None));
            }
            let (more_cases, else_case) = self.elif_or_else(true)?;
            cases.extend(more_cases);
            Ok((cases, else_case))
        } else {
            let body = self.statement()?;
            let mut cases = vec![IfCase {
                condition,
                body,
                returns_null: false,
            }];
            let (more_cases, else_case) = self.elif_or_else(false)?;
            cases.extend(more_cases);
            Ok((cases, else_case))
        }
    }

    fn elif_or_else(
        &mut self,
        inside_block: bool,
    ) -> ParseResult<(Vec<IfCase>, Option<Box<ElseCase>>)> {
        if self.current().is_keyword(Keyword::Elif) {
            return self.if_cases(Keyword::Elif);
        }
        if self.advance_on_keyword(Keyword::Else) {
            let else_case = if self.advance_on(TokenDiscriminant::Newline) {
                let body = self.statements()?;
                self.expect_keyword(Keyword::End)?;
                ElseCase {
                    body,
                    returns_null: true,
                }
            } else {
                ElseCase {
                    body: self.statement()?,
                    returns_null: false,
                }
            };
            return Ok((vec![], Some(Box::new(else_case))));
        }
        if inside_block {
            // A multi-line `IF` without further branches must be closed.
            self.expect_keyword(Keyword::End)?;
        }
        Ok((vec![], None))
    }

    fn for_expression(&mut self) -> ParseResult<Node> {
        let start_span = self.current().span;
        self.expect_keyword(Keyword::For)?;
        let variable = self.expect_identifier()?;
        self.expect(TokenDiscriminant::Equal, "Expected '='")?;
        let start = self.expr()?;
        self.expect_keyword(Keyword::To)?;
        let end = self.expr()?;
        let step = if self.advance_on_keyword(Keyword::Step) {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::Then)?;
        let (body, returns_null) = self.loop_body()?;
        Ok(Node::For(ForNode {
            variable,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
            returns_null,
            span: start_span.to(self.previous_span()),
        }))
    }

    fn while_expression(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        self.expect_keyword(Keyword::While)?;
        let condition = self.expr()?;
        self.expect_keyword(Keyword::Then)?;
        let (body, returns_null) = self.loop_body()?;
        Ok(Node::While(WhileNode {
            condition: Box::new(condition),
            body: Box::new(body),
            returns_null,
            span: start.to(self.previous_span()),
        }))
    }

    /// Either a block closed by `END` (the loop evaluates to `NULL`) or a single statement
    /// (the loop evaluates to the list of its body values).
    fn loop_body(&mut self) -> ParseResult<(Node, bool)> {
        if self.advance_on(TokenDiscriminant::Newline) {
            let body = self.statements()?;
            self.expect_keyword(Keyword::End)?;
            Ok((body, true))
        } else {
            Ok((self.statement()?, false))
        }
    }

    fn function_definition(&mut self) -> ParseResult<Node> {
        let start = self.current().span;
        self.expect_keyword(Keyword::Fun)?;
        let name = match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        let message = if name.is_some() {
            "Expected '('"
        } else {
            "Expected identifier or '('"
        };
        self.expect(TokenDiscriminant::LeftParen, message)?;

        let mut parameters = vec![];
        if self.current().discriminant() == TokenDiscriminant::Identifier {
            parameters.push(self.expect_identifier()?);
            while self.advance_on(TokenDiscriminant::Comma) {
                parameters.push(self.expect_identifier()?);
            }
        }
        let message = if parameters.is_empty() {
            "Expected identifier or ')'"
        } else {
            "Expected ',' or ')'"
        };
        self.expect(TokenDiscriminant::RightParen, message)?;

        let (body, auto_return) = if self.advance_on(TokenDiscriminant::Arrow) {
            (self.expr()?, true)
        } else if self.advance_on(TokenDiscriminant::Newline) {
            let body = self.statements()?;
            self.expect_keyword(Keyword::End)?;
            (body, false)
        } else {
            return Err(self.error_here("Expected '->' or NEWLINE"));
        };

        Ok(Node::FunctionDefinition(FunctionDefinitionNode {
            name,
            parameters,
            body: Rc::new(body),
            auto_return,
            span: start.to(self.previous_span()),
        }))
    }

    /// Parse a left-associative chain of binary operators.
    fn binary_operation(
        &mut self,
        left: fn(&mut Self) -> ParseResult<Node>,
        right: fn(&mut Self) -> ParseResult<Node>,
        operator: fn(&TokenKind) -> Option<BinaryOperator>,
    ) -> ParseResult<Node> {
        let depth = self.depth;
        let mut node = left(self)?;
        while let Some(op) = operator(&self.current().kind) {
            // Every link of the chain adds a level to the tree.
            self.descend()?;
            self.advance();
            node = Node::binary(node, op, right(self)?);
        }
        self.depth = depth;
        Ok(node)
    }

    fn nested(&mut self, f: fn(&mut Self) -> ParseResult<Node>) -> ParseResult<Node> {
        let depth = self.depth;
        self.descend()?;
        let node = f(self)?;
        self.depth = depth;
        Ok(node)
    }

    // A syntax error aborts the whole parse, so the depth is only restored on success.
    fn descend(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here("Expression is nested too deeply"));
        }
        Ok(())
    }

    fn starts_expression(&self) -> bool {
        match &self.current().kind {
            TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::Identifier(_)
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::LeftParen
            | TokenKind::LeftSquare => true,
            TokenKind::Keyword(keyword) => matches!(
                keyword,
                Keyword::Var
                    | Keyword::Not
                    | Keyword::If
                    | Keyword::For
                    | Keyword::While
                    | Keyword::Fun
            ),
            _ => false,
        }
    }

    fn at_block_end(&self) -> bool {
        let current = self.current();
        current.discriminant() == TokenDiscriminant::Eof
            || current.is_keyword(Keyword::End)
            || current.is_keyword(Keyword::Else)
            || current.is_keyword(Keyword::Elif)
    }

    fn skip_newlines(&mut self) -> usize {
        let mut count = 0;
        while self.advance_on(TokenDiscriminant::Newline) {
            count += 1;
        }
        count
    }

    fn expect(&mut self, token_type: TokenDiscriminant, message: &str) -> ParseResult<()> {
        if self.advance_on(token_type) {
            Ok(())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<()> {
        if self.advance_on_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_here(format!("Expected '{keyword}'")))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.current().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here("Expected identifier"))
        }
    }

    fn advance_on(&mut self, token_type: TokenDiscriminant) -> bool {
        if self.current().discriminant() == token_type {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance_on_keyword(&mut self, keyword: Keyword) -> bool {
        if self.current().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    // The scanner always terminates the sequence with `Eof`: the cursor never moves past it.
    fn advance(&mut self) {
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.cursor.saturating_sub(1)].span
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            span: self.current().span,
            file: Arc::clone(&self.file),
        }
    }
}

/// The token sequence does not form a valid Bolton program.
#[derive(Debug, thiserror::Error)]
#[error("{}", render(.message, .span, .file))]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub file: Arc<SourceFile>,
}

fn render(message: &str, span: &Span, file: &SourceFile) -> String {
    diagnostic::report(&format!("Invalid Syntax: {message}"), span, file)
}

#[allow(unused)]
pub fn display_ast(node: &Node) -> Result<String, std::fmt::Error> {
    let mut buffer = String::new();
    _display_node(&mut buffer, node, 0)?;
    Ok(buffer)
}

fn _display_node(w: &mut impl Write, node: &Node, depth: usize) -> std::fmt::Result {
    write!(w, "{}", " ".repeat(depth))?;
    match node {
        Node::Literal(literal) => match &literal.value {
            Literal::Int(n) => writeln!(w, "Int {n}")?,
            Literal::Float(n) => writeln!(w, "Float {n}")?,
            Literal::String(s) => writeln!(w, "String {s:?}")?,
        },
        Node::List(ListNode { elements, .. }) => {
            writeln!(w, "List")?;
            for element in elements {
                _display_node(w, element, depth + 1)?;
            }
        }
        Node::Statements(StatementsNode { statements, .. }) => {
            writeln!(w, "Statements")?;
            for statement in statements {
                _display_node(w, statement, depth + 1)?;
            }
        }
        Node::VariableAccess(VariableAccessNode { name, .. }) => writeln!(w, "Variable {name}")?,
        Node::VariableAssignment(VariableAssignmentNode { name, value, .. }) => {
            writeln!(w, "Assign {name}")?;
            _display_node(w, value, depth + 1)?;
        }
        Node::Binary(binary) => {
            writeln!(w, "Binary {:?}", binary.operator)?;
            _display_node(w, &binary.left, depth + 1)?;
            _display_node(w, &binary.right, depth + 1)?;
        }
        Node::Unary(unary) => {
            writeln!(w, "Unary {:?}", unary.operator)?;
            _display_node(w, &unary.operand, depth + 1)?;
        }
        Node::If(IfNode {
            cases, else_case, ..
        }) => {
            writeln!(w, "If")?;
            for case in cases {
                _display_label(w, "Case", depth + 1)?;
                _display_node(w, &case.condition, depth + 2)?;
                _display_node(w, &case.body, depth + 2)?;
            }
            if let Some(else_case) = else_case {
                _display_label(w, "Else", depth + 1)?;
                _display_node(w, &else_case.body, depth + 2)?;
            }
        }
        Node::For(ForNode {
            variable,
            start,
            end,
            step,
            body,
            ..
        }) => {
            writeln!(w, "For {variable}")?;
            _display_node(w, start, depth + 1)?;
            _display_node(w, end, depth + 1)?;
            if let Some(step) = step {
                _display_node(w, step, depth + 1)?;
            }
            _display_node(w, body, depth + 1)?;
        }
        Node::While(WhileNode {
            condition, body, ..
        }) => {
            writeln!(w, "While")?;
            _display_node(w, condition, depth + 1)?;
            _display_node(w, body, depth + 1)?;
        }
        Node::FunctionDefinition(FunctionDefinitionNode {
            name,
            parameters,
            body,
            ..
        }) => {
            let name = name.as_deref().unwrap_or("<anonymous>");
            writeln!(w, "Function {name}({})", parameters.join(", "))?;
            _display_node(w, body, depth + 1)?;
        }
        Node::Call(CallNode {
            callee, arguments, ..
        }) => {
            writeln!(w, "Call")?;
            _display_node(w, callee, depth + 1)?;
            for argument in arguments {
                _display_node(w, argument, depth + 1)?;
            }
        }
        Node::Return(ReturnNode { value, .. }) => {
            writeln!(w, "Return")?;
            if let Some(value) = value {
                _display_node(w, value, depth + 1)?;
            }
        }
        Node::Continue(_) => writeln!(w, "Continue")?,
        Node::Break(_) => writeln!(w, "Break")?,
    }
    Ok(())
}

fn _display_label(w: &mut impl Write, s: &str, depth: usize) -> std::fmt::Result {
    write!(w, "{}", " ".repeat(depth))?;
    writeln!(w, "{s}")
}
