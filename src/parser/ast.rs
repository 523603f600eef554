use crate::diagnostic::{SourceFile, Span};
use std::rc::Rc;
use std::sync::Arc;

/// A parsed Bolton program: the root node plus the file its spans point into.
#[derive(Debug)]
pub struct Program {
    pub root: Node,
    pub file: Arc<SourceFile>,
}

#[derive(Debug)]
pub enum Node {
    Literal(LiteralNode),
    List(ListNode),
    VariableAccess(VariableAccessNode),
    VariableAssignment(VariableAssignmentNode),
    Binary(BinaryNode),
    Unary(UnaryNode),
    If(IfNode),
    For(ForNode),
    While(WhileNode),
    FunctionDefinition(FunctionDefinitionNode),
    Call(CallNode),
    Return(ReturnNode),
    Continue(Span),
    Break(Span),
    Statements(StatementsNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Literal(n) => n.span,
            Node::List(n) => n.span,
            Node::VariableAccess(n) => n.span,
            Node::VariableAssignment(n) => n.span,
            Node::Binary(n) => n.span,
            Node::Unary(n) => n.span,
            Node::If(n) => n.span,
            Node::For(n) => n.span,
            Node::While(n) => n.span,
            Node::FunctionDefinition(n) => n.span,
            Node::Call(n) => n.span,
            Node::Return(n) => n.span,
            Node::Continue(span) | Node::Break(span) => *span,
            Node::Statements(n) => n.span,
        }
    }

    pub fn literal(value: Literal, span: Span) -> Self {
        Self::Literal(LiteralNode { value, span })
    }

    pub fn binary(left: Node, operator: BinaryOperator, right: Node) -> Self {
        let span = left.span().to(right.span());
        Self::Binary(BinaryNode {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span,
        })
    }

    pub fn unary(operator: UnaryOperator, operand: Node, span: Span) -> Self {
        Self::Unary(UnaryNode {
            operator,
            operand: Box::new(operand),
            span,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(Rc<str>),
}

#[derive(Debug)]
pub struct LiteralNode {
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug)]
pub struct ListNode {
    pub elements: Vec<Node>,
    pub span: Span,
}

#[derive(Debug)]
pub struct StatementsNode {
    pub statements: Vec<Node>,
    pub span: Span,
}

#[derive(Debug)]
pub struct VariableAccessNode {
    pub name: String,
    pub span: Span,
}

#[derive(Debug)]
pub struct VariableAssignmentNode {
    pub name: String,
    pub value: Box<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug)]
pub struct BinaryNode {
    pub left: Box<Node>,
    pub operator: BinaryOperator,
    pub right: Box<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
    Not,
}

#[derive(Debug)]
pub struct UnaryNode {
    pub operator: UnaryOperator,
    pub operand: Box<Node>,
    pub span: Span,
}

/// One `IF`/`ELIF` branch.
///
/// `returns_null` is set for the multi-line form: a block evaluates to `NULL`, a single
/// statement evaluates to its own value.
#[derive(Debug)]
pub struct IfCase {
    pub condition: Node,
    pub body: Node,
    pub returns_null: bool,
}

#[derive(Debug)]
pub struct ElseCase {
    pub body: Node,
    pub returns_null: bool,
}

#[derive(Debug)]
pub struct IfNode {
    pub cases: Vec<IfCase>,
    pub else_case: Option<Box<ElseCase>>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ForNode {
    pub variable: String,
    pub start: Box<Node>,
    pub end: Box<Node>,
    pub step: Option<Box<Node>>,
    pub body: Box<Node>,
    pub returns_null: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct WhileNode {
    pub condition: Box<Node>,
    pub body: Box<Node>,
    pub returns_null: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct FunctionDefinitionNode {
    pub name: Option<String>,
    pub parameters: Vec<String>,
    // Shared with every function value created from this definition.
    pub body: Rc<Node>,
    /// `FUN f() -> expr` returns `expr`; the block form only returns through `RETURN`.
    pub auto_return: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct CallNode {
    pub callee: Box<Node>,
    pub arguments: Vec<Node>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ReturnNode {
    pub value: Option<Box<Node>>,
    pub span: Span,
}
