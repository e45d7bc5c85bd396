//! Syntax tree
//!
//! Function bodies carry the names their `var` declarations introduce and
//! the function declarations to hoist, both collected while parsing so the
//! evaluator can set up a scope before running the first statement.

use std::rc::Rc;

/// A parsed script
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub var_names: Vec<Rc<str>>,
    pub functions: Vec<Rc<FunctionDef>>,
}

/// A function literal or declaration
#[derive(Debug, Clone, Default)]
pub struct FunctionDef {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub body: Vec<Stmt>,
    pub var_names: Vec<Rc<str>>,
    pub functions: Vec<Rc<FunctionDef>>,
    /// Named function expressions bind their own name inside the body
    pub is_expression: bool,
    /// The body mentions `arguments`
    pub uses_arguments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    String(Rc<str>),
    Bool(bool),
    Null,
    This,
    Ident(Rc<str>),
    /// Array literal, `None` marks a hole
    Array(Vec<Option<Expr>>),
    Object(Vec<(Rc<str>, Expr)>),
    Function(Rc<FunctionDef>),
    Unary(UnaryOp, Box<Expr>),
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    /// Plain (`op == None`) or compound assignment
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Member(Box<Expr>, Rc<str>),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
    Sequence(Vec<Expr>),
}

impl Expr {
    /// Check if the expression can appear on the left of an assignment
    pub fn is_reference(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..))
    }
}

/// A `var`/`let`/`const` binding
pub type Declarator = (Rc<str>, Option<Expr>);

#[derive(Debug, Clone)]
pub enum ForInit {
    Var(Vec<Declarator>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum ForInTarget {
    Var(Rc<str>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<Rc<str>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Var(Vec<Declarator>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    DoWhile(Box<Stmt>, Expr),
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        target: ForInTarget,
        object: Expr,
        body: Box<Stmt>,
    },
    Switch(Expr, Vec<SwitchCase>),
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
}
