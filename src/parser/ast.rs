//! Syntax tree
//!
//! The parser also records a scope tree: every identifier carries the scope
//! it appears in, and every binding knows whether an inner function captures
//! it. The compiler uses that to decide between frame locals and scope-object
//! slots.

use crate::object::JSString;

/// Line and column of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

/// Index into `Program::scopes`
pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    /// Function declaration
    Function,
    /// Parameter at the given position
    Param(u16),
    Catch,
    /// Own name of a named function expression
    FunctionName,
    /// Module import (read-only)
    Import,
}

impl BindingKind {
    /// Subject to the temporal dead zone
    pub fn is_lexical(self) -> bool {
        matches!(self, BindingKind::Let | BindingKind::Const)
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, BindingKind::Const | BindingKind::Import | BindingKind::FunctionName)
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// Referenced from a nested function
    pub captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Top scope of a function (parameters, `var`s, hoisted declarations)
    Function,
    /// Top scope of a global script: its declarations live on the global
    /// object or in the global lexical environment
    Global,
    Block,
}

#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub parent: Option<ScopeId>,
    /// Function the scope belongs to
    pub func: usize,
    pub kind: ScopeKind,
    pub bindings: Vec<Binding>,
}

impl ScopeInfo {
    pub fn find(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name == name)
    }

    /// Any binding needs a heap slot
    pub fn has_captures(&self) -> bool {
        self.bindings.iter().any(|b| b.captured)
    }
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
    Pow,
    Shl,
    Sar,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub scope: ScopeId,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum PropKey {
    Named(JSString),
    Computed(Expr),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: PropKey,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    String(JSString),
    BigInt(String),
    BigDecimal(String),
    Template {
        quasis: Vec<JSString>,
        exprs: Vec<Expr>,
    },
    Bool(bool),
    Null,
    This,
    Ident(Ident),
    /// Array literal (elisions are `None`)
    Array(Vec<Option<Expr>>),
    Object(Vec<Property>),
    Function(Box<FunctionNode>),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        pos: Pos,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Member {
        object: Box<Expr>,
        name: JSString,
        pos: Pos,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
}

impl Expr {
    /// Valid target of assignment or update
    pub fn is_reference(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Script,
    Module,
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    /// Function id (index in creation order)
    pub id: usize,
    /// Name shown in stack traces and `f.name`
    pub name: String,
    /// Name bound inside a named function expression, with its scope
    pub binding_name: Option<(String, ScopeId)>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub kind: FunctionKind,
    pub strict: bool,
    /// Top scope of the function
    pub scope: ScopeId,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: Ident,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Var(VarKind, Vec<Declarator>),
    Expr(Expr),
}

/// Left side of `for-in` / `for-of`
#[derive(Debug, Clone)]
pub enum ForTarget {
    Decl(VarKind, Ident),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// None for `default`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<Ident>,
    pub scope: ScopeId,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Exported name, None for `* as ns`
    pub imported: Option<JSString>,
    pub local: String,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr, Pos),
    Var(VarKind, Vec<Declarator>, Pos),
    Function(Box<FunctionNode>),
    Return(Option<Expr>, Pos),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
        pos: Pos,
    },
    Block(Vec<Stmt>, ScopeId),
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        scope: ScopeId,
        pos: Pos,
    },
    ForIn {
        of: bool,
        target: ForTarget,
        iterable: Expr,
        body: Box<Stmt>,
        scope: ScopeId,
        pos: Pos,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        pos: Pos,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
        pos: Pos,
    },
    Break(Option<String>, Pos),
    Continue(Option<String>, Pos),
    Throw(Expr, Pos),
    Try {
        block: Vec<Stmt>,
        block_scope: ScopeId,
        handler: Option<CatchClause>,
        finalizer: Option<(Vec<Stmt>, ScopeId)>,
        pos: Pos,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        scope: ScopeId,
        pos: Pos,
    },
    Labeled(String, Box<Stmt>),
    /// Statements sharing the enclosing scope
    List(Vec<Stmt>),
    Empty,
    Import {
        specifier: JSString,
        names: Vec<ImportSpec>,
        pos: Pos,
    },
    /// `export { local as exported }`, also produced by `export <declaration>`
    Export {
        names: Vec<(String, JSString)>,
        scope: ScopeId,
    },
    /// `export default <expr>`
    ExportDefault(Expr, Pos),
}

/// Parsed script or module
#[derive(Debug)]
pub struct Program {
    pub main: FunctionNode,
    pub scopes: Vec<ScopeInfo>,
}
