//! Recursive-descent parser
//!
//! Builds the syntax tree and the scope tree in one pass. Identifier
//! references are resolved after the whole program is read, since `var` and
//! function declarations are visible before their textual position.

use std::mem;

use super::ast::*;
use super::{CompileError, MAX_NESTING};
use super::lexer::{Lexer, Token};
use crate::object::JSString;
use crate::util::dtoa::number_to_string;

type PResult<T> = Result<T, CompileError>;

/// Per-function parser state
struct FuncState {
    id: usize,
    kind: FunctionKind,
    strict: bool,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    pos: Pos,
    newline_before: bool,
    scopes: Vec<ScopeInfo>,
    scope: ScopeId,
    funcs: Vec<FuncState>,
    next_func_id: usize,
    references: Vec<(ScopeId, String)>,
    /// Parsing a `for` head, where `in` ends the expression
    no_in: bool,
    /// Open recursive productions
    depth: usize,
}

fn is_assign_op(token: &Token) -> Option<AssignOp> {
    Some(match token {
        Token::Eq => AssignOp::Assign,
        Token::PlusEq => AssignOp::Binary(BinaryOp::Add),
        Token::MinusEq => AssignOp::Binary(BinaryOp::Sub),
        Token::StarEq => AssignOp::Binary(BinaryOp::Mul),
        Token::SlashEq => AssignOp::Binary(BinaryOp::Div),
        Token::PercentEq => AssignOp::Binary(BinaryOp::Mod),
        Token::StarStarEq => AssignOp::Binary(BinaryOp::Pow),
        Token::LtLtEq => AssignOp::Binary(BinaryOp::Shl),
        Token::GtGtEq => AssignOp::Binary(BinaryOp::Sar),
        Token::GtGtGtEq => AssignOp::Binary(BinaryOp::Shr),
        Token::AmpEq => AssignOp::Binary(BinaryOp::BitAnd),
        Token::PipeEq => AssignOp::Binary(BinaryOp::BitOr),
        Token::CaretEq => AssignOp::Binary(BinaryOp::BitXor),
        Token::AmpAmpEq => AssignOp::Logical(LogicalOp::And),
        Token::PipePipeEq => AssignOp::Logical(LogicalOp::Or),
        Token::QuestionQuestionEq => AssignOp::Logical(LogicalOp::Nullish),
        _ => return None,
    })
}

/// Binary operator precedence; higher binds tighter
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix_op(token: &Token, no_in: bool) -> Option<(u8, Infix)> {
    use BinaryOp as B;
    Some(match token {
        Token::QuestionQuestion => (1, Infix::Logical(LogicalOp::Nullish)),
        Token::PipePipe => (2, Infix::Logical(LogicalOp::Or)),
        Token::AmpAmp => (3, Infix::Logical(LogicalOp::And)),
        Token::Pipe => (4, Infix::Binary(B::BitOr)),
        Token::Caret => (5, Infix::Binary(B::BitXor)),
        Token::Amp => (6, Infix::Binary(B::BitAnd)),
        Token::EqEq => (7, Infix::Binary(B::Eq)),
        Token::BangEq => (7, Infix::Binary(B::Neq)),
        Token::EqEqEq => (7, Infix::Binary(B::StrictEq)),
        Token::BangEqEq => (7, Infix::Binary(B::StrictNeq)),
        Token::Lt => (8, Infix::Binary(B::Lt)),
        Token::LtEq => (8, Infix::Binary(B::Lte)),
        Token::Gt => (8, Infix::Binary(B::Gt)),
        Token::GtEq => (8, Infix::Binary(B::Gte)),
        Token::InstanceOf => (8, Infix::Binary(B::InstanceOf)),
        Token::In if !no_in => (8, Infix::Binary(B::In)),
        Token::LtLt => (9, Infix::Binary(B::Shl)),
        Token::GtGt => (9, Infix::Binary(B::Sar)),
        Token::GtGtGt => (9, Infix::Binary(B::Shr)),
        Token::Plus => (10, Infix::Binary(B::Add)),
        Token::Minus => (10, Infix::Binary(B::Sub)),
        Token::Star => (11, Infix::Binary(B::Mul)),
        Token::Slash => (11, Infix::Binary(B::Div)),
        Token::Percent => (11, Infix::Binary(B::Mod)),
        Token::StarStar => (12, Infix::Binary(B::Pow)),
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(source),
            current: Token::Eof,
            pos: Pos::default(),
            newline_before: false,
            scopes: Vec::new(),
            scope: 0,
            funcs: Vec::new(),
            next_func_id: 0,
            references: Vec::new(),
            no_in: false,
            depth: 0,
        }
    }

    /// Parse a whole script or module
    pub fn parse_program(mut self, module: bool, strict: bool) -> PResult<Program> {
        let kind = if module {
            FunctionKind::Module
        } else {
            FunctionKind::Script
        };
        self.funcs.push(FuncState {
            id: 0,
            kind,
            strict: strict || module,
        });
        self.next_func_id = 1;
        self.scopes.push(ScopeInfo {
            parent: None,
            func: 0,
            kind: if module { ScopeKind::Function } else { ScopeKind::Global },
            bindings: Vec::new(),
        });
        self.advance()?;

        let pos = self.pos;
        self.parse_directives()?;
        let mut body = Vec::new();
        while self.current != Token::Eof {
            body.push(self.parse_statement_item()?);
        }
        let strict = self.func().strict;
        self.resolve_references();
        Ok(Program {
            main: FunctionNode {
                id: 0,
                name: String::new(),
                binding_name: None,
                params: Vec::new(),
                body,
                kind,
                strict,
                scope: 0,
                pos,
            },
            scopes: self.scopes,
        })
    }

    // ---- tokens ----

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError {
            message: message.into(),
            line: self.pos.line,
            column: self.pos.column,
        }
    }

    /// Run a recursive production one level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("too deeply nested"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn unexpected(&self) -> CompileError {
        match &self.current {
            Token::Eof => self.error("unexpected end of input"),
            Token::Reserved(word) => self.error(format!("'{}' is not supported", word)),
            Token::QuestionDot => self.error("optional chaining is not supported"),
            Token::Ellipsis => self.error("spread and rest syntax is not supported"),
            Token::Slash | Token::SlashEq => self.error("regular expression literals are not supported"),
            tok => self.error(format!("unexpected token {:?}", tok)),
        }
    }

    fn set_current(&mut self, token: Token, line: usize, column: usize) -> PResult<Token> {
        self.pos = Pos {
            line: line as u32,
            column: column as u32,
        };
        if let Token::Error(message) = token {
            return Err(self.error(message));
        }
        Ok(mem::replace(&mut self.current, token))
    }

    /// Move to the next token, returning the previous one
    fn advance(&mut self) -> PResult<Token> {
        let token = self.lexer.next_token();
        let start = self.lexer.token_start();
        self.newline_before = self.lexer.newline_before();
        self.set_current(token, start.line, start.column)
    }

    /// Continue a template literal after the `}` of a substitution
    fn advance_template(&mut self) -> PResult<Token> {
        let start = self.lexer.position();
        let token = self.lexer.read_template();
        self.newline_before = false;
        self.set_current(token, start.line, start.column)
    }

    fn peek(&self) -> Token {
        self.lexer.clone().next_token()
    }

    fn check(&self, expected: &Token) -> bool {
        mem::discriminant(&self.current) == mem::discriminant(expected)
    }

    fn eat(&mut self, expected: &Token) -> PResult<bool> {
        if self.check(expected) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, expected: Token) -> PResult<()> {
        if self.check(&expected) {
            self.advance()?;
            Ok(())
        } else if self.current == Token::Eof {
            Err(self.error("unexpected end of input"))
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", expected, self.current)))
        }
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.current, Token::Ident(s) if s == name)
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match &self.current {
            Token::Ident(_) => match self.advance()? {
                Token::Ident(name) => Ok(name),
                _ => Err(self.unexpected()),
            },
            _ => Err(self.unexpected()),
        }
    }

    /// Automatic semicolon insertion
    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat(&Token::Semicolon)? {
            return Ok(());
        }
        if matches!(self.current, Token::RBrace | Token::Eof) || self.newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // ---- scopes ----

    fn func(&self) -> &FuncState {
        &self.funcs[self.funcs.len() - 1]
    }

    fn strict(&self) -> bool {
        self.func().strict
    }

    fn push_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(ScopeInfo {
            parent: Some(self.scope),
            func: self.func().id,
            kind,
            bindings: Vec::new(),
        });
        self.scope = id;
        id
    }

    fn pop_scope(&mut self) {
        self.scope = self.scopes[self.scope].parent.unwrap_or(0);
    }

    /// Nearest scope that receives `var` declarations
    fn var_scope(&self) -> ScopeId {
        let mut s = self.scope;
        while self.scopes[s].kind == ScopeKind::Block {
            match self.scopes[s].parent {
                Some(p) => s = p,
                None => break,
            }
        }
        s
    }

    fn redeclared(&self, name: &str) -> CompileError {
        self.error(format!("redeclaration of '{}'", name))
    }

    fn declare(&mut self, name: &str, kind: BindingKind) -> PResult<()> {
        let target = if kind == BindingKind::Var {
            self.var_scope()
        } else {
            self.scope
        };
        if kind == BindingKind::Var {
            let mut s = self.scope;
            loop {
                if let Some(i) = self.scopes[s].find(name) {
                    let existing = self.scopes[s].bindings[i].kind;
                    if existing.is_lexical() || existing == BindingKind::Import {
                        return Err(self.redeclared(name));
                    }
                }
                if s == target {
                    break;
                }
                match self.scopes[s].parent {
                    Some(p) => s = p,
                    None => break,
                }
            }
        }
        let lexical =
            |k: BindingKind| k.is_lexical() || matches!(k, BindingKind::Import | BindingKind::Catch);
        let strict = self.strict();
        if let Some(i) = self.scopes[target].find(name) {
            let existing = self.scopes[target].bindings[i].kind;
            let duplicate_param = strict
                && matches!(existing, BindingKind::Param(_))
                && matches!(kind, BindingKind::Param(_));
            if lexical(existing) || lexical(kind) || duplicate_param {
                return Err(self.redeclared(name));
            }
            if kind == BindingKind::Function && existing == BindingKind::Var {
                self.scopes[target].bindings[i].kind = BindingKind::Function;
            }
            return Ok(());
        }
        self.scopes[target].bindings.push(Binding {
            name: name.to_string(),
            kind,
            captured: false,
        });
        Ok(())
    }

    fn reference(&mut self, name: String, pos: Pos) -> Ident {
        self.references.push((self.scope, name.clone()));
        Ident {
            name,
            scope: self.scope,
            pos,
        }
    }

    /// Mark every binding referenced from a nested function as captured
    fn resolve_references(&mut self) {
        for (scope, name) in mem::take(&mut self.references) {
            let from = self.scopes[scope].func;
            let mut s = Some(scope);
            while let Some(id) = s {
                if let Some(i) = self.scopes[id].find(&name) {
                    if self.scopes[id].kind != ScopeKind::Global && self.scopes[id].func != from {
                        self.scopes[id].bindings[i].captured = true;
                    }
                    break;
                }
                s = self.scopes[id].parent;
            }
        }
    }

    // ---- statements ----

    /// Directive prologue: detect "use strict"
    fn parse_directives(&mut self) -> PResult<()> {
        let mut lookahead = self.lexer.clone();
        let mut token = self.current.clone();
        while let Token::String(s) = &token {
            let next = lookahead.next_token();
            let terminated = matches!(next, Token::Semicolon | Token::RBrace | Token::Eof)
                || lookahead.newline_before();
            if !terminated {
                break;
            }
            if s.to_string_lossy() == "use strict" {
                if let Some(f) = self.funcs.last_mut() {
                    f.strict = true;
                }
                break;
            }
            token = if next == Token::Semicolon {
                lookahead.next_token()
            } else {
                next
            };
        }
        Ok(())
    }

    fn parse_statement_item(&mut self) -> PResult<Stmt> {
        match self.current {
            Token::Function => {
                let f = self.nested(Self::parse_function_declaration)?;
                Ok(Stmt::Function(Box::new(f)))
            }
            Token::Let | Token::Const => {
                let stmt = self.parse_var_statement()?;
                Ok(stmt)
            }
            Token::Import | Token::Export => {
                let top_of_module =
                    self.func().kind == FunctionKind::Module && self.scope == 0;
                if !top_of_module {
                    return Err(self.error("import and export are only allowed at the top level of a module"));
                }
                if self.current == Token::Import {
                    self.parse_import()
                } else {
                    self.parse_export()
                }
            }
            _ => self.parse_statement(),
        }
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        match self.current {
            Token::LBrace => {
                self.advance()?;
                let scope = self.push_scope(ScopeKind::Block);
                let body = self.parse_block_body()?;
                self.pop_scope();
                Ok(Stmt::Block(body, scope))
            }
            Token::Var => self.parse_var_statement(),
            Token::Let | Token::Const | Token::Function => {
                Err(self.error("lexical declaration is not allowed here"))
            }
            Token::Semicolon => {
                self.advance()?;
                Ok(Stmt::Empty)
            }
            Token::If => {
                self.advance()?;
                self.expect(Token::LParen)?;
                let test = self.parse_expression()?;
                self.expect(Token::RParen)?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat(&Token::Else)? {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                    pos,
                })
            }
            Token::For => self.parse_for(),
            Token::While => {
                self.advance()?;
                self.expect(Token::LParen)?;
                let test = self.parse_expression()?;
                self.expect(Token::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body, pos })
            }
            Token::Do => {
                self.advance()?;
                let body = Box::new(self.parse_statement()?);
                self.expect(Token::While)?;
                self.expect(Token::LParen)?;
                let test = self.parse_expression()?;
                self.expect(Token::RParen)?;
                self.eat(&Token::Semicolon)?;
                Ok(Stmt::DoWhile { body, test, pos })
            }
            Token::Return => {
                if matches!(self.func().kind, FunctionKind::Script | FunctionKind::Module) {
                    return Err(self.error("return not in a function"));
                }
                self.advance()?;
                let value = if self.check(&Token::Semicolon)
                    || matches!(self.current, Token::RBrace | Token::Eof)
                    || self.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value, pos))
            }
            Token::Break | Token::Continue => {
                let is_break = self.current == Token::Break;
                self.advance()?;
                let label = match &self.current {
                    Token::Ident(_) if !self.newline_before => Some(self.expect_ident()?),
                    _ => None,
                };
                self.consume_semicolon()?;
                Ok(if is_break {
                    Stmt::Break(label, pos)
                } else {
                    Stmt::Continue(label, pos)
                })
            }
            Token::Throw => {
                self.advance()?;
                if self.newline_before {
                    return Err(self.error("line break is not allowed after 'throw'"));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value, pos))
            }
            Token::Try => self.parse_try(),
            Token::Switch => self.parse_switch(),
            Token::Debugger => {
                self.advance()?;
                self.consume_semicolon()?;
                Ok(Stmt::Empty)
            }
            Token::Ident(_) if self.peek() == Token::Colon => {
                let label = self.expect_ident()?;
                self.advance()?;
                let body = self.parse_statement()?;
                Ok(Stmt::Labeled(label, Box::new(body)))
            }
            Token::Reserved(_) | Token::Import | Token::Export => Err(self.unexpected()),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr, pos))
            }
        }
    }

    /// Statements up to and including the closing brace
    fn parse_block_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.current == Token::Eof {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement_item()?);
        }
        self.advance()?;
        Ok(body)
    }

    fn var_kind(&mut self) -> PResult<VarKind> {
        let kind = match self.current {
            Token::Var => VarKind::Var,
            Token::Let => VarKind::Let,
            Token::Const => VarKind::Const,
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(kind)
    }

    fn declare_var(&mut self, kind: VarKind, name: String, pos: Pos) -> PResult<Ident> {
        let binding = match kind {
            VarKind::Var => BindingKind::Var,
            VarKind::Let => BindingKind::Let,
            VarKind::Const => BindingKind::Const,
        };
        self.declare(&name, binding)?;
        Ok(self.reference(name, pos))
    }

    fn parse_declarators(&mut self, kind: VarKind) -> PResult<Vec<Declarator>> {
        let mut decls = Vec::new();
        loop {
            if matches!(self.current, Token::LBrace | Token::LBracket) {
                return Err(self.error("destructuring is not supported"));
            }
            let pos = self.pos;
            let name = self.expect_ident()?;
            let ident = self.declare_var(kind, name, pos)?;
            let init = if self.eat(&Token::Eq)? {
                let mut value = self.parse_assignment()?;
                name_function(&mut value, &ident.name);
                Some(value)
            } else {
                None
            };
            if kind == VarKind::Const && init.is_none() && !self.no_in {
                return Err(self.error("missing initializer in const declaration"));
            }
            decls.push(Declarator { name: ident, init });
            if !self.eat(&Token::Comma)? {
                return Ok(decls);
            }
        }
    }

    fn parse_var_statement(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        let kind = self.var_kind()?;
        let decls = self.parse_declarators(kind)?;
        self.consume_semicolon()?;
        Ok(Stmt::Var(kind, decls, pos))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        self.advance()?;
        self.expect(Token::LParen)?;
        let scope = self.push_scope(ScopeKind::Block);

        let mut init = None;
        if matches!(self.current, Token::Var | Token::Let | Token::Const) {
            let kind = self.var_kind()?;
            let decl_pos = self.pos;
            let name = self.expect_ident()?;
            if self.check(&Token::In) || self.is_ident("of") {
                let ident = self.declare_var(kind, name, decl_pos)?;
                return self.parse_for_in_rest(ForTarget::Decl(kind, ident), scope, pos);
            }
            let ident = self.declare_var(kind, name, decl_pos)?;
            self.no_in = true;
            let first_init = if self.eat(&Token::Eq)? {
                let mut value = self.parse_assignment()?;
                name_function(&mut value, &ident.name);
                Some(value)
            } else {
                None
            };
            let mut decls = vec![Declarator {
                name: ident,
                init: first_init,
            }];
            if self.eat(&Token::Comma)? {
                decls.extend(self.parse_declarators(kind)?);
            }
            self.no_in = false;
            if kind == VarKind::Const && decls.iter().any(|d| d.init.is_none()) {
                return Err(self.error("missing initializer in const declaration"));
            }
            init = Some(ForInit::Var(kind, decls));
        } else if !self.check(&Token::Semicolon) {
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = false;
            let expr = expr?;
            if self.check(&Token::In) || self.is_ident("of") {
                if !expr.is_reference() {
                    return Err(self.error("invalid for-in/of left-hand side"));
                }
                return self.parse_for_in_rest(ForTarget::Expr(expr), scope, pos);
            }
            init = Some(ForInit::Expr(expr));
        }

        self.expect(Token::Semicolon)?;
        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;
        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        self.pop_scope();
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
            scope,
            pos,
        })
    }

    fn parse_for_in_rest(&mut self, target: ForTarget, scope: ScopeId, pos: Pos) -> PResult<Stmt> {
        let of = self.is_ident("of");
        self.advance()?;
        let iterable = if of {
            self.parse_assignment()?
        } else {
            self.parse_expression()?
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        self.pop_scope();
        Ok(Stmt::ForIn {
            of,
            target,
            iterable,
            body,
            scope,
            pos,
        })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        self.advance()?;
        self.expect(Token::LBrace)?;
        let block_scope = self.push_scope(ScopeKind::Block);
        let block = self.parse_block_body()?;
        self.pop_scope();

        let handler = if self.eat(&Token::Catch)? {
            let scope = self.push_scope(ScopeKind::Block);
            let param = if self.eat(&Token::LParen)? {
                if matches!(self.current, Token::LBrace | Token::LBracket) {
                    return Err(self.error("destructuring is not supported"));
                }
                let param_pos = self.pos;
                let name = self.expect_ident()?;
                self.declare(&name, BindingKind::Catch)?;
                self.expect(Token::RParen)?;
                Some(self.reference(name, param_pos))
            } else {
                None
            };
            self.expect(Token::LBrace)?;
            let body = self.parse_block_body()?;
            self.pop_scope();
            Some(CatchClause { param, scope, body })
        } else {
            None
        };

        let finalizer = if self.eat(&Token::Finally)? {
            self.expect(Token::LBrace)?;
            let scope = self.push_scope(ScopeKind::Block);
            let body = self.parse_block_body()?;
            self.pop_scope();
            Some((body, scope))
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            block_scope,
            handler,
            finalizer,
            pos,
        })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        self.advance()?;
        self.expect(Token::LParen)?;
        let discriminant = self.parse_expression()?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let scope = self.push_scope(ScopeKind::Block);
        let mut cases = Vec::new();
        let mut has_default = false;
        while !self.eat(&Token::RBrace)? {
            let test = match self.current {
                Token::Case => {
                    self.advance()?;
                    Some(self.parse_expression()?)
                }
                Token::Default => {
                    if has_default {
                        return Err(self.error("multiple default clauses in switch"));
                    }
                    has_default = true;
                    self.advance()?;
                    None
                }
                _ => return Err(self.unexpected()),
            };
            self.expect(Token::Colon)?;
            let mut body = Vec::new();
            while !matches!(self.current, Token::Case | Token::Default | Token::RBrace) {
                if self.current == Token::Eof {
                    return Err(self.unexpected());
                }
                body.push(self.parse_statement_item()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.pop_scope();
        Ok(Stmt::Switch {
            discriminant,
            cases,
            scope,
            pos,
        })
    }

    fn parse_module_specifier(&mut self) -> PResult<JSString> {
        match self.advance()? {
            Token::String(s) => Ok(s),
            _ => Err(self.error("expected a module specifier string")),
        }
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        self.advance()?;
        let mut names = Vec::new();
        if !matches!(self.current, Token::String(_)) {
            if let Token::Ident(_) = self.current {
                let local = self.expect_ident()?;
                names.push(ImportSpec {
                    imported: Some(JSString::from_str("default")),
                    local,
                });
                if !self.eat(&Token::Comma)? {
                    return self.finish_import(names, pos);
                }
            }
            if self.eat(&Token::Star)? {
                if !self.is_ident("as") {
                    return Err(self.unexpected());
                }
                self.advance()?;
                let local = self.expect_ident()?;
                names.push(ImportSpec {
                    imported: None,
                    local,
                });
            } else {
                self.expect(Token::LBrace)?;
                while !self.eat(&Token::RBrace)? {
                    let imported = self.parse_module_export_name()?;
                    let local = if self.is_ident("as") {
                        self.advance()?;
                        self.expect_ident()?
                    } else {
                        imported.to_string_lossy()
                    };
                    names.push(ImportSpec {
                        imported: Some(imported),
                        local,
                    });
                    if !self.eat(&Token::Comma)? {
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
            }
            return self.finish_import(names, pos);
        }
        let specifier = self.parse_module_specifier()?;
        self.consume_semicolon()?;
        Ok(Stmt::Import {
            specifier,
            names,
            pos,
        })
    }

    fn finish_import(&mut self, names: Vec<ImportSpec>, pos: Pos) -> PResult<Stmt> {
        if !self.is_ident("from") {
            return Err(self.error("expected 'from'"));
        }
        self.advance()?;
        let specifier = self.parse_module_specifier()?;
        self.consume_semicolon()?;
        for spec in &names {
            self.declare(&spec.local, BindingKind::Import)?;
        }
        Ok(Stmt::Import {
            specifier,
            names,
            pos,
        })
    }

    /// Identifier, keyword or string naming a module binding
    fn parse_module_export_name(&mut self) -> PResult<JSString> {
        if let Some(word) = self.current.keyword_name() {
            self.advance()?;
            return Ok(JSString::from_str(word));
        }
        match self.advance()? {
            Token::Ident(name) => Ok(JSString::from_str(&name)),
            Token::String(s) => Ok(s),
            _ => Err(self.error("expected an export name")),
        }
    }

    fn parse_export(&mut self) -> PResult<Stmt> {
        let pos = self.pos;
        self.advance()?;
        let scope = self.scope;
        match self.current {
            Token::Default => {
                self.advance()?;
                if self.check(&Token::Function) && matches!(self.peek(), Token::Ident(_)) {
                    let f = self.parse_function_declaration()?;
                    let name = f.name.clone();
                    return Ok(Stmt::List(vec![
                        Stmt::Function(Box::new(f)),
                        Stmt::Export {
                            names: vec![(name, JSString::from_str("default"))],
                            scope,
                        },
                    ]));
                }
                let mut value = self.parse_assignment()?;
                name_function(&mut value, "default");
                self.consume_semicolon()?;
                Ok(Stmt::ExportDefault(value, pos))
            }
            Token::Var | Token::Let | Token::Const => {
                let decl = self.parse_var_statement()?;
                let names = match &decl {
                    Stmt::Var(_, decls, _) => decls
                        .iter()
                        .map(|d| (d.name.name.clone(), JSString::from_str(&d.name.name)))
                        .collect(),
                    _ => Vec::new(),
                };
                Ok(Stmt::List(vec![decl, Stmt::Export { names, scope }]))
            }
            Token::Function => {
                let f = self.parse_function_declaration()?;
                let names = vec![(f.name.clone(), JSString::from_str(&f.name))];
                Ok(Stmt::List(vec![
                    Stmt::Function(Box::new(f)),
                    Stmt::Export { names, scope },
                ]))
            }
            Token::LBrace => {
                self.advance()?;
                let mut names = Vec::new();
                while !self.eat(&Token::RBrace)? {
                    let local = self.expect_ident()?;
                    let exported = if self.is_ident("as") {
                        self.advance()?;
                        self.parse_module_export_name()?
                    } else {
                        JSString::from_str(&local)
                    };
                    names.push((local, exported));
                    if !self.eat(&Token::Comma)? {
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                self.consume_semicolon()?;
                Ok(Stmt::Export { names, scope })
            }
            _ => Err(self.unexpected()),
        }
    }

    // ---- functions ----

    fn parse_function_declaration(&mut self) -> PResult<FunctionNode> {
        let pos = self.pos;
        self.expect(Token::Function)?;
        if self.check(&Token::Star) {
            return Err(self.error("generators are not supported"));
        }
        let name = self.expect_ident()?;
        self.declare(&name, BindingKind::Function)?;
        self.parse_function_rest(name, None, FunctionKind::Normal, pos)
    }

    fn parse_function_expression(&mut self) -> PResult<FunctionNode> {
        let pos = self.pos;
        self.expect(Token::Function)?;
        if self.check(&Token::Star) {
            return Err(self.error("generators are not supported"));
        }
        let name = match self.current {
            Token::Ident(_) => Some(self.expect_ident()?),
            _ => None,
        };
        let Some(name) = name else {
            return self.parse_function_rest(String::new(), None, FunctionKind::Normal, pos);
        };
        let name_scope = self.push_scope(ScopeKind::Block);
        self.declare(&name, BindingKind::FunctionName)?;
        let result = self.parse_function_rest(
            name.clone(),
            Some((name, name_scope)),
            FunctionKind::Normal,
            pos,
        );
        self.pop_scope();
        result
    }

    /// Parameter list and body; the current token is `(`
    fn parse_function_rest(
        &mut self,
        name: String,
        binding_name: Option<(String, ScopeId)>,
        kind: FunctionKind,
        pos: Pos,
    ) -> PResult<FunctionNode> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        while !self.eat(&Token::RParen)? {
            if matches!(self.current, Token::LBrace | Token::LBracket | Token::Ellipsis) {
                return Err(self.unexpected_param());
            }
            params.push(self.expect_ident()?);
            if self.check(&Token::Eq) {
                return Err(self.error("default parameters are not supported"));
            }
            if !self.eat(&Token::Comma)? {
                self.expect(Token::RParen)?;
                break;
            }
        }
        self.expect(Token::LBrace)?;
        self.enter_function(kind);
        let scope = self.push_scope(ScopeKind::Function);
        let result = self.parse_function_body(&params);
        self.pop_scope();
        let state = self.leave_function();
        let body = result?;
        if state.strict {
            check_strict_params(&params).map_err(|m| CompileError {
                message: m,
                line: pos.line,
                column: pos.column,
            })?;
        }
        Ok(FunctionNode {
            id: state.id,
            name,
            binding_name,
            params,
            body,
            kind,
            strict: state.strict,
            scope,
            pos,
        })
    }

    fn unexpected_param(&self) -> CompileError {
        match self.current {
            Token::Ellipsis => self.error("rest parameters are not supported"),
            _ => self.error("destructuring is not supported"),
        }
    }

    fn enter_function(&mut self, kind: FunctionKind) {
        let id = self.next_func_id;
        self.next_func_id += 1;
        let strict = self.strict();
        self.funcs.push(FuncState { id, kind, strict });
    }

    fn leave_function(&mut self) -> FuncState {
        match self.funcs.pop() {
            Some(state) => state,
            None => FuncState {
                id: 0,
                kind: FunctionKind::Script,
                strict: false,
            },
        }
    }

    /// Declares the parameters in the current scope, then reads statements
    /// up to the closing brace
    fn parse_function_body(&mut self, params: &[String]) -> PResult<Vec<Stmt>> {
        for (i, p) in params.iter().enumerate() {
            self.declare(p, BindingKind::Param(i as u16))?;
        }
        self.parse_directives()?;
        self.parse_block_body()
    }

    /// `(a, b) =>` or `ident =>` ahead
    fn is_arrow_ahead(&self) -> bool {
        match self.current {
            Token::Ident(_) => self.peek() == Token::Arrow,
            Token::LParen => {
                let mut la = self.lexer.clone();
                let mut tok = la.next_token();
                if tok != Token::RParen {
                    loop {
                        if !matches!(tok, Token::Ident(_)) {
                            return false;
                        }
                        tok = la.next_token();
                        match tok {
                            Token::Comma => tok = la.next_token(),
                            Token::RParen => break,
                            _ => return false,
                        }
                    }
                }
                la.next_token() == Token::Arrow && !la.newline_before()
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        let mut params = Vec::new();
        if self.eat(&Token::LParen)? {
            while !self.eat(&Token::RParen)? {
                params.push(self.expect_ident()?);
                self.eat(&Token::Comma)?;
            }
        } else {
            params.push(self.expect_ident()?);
        }
        self.expect(Token::Arrow)?;

        self.enter_function(FunctionKind::Arrow);
        let scope = self.push_scope(ScopeKind::Function);
        let result = (|| -> PResult<Vec<Stmt>> {
            if self.eat(&Token::LBrace)? {
                return self.parse_function_body(&params);
            }
            for (i, p) in params.iter().enumerate() {
                self.declare(p, BindingKind::Param(i as u16))?;
            }
            let body_pos = self.pos;
            let saved = mem::replace(&mut self.no_in, false);
            let value = self.parse_assignment();
            self.no_in = saved;
            Ok(vec![Stmt::Return(Some(value?), body_pos)])
        })();
        self.pop_scope();
        let state = self.leave_function();
        let body = result?;
        if state.strict {
            check_strict_params(&params).map_err(|m| CompileError {
                message: m,
                line: pos.line,
                column: pos.column,
            })?;
        }
        Ok(Expr::Function(Box::new(FunctionNode {
            id: state.id,
            name: String::new(),
            binding_name: None,
            params,
            body,
            kind: FunctionKind::Arrow,
            strict: state.strict,
            scope,
            pos,
        })))
    }

    // ---- expressions ----

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        let first = self.parse_assignment()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma)? {
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> PResult<Expr> {
        if self.is_arrow_ahead() {
            return self.parse_arrow();
        }
        let pos = self.pos;
        let target = self.parse_conditional()?;
        let Some(op) = is_assign_op(&self.current) else {
            return Ok(target);
        };
        if !target.is_reference() {
            return Err(self.error("invalid assignment target"));
        }
        self.advance()?;
        let mut value = self.parse_assignment()?;
        if let Expr::Ident(id) = &target {
            name_function(&mut value, &id.name);
        }
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            pos,
        })
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat(&Token::Question)? {
            return Ok(test);
        }
        let saved = mem::replace(&mut self.no_in, false);
        let consequent = self.parse_assignment();
        self.no_in = saved;
        let consequent = consequent?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Precedence climbing over binary and logical operators
    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        self.nested(|p| p.binary(min_prec))
    }

    fn binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((prec, op)) = infix_op(&self.current, self.no_in) {
            if prec <= min_prec {
                break;
            }
            let pos = self.pos;
            self.advance()?;
            // `**` is right-associative
            let next_min = if prec == 12 { prec - 1 } else { prec };
            let right = self.parse_binary(next_min)?;
            left = match op {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    pos,
                },
                Infix::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        let op = match self.current {
            Token::Bang => UnaryOp::Not,
            Token::Tilde => UnaryOp::BitNot,
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Neg,
            Token::TypeOf => UnaryOp::TypeOf,
            Token::Void => UnaryOp::Void,
            Token::Delete => UnaryOp::Delete,
            Token::PlusPlus | Token::MinusMinus => {
                let increment = self.current == Token::PlusPlus;
                self.advance()?;
                let target = self.nested(Self::parse_unary)?;
                if !target.is_reference() {
                    return Err(self.error("invalid increment/decrement operand"));
                }
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                    pos,
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let arg = self.nested(Self::parse_unary)?;
        if op == UnaryOp::Delete && self.strict() && matches!(arg, Expr::Ident(_)) {
            return Err(self.error("cannot delete a variable in strict mode"));
        }
        if self.check(&Token::StarStar) {
            return Err(self.error("unparenthesized unary expression cannot appear on the left of '**'"));
        }
        Ok(Expr::Unary {
            op,
            arg: Box::new(arg),
        })
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        let expr = self.parse_lhs()?;
        if matches!(self.current, Token::PlusPlus | Token::MinusMinus) && !self.newline_before {
            if !expr.is_reference() {
                return Err(self.error("invalid increment/decrement operand"));
            }
            let increment = self.current == Token::PlusPlus;
            self.advance()?;
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
                pos,
            });
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let saved = mem::replace(&mut self.no_in, false);
        let mut args = Vec::new();
        let result = (|| -> PResult<()> {
            while !self.eat(&Token::RParen)? {
                if self.check(&Token::Ellipsis) {
                    return Err(self.unexpected());
                }
                args.push(self.parse_assignment()?);
                if !self.eat(&Token::Comma)? {
                    self.expect(Token::RParen)?;
                    break;
                }
            }
            Ok(())
        })();
        self.no_in = saved;
        result.map(|_| args)
    }

    /// Property name after `.`
    fn parse_member_name(&mut self) -> PResult<JSString> {
        if let Some(word) = self.current.keyword_name() {
            self.advance()?;
            return Ok(JSString::from_str(word));
        }
        match self.advance()? {
            Token::Ident(name) => Ok(JSString::from_str(&name)),
            _ => Err(self.error("expected a property name")),
        }
    }

    /// Member accesses following an expression; calls only if `calls`
    fn parse_member_chain(&mut self, mut expr: Expr, calls: bool) -> PResult<Expr> {
        loop {
            let pos = self.pos;
            match self.current {
                Token::Dot => {
                    self.advance()?;
                    let name = self.parse_member_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        name,
                        pos,
                    };
                }
                Token::LBracket => {
                    self.advance()?;
                    let saved = mem::replace(&mut self.no_in, false);
                    let index = self.parse_expression();
                    self.no_in = saved;
                    let index = index?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                Token::LParen if calls => {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        pos,
                    };
                }
                Token::Template { .. } => {
                    return Err(self.error("tagged templates are not supported"));
                }
                Token::QuestionDot => return Err(self.unexpected()),
                _ => return Ok(expr),
            }
        }
    }

    fn parse_lhs(&mut self) -> PResult<Expr> {
        let expr = if self.check(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        self.parse_member_chain(expr, true)
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        self.expect(Token::New)?;
        if self.check(&Token::Dot) {
            return Err(self.error("'new.target' is not supported"));
        }
        let callee = if self.check(&Token::New) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        let callee = self.parse_member_chain(callee, false)?;
        let args = if self.check(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            pos,
        })
    }

    fn parse_template(&mut self) -> PResult<Expr> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        loop {
            let Token::Template { cooked, tail } = mem::replace(&mut self.current, Token::Eof) else {
                return Err(self.unexpected());
            };
            quasis.push(cooked);
            if tail {
                self.advance()?;
                return Ok(Expr::Template { quasis, exprs });
            }
            self.advance()?;
            let saved = mem::replace(&mut self.no_in, false);
            let expr = self.parse_expression();
            self.no_in = saved;
            exprs.push(expr?);
            if !self.check(&Token::RBrace) {
                return Err(self.error("expected '}' in template literal"));
            }
            self.advance_template()?;
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.pos;
        match self.current {
            Token::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            Token::String(_) | Token::BigInt(_) | Token::BigDecimal(_) | Token::Ident(_) => {
                Ok(match self.advance()? {
                    Token::String(s) => Expr::String(s),
                    Token::BigInt(s) => Expr::BigInt(s),
                    Token::BigDecimal(s) => Expr::BigDecimal(s),
                    Token::Ident(name) => Expr::Ident(self.reference(name, pos)),
                    _ => return Err(self.unexpected()),
                })
            }
            Token::Template { .. } => self.parse_template(),
            Token::True | Token::False => {
                let value = self.current == Token::True;
                self.advance()?;
                Ok(Expr::Bool(value))
            }
            Token::Null => {
                self.advance()?;
                Ok(Expr::Null)
            }
            Token::This => {
                self.advance()?;
                Ok(Expr::This)
            }
            Token::LParen => {
                self.advance()?;
                let saved = mem::replace(&mut self.no_in, false);
                let expr = self.parse_expression();
                self.no_in = saved;
                let expr = expr?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            Token::Function => {
                let f = self.parse_function_expression()?;
                Ok(Expr::Function(Box::new(f)))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> PResult<Expr> {
        self.expect(Token::LBracket)?;
        let saved = mem::replace(&mut self.no_in, false);
        let mut items = Vec::new();
        let result = (|| -> PResult<()> {
            loop {
                match self.current {
                    Token::RBracket => {
                        self.advance()?;
                        return Ok(());
                    }
                    Token::Comma => {
                        self.advance()?;
                        items.push(None);
                    }
                    Token::Ellipsis => return Err(self.unexpected()),
                    _ => {
                        items.push(Some(self.parse_assignment()?));
                        if !self.eat(&Token::Comma)? {
                            self.expect(Token::RBracket)?;
                            return Ok(());
                        }
                    }
                }
            }
        })();
        self.no_in = saved;
        result.map(|_| Expr::Array(items))
    }

    fn parse_property_key(&mut self) -> PResult<PropKey> {
        if let Some(word) = self.current.keyword_name() {
            self.advance()?;
            return Ok(PropKey::Named(JSString::from_str(word)));
        }
        match self.current {
            Token::LBracket => {
                self.advance()?;
                let key = self.parse_assignment()?;
                self.expect(Token::RBracket)?;
                Ok(PropKey::Computed(key))
            }
            Token::Number(n) => {
                self.advance()?;
                Ok(PropKey::Named(JSString::from_str(&number_to_string(n))))
            }
            _ => match self.advance()? {
                Token::Ident(name) => Ok(PropKey::Named(JSString::from_str(&name))),
                Token::String(s) => Ok(PropKey::Named(s)),
                Token::BigInt(s) => Ok(PropKey::Named(JSString::from_str(&s))),
                _ => Err(self.error("expected a property name")),
            },
        }
    }

    fn parse_object_literal(&mut self) -> PResult<Expr> {
        self.expect(Token::LBrace)?;
        let saved = mem::replace(&mut self.no_in, false);
        let mut props = Vec::new();
        let result = (|| -> PResult<()> {
            while !self.eat(&Token::RBrace)? {
                if self.check(&Token::Ellipsis) {
                    return Err(self.unexpected());
                }
                if (self.is_ident("get") || self.is_ident("set"))
                    && !matches!(
                        self.peek(),
                        Token::Colon | Token::LParen | Token::Comma | Token::RBrace
                    )
                {
                    return Err(self.error("getters and setters are not supported"));
                }
                let pos = self.pos;
                let shorthand = match &self.current {
                    Token::Ident(name)
                        if matches!(self.peek(), Token::Comma | Token::RBrace) =>
                    {
                        Some(name.clone())
                    }
                    _ => None,
                };
                if let Some(name) = shorthand {
                    self.advance()?;
                    let value = Expr::Ident(self.reference(name.clone(), pos));
                    props.push(Property {
                        key: PropKey::Named(JSString::from_str(&name)),
                        value,
                    });
                } else {
                    let key = self.parse_property_key()?;
                    let value = if self.check(&Token::LParen) {
                        let name = match &key {
                            PropKey::Named(s) => s.to_string_lossy(),
                            PropKey::Computed(_) => String::new(),
                        };
                        let f = self.parse_function_rest(name, None, FunctionKind::Normal, pos)?;
                        Expr::Function(Box::new(f))
                    } else {
                        self.expect(Token::Colon)?;
                        let mut value = self.parse_assignment()?;
                        if let PropKey::Named(s) = &key {
                            name_function(&mut value, &s.to_string_lossy());
                        }
                        value
                    };
                    props.push(Property { key, value });
                }
                if !self.eat(&Token::Comma)? {
                    self.expect(Token::RBrace)?;
                    break;
                }
            }
            Ok(())
        })();
        self.no_in = saved;
        result.map(|_| Expr::Object(props))
    }
}

/// Give an anonymous function the name of what it is assigned to
fn name_function(value: &mut Expr, name: &str) {
    if let Expr::Function(f) = value {
        if f.name.is_empty() && f.binding_name.is_none() {
            f.name = name.to_string();
        }
    }
}

fn check_strict_params(params: &[String]) -> Result<(), String> {
    for (i, p) in params.iter().enumerate() {
        if params[..i].contains(p) {
            return Err(format!("duplicate parameter name '{}'", p));
        }
        if p == "eval" || p == "arguments" {
            return Err(format!("invalid parameter name '{}' in strict mode", p));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse_program(false, false).unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        Parser::new(src).parse_program(false, false).unwrap_err()
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 100 - 3");
        let Stmt::Expr(Expr::Binary { op, left, .. }, _) = &program.main.body[0] else {
            panic!("expected a binary expression");
        };
        assert_eq!(*op, BinaryOp::Sub);
        assert!(matches!(**left, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = |open: &str, close: &str, n: usize| format!("{}1{}", open.repeat(n), close.repeat(n));
        parse(&deep("(", ")", 60));
        parse(&deep("[", "]", 60));
        for src in [
            deep("(", ")", 1000),
            deep("[", "]", 1000),
            deep("{ ", " }", 1000),
            format!("{}1", "!".repeat(1000)),
            format!("1{}", " ** 1".repeat(1000)),
            deep("function f() { ", " }", 1000),
        ] {
            let err = parse_err(&src);
            assert_eq!(err.message, "too deeply nested");
        }
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let program = parse("2 ** 3 ** 2");
        let Stmt::Expr(Expr::Binary { right, .. }, _) = &program.main.body[0] else {
            panic!("expected a binary expression");
        };
        assert!(matches!(**right, Expr::Binary { op: BinaryOp::Pow, .. }));
        assert!(Parser::new("-2 ** 2").parse_program(false, false).is_err());
    }

    #[test]
    fn test_captured_bindings() {
        let program = parse("function f(a, b) { var c = 1; return function() { return a + c; }; }");
        let Stmt::Function(f) = &program.main.body[0] else {
            panic!("expected a function declaration");
        };
        let scope = &program.scopes[f.scope];
        let captured: Vec<&str> = scope
            .bindings
            .iter()
            .filter(|b| b.captured)
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(captured, vec!["a", "c"]);
    }

    #[test]
    fn test_script_globals_are_not_captured() {
        let program = parse("var x = 1; function g() { return x; }");
        assert!(program.scopes[0].bindings.iter().all(|b| !b.captured));
        assert_eq!(program.scopes[0].kind, ScopeKind::Global);
    }

    #[test]
    fn test_asi() {
        let program = parse("var a = 1\nvar b = 2\na\n++b");
        assert_eq!(program.main.body.len(), 4);
        assert!(matches!(
            program.main.body[3],
            Stmt::Expr(Expr::Update { prefix: true, .. }, _)
        ));
    }

    #[test]
    fn test_arrow_functions() {
        let program = parse("var f = (a, b) => a + b; var g = x => { return x; }; var h = () => 1;");
        assert_eq!(program.main.body.len(), 3);
        let Stmt::Var(_, decls, _) = &program.main.body[0] else {
            panic!("expected a declaration");
        };
        let Some(Expr::Function(f)) = &decls[0].init else {
            panic!("expected an arrow function");
        };
        assert_eq!(f.kind, FunctionKind::Arrow);
        assert_eq!(f.name, "f");
        assert_eq!(f.params, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_template_literal() {
        let program = parse("`a${1 + 2}b${x}`");
        let Stmt::Expr(Expr::Template { quasis, exprs }, _) = &program.main.body[0] else {
            panic!("expected a template");
        };
        assert_eq!(quasis.len(), 3);
        assert_eq!(exprs.len(), 2);
    }

    #[test]
    fn test_strict_directive() {
        let program = parse("'use strict'; var x = 1;");
        assert!(program.main.strict);
        assert_eq!(program.main.body.len(), 2);
        assert!(!parse("var x = 'use strict';").main.strict);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_err("var = 1").line == 1);
        let err = parse_err("let x = 1;\nlet x = 2;");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("redeclaration"));
        assert!(parse_err("class A {}").message.contains("class"));
        assert!(parse_err("return 1").message.contains("return"));
        assert!(parse_err("1 = 2").message.contains("assignment"));
        assert!(parse_err("a?.b").message.contains("optional chaining"));
    }

    #[test]
    fn test_module_syntax() {
        let program = Parser::new("import { a as b } from 'm'; export const c = b; export default 1;")
            .parse_program(true, false)
            .unwrap();
        assert!(program.main.strict);
        assert!(matches!(program.main.body[0], Stmt::Import { .. }));
        assert!(matches!(program.main.body[2], Stmt::ExportDefault(..)));
        assert!(parse_err("export var x;").message.contains("module"));
    }
}
