//! Bytecode generation
//!
//! Walks the syntax tree produced by the parser. A scope with at least one
//! binding captured by an inner function is materialized as a scope object
//! at runtime (`PushScope`); every other binding lives in a frame local.
//! Script top-level declarations go to the global object or the global
//! lexical environment.

use std::mem;
use std::rc::Rc;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use super::{CompileError, MAX_TREE_DEPTH};
use super::ast::*;
use crate::engine::{ErrorKind, JSContext};
use crate::object::JSString;
use crate::object::function::{
    Constant, FUNC_ARGUMENTS, FUNC_ARROW, FUNC_MODULE, FUNC_SCRIPT, FUNC_STRICT, FunctionBytecode,
};
use crate::vm::OpCode;

type CResult<T> = Result<T, CompileError>;

/// Where a binding lives at runtime
#[derive(Debug, Clone, Copy)]
enum Slot {
    Global,
    Local(u16),
    Scoped(u16),
}

struct Layout {
    materialized: bool,
    slots: Vec<Slot>,
}

/// Resolved variable reference
enum VarRef {
    /// Global object or global lexical; the kind if declared by the script
    Global(Option<BindingKind>),
    Local(u16, BindingKind),
    Scoped {
        depth: u16,
        index: u16,
        kind: BindingKind,
    },
}

/// Entry of the control stack, walked by `break`, `continue` and `return`
#[derive(Clone)]
enum Control<'a> {
    /// Materialized scope to pop
    Scope,
    /// Installed exception handler
    Handler,
    /// Finally block to run on early exit
    Finally(&'a [Stmt], ScopeId),
    Jump {
        labels: Vec<&'a str>,
        break_label: usize,
        continue_label: Option<usize>,
        /// Target of an unlabeled `break`
        breakable: bool,
    },
}

enum ExportSource {
    Binding(Ident),
    Local(u16),
}

/// Per-function code generation state
struct FuncState<'a> {
    fb: FunctionBytecode,
    kind: FunctionKind,
    strict: bool,
    scope: ScopeId,
    local_count: u32,
    labels: Vec<Option<u32>>,
    fixups: Vec<(u32, usize)>,
    control: Vec<Control<'a>>,
    /// Script completion value
    completion: Option<u16>,
    exports: Vec<(ExportSource, JSString)>,
}

impl FuncState<'_> {
    fn new(fb: FunctionBytecode, kind: FunctionKind, strict: bool, scope: ScopeId) -> Self {
        let local_count = fb.arg_count as u32;
        FuncState {
            fb,
            kind,
            strict,
            scope,
            local_count,
            labels: Vec::new(),
            fixups: Vec::new(),
            control: Vec::new(),
            completion: None,
            exports: Vec::new(),
        }
    }
}

pub struct Compiler<'a> {
    ctx: &'a JSContext,
    scopes: &'a [ScopeInfo],
    filename: JSString,
    layouts: Vec<Option<Layout>>,
    f: FuncState<'a>,
    depth: usize,
    /// Position of the statement being compiled
    pos: Pos,
}

fn error_at(pos: Pos, message: impl Into<String>) -> CompileError {
    CompileError {
        message: message.into(),
        line: pos.line,
        column: pos.column,
    }
}

impl<'a> Compiler<'a> {
    pub fn new(ctx: &'a JSContext, scopes: &'a [ScopeInfo], filename: &str) -> Self {
        let filename = JSString::from_str(filename);
        Compiler {
            ctx,
            scopes,
            layouts: scopes.iter().map(|_| None).collect(),
            f: FuncState::new(
                FunctionBytecode::new(JSString::empty(), filename.clone()),
                FunctionKind::Script,
                false,
                0,
            ),
            filename,
            depth: 0,
            pos: Pos::default(),
        }
    }

    /// Compile a parsed program into its top-level function
    pub fn compile_program(mut self, program: &'a Program) -> CResult<Rc<FunctionBytecode>> {
        self.compile_function(&program.main)
    }

    // ---- emission ----

    fn op(&mut self, op: OpCode) {
        self.f.fb.emit_u8(op as u8);
    }

    fn op_u16(&mut self, op: OpCode, value: u16) {
        self.op(op);
        self.f.fb.emit_u16(value);
    }

    fn atom_index(&mut self, name: &str) -> u32 {
        let atom = self.ctx.atom(name);
        self.f.fb.add_atom(atom)
    }

    fn atom_index_js(&mut self, name: &JSString) -> u32 {
        let atom = self.ctx.atom_js(name);
        self.f.fb.add_atom(atom)
    }

    fn op_atom(&mut self, op: OpCode, name: &str) {
        let index = self.atom_index(name);
        self.op(op);
        self.f.fb.emit_u32(index);
    }

    fn op_atom_js(&mut self, op: OpCode, name: &JSString) {
        let index = self.atom_index_js(name);
        self.op(op);
        self.f.fb.emit_u32(index);
    }

    fn op_scoped(&mut self, op: OpCode, depth: u16, index: u16) {
        self.op(op);
        self.f.fb.emit_u16(depth);
        self.f.fb.emit_u16(index);
    }

    fn throw_error(&mut self, kind: ErrorKind, message: &str) {
        let index = self.atom_index(message);
        self.op(OpCode::ThrowError);
        self.f.fb.emit_u8(kind.index() as u8);
        self.f.fb.emit_u32(index);
    }

    fn constant(&mut self, value: Constant, pos: Pos) -> CResult<u16> {
        if self.f.fb.constants.len() >= u16::MAX as usize {
            return Err(error_at(pos, "too many constants"));
        }
        Ok(self.f.fb.add_constant(value))
    }

    fn push_constant(&mut self, value: Constant, pos: Pos) -> CResult<()> {
        let index = self.constant(value, pos)?;
        self.op_u16(OpCode::PushConst, index);
        Ok(())
    }

    fn alloc_local(&mut self, pos: Pos) -> CResult<u16> {
        if self.f.local_count >= u16::MAX as u32 {
            return Err(error_at(pos, "too many local variables"));
        }
        self.f.local_count += 1;
        Ok((self.f.local_count - 1) as u16)
    }

    fn line(&mut self, pos: Pos) {
        self.pos = pos;
        let pc = self.f.fb.current_offset();
        self.f.fb.add_line_number(pc, pos.line);
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> CResult<()>) -> CResult<()> {
        if self.depth >= MAX_TREE_DEPTH {
            return Err(error_at(self.pos, "too deeply nested"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn new_label(&mut self) -> usize {
        self.f.labels.push(None);
        self.f.labels.len() - 1
    }

    fn place(&mut self, label: usize) {
        self.f.labels[label] = Some(self.f.fb.current_offset());
    }

    fn jump(&mut self, op: OpCode, label: usize) {
        self.op(op);
        let at = self.f.fb.current_offset();
        self.f.fixups.push((at, label));
        self.f.fb.emit_u32(0);
    }

    // ---- functions ----

    fn compile_function(&mut self, node: &'a FunctionNode) -> CResult<Rc<FunctionBytecode>> {
        let mut fb = FunctionBytecode::new(JSString::from_str(&node.name), self.filename.clone());
        if node.params.len() > u16::MAX as usize {
            return Err(error_at(node.pos, "too many parameters"));
        }
        fb.arg_count = node.params.len() as u16;
        let parent = self.scopes[node.scope].parent.unwrap_or(node.scope);
        let state = FuncState::new(fb, node.kind, node.strict, parent);
        let saved = mem::replace(&mut self.f, state);
        let result = self.compile_function_body(node);
        let state = mem::replace(&mut self.f, saved);
        result?;
        finish_function(state, node.pos)
    }

    fn compile_function_body(&mut self, node: &'a FunctionNode) -> CResult<()> {
        if node.kind == FunctionKind::Script {
            self.f.completion = Some(self.alloc_local(node.pos)?);
        }
        self.line(node.pos);
        self.enter_scope(node.scope, node.pos)?;
        if node.kind == FunctionKind::Module {
            self.hoist_imports(&node.body, node.scope)?;
        }
        self.hoist_functions(&node.body)?;
        for stmt in &node.body {
            self.compile_stmt(stmt)?;
        }
        match node.kind {
            FunctionKind::Script => {
                let completion = self.f.completion.unwrap_or(0);
                self.op_u16(OpCode::GetLoc, completion);
                self.op(OpCode::Return);
            }
            FunctionKind::Module => {
                self.emit_exports(node.pos)?;
                self.op(OpCode::ReturnUndef);
            }
            FunctionKind::Normal | FunctionKind::Arrow => self.op(OpCode::ReturnUndef),
        }
        Ok(())
    }

    /// Push a closure for a nested function
    fn emit_closure(&mut self, node: &'a FunctionNode) -> CResult<()> {
        let func = self.compile_function(node)?;
        let index = self.constant(Constant::Function(func), node.pos)?;
        self.op_u16(OpCode::FClosure, index);
        Ok(())
    }

    fn compile_function_expr(&mut self, node: &'a FunctionNode) -> CResult<()> {
        let Some((_, name_scope)) = &node.binding_name else {
            return self.emit_closure(node);
        };
        let name_scope = *name_scope;
        if !self.scopes[name_scope].has_captures() {
            return self.emit_closure(node);
        }
        // The function's own name lives in a one-slot scope around it
        self.op_u16(OpCode::PushScope, 1);
        self.layouts[name_scope] = Some(Layout {
            materialized: true,
            slots: vec![Slot::Scoped(0)],
        });
        let outer = self.f.scope;
        self.f.scope = name_scope;
        let result = self.emit_closure(node);
        self.f.scope = outer;
        result?;
        self.op(OpCode::Dup);
        self.op_scoped(OpCode::PutScoped, 0, 0);
        self.op(OpCode::PopScope);
        Ok(())
    }

    fn hoist_functions(&mut self, body: &'a [Stmt]) -> CResult<()> {
        for stmt in body {
            match stmt {
                Stmt::Function(node) => {
                    self.emit_closure(node)?;
                    let ident = Ident {
                        name: node.name.clone(),
                        scope: self.f.scope,
                        pos: node.pos,
                    };
                    match self.resolve(&ident) {
                        VarRef::Global(_) => self.op_atom(OpCode::DefineGlobalFunc, &node.name),
                        _ => self.init_var(&ident),
                    }
                }
                Stmt::List(items) => self.hoist_functions(items)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn hoist_imports(&mut self, body: &'a [Stmt], scope: ScopeId) -> CResult<()> {
        for stmt in body {
            let Stmt::Import {
                specifier,
                names,
                pos,
            } = stmt
            else {
                continue;
            };
            self.line(*pos);
            self.op_atom_js(OpCode::GetModule, specifier);
            if names.is_empty() {
                self.op(OpCode::Drop);
                continue;
            }
            for (i, spec) in names.iter().enumerate() {
                if i + 1 < names.len() {
                    self.op(OpCode::Dup);
                }
                if let Some(imported) = &spec.imported {
                    self.op_atom_js(OpCode::GetField, imported);
                }
                let ident = Ident {
                    name: spec.local.clone(),
                    scope,
                    pos: *pos,
                };
                self.init_var(&ident);
            }
        }
        Ok(())
    }

    /// Build the namespace object and register it under the file name
    fn emit_exports(&mut self, pos: Pos) -> CResult<()> {
        self.op(OpCode::Object);
        let exports = mem::take(&mut self.f.exports);
        for (source, exported) in &exports {
            match source {
                ExportSource::Binding(ident) => self.get_var(ident, false)?,
                ExportSource::Local(index) => self.op_u16(OpCode::GetLoc, *index),
            }
            self.op_atom_js(OpCode::DefineField, exported);
        }
        let filename = self.filename.clone();
        self.line(pos);
        self.op_atom_js(OpCode::ExportModule, &filename);
        Ok(())
    }

    // ---- scopes and variables ----

    fn enter_scope(&mut self, id: ScopeId, pos: Pos) -> CResult<()> {
        let scopes = self.scopes;
        let info = &scopes[id];
        let global = info.kind == ScopeKind::Global;
        let materialized = !global && info.has_captures();
        let mut slots = Vec::with_capacity(info.bindings.len());
        let mut next = 0u16;
        for binding in &info.bindings {
            let slot = if global {
                Slot::Global
            } else if binding.captured {
                next += 1;
                Slot::Scoped(next - 1)
            } else if let BindingKind::Param(k) = binding.kind {
                Slot::Local(k)
            } else {
                Slot::Local(self.alloc_local(pos)?)
            };
            slots.push(slot);
        }
        if materialized {
            self.op_u16(OpCode::PushScope, next);
            self.f.control.push(Control::Scope);
        }
        self.layouts[id] = Some(Layout {
            materialized,
            slots: slots.clone(),
        });
        self.f.scope = id;

        for (binding, slot) in info.bindings.iter().zip(slots) {
            match (binding.kind, slot) {
                (BindingKind::Var, Slot::Global) => {
                    self.op_atom(OpCode::DefineGlobalVar, &binding.name)
                }
                (BindingKind::Let | BindingKind::Const, Slot::Global) => {
                    let index = self.atom_index(&binding.name);
                    self.op(OpCode::DefineGlobalLex);
                    self.f.fb.emit_u32(index);
                    self.f.fb.emit_u8((binding.kind == BindingKind::Const) as u8);
                }
                (BindingKind::Let | BindingKind::Const, Slot::Local(i)) => {
                    self.op(OpCode::PushUninitialized);
                    self.op_u16(OpCode::PutLoc, i);
                }
                (BindingKind::Let | BindingKind::Const, Slot::Scoped(j)) => {
                    self.op(OpCode::PushUninitialized);
                    self.op_scoped(OpCode::PutScoped, 0, j);
                }
                (BindingKind::Param(k), Slot::Scoped(j)) => {
                    self.op_u16(OpCode::GetLoc, k);
                    self.op_scoped(OpCode::PutScoped, 0, j);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn leave_scope(&mut self, id: ScopeId) {
        if self.layouts[id].as_ref().is_some_and(|l| l.materialized) {
            self.op(OpCode::PopScope);
            self.f.control.pop();
        }
        self.f.scope = self.scopes[id].parent.unwrap_or(0);
    }

    fn resolve(&self, ident: &Ident) -> VarRef {
        let mut depth = 0u16;
        let mut current = Some(ident.scope);
        while let Some(id) = current {
            let info = &self.scopes[id];
            let layout = self.layouts[id].as_ref();
            if let Some(i) = info.find(&ident.name) {
                let kind = info.bindings[i].kind;
                return match layout.map(|l| l.slots[i]) {
                    Some(Slot::Local(index)) => VarRef::Local(index, kind),
                    Some(Slot::Scoped(index)) => VarRef::Scoped { depth, index, kind },
                    _ => VarRef::Global(Some(kind)),
                };
            }
            if layout.is_some_and(|l| l.materialized) {
                depth += 1;
            }
            current = info.parent;
        }
        VarRef::Global(None)
    }

    fn get_var(&mut self, ident: &Ident, for_typeof: bool) -> CResult<()> {
        match self.resolve(ident) {
            VarRef::Global(None)
                if ident.name == "arguments"
                    && matches!(self.f.kind, FunctionKind::Normal | FunctionKind::Arrow) =>
            {
                self.f.fb.flags |= FUNC_ARGUMENTS;
                self.op(OpCode::SpecialArguments);
            }
            VarRef::Global(_) => {
                let op = if for_typeof {
                    OpCode::GetGlobalUndef
                } else {
                    OpCode::GetGlobal
                };
                self.op_atom(op, &ident.name);
            }
            VarRef::Local(index, kind) if kind.is_lexical() => {
                let atom = self.atom_index(&ident.name);
                self.op_u16(OpCode::GetLocCheck, index);
                self.f.fb.emit_u32(atom);
            }
            VarRef::Local(index, _) => self.op_u16(OpCode::GetLoc, index),
            VarRef::Scoped { depth, index, kind } if kind.is_lexical() => {
                let atom = self.atom_index(&ident.name);
                self.op_scoped(OpCode::GetScopedCheck, depth, index);
                self.f.fb.emit_u32(atom);
            }
            VarRef::Scoped { depth, index, .. } => self.op_scoped(OpCode::GetScoped, depth, index),
        }
        Ok(())
    }

    /// Initialize a declared binding with the value on top of the stack
    fn init_var(&mut self, ident: &Ident) {
        match self.resolve(ident) {
            VarRef::Global(Some(BindingKind::Let | BindingKind::Const)) => {
                self.op_atom(OpCode::InitGlobalLex, &ident.name)
            }
            VarRef::Global(_) => self.op_atom(OpCode::PutGlobal, &ident.name),
            VarRef::Local(index, _) => self.op_u16(OpCode::PutLoc, index),
            VarRef::Scoped { depth, index, .. } => self.op_scoped(OpCode::PutScoped, depth, index),
        }
    }

    /// Assign the value on top of the stack to a variable
    fn put_var(&mut self, ident: &Ident) {
        let reference = self.resolve(ident);
        let kind = match &reference {
            VarRef::Global(_) => None,
            VarRef::Local(_, kind) | VarRef::Scoped { kind, .. } => Some(*kind),
        };
        if let Some(kind) = kind.filter(|k| k.is_read_only()) {
            self.op(OpCode::Drop);
            if kind != BindingKind::FunctionName || self.f.strict {
                self.throw_error(ErrorKind::TypeError, &format!("'{}' is read-only", ident.name));
            }
            return;
        }
        match reference {
            VarRef::Global(_) => self.op_atom(OpCode::PutGlobal, &ident.name),
            VarRef::Local(index, kind) if kind.is_lexical() => {
                let atom = self.atom_index(&ident.name);
                self.op_u16(OpCode::PutLocCheck, index);
                self.f.fb.emit_u32(atom);
            }
            VarRef::Local(index, _) => self.op_u16(OpCode::PutLoc, index),
            VarRef::Scoped { depth, index, kind } if kind.is_lexical() => {
                let atom = self.atom_index(&ident.name);
                self.op_scoped(OpCode::PutScopedCheck, depth, index);
                self.f.fb.emit_u32(atom);
            }
            VarRef::Scoped { depth, index, .. } => self.op_scoped(OpCode::PutScoped, depth, index),
        }
    }

    // ---- control flow ----

    /// Emit the cleanup for every control entry above `down_to`
    fn unwind_control(&mut self, down_to: usize) -> CResult<()> {
        let mut i = self.f.control.len();
        while i > down_to {
            i -= 1;
            match self.f.control[i].clone() {
                Control::Scope => self.op(OpCode::PopScope),
                Control::Handler => self.op(OpCode::DropCatch),
                Control::Finally(body, scope) => {
                    let saved = self.f.control.split_off(i);
                    let saved_scope = self.f.scope;
                    self.f.scope = self.scopes[scope].parent.unwrap_or(0);
                    let result = self.compile_block(body, scope, Pos::default());
                    self.f.scope = saved_scope;
                    self.f.control.extend(saved);
                    result?;
                }
                Control::Jump { .. } => {}
            }
        }
        Ok(())
    }

    fn emit_return(&mut self, pos: Pos) -> CResult<()> {
        if !self.f.control.iter().any(|c| matches!(c, Control::Finally(..))) {
            self.op(OpCode::Return);
            return Ok(());
        }
        let tmp = self.alloc_local(pos)?;
        self.op_u16(OpCode::PutLoc, tmp);
        self.unwind_control(0)?;
        self.op_u16(OpCode::GetLoc, tmp);
        self.op(OpCode::Return);
        Ok(())
    }

    fn emit_break(&mut self, label: Option<&str>, is_continue: bool, pos: Pos) -> CResult<()> {
        let target = self.f.control.iter().rposition(|c| match c {
            Control::Jump {
                labels,
                continue_label,
                breakable,
                ..
            } => match label {
                Some(l) => labels.iter().any(|x| *x == l) && (!is_continue || continue_label.is_some()),
                None if is_continue => continue_label.is_some(),
                None => *breakable,
            },
            _ => false,
        });
        let Some(target) = target else {
            return Err(match (label, is_continue) {
                (Some(l), _) => error_at(pos, format!("undefined label '{}'", l)),
                (None, true) => error_at(pos, "continue must be inside a loop"),
                (None, false) => error_at(pos, "break must be inside a loop or switch"),
            });
        };
        self.unwind_control(target + 1)?;
        let dest = match &self.f.control[target] {
            Control::Jump {
                break_label,
                continue_label,
                ..
            } => {
                if is_continue {
                    continue_label.unwrap_or(*break_label)
                } else {
                    *break_label
                }
            }
            _ => return Err(error_at(pos, "invalid jump target")),
        };
        self.jump(OpCode::Goto, dest);
        Ok(())
    }

    // ---- statements ----

    fn compile_block(&mut self, body: &'a [Stmt], scope: ScopeId, pos: Pos) -> CResult<()> {
        self.enter_scope(scope, pos)?;
        self.hoist_functions(body)?;
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        self.leave_scope(scope);
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &'a Stmt) -> CResult<()> {
        self.nested(|c| c.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &'a Stmt) -> CResult<()> {
        match stmt {
            Stmt::Expr(expr, pos) => {
                self.line(*pos);
                self.compile_expr(expr)?;
                match self.f.completion {
                    Some(local) => self.op_u16(OpCode::PutLoc, local),
                    None => self.op(OpCode::Drop),
                }
            }
            Stmt::Var(kind, decls, pos) => {
                self.line(*pos);
                self.compile_declarators(*kind, decls)?;
            }
            Stmt::Function(_) | Stmt::Import { .. } | Stmt::Empty => {}
            Stmt::Return(value, pos) => {
                self.line(*pos);
                match value {
                    Some(e) => self.compile_expr(e)?,
                    None => self.op(OpCode::Undefined),
                }
                self.emit_return(*pos)?;
            }
            Stmt::If {
                test,
                consequent,
                alternate,
                pos,
            } => {
                self.line(*pos);
                self.compile_expr(test)?;
                let else_label = self.new_label();
                self.jump(OpCode::IfFalse, else_label);
                self.compile_stmt(consequent)?;
                match alternate {
                    Some(alt) => {
                        let end = self.new_label();
                        self.jump(OpCode::Goto, end);
                        self.place(else_label);
                        self.compile_stmt(alt)?;
                        self.place(end);
                    }
                    None => self.place(else_label),
                }
            }
            Stmt::Block(body, scope) => self.compile_block(body, *scope, Pos::default())?,
            Stmt::List(items) => {
                for item in items {
                    self.compile_stmt(item)?;
                }
            }
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::ForIn { .. } => {
                self.compile_loop(stmt, Vec::new())?
            }
            Stmt::Break(label, pos) => self.emit_break(label.as_deref(), false, *pos)?,
            Stmt::Continue(label, pos) => self.emit_break(label.as_deref(), true, *pos)?,
            Stmt::Throw(value, pos) => {
                self.line(*pos);
                self.compile_expr(value)?;
                self.op(OpCode::Throw);
            }
            Stmt::Try {
                block,
                block_scope,
                handler,
                finalizer,
                pos,
            } => self.compile_try(block, *block_scope, handler.as_ref(), finalizer.as_ref(), *pos)?,
            Stmt::Switch {
                discriminant,
                cases,
                scope,
                pos,
            } => self.compile_switch(discriminant, cases, *scope, Vec::new(), *pos)?,
            Stmt::Labeled(..) => {
                let mut labels = Vec::new();
                let mut inner = stmt;
                while let Stmt::Labeled(label, body) = inner {
                    labels.push(label.as_str());
                    inner = body;
                }
                match inner {
                    Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::ForIn { .. } => {
                        self.compile_loop(inner, labels)?
                    }
                    Stmt::Switch {
                        discriminant,
                        cases,
                        scope,
                        pos,
                    } => self.compile_switch(discriminant, cases, *scope, labels, *pos)?,
                    _ => {
                        let end = self.new_label();
                        self.f.control.push(Control::Jump {
                            labels,
                            break_label: end,
                            continue_label: None,
                            breakable: false,
                        });
                        self.compile_stmt(inner)?;
                        self.f.control.pop();
                        self.place(end);
                    }
                }
            }
            Stmt::Export { names, scope } => {
                for (local, exported) in names {
                    let ident = Ident {
                        name: local.clone(),
                        scope: *scope,
                        pos: Pos::default(),
                    };
                    self.f.exports.push((ExportSource::Binding(ident), exported.clone()));
                }
            }
            Stmt::ExportDefault(value, pos) => {
                self.line(*pos);
                self.compile_expr(value)?;
                let local = self.alloc_local(*pos)?;
                self.op_u16(OpCode::PutLoc, local);
                self.f
                    .exports
                    .push((ExportSource::Local(local), JSString::from_str("default")));
            }
        }
        Ok(())
    }

    fn compile_declarators(&mut self, kind: VarKind, decls: &'a [Declarator]) -> CResult<()> {
        for decl in decls {
            match &decl.init {
                Some(init) => self.compile_expr(init)?,
                None if kind == VarKind::Var => continue,
                None => self.op(OpCode::Undefined),
            }
            self.init_var(&decl.name);
        }
        Ok(())
    }

    fn compile_loop(&mut self, stmt: &'a Stmt, labels: Vec<&'a str>) -> CResult<()> {
        let end = self.new_label();
        match stmt {
            Stmt::While { test, body, pos } => {
                let top = self.new_label();
                self.place(top);
                self.line(*pos);
                self.compile_expr(test)?;
                self.jump(OpCode::IfFalse, end);
                self.loop_body(body, labels, end, top)?;
                self.jump(OpCode::Goto, top);
            }
            Stmt::DoWhile { body, test, pos } => {
                let top = self.new_label();
                let cont = self.new_label();
                self.place(top);
                self.loop_body(body, labels, end, cont)?;
                self.place(cont);
                self.line(*pos);
                self.compile_expr(test)?;
                self.jump(OpCode::IfTrue, top);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                scope,
                pos,
            } => {
                self.line(*pos);
                self.enter_scope(*scope, *pos)?;
                match init {
                    Some(ForInit::Var(kind, decls)) => self.compile_declarators(*kind, decls)?,
                    Some(ForInit::Expr(e)) => {
                        self.compile_expr(e)?;
                        self.op(OpCode::Drop);
                    }
                    None => {}
                }
                let top = self.new_label();
                let cont = self.new_label();
                let exit = self.new_label();
                self.place(top);
                if let Some(test) = test {
                    self.compile_expr(test)?;
                    self.jump(OpCode::IfFalse, exit);
                }
                self.loop_body(body, labels, exit, cont)?;
                self.place(cont);
                if self.layouts[*scope].as_ref().is_some_and(|l| l.materialized) {
                    // Fresh bindings per iteration for closures
                    self.op(OpCode::CopyScope);
                }
                if let Some(update) = update {
                    self.compile_expr(update)?;
                    self.op(OpCode::Drop);
                }
                self.jump(OpCode::Goto, top);
                self.place(exit);
                self.leave_scope(*scope);
            }
            Stmt::ForIn {
                of,
                target,
                iterable,
                body,
                scope,
                pos,
            } => {
                self.line(*pos);
                self.compile_expr(iterable)?;
                self.op(if *of { OpCode::ForOfStart } else { OpCode::ForInStart });
                let iter = self.alloc_local(*pos)?;
                self.op_u16(OpCode::PutLoc, iter);

                let top = self.new_label();
                let done = self.new_label();
                self.place(top);
                self.op_u16(OpCode::GetLoc, iter);
                self.op(if *of { OpCode::ForOfNext } else { OpCode::ForInNext });
                self.jump(OpCode::IfTrue, done);

                self.f.control.push(Control::Jump {
                    labels,
                    break_label: end,
                    continue_label: Some(top),
                    breakable: true,
                });
                self.enter_scope(*scope, *pos)?;
                match target {
                    ForTarget::Decl(_, ident) => self.init_var(ident),
                    ForTarget::Expr(e) => {
                        let tmp = self.alloc_local(*pos)?;
                        self.op_u16(OpCode::PutLoc, tmp);
                        self.assign_from_local(e, tmp)?;
                    }
                }
                self.compile_stmt(body)?;
                self.leave_scope(*scope);
                self.f.control.pop();
                self.jump(OpCode::Goto, top);
                self.place(done);
                self.op(OpCode::Drop);
            }
            _ => {}
        }
        self.place(end);
        Ok(())
    }

    fn loop_body(
        &mut self,
        body: &'a Stmt,
        labels: Vec<&'a str>,
        break_label: usize,
        continue_label: usize,
    ) -> CResult<()> {
        self.f.control.push(Control::Jump {
            labels,
            break_label,
            continue_label: Some(continue_label),
            breakable: true,
        });
        let result = self.compile_stmt(body);
        self.f.control.pop();
        result
    }

    /// Store a local into an assignment target
    fn assign_from_local(&mut self, target: &'a Expr, local: u16) -> CResult<()> {
        match target {
            Expr::Ident(ident) => {
                self.op_u16(OpCode::GetLoc, local);
                self.put_var(ident);
            }
            Expr::Member { object, name, .. } => {
                self.compile_expr(object)?;
                self.op_u16(OpCode::GetLoc, local);
                self.op_atom_js(OpCode::PutField, name);
                self.op(OpCode::Drop);
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.op_u16(OpCode::GetLoc, local);
                self.op(OpCode::PutArrayEl);
                self.op(OpCode::Drop);
            }
            _ => return Err(error_at(Pos::default(), "invalid assignment target")),
        }
        Ok(())
    }

    fn compile_try(
        &mut self,
        block: &'a [Stmt],
        block_scope: ScopeId,
        handler: Option<&'a CatchClause>,
        finalizer: Option<&'a (Vec<Stmt>, ScopeId)>,
        pos: Pos,
    ) -> CResult<()> {
        self.line(pos);
        let catch_label = self.new_label();
        let after = self.new_label();
        if let Some((body, scope)) = finalizer {
            self.f.control.push(Control::Finally(body, *scope));
        }

        self.jump(OpCode::Catch, catch_label);
        self.f.control.push(Control::Handler);
        self.compile_block(block, block_scope, pos)?;
        self.f.control.pop();
        self.op(OpCode::DropCatch);
        self.jump(OpCode::Goto, after);

        // Exception on the stack
        self.place(catch_label);
        let finally_exc = self.new_label();
        match handler {
            Some(clause) => {
                let exc = match finalizer {
                    Some(_) => {
                        let tmp = self.alloc_local(pos)?;
                        self.op_u16(OpCode::PutLoc, tmp);
                        self.jump(OpCode::Catch, finally_exc);
                        self.f.control.push(Control::Handler);
                        Some(tmp)
                    }
                    None => None,
                };
                self.enter_scope(clause.scope, pos)?;
                if let Some(tmp) = exc {
                    self.op_u16(OpCode::GetLoc, tmp);
                }
                match &clause.param {
                    Some(param) => self.init_var(param),
                    None => self.op(OpCode::Drop),
                }
                self.hoist_functions(&clause.body)?;
                for stmt in &clause.body {
                    self.compile_stmt(stmt)?;
                }
                self.leave_scope(clause.scope);
                if exc.is_some() {
                    self.f.control.pop();
                    self.op(OpCode::DropCatch);
                }
            }
            None => self.jump(OpCode::Goto, finally_exc),
        }

        self.place(after);
        if let Some((body, scope)) = finalizer {
            self.f.control.pop();
            let end = self.new_label();
            self.compile_block(body, *scope, pos)?;
            self.jump(OpCode::Goto, end);

            self.place(finally_exc);
            let tmp = self.alloc_local(pos)?;
            self.op_u16(OpCode::PutLoc, tmp);
            self.compile_block(body, *scope, pos)?;
            self.op_u16(OpCode::GetLoc, tmp);
            self.op(OpCode::Throw);
            self.place(end);
        }
        Ok(())
    }

    fn compile_switch(
        &mut self,
        discriminant: &'a Expr,
        cases: &'a [SwitchCase],
        scope: ScopeId,
        labels: Vec<&'a str>,
        pos: Pos,
    ) -> CResult<()> {
        self.line(pos);
        self.compile_expr(discriminant)?;
        let value = self.alloc_local(pos)?;
        self.op_u16(OpCode::PutLoc, value);
        self.enter_scope(scope, pos)?;
        for case in cases {
            self.hoist_functions(&case.body)?;
        }

        let end = self.new_label();
        let targets: Vec<usize> = cases.iter().map(|_| self.new_label()).collect();
        for (case, &target) in cases.iter().zip(&targets) {
            if let Some(test) = &case.test {
                self.op_u16(OpCode::GetLoc, value);
                self.compile_expr(test)?;
                self.op(OpCode::StrictEq);
                self.jump(OpCode::IfTrue, target);
            }
        }
        match cases.iter().position(|c| c.test.is_none()) {
            Some(i) => self.jump(OpCode::Goto, targets[i]),
            None => self.jump(OpCode::Goto, end),
        }

        self.f.control.push(Control::Jump {
            labels,
            break_label: end,
            continue_label: None,
            breakable: true,
        });
        for (case, &target) in cases.iter().zip(&targets) {
            self.place(target);
            for stmt in &case.body {
                self.compile_stmt(stmt)?;
            }
        }
        self.f.control.pop();
        self.place(end);
        self.leave_scope(scope);
        Ok(())
    }

    // ---- expressions ----

    fn compile_expr(&mut self, expr: &'a Expr) -> CResult<()> {
        self.nested(|c| c.expr(expr))
    }

    fn expr(&mut self, expr: &'a Expr) -> CResult<()> {
        match expr {
            Expr::Number(n) => self.push_number(*n)?,
            Expr::String(s) => self.push_constant(Constant::String(s.clone()), Pos::default())?,
            Expr::BigInt(digits) => {
                let value = BigInt::from_str(digits)
                    .map_err(|_| error_at(Pos::default(), "invalid BigInt literal"))?;
                self.push_constant(Constant::BigInt(Rc::new(value)), Pos::default())?;
            }
            Expr::BigDecimal(digits) => {
                let value = BigDecimal::from_str(digits)
                    .map_err(|_| error_at(Pos::default(), "invalid BigDecimal literal"))?;
                self.push_constant(Constant::BigDecimal(Rc::new(value)), Pos::default())?;
            }
            Expr::Template { quasis, exprs } => {
                let first = quasis.first().cloned().unwrap_or_else(JSString::empty);
                self.push_constant(Constant::String(first), Pos::default())?;
                for (i, e) in exprs.iter().enumerate() {
                    self.compile_expr(e)?;
                    self.op(OpCode::ToString);
                    self.op(OpCode::Add);
                    if let Some(q) = quasis.get(i + 1).filter(|q| !q.is_empty()) {
                        self.push_constant(Constant::String(q.clone()), Pos::default())?;
                        self.op(OpCode::Add);
                    }
                }
            }
            Expr::Bool(true) => self.op(OpCode::PushTrue),
            Expr::Bool(false) => self.op(OpCode::PushFalse),
            Expr::Null => self.op(OpCode::Null),
            Expr::This => self.op(OpCode::PushThis),
            Expr::Ident(ident) => self.get_var(ident, false)?,
            Expr::Array(items) => {
                if items.len() > u16::MAX as usize {
                    return Err(error_at(Pos::default(), "array literal too large"));
                }
                for item in items {
                    match item {
                        Some(e) => self.compile_expr(e)?,
                        None => self.op(OpCode::Undefined),
                    }
                }
                self.op_u16(OpCode::ArrayFrom, items.len() as u16);
            }
            Expr::Object(props) => {
                self.op(OpCode::Object);
                for prop in props {
                    match &prop.key {
                        PropKey::Named(name) => {
                            self.compile_expr(&prop.value)?;
                            self.op_atom_js(OpCode::DefineField, name);
                        }
                        PropKey::Computed(key) => {
                            self.compile_expr(key)?;
                            self.compile_expr(&prop.value)?;
                            self.op(OpCode::DefineArrayEl);
                        }
                    }
                }
            }
            Expr::Function(node) => self.compile_function_expr(node)?,
            Expr::Unary { op, arg } => self.compile_unary(*op, arg)?,
            Expr::Update {
                increment,
                prefix,
                target,
                pos,
            } => self.compile_update(*increment, *prefix, target, *pos)?,
            Expr::Binary {
                op,
                left,
                right,
                pos,
            } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.line(*pos);
                self.op(binary_opcode(*op));
            }
            Expr::Logical { op, left, right } => {
                self.compile_expr(left)?;
                let end = self.new_label();
                self.op(OpCode::Dup);
                self.short_circuit(*op, end);
                self.op(OpCode::Drop);
                self.compile_expr(right)?;
                self.place(end);
            }
            Expr::Assign {
                op,
                target,
                value,
                pos,
            } => self.compile_assign(*op, target, value, *pos)?,
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.compile_expr(test)?;
                let else_label = self.new_label();
                let end = self.new_label();
                self.jump(OpCode::IfFalse, else_label);
                self.compile_expr(consequent)?;
                self.jump(OpCode::Goto, end);
                self.place(else_label);
                self.compile_expr(alternate)?;
                self.place(end);
            }
            Expr::Sequence(items) => {
                for (i, e) in items.iter().enumerate() {
                    self.compile_expr(e)?;
                    if i + 1 < items.len() {
                        self.op(OpCode::Drop);
                    }
                }
            }
            Expr::Member { object, name, pos } => {
                self.compile_expr(object)?;
                self.line(*pos);
                self.op_atom_js(OpCode::GetField, name);
            }
            Expr::Index { object, index, pos } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.line(*pos);
                self.op(OpCode::GetArrayEl);
            }
            Expr::Call { callee, args, pos } => self.compile_call(callee, args, *pos)?,
            Expr::New { callee, args, pos } => {
                self.compile_expr(callee)?;
                let argc = self.compile_args(args, *pos)?;
                self.line(*pos);
                self.op_u16(OpCode::CallConstructor, argc);
            }
        }
        Ok(())
    }

    fn push_number(&mut self, n: f64) -> CResult<()> {
        let is_int = n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative());
        if is_int {
            self.op(OpCode::PushI32);
            self.f.fb.emit_i32(n as i32);
            Ok(())
        } else {
            self.push_constant(Constant::Number(n), Pos::default())
        }
    }

    /// Jump to `label` when the value on top decides the result; consumes
    /// the copy pushed by the caller
    fn short_circuit(&mut self, op: LogicalOp, label: usize) {
        match op {
            LogicalOp::And => self.jump(OpCode::IfFalse, label),
            LogicalOp::Or => self.jump(OpCode::IfTrue, label),
            LogicalOp::Nullish => {
                self.op(OpCode::IsNullish);
                self.jump(OpCode::IfFalse, label);
            }
        }
    }

    fn compile_args(&mut self, args: &'a [Expr], pos: Pos) -> CResult<u16> {
        if args.len() > u16::MAX as usize {
            return Err(error_at(pos, "too many arguments"));
        }
        for arg in args {
            self.compile_expr(arg)?;
        }
        Ok(args.len() as u16)
    }

    fn compile_call(&mut self, callee: &'a Expr, args: &'a [Expr], pos: Pos) -> CResult<()> {
        match callee {
            Expr::Member { object, name, .. } => {
                self.compile_expr(object)?;
                self.op(OpCode::Dup);
                self.op_atom_js(OpCode::GetField, name);
                let argc = self.compile_args(args, pos)?;
                self.line(pos);
                self.op_u16(OpCode::CallMethod, argc);
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(object)?;
                self.op(OpCode::Dup);
                self.compile_expr(index)?;
                self.op(OpCode::GetArrayEl);
                let argc = self.compile_args(args, pos)?;
                self.line(pos);
                self.op_u16(OpCode::CallMethod, argc);
            }
            _ => {
                self.compile_expr(callee)?;
                let argc = self.compile_args(args, pos)?;
                self.line(pos);
                self.op_u16(OpCode::Call, argc);
            }
        }
        Ok(())
    }

    fn compile_unary(&mut self, op: UnaryOp, arg: &'a Expr) -> CResult<()> {
        match op {
            UnaryOp::TypeOf => {
                match arg {
                    Expr::Ident(ident) => self.get_var(ident, true)?,
                    _ => self.compile_expr(arg)?,
                }
                self.op(OpCode::TypeOf);
            }
            UnaryOp::Delete => match arg {
                Expr::Member { object, name, .. } => {
                    self.compile_expr(object)?;
                    self.push_constant(Constant::String(name.clone()), Pos::default())?;
                    self.op(OpCode::Delete);
                }
                Expr::Index { object, index, .. } => {
                    self.compile_expr(object)?;
                    self.compile_expr(index)?;
                    self.op(OpCode::Delete);
                }
                Expr::Ident(ident) => match self.resolve(ident) {
                    VarRef::Global(_) => {
                        self.op(OpCode::PushGlobalObject);
                        let name = JSString::from_str(&ident.name);
                        self.push_constant(Constant::String(name), ident.pos)?;
                        self.op(OpCode::Delete);
                    }
                    _ => self.op(OpCode::PushFalse),
                },
                _ => {
                    self.compile_expr(arg)?;
                    self.op(OpCode::Drop);
                    self.op(OpCode::PushTrue);
                }
            },
            UnaryOp::Void => {
                self.compile_expr(arg)?;
                self.op(OpCode::Drop);
                self.op(OpCode::Undefined);
            }
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Not | UnaryOp::BitNot => {
                self.compile_expr(arg)?;
                self.op(match op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Plus => OpCode::Plus,
                    UnaryOp::Not => OpCode::LNot,
                    _ => OpCode::Not,
                });
            }
        }
        Ok(())
    }

    fn compile_update(&mut self, increment: bool, prefix: bool, target: &'a Expr, pos: Pos) -> CResult<()> {
        let (pre, post) = if increment {
            (OpCode::Inc, OpCode::PostInc)
        } else {
            (OpCode::Dec, OpCode::PostDec)
        };
        self.line(pos);
        match target {
            Expr::Ident(ident) => {
                self.get_var(ident, false)?;
                if prefix {
                    self.op(pre);
                    self.op(OpCode::Dup);
                } else {
                    self.op(post);
                }
                self.put_var(ident);
            }
            Expr::Member { object, name, .. } => {
                self.compile_expr(object)?;
                self.op(OpCode::Dup);
                self.op_atom_js(OpCode::GetField, name);
                if prefix {
                    self.op(pre);
                    self.op_atom_js(OpCode::PutField, name);
                } else {
                    self.op(post);
                    self.op(OpCode::Perm3);
                    self.op_atom_js(OpCode::PutField, name);
                    self.op(OpCode::Drop);
                }
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.op(OpCode::Dup2);
                self.op(OpCode::GetArrayEl);
                if prefix {
                    self.op(pre);
                    self.op(OpCode::PutArrayEl);
                } else {
                    self.op(post);
                    self.op(OpCode::Perm4);
                    self.op(OpCode::PutArrayEl);
                    self.op(OpCode::Drop);
                }
            }
            _ => return Err(error_at(pos, "invalid increment/decrement operand")),
        }
        Ok(())
    }

    fn compile_assign(&mut self, op: AssignOp, target: &'a Expr, value: &'a Expr, pos: Pos) -> CResult<()> {
        match (op, target) {
            (AssignOp::Assign, Expr::Ident(ident)) => {
                self.compile_expr(value)?;
                self.op(OpCode::Dup);
                self.put_var(ident);
            }
            (AssignOp::Assign, Expr::Member { object, name, .. }) => {
                self.compile_expr(object)?;
                self.compile_expr(value)?;
                self.line(pos);
                self.op_atom_js(OpCode::PutField, name);
            }
            (AssignOp::Assign, Expr::Index { object, index, .. }) => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.compile_expr(value)?;
                self.line(pos);
                self.op(OpCode::PutArrayEl);
            }
            (AssignOp::Binary(bin), Expr::Ident(ident)) => {
                self.get_var(ident, false)?;
                self.compile_expr(value)?;
                self.op(binary_opcode(bin));
                self.op(OpCode::Dup);
                self.put_var(ident);
            }
            (AssignOp::Binary(bin), Expr::Member { object, name, .. }) => {
                self.compile_expr(object)?;
                self.op(OpCode::Dup);
                self.op_atom_js(OpCode::GetField, name);
                self.compile_expr(value)?;
                self.line(pos);
                self.op(binary_opcode(bin));
                self.op_atom_js(OpCode::PutField, name);
            }
            (AssignOp::Binary(bin), Expr::Index { object, index, .. }) => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.op(OpCode::Dup2);
                self.op(OpCode::GetArrayEl);
                self.compile_expr(value)?;
                self.line(pos);
                self.op(binary_opcode(bin));
                self.op(OpCode::PutArrayEl);
            }
            (AssignOp::Logical(logical), Expr::Ident(ident)) => {
                let end = self.new_label();
                self.get_var(ident, false)?;
                self.op(OpCode::Dup);
                self.short_circuit(logical, end);
                self.op(OpCode::Drop);
                self.compile_expr(value)?;
                self.op(OpCode::Dup);
                self.put_var(ident);
                self.place(end);
            }
            (AssignOp::Logical(logical), Expr::Member { object, name, .. }) => {
                let skip = self.new_label();
                let end = self.new_label();
                self.compile_expr(object)?;
                self.op(OpCode::Dup);
                self.op_atom_js(OpCode::GetField, name);
                self.op(OpCode::Dup);
                self.short_circuit(logical, skip);
                self.op(OpCode::Drop);
                self.compile_expr(value)?;
                self.op_atom_js(OpCode::PutField, name);
                self.jump(OpCode::Goto, end);
                self.place(skip);
                self.op(OpCode::Swap);
                self.op(OpCode::Drop);
                self.place(end);
            }
            (AssignOp::Logical(logical), Expr::Index { object, index, .. }) => {
                let skip = self.new_label();
                let end = self.new_label();
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.op(OpCode::Dup2);
                self.op(OpCode::GetArrayEl);
                self.op(OpCode::Dup);
                self.short_circuit(logical, skip);
                self.op(OpCode::Drop);
                self.compile_expr(value)?;
                self.op(OpCode::PutArrayEl);
                self.jump(OpCode::Goto, end);
                self.place(skip);
                self.op(OpCode::Swap);
                self.op(OpCode::Drop);
                self.op(OpCode::Swap);
                self.op(OpCode::Drop);
                self.place(end);
            }
            _ => return Err(error_at(pos, "invalid assignment target")),
        }
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Pow => OpCode::Pow,
        BinaryOp::Shl => OpCode::Shl,
        BinaryOp::Sar => OpCode::Sar,
        BinaryOp::Shr => OpCode::Shr,
        BinaryOp::BitAnd => OpCode::And,
        BinaryOp::BitOr => OpCode::Or,
        BinaryOp::BitXor => OpCode::Xor,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Lte => OpCode::Lte,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Gte => OpCode::Gte,
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Neq => OpCode::Neq,
        BinaryOp::StrictEq => OpCode::StrictEq,
        BinaryOp::StrictNeq => OpCode::StrictNeq,
        BinaryOp::In => OpCode::In,
        BinaryOp::InstanceOf => OpCode::InstanceOf,
    }
}

/// Resolve jump labels and seal the function
fn finish_function(state: FuncState<'_>, pos: Pos) -> CResult<Rc<FunctionBytecode>> {
    let mut fb = state.fb;
    for (at, label) in state.fixups {
        let target = state
            .labels
            .get(label)
            .copied()
            .flatten()
            .ok_or_else(|| error_at(pos, "unresolved jump label"))?;
        fb.patch_u32(at, target);
    }
    fb.local_count = state.local_count as u16;
    fb.flags |= match state.kind {
        FunctionKind::Normal => 0,
        FunctionKind::Arrow => FUNC_ARROW,
        FunctionKind::Script => FUNC_SCRIPT,
        FunctionKind::Module => FUNC_MODULE,
    };
    if state.strict {
        fb.flags |= FUNC_STRICT;
    }
    fb.calculate_stack_size();
    Ok(Rc::new(fb))
}

#[cfg(test)]
mod tests {
    use crate::engine::{JSContext, JSRuntime};
    use crate::value::JSValue;
    use crate::vm::run_function;

    fn eval(ctx: &JSContext, src: &str) -> JSValue {
        let func = crate::parser::compile(ctx, src, "test.js", false).unwrap();
        run_function(ctx, func, JSValue::Undefined).unwrap()
    }

    fn eval_int(src: &str) -> i32 {
        let ctx = JSContext::new(&JSRuntime::new());
        match eval(&ctx, src) {
            JSValue::Int(n) => n,
            JSValue::Float(f) if f.fract() == 0.0 => f as i32,
            other => panic!("expected an integer, got {:?}", other),
        }
    }

    #[test]
    fn test_expression_completion() {
        assert_eq!(eval_int("1 + 2 * 100 - 3"), 198);
        assert_eq!(eval_int("var x = 4; x * x"), 16);
    }

    #[test]
    fn test_closures_capture_by_reference() {
        let src = "function counter() { var n = 0; return function() { n += 1; return n; }; }
                   var c = counter(); c(); c(); c()";
        assert_eq!(eval_int(src), 3);
    }

    #[test]
    fn test_per_iteration_let_bindings() {
        let src = "var fs = []; for (let i = 0; i < 3; i++) { fs[i] = () => i; }
                   fs[0]() + fs[1]() * 10 + fs[2]() * 100";
        assert_eq!(eval_int(src), 210);
    }

    #[test]
    fn test_loops_and_labels() {
        let src = "var n = 0;
                   outer: for (var i = 0; i < 5; i++) {
                     for (var j = 0; j < 5; j++) {
                       if (j == 3) continue outer;
                       if (i == 4) break outer;
                       n++;
                     }
                   }
                   n";
        assert_eq!(eval_int(src), 12);
    }

    #[test]
    fn test_try_finally_runs_on_return() {
        let src = "var log = 0;
                   function f() { try { return 1; } finally { log = 10; } }
                   f() + log";
        assert_eq!(eval_int(src), 11);
        let src = "var r = 0;
                   try { try { throw 5; } finally { r = 1; } } catch (e) { r += e; }
                   r";
        assert_eq!(eval_int(src), 6);
    }

    #[test]
    fn test_switch_fallthrough() {
        let src = "function f(x) { var r = 0;
                     switch (x) { case 1: r += 1; case 2: r += 2; break; default: r = 100; }
                     return r; }
                   f(1) * 1000 + f(2) * 10 + f(7) / 100";
        assert_eq!(eval_int(src), 3021);
    }

    #[test]
    fn test_update_and_compound_assignment() {
        let src = "var o = { a: 1 }; var arr = [5];
                   var x = o.a++; var y = ++arr[0]; o.a *= 10; arr[0] ??= 99;
                   x * 1000 + y * 100 + o.a + arr[0]";
        assert_eq!(eval_int(src), 1000 + 600 + 20 + 6);
    }

    #[test]
    fn test_tdz_and_const() {
        let ctx = JSContext::new(&JSRuntime::new());
        let func = crate::parser::compile(&ctx, "{ x; let x = 1; }", "test.js", false).unwrap();
        assert!(run_function(&ctx, func, JSValue::Undefined).is_err());
        let func = crate::parser::compile(&ctx, "const k = 1; k = 2;", "test.js", false).unwrap();
        assert!(run_function(&ctx, func, JSValue::Undefined).is_err());
    }

    #[test]
    fn test_undefined_label_is_compile_error() {
        let ctx = JSContext::new(&JSRuntime::new());
        let err = crate::parser::compile(&ctx, "while (1) { break nowhere; }", "t.js", false).unwrap_err();
        assert!(err.message.contains("nowhere"));
    }

    #[test]
    fn test_long_operator_chain() {
        assert_eq!(eval_int(&format!("0{}", " + 1".repeat(100))), 100);
        let ctx = JSContext::new(&JSRuntime::new());
        let src = format!("var x = 0{}", " + 1".repeat(1000));
        let err = crate::parser::compile(&ctx, &src, "t.js", false).unwrap_err();
        assert_eq!(err.message, "too deeply nested");
    }

    #[test]
    fn test_module_exports() {
        let ctx = JSContext::new(&JSRuntime::new());
        let m = crate::parser::compile(&ctx, "export const a = 41; export default a + 1;", "m", true).unwrap();
        run_function(&ctx, m, JSValue::Undefined).unwrap();
        let v = eval(&ctx, "0");
        assert!(matches!(v, JSValue::Int(0)));
        let user = crate::parser::compile(&ctx, "import d, { a } from 'm'; globalThis.r = d + a;", "u", true);
        let user = user.unwrap();
        run_function(&ctx, user, JSValue::Undefined).unwrap();
        assert!(matches!(eval(&ctx, "r"), JSValue::Int(83)));
    }
}
