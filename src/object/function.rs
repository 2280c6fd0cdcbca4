//! JavaScript function types
//!
//! - Closures (compiled functions plus their captured scope chain)
//! - Native functions (builtins implemented in Rust)
//! - Host callbacks (closures registered by the embedder)
//! - Function bytecode

use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use super::atom::JSAtom;
use super::string::JSString;
use crate::engine::{JSContext, JSResult};
use crate::gc::GcRef;
use crate::value::JSValue;

/// Native function signature
///
/// `magic` lets one Rust function back several builtins. Under `new`, `this`
/// is the constructor being invoked.
pub type NativeFn =
    fn(ctx: &JSContext, this: &JSValue, args: &[JSValue], magic: i32) -> JSResult<JSValue>;

/// Builtin function implemented in Rust
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub func: NativeFn,
    pub magic: i32,
    /// Whether `new` is allowed
    pub constructor: bool,
}

/// Callable supplied by the embedder
pub trait HostCallback {
    fn call(&self, ctx: &JSContext, this: &JSValue, args: &[JSValue]) -> JSResult<JSValue>;
}

/// Compiled function instance
#[derive(Clone)]
pub struct Closure {
    pub func: Rc<FunctionBytecode>,
    /// Innermost scope object at creation time
    pub scope: Option<GcRef>,
    /// Captured `this` (arrow functions only)
    pub this_val: Option<JSValue>,
}

/// Function flags
pub const FUNC_STRICT: u8 = 1 << 0;
pub const FUNC_ARROW: u8 = 1 << 1;
pub const FUNC_MODULE: u8 = 1 << 2;
pub const FUNC_ARGUMENTS: u8 = 1 << 3;
pub const FUNC_SCRIPT: u8 = 1 << 4;
pub const FUNC_ALL: u8 = FUNC_STRICT | FUNC_ARROW | FUNC_MODULE | FUNC_ARGUMENTS | FUNC_SCRIPT;

/// Constant pool entry
#[derive(Debug, Clone)]
pub enum Constant {
    Number(f64),
    String(JSString),
    BigInt(Rc<BigInt>),
    BigDecimal(Rc<BigDecimal>),
    Function(Rc<FunctionBytecode>),
}

/// Function bytecode
///
/// Operands that name properties index into `atoms`, so a function can be
/// moved between runtimes by re-interning that table alone.
#[derive(Debug, Clone)]
pub struct FunctionBytecode {
    pub name: JSString,
    pub filename: JSString,
    /// Number of declared parameters
    pub arg_count: u16,
    /// Number of frame locals (parameters included)
    pub local_count: u16,
    /// Operand stack capacity hint
    pub stack_size: u16,
    pub flags: u8,
    pub code: Vec<u8>,
    pub atoms: Vec<JSAtom>,
    pub constants: Vec<Constant>,
    /// (pc, line) pairs sorted by pc
    pub line_numbers: Vec<(u32, u32)>,
}

impl FunctionBytecode {
    pub fn new(name: JSString, filename: JSString) -> Self {
        FunctionBytecode {
            name,
            filename,
            arg_count: 0,
            local_count: 0,
            stack_size: 0,
            flags: 0,
            code: Vec::new(),
            atoms: Vec::new(),
            constants: Vec::new(),
            line_numbers: Vec::new(),
        }
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.flags & FUNC_STRICT != 0
    }

    #[inline]
    pub fn is_arrow(&self) -> bool {
        self.flags & FUNC_ARROW != 0
    }

    #[inline]
    pub fn is_module(&self) -> bool {
        self.flags & FUNC_MODULE != 0
    }

    #[inline]
    pub fn uses_arguments(&self) -> bool {
        self.flags & FUNC_ARGUMENTS != 0
    }

    /// Add an atom to the operand table, reusing an existing slot
    pub fn add_atom(&mut self, atom: JSAtom) -> u32 {
        if let Some(pos) = self.atoms.iter().position(|&a| a == atom) {
            return pos as u32;
        }
        self.atoms.push(atom);
        (self.atoms.len() - 1) as u32
    }

    /// Add a constant to the pool
    pub fn add_constant(&mut self, value: Constant) -> u16 {
        self.constants.push(value);
        (self.constants.len() - 1) as u16
    }

    pub fn emit_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    pub fn emit_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn current_offset(&self) -> u32 {
        self.code.len() as u32
    }

    /// Patch a u32 at a given offset
    pub fn patch_u32(&mut self, offset: u32, value: u32) {
        let at = offset as usize;
        self.code[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Add a line number entry, collapsing repeats
    pub fn add_line_number(&mut self, pc: u32, line: u32) {
        match self.line_numbers.last_mut() {
            Some(last) if last.1 == line => {}
            Some(last) if last.0 == pc => last.1 = line,
            _ => self.line_numbers.push((pc, line)),
        }
    }

    /// Get the source line for a pc
    pub fn get_line_number(&self, pc: u32) -> Option<u32> {
        let idx = self
            .line_numbers
            .partition_point(|&(p, _)| p <= pc)
            .checked_sub(1)?;
        self.line_numbers.get(idx).map(|&(_, line)| line)
    }

    /// Size the operand stack from the local count
    pub fn calculate_stack_size(&mut self) {
        self.stack_size = self.local_count.saturating_add(16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> FunctionBytecode {
        FunctionBytecode::new(JSString::from_str("f"), JSString::from_str("test.js"))
    }

    #[test]
    fn test_bytecode_emit() {
        let mut fb = empty();
        fb.emit_u8(0x01);
        fb.emit_u16(0x1234);
        fb.emit_u32(0x12345678);
        assert_eq!(fb.code.len(), 7);
        assert_eq!(fb.code[1], 0x34);
        assert_eq!(fb.code[2], 0x12);

        fb.patch_u32(3, 0xAABBCCDD);
        assert_eq!(&fb.code[3..], &[0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_atom_table_dedup() {
        let mut fb = empty();
        let a = fb.add_atom(JSAtom(20));
        let b = fb.add_atom(JSAtom(21));
        assert_eq!(fb.add_atom(JSAtom(20)), a);
        assert_ne!(a, b);
        assert_eq!(fb.atoms.len(), 2);
    }

    #[test]
    fn test_line_numbers() {
        let mut fb = empty();
        fb.add_line_number(0, 1);
        fb.add_line_number(4, 1);
        fb.add_line_number(10, 5);
        fb.add_line_number(20, 10);
        assert_eq!(fb.line_numbers.len(), 3);

        assert_eq!(fb.get_line_number(0), Some(1));
        assert_eq!(fb.get_line_number(5), Some(1));
        assert_eq!(fb.get_line_number(10), Some(5));
        assert_eq!(fb.get_line_number(25), Some(10));
    }

    #[test]
    fn test_flags() {
        let mut fb = empty();
        assert!(!fb.is_strict());
        fb.flags = FUNC_STRICT | FUNC_ARROW;
        assert!(fb.is_strict());
        assert!(fb.is_arrow());
        assert!(!fb.is_module());
    }
}
