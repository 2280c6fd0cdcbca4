//! Bytecode serialization
//!
//! A compiled program is written as
//!
//! ```text
//! "MQJB" | version u16 | build tag u32 | flags u8 | function record
//! ```
//!
//! with all integers little-endian. A function record holds the name and
//! file name, argument/local/stack counts, flags, code, the atom table as
//! strings, the constant pool (nested functions are records themselves) and
//! the line table. Strings are a u32 length followed by UTF-16 code units.
//!
//! Atoms are written as text and re-interned on load, so a buffer is not tied
//! to the runtime that produced it, only to the engine build (the build tag).
//! Loading checks every read and verifies each function's instruction stream
//! before anything runs. This keeps malformed buffers out of the interpreter;
//! it does not make hostile bytecode safe to run.

use std::rc::Rc;

use bigdecimal::BigDecimal;
use log::debug;
use num_bigint::BigInt;

use crate::engine::{ErrorKind, JSRuntime};
use crate::error::DecodeError;
use crate::object::{
    Constant, FUNC_ALL, FUNC_MODULE, FUNC_SCRIPT, FunctionBytecode, JSString,
};
use crate::vm::opcode::{OpCode, OpFormat, decode};

pub const MAGIC: &[u8; 4] = b"MQJB";
pub const VERSION: u16 = 1;

/// Identifies the engine build: crate version and instruction set
pub const BUILD_TAG: u32 = build_tag();

const HEADER_MODULE: u8 = 1 << 0;

/// Deepest accepted function nesting
const MAX_DEPTH: usize = 64;

const TAG_NUMBER: u8 = 0;
const TAG_STRING: u8 = 1;
const TAG_BIGINT: u8 = 2;
const TAG_BIGDECIMAL: u8 = 3;
const TAG_FUNCTION: u8 = 4;

/// FNV-1a over the crate version and opcode count
const fn build_tag() -> u32 {
    let version = env!("CARGO_PKG_VERSION").as_bytes();
    let mut hash: u32 = 0x811c_9dc5;
    let mut i = 0;
    while i < version.len() {
        hash ^= version[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash ^= OpCode::COUNT as u32;
    hash.wrapping_mul(0x0100_0193)
}

// ---- writer ----

struct Writer<'a> {
    rt: &'a JSRuntime,
    buf: Vec<u8>,
}

impl Writer<'_> {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.buf.extend_from_slice(b);
    }

    fn string(&mut self, s: &JSString) {
        self.u32(s.len() as u32);
        for &unit in s.units() {
            self.u16(unit);
        }
    }

    fn function(&mut self, func: &FunctionBytecode) {
        self.string(&func.name);
        self.string(&func.filename);
        self.u16(func.arg_count);
        self.u16(func.local_count);
        self.u16(func.stack_size);
        self.u8(func.flags);
        self.bytes(&func.code);

        self.u32(func.atoms.len() as u32);
        for &atom in &func.atoms {
            let s = self.rt.atom_string(atom);
            self.string(&s);
        }

        self.u32(func.constants.len() as u32);
        for c in &func.constants {
            match c {
                Constant::Number(n) => {
                    self.u8(TAG_NUMBER);
                    self.buf.extend_from_slice(&n.to_le_bytes());
                }
                Constant::String(s) => {
                    self.u8(TAG_STRING);
                    self.string(s);
                }
                Constant::BigInt(b) => {
                    self.u8(TAG_BIGINT);
                    self.bytes(&b.to_signed_bytes_le());
                }
                Constant::BigDecimal(d) => {
                    self.u8(TAG_BIGDECIMAL);
                    let (digits, scale) = d.as_bigint_and_exponent();
                    self.bytes(&digits.to_signed_bytes_le());
                    self.buf.extend_from_slice(&scale.to_le_bytes());
                }
                Constant::Function(f) => {
                    self.u8(TAG_FUNCTION);
                    self.function(f);
                }
            }
        }

        self.u32(func.line_numbers.len() as u32);
        for &(pc, line) in &func.line_numbers {
            self.u32(pc);
            self.u32(line);
        }
    }
}

/// Serialize a top-level function
pub(crate) fn write(rt: &JSRuntime, func: &FunctionBytecode) -> Vec<u8> {
    let mut w = Writer {
        rt,
        buf: Vec::with_capacity(func.code.len() * 2 + 64),
    };
    w.buf.extend_from_slice(MAGIC);
    w.u16(VERSION);
    w.u32(BUILD_TAG);
    w.u8(if func.is_module() { HEADER_MODULE } else { 0 });
    w.function(func);
    w.buf
}

// ---- reader ----

struct Reader<'a> {
    rt: &'a JSRuntime,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }

    /// A length prefix, checked against the remaining input
    fn count(&mut self, unit: usize) -> Result<usize, DecodeError> {
        let at = self.pos;
        let n = self.u32()? as usize;
        if n.saturating_mul(unit) > self.data.len() - self.pos {
            return Err(DecodeError::Truncated(at));
        }
        Ok(n)
    }

    fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let n = self.count(1)?;
        self.take(n)
    }

    fn string(&mut self) -> Result<JSString, DecodeError> {
        let n = self.count(2)?;
        let raw = self.take(n * 2)?;
        let units = raw
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(JSString::from_units(units))
    }

    fn function(&mut self, depth: usize) -> Result<Rc<FunctionBytecode>, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        let name = self.string()?;
        let filename = self.string()?;
        let mut func = FunctionBytecode::new(name, filename);
        func.arg_count = self.u16()?;
        func.local_count = self.u16()?;
        func.stack_size = self.u16()?;
        func.flags = self.u8()?;
        func.code = self.bytes()?.to_vec();

        let atom_count = self.count(4)?;
        func.atoms = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let s = self.string()?;
            func.atoms.push(self.rt.intern_js(&s));
        }

        let constant_count = self.count(1)?;
        func.constants = Vec::with_capacity(constant_count);
        for _ in 0..constant_count {
            let offset = self.pos;
            let constant = match self.u8()? {
                TAG_NUMBER => Constant::Number(f64::from_le_bytes(self.array()?)),
                TAG_STRING => Constant::String(self.string()?),
                TAG_BIGINT => Constant::BigInt(Rc::new(BigInt::from_signed_bytes_le(self.bytes()?))),
                TAG_BIGDECIMAL => {
                    let digits = BigInt::from_signed_bytes_le(self.bytes()?);
                    let scale = i64::from_le_bytes(self.array()?);
                    Constant::BigDecimal(Rc::new(BigDecimal::new(digits, scale)))
                }
                TAG_FUNCTION => Constant::Function(self.function(depth + 1)?),
                tag => return Err(DecodeError::UnknownTag { tag, offset }),
            };
            func.constants.push(constant);
        }

        let line_count = self.count(8)?;
        func.line_numbers = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            let pc = self.u32()?;
            let line = self.u32()?;
            func.line_numbers.push((pc, line));
        }

        verify(&func, depth == 0)?;
        Ok(Rc::new(func))
    }
}

/// Decode and verify a serialized program
pub(crate) fn read(rt: &JSRuntime, data: &[u8]) -> Result<Rc<FunctionBytecode>, DecodeError> {
    let mut r = Reader { rt, data, pos: 0 };
    if data.len() < MAGIC.len() || r.take(MAGIC.len())? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = r.u16()?;
    if version != VERSION {
        return Err(DecodeError::Version(version));
    }
    let tag = r.u32()?;
    if tag != BUILD_TAG {
        return Err(DecodeError::BuildTag {
            expected: BUILD_TAG,
            found: tag,
        });
    }
    let header_flags = r.u8()?;
    let func = r.function(0)?;
    if r.pos != data.len() {
        return Err(DecodeError::TrailingBytes(data.len() - r.pos));
    }
    let expected = if header_flags & HEADER_MODULE != 0 {
        FUNC_MODULE
    } else {
        FUNC_SCRIPT
    };
    if func.flags & expected == 0 {
        return Err(invalid(&func, "top level does not match the header"));
    }
    debug!(
        "runtime {}: loaded bytecode '{}' ({} bytes)",
        rt.id(),
        func.filename.to_string_lossy(),
        data.len()
    );
    Ok(func)
}

fn invalid(func: &FunctionBytecode, reason: impl Into<String>) -> DecodeError {
    DecodeError::Invalid {
        function: func.name.to_string_lossy(),
        reason: reason.into(),
    }
}

/// Structural checks on one function
///
/// Every instruction must decode, every table operand must be in range and
/// every jump must land on an instruction boundary (or the end of the code).
fn verify(func: &FunctionBytecode, top_level: bool) -> Result<(), DecodeError> {
    if func.flags & !FUNC_ALL != 0 {
        return Err(invalid(func, format!("unknown flags {:#04x}", func.flags)));
    }
    let entry = func.flags & (FUNC_SCRIPT | FUNC_MODULE);
    let entry_ok = if top_level {
        entry == FUNC_SCRIPT || entry == FUNC_MODULE
    } else {
        entry == 0
    };
    if !entry_ok {
        return Err(invalid(func, "misplaced script or module flag"));
    }
    if func.arg_count > func.local_count {
        return Err(invalid(func, "more arguments than locals"));
    }

    let code = &func.code;
    let mut boundary = vec![false; code.len() + 1];
    let mut jumps = Vec::new();
    let atom_ok = |i: u32| (i as usize) < func.atoms.len();
    let local_ok = |i: u32| i < func.local_count as u32;
    let mut pc = 0;
    while pc < code.len() {
        boundary[pc] = true;
        let ins = decode(code, pc).ok_or_else(|| invalid(func, format!("bad instruction at {}", pc)))?;
        if ins.op.is_jump() {
            jumps.push((pc, ins.a));
        }
        let ok = match ins.op.format() {
            OpFormat::None
            | OpFormat::I32
            | OpFormat::Argc
            | OpFormat::Count
            | OpFormat::Scoped => true,
            OpFormat::Const => match func.constants.get(ins.a as usize) {
                Some(Constant::Function(_)) => true,
                Some(_) => ins.op != OpCode::FClosure,
                None => false,
            },
            OpFormat::Atom | OpFormat::AtomFlag => atom_ok(ins.a),
            OpFormat::Label => true,
            OpFormat::Loc => local_ok(ins.a),
            OpFormat::LocAtom => local_ok(ins.a) && atom_ok(ins.b),
            OpFormat::ScopedAtom => atom_ok(ins.c),
            OpFormat::KindAtom => ErrorKind::from_index(ins.a as usize).is_some() && atom_ok(ins.b),
        };
        if !ok {
            return Err(invalid(
                func,
                format!("operand out of range in {} at {}", ins.op.name(), pc),
            ));
        }
        pc += ins.size;
    }
    boundary[code.len()] = true;

    for (pc, target) in jumps {
        if !boundary.get(target as usize).copied().unwrap_or(false) {
            return Err(invalid(func, format!("jump at {} to {} is not an instruction", pc, target)));
        }
    }
    if func.line_numbers.iter().any(|&(pc, _)| pc as usize > code.len()) {
        return Err(invalid(func, "line table outside the code"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JSContext;
    use crate::parser;
    use crate::{EvalKind, Runtime};

    const PROGRAM: &str = "
        var total = 0;
        function add(n) { total += n; return total; }
        for (var i = 0; i < 4; i++) add(i);
        [add(10), 12345678901234567890n, 1.25l, 'text'].join(' ')
    ";

    fn compile(src: &str) -> (Rc<JSRuntime>, FunctionBytecode) {
        let rt = JSRuntime::new();
        let ctx = JSContext::new(&rt);
        let f = parser::compile(&ctx, src, "<test>", false).unwrap();
        (rt, FunctionBytecode::clone(&f))
    }

    #[test]
    fn test_round_trip_across_runtimes() {
        let rt1 = Runtime::new();
        let bytes = rt1.new_context().compile(PROGRAM).unwrap();
        let rt2 = Runtime::new();
        let ctx = rt2.new_context();
        let v = ctx.eval_binary(&bytes).unwrap();
        assert_eq!(v.as_string().unwrap(), "16 12345678901234567890 1.25 text");
        assert_eq!(ctx.globals().get("total").unwrap().as_i32().unwrap(), 16);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let (rt, f) = compile(PROGRAM);
        let bytes = write(&rt, &f);
        let again = write(&rt, &read(&rt, &bytes).unwrap());
        assert_eq!(bytes, again);
    }

    #[test]
    fn test_header_checks() {
        let (rt, f) = compile("1");
        let bytes = write(&rt, &f);
        assert_eq!(read(&rt, b"JUNK").unwrap_err(), DecodeError::BadMagic);
        assert_eq!(read(&rt, b"MQ").unwrap_err(), DecodeError::BadMagic);

        let mut other_version = bytes.clone();
        other_version[4] = 9;
        assert_eq!(read(&rt, &other_version).unwrap_err(), DecodeError::Version(9));

        let mut other_build = bytes.clone();
        other_build[6] ^= 0xff;
        assert!(matches!(
            read(&rt, &other_build).unwrap_err(),
            DecodeError::BuildTag { expected: BUILD_TAG, .. }
        ));
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let (rt, f) = compile(PROGRAM);
        let bytes = write(&rt, &f);
        for n in 0..bytes.len() {
            assert!(read(&rt, &bytes[..n]).is_err(), "prefix of {n} bytes accepted");
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let (rt, f) = compile("1");
        let mut bytes = write(&rt, &f);
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(read(&rt, &bytes).unwrap_err(), DecodeError::TrailingBytes(2));
    }

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let (rt, mut f) = compile("1 + 2");
        f.code[0] = 0xff;
        let err = read(&rt, &write(&rt, &f)).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { .. }), "{err}");
    }

    #[test]
    fn test_jump_into_instruction_is_rejected() {
        let (rt, mut f) = compile("var s = 0; for (var i = 0; i < 3; i++) s += i; s");
        let mut pc = 0;
        let at = loop {
            let ins = decode(&f.code, pc).unwrap();
            if ins.op.is_jump() {
                break pc;
            }
            pc += ins.size;
        };
        let target = (at as u32 + 1).to_le_bytes();
        f.code[at + 1..at + 5].copy_from_slice(&target);
        let err = read(&rt, &write(&rt, &f)).unwrap_err();
        assert!(err.to_string().contains("is not an instruction"), "{err}");
    }

    #[test]
    fn test_local_out_of_range_is_rejected() {
        let (rt, mut f) = compile("function f(a) { return a; } f(1)");
        let inner = f
            .constants
            .iter()
            .position(|c| matches!(c, Constant::Function(_)))
            .unwrap();
        let Constant::Function(g) = &f.constants[inner] else {
            unreachable!()
        };
        let mut g = FunctionBytecode::clone(g);
        g.local_count = 0;
        g.arg_count = 0;
        f.constants[inner] = Constant::Function(Rc::new(g));
        let err = read(&rt, &write(&rt, &f)).unwrap_err();
        assert!(err.to_string().contains("operand out of range"), "{err}");
    }

    #[test]
    fn test_module_flag_round_trips() {
        let rt = Runtime::new();
        let ctx = rt.new_context();
        let opts = crate::EvalOptions::new().module().filename("lib.js");
        let bytes = ctx.compile_with("export var answer = 42;", &opts).unwrap();
        assert_eq!(bytes[10] & HEADER_MODULE, HEADER_MODULE);
        let other = rt.new_context();
        let ns = other.eval_binary(&bytes).unwrap();
        assert_eq!(ns.get("answer").unwrap().as_i32().unwrap(), 42);
        assert!(other.eval("typeof answer", EvalKind::Global).unwrap().as_string().unwrap() == "undefined");
    }
}
