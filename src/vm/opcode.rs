//! Bytecode opcode definitions
//!
//! The bytecode is stack-based. Each opcode is one byte followed by its
//! operands in little-endian order; the operand layout is given by its
//! [`OpFormat`]. Jump targets are absolute offsets into the function's code.

#[cfg(feature = "dump")]
use std::fmt::Write as _;

#[cfg(feature = "dump")]
use crate::object::FunctionBytecode;

/// Opcode operand formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFormat {
    /// No operand
    None,
    /// Signed 32-bit immediate
    I32,
    /// 16-bit constant pool index
    Const,
    /// 32-bit atom table index
    Atom,
    /// 32-bit absolute jump target
    Label,
    /// 16-bit local variable index
    Loc,
    /// 16-bit argument count
    Argc,
    /// 16-bit element/slot count
    Count,
    /// 16-bit scope depth, 16-bit slot index
    Scoped,
    /// 16-bit local index, 32-bit atom (variable name for diagnostics)
    LocAtom,
    /// 16-bit scope depth, 16-bit slot index, 32-bit atom
    ScopedAtom,
    /// 8-bit error kind, 32-bit atom (message)
    KindAtom,
    /// 32-bit atom, 8-bit flag
    AtomFlag,
}

impl OpFormat {
    /// Operand bytes following the opcode byte
    pub const fn operand_size(self) -> usize {
        match self {
            OpFormat::None => 0,
            OpFormat::Const | OpFormat::Loc | OpFormat::Argc | OpFormat::Count => 2,
            OpFormat::I32 | OpFormat::Atom | OpFormat::Label | OpFormat::Scoped => 4,
            OpFormat::KindAtom | OpFormat::AtomFlag => 5,
            OpFormat::LocAtom => 6,
            OpFormat::ScopedAtom => 8,
        }
    }
}

macro_rules! define_opcodes {
    ($($(#[$doc:meta])* $name:ident => $fmt:ident),* $(,)?) => {
        /// JavaScript bytecode opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum OpCode {
            $($(#[$doc])* $name),*
        }

        const ALL_OPCODES: &[OpCode] = &[$(OpCode::$name),*];

        impl OpCode {
            /// Total number of opcodes
            pub const COUNT: usize = ALL_OPCODES.len();

            /// Decode an opcode byte
            #[inline]
            pub fn from_u8(byte: u8) -> Option<OpCode> {
                ALL_OPCODES.get(byte as usize).copied()
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name)),*
                }
            }

            #[inline]
            pub fn format(self) -> OpFormat {
                match self {
                    $(OpCode::$name => OpFormat::$fmt),*
                }
            }
        }
    };
}

define_opcodes! {
    Nop => None,

    // Push values
    PushI32 => I32,
    PushConst => Const,
    Undefined => None,
    Null => None,
    PushTrue => None,
    PushFalse => None,
    PushThis => None,
    /// Push the TDZ marker
    PushUninitialized => None,
    PushGlobalObject => None,
    /// Create a closure from a constant pool function
    FClosure => Const,
    /// Push a new empty object
    Object => None,
    /// Pop `n` values into a new array
    ArrayFrom => Count,
    /// Push the `arguments` array of the current frame
    SpecialArguments => None,

    // Stack manipulation
    Drop => None,
    Dup => None,
    /// a b -> a b a b
    Dup2 => None,
    Swap => None,
    /// a b c -> b a c
    Perm3 => None,
    /// a b c d -> c a b d
    Perm4 => None,

    // Calls
    /// func args... -> result
    Call => Argc,
    /// this func args... -> result
    CallMethod => Argc,
    /// func args... -> object
    CallConstructor => Argc,
    Return => None,
    ReturnUndef => None,
    Throw => None,
    ThrowError => KindAtom,

    // Properties
    /// obj -> value
    GetField => Atom,
    /// obj value -> value
    PutField => Atom,
    /// obj value -> obj
    DefineField => Atom,
    /// obj key -> value
    GetArrayEl => None,
    /// obj key value -> value
    PutArrayEl => None,
    /// obj key value -> obj
    DefineArrayEl => None,
    /// obj key -> bool
    Delete => None,
    /// key obj -> bool
    In => None,
    /// value ctor -> bool
    InstanceOf => None,

    // Variables
    GetLoc => Loc,
    PutLoc => Loc,
    GetLocCheck => LocAtom,
    PutLocCheck => LocAtom,
    GetScoped => Scoped,
    PutScoped => Scoped,
    GetScopedCheck => ScopedAtom,
    PutScopedCheck => ScopedAtom,
    /// Enter a new scope object with `n` slots
    PushScope => Count,
    PopScope => None,
    /// Replace the current scope with a copy (per-iteration bindings)
    CopyScope => None,

    // Globals and modules
    GetGlobal => Atom,
    /// Like GetGlobal, but a missing name yields undefined (typeof)
    GetGlobalUndef => Atom,
    PutGlobal => Atom,
    DefineGlobalVar => Atom,
    DefineGlobalFunc => Atom,
    /// Declare a top-level lexical binding (flag: const)
    DefineGlobalLex => AtomFlag,
    InitGlobalLex => Atom,
    GetModule => Atom,
    ExportModule => Atom,

    // Control flow
    Goto => Label,
    IfFalse => Label,
    IfTrue => Label,
    /// Install an exception handler
    Catch => Label,
    DropCatch => None,

    // Iteration
    ForInStart => None,
    ForOfStart => None,
    /// iter -> value done
    ForInNext => None,
    /// iter -> value done
    ForOfNext => None,

    // Unary operators
    Neg => None,
    Plus => None,
    Inc => None,
    Dec => None,
    /// v -> old new
    PostInc => None,
    /// v -> old new
    PostDec => None,
    Not => None,
    LNot => None,
    TypeOf => None,

    // Binary operators
    Mul => None,
    Div => None,
    Mod => None,
    Add => None,
    Sub => None,
    Pow => None,
    Shl => None,
    Sar => None,
    Shr => None,
    Lt => None,
    Lte => None,
    Gt => None,
    Gte => None,
    Eq => None,
    Neq => None,
    StrictEq => None,
    StrictNeq => None,
    And => None,
    Or => None,
    Xor => None,

    IsNullish => None,
    ToString => None,
}

impl OpCode {
    /// Instruction size in bytes
    #[inline]
    pub fn size(self) -> usize {
        1 + self.format().operand_size()
    }

    #[inline]
    pub fn is_jump(self) -> bool {
        self.format() == OpFormat::Label
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub op: OpCode,
    /// Operands in declaration order (unused entries are zero)
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub size: usize,
}

#[inline]
fn read_u16(code: &[u8], at: usize) -> Option<u32> {
    let b = code.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]) as u32)
}

#[inline]
fn read_u32(code: &[u8], at: usize) -> Option<u32> {
    let b = code.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Decode the instruction at `pc`; None if the bytes are not a valid
/// instruction
#[inline]
pub fn decode(code: &[u8], pc: usize) -> Option<Instruction> {
    let op = OpCode::from_u8(*code.get(pc)?)?;
    let at = pc + 1;
    let (a, b, c) = match op.format() {
        OpFormat::None => (0, 0, 0),
        OpFormat::Const | OpFormat::Loc | OpFormat::Argc | OpFormat::Count => {
            (read_u16(code, at)?, 0, 0)
        }
        OpFormat::I32 | OpFormat::Atom | OpFormat::Label => (read_u32(code, at)?, 0, 0),
        OpFormat::Scoped => (read_u16(code, at)?, read_u16(code, at + 2)?, 0),
        OpFormat::LocAtom => (read_u16(code, at)?, read_u32(code, at + 2)?, 0),
        OpFormat::ScopedAtom => (
            read_u16(code, at)?,
            read_u16(code, at + 2)?,
            read_u32(code, at + 4)?,
        ),
        OpFormat::KindAtom => (*code.get(at)? as u32, read_u32(code, at + 1)?, 0),
        OpFormat::AtomFlag => (read_u32(code, at)?, *code.get(at + 4)? as u32, 0),
    };
    Some(Instruction {
        op,
        a,
        b,
        c,
        size: op.size(),
    })
}

/// Render a function's code as text, one instruction per line
#[cfg(feature = "dump")]
pub fn disassemble(func: &FunctionBytecode) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "function {} ({} args, {} locals):",
        func.name.to_string_lossy(),
        func.arg_count,
        func.local_count
    );
    let mut pc = 0;
    while pc < func.code.len() {
        match decode(&func.code, pc) {
            Some(ins) => {
                let _ = write!(out, "  {:5}: {}", pc, ins.op.name());
                match ins.op.format() {
                    OpFormat::None => {}
                    OpFormat::I32 => {
                        let _ = write!(out, " {}", ins.a as i32);
                    }
                    OpFormat::Scoped => {
                        let _ = write!(out, " {} {}", ins.a, ins.b);
                    }
                    OpFormat::LocAtom | OpFormat::KindAtom | OpFormat::AtomFlag => {
                        let _ = write!(out, " {} {}", ins.a, ins.b);
                    }
                    OpFormat::ScopedAtom => {
                        let _ = write!(out, " {} {} {}", ins.a, ins.b, ins.c);
                    }
                    _ => {
                        let _ = write!(out, " {}", ins.a);
                    }
                }
                out.push('\n');
                pc += ins.size;
            }
            None => {
                let _ = writeln!(out, "  {:5}: <invalid {:#04x}>", pc, func.code[pc]);
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for byte in 0..OpCode::COUNT as u8 {
            let op = OpCode::from_u8(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert!(OpCode::from_u8(OpCode::COUNT as u8).is_none());
        assert!(OpCode::from_u8(0xFF).is_none());
    }

    #[test]
    fn test_opcode_sizes() {
        assert_eq!(OpCode::Drop.size(), 1);
        assert_eq!(OpCode::PushConst.size(), 3);
        assert_eq!(OpCode::Goto.size(), 5);
        assert_eq!(OpCode::GetScopedCheck.size(), 9);
        assert_eq!(OpCode::ThrowError.size(), 6);
    }

    #[test]
    fn test_decode() {
        let mut code = vec![OpCode::PushI32 as u8];
        code.extend_from_slice(&(-5i32).to_le_bytes());
        code.push(OpCode::GetScoped as u8);
        code.extend_from_slice(&2u16.to_le_bytes());
        code.extend_from_slice(&7u16.to_le_bytes());

        let ins = decode(&code, 0).unwrap();
        assert_eq!(ins.op, OpCode::PushI32);
        assert_eq!(ins.a as i32, -5);
        let ins = decode(&code, ins.size).unwrap();
        assert_eq!(ins.op, OpCode::GetScoped);
        assert_eq!((ins.a, ins.b), (2, 7));
    }

    #[test]
    fn test_decode_truncated() {
        let code = vec![OpCode::Goto as u8, 0, 0];
        assert!(decode(&code, 0).is_none());
        assert!(decode(&[], 0).is_none());
    }
}
