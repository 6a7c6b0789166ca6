//! Bytecode instruction set
//!
//! One-byte opcodes with inline operands, grouped by category with explicit
//! byte values so bytecode is stable across builds. Operand encodings:
//! slots and field indices are `u16`, code offsets are absolute `u32`,
//! strings and names are `u16` length + UTF-8 bytes. All integers are
//! little-endian.

/// Size of the opcode dispatch table. Bytes at or above this value are
/// rejected before indexing.
pub const OPCODE_TABLE_SIZE: usize = 0x60;

/// Size of the primitive-cast dispatch table.
pub const CAST_TABLE_SIZE: usize = 0x08;

/// Bytecode opcode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Variables (0x00-0x0F) =====
    /// Read local slot [u16 slot]; sets the lvalue cursor
    LocalVariable = 0x00,
    /// Read object field [u16 field]; sets the lvalue cursor
    InstanceVariable = 0x01,
    /// Read an out-parameter slot [u16 slot]; sets the lvalue cursor
    LocalOutVariable = 0x02,
    /// Generic assignment: [lvalue expr][rvalue expr]
    Let = 0x04,
    /// Object-reference assignment: [lvalue expr][rvalue expr]
    LetObj = 0x05,

    // ===== Control flow (0x10-0x1F) =====
    /// Unconditional jump [u32 offset]
    Jump = 0x10,
    /// Jump if false [u32 offset] + bool expr
    JumpIfNot = 0x11,
    /// Jump to a computed offset: int expr
    ComputedJump = 0x12,
    /// Push a resume offset on the flow stack [u32 offset]
    PushFlow = 0x13,
    /// Pop the flow stack and jump there
    PopFlow = 0x14,
    /// Pop-and-jump only if the condition is false: bool expr
    PopFlowIfNot = 0x15,
    /// Script assertion [u16 line][u8 fatal] + bool expr
    Assert = 0x16,

    // ===== Context & calls (0x20-0x2F) =====
    /// Push the executing object
    Self_ = 0x20,
    /// Evaluate an object expr, then a sub-expr against it; a null object
    /// jumps to the skip offset instead: [u32 skip offset][obj expr][sub expr]
    Context = 0x21,
    /// Same as Context but a null object raises no fault
    ContextFailSilent = 0x22,
    /// Late-bound call [name] + param exprs + EndFunctionParms
    CallByName = 0x23,
    /// Early-bound call [u32 function ref] + param exprs + EndFunctionParms
    CallFinal = 0x24,

    // ===== Constants (0x30-0x3F) =====
    /// [i32]
    IntConst = 0x30,
    /// [f32]
    FloatConst = 0x31,
    /// [u8], widened to int
    ByteConst = 0x32,
    IntZero = 0x33,
    IntOne = 0x34,
    True = 0x35,
    False = 0x36,
    /// [u16 len][UTF-8 bytes]
    StringConst = 0x37,
    /// [u16 len][UTF-8 bytes]
    NameConst = 0x38,
    /// [u32 object ref], resolved by the host
    ObjectConst = 0x39,
    /// The null object reference
    NoObject = 0x3A,
    /// [u32], a code offset pushed as an int (feeds ComputedJump)
    SkipOffsetConst = 0x3B,

    // ===== Casts (0x40-0x4F) =====
    /// [u8 cast kind] + operand expr
    PrimitiveCast = 0x40,

    // ===== Structure (0x50-0x57) =====
    /// Ends the function body; followed by the return expression
    Return = 0x50,
    /// Terminates a call's parameter expression list
    EndFunctionParms = 0x51,
    /// No-op; also the "no argument" marker for optional parameters
    Nothing = 0x52,
    /// Sentinel after the return expression; executing it is fatal
    EndOfScript = 0x53,

    // ===== Development (0x58-0x5F) =====
    Breakpoint = 0x58,
    Tracepoint = 0x59,
    WireTracepoint = 0x5A,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::LocalVariable => "LocalVariable",
            Opcode::InstanceVariable => "InstanceVariable",
            Opcode::LocalOutVariable => "LocalOutVariable",
            Opcode::Let => "Let",
            Opcode::LetObj => "LetObj",
            Opcode::Jump => "Jump",
            Opcode::JumpIfNot => "JumpIfNot",
            Opcode::ComputedJump => "ComputedJump",
            Opcode::PushFlow => "PushFlow",
            Opcode::PopFlow => "PopFlow",
            Opcode::PopFlowIfNot => "PopFlowIfNot",
            Opcode::Assert => "Assert",
            Opcode::Self_ => "Self",
            Opcode::Context => "Context",
            Opcode::ContextFailSilent => "ContextFailSilent",
            Opcode::CallByName => "CallByName",
            Opcode::CallFinal => "CallFinal",
            Opcode::IntConst => "IntConst",
            Opcode::FloatConst => "FloatConst",
            Opcode::ByteConst => "ByteConst",
            Opcode::IntZero => "IntZero",
            Opcode::IntOne => "IntOne",
            Opcode::True => "True",
            Opcode::False => "False",
            Opcode::StringConst => "StringConst",
            Opcode::NameConst => "NameConst",
            Opcode::ObjectConst => "ObjectConst",
            Opcode::NoObject => "NoObject",
            Opcode::SkipOffsetConst => "SkipOffsetConst",
            Opcode::PrimitiveCast => "PrimitiveCast",
            Opcode::Return => "Return",
            Opcode::EndFunctionParms => "EndFunctionParms",
            Opcode::Nothing => "Nothing",
            Opcode::EndOfScript => "EndOfScript",
            Opcode::Breakpoint => "Breakpoint",
            Opcode::Tracepoint => "Tracepoint",
            Opcode::WireTracepoint => "WireTracepoint",
        }
    }

    /// All defined opcodes, in byte order. Used by the startup completeness
    /// check and the validator.
    pub fn all() -> &'static [Opcode] {
        &[
            Opcode::LocalVariable,
            Opcode::InstanceVariable,
            Opcode::LocalOutVariable,
            Opcode::Let,
            Opcode::LetObj,
            Opcode::Jump,
            Opcode::JumpIfNot,
            Opcode::ComputedJump,
            Opcode::PushFlow,
            Opcode::PopFlow,
            Opcode::PopFlowIfNot,
            Opcode::Assert,
            Opcode::Self_,
            Opcode::Context,
            Opcode::ContextFailSilent,
            Opcode::CallByName,
            Opcode::CallFinal,
            Opcode::IntConst,
            Opcode::FloatConst,
            Opcode::ByteConst,
            Opcode::IntZero,
            Opcode::IntOne,
            Opcode::True,
            Opcode::False,
            Opcode::StringConst,
            Opcode::NameConst,
            Opcode::ObjectConst,
            Opcode::NoObject,
            Opcode::SkipOffsetConst,
            Opcode::PrimitiveCast,
            Opcode::Return,
            Opcode::EndFunctionParms,
            Opcode::Nothing,
            Opcode::EndOfScript,
            Opcode::Breakpoint,
            Opcode::Tracepoint,
            Opcode::WireTracepoint,
        ]
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Opcode::LocalVariable),
            0x01 => Ok(Opcode::InstanceVariable),
            0x02 => Ok(Opcode::LocalOutVariable),
            0x04 => Ok(Opcode::Let),
            0x05 => Ok(Opcode::LetObj),
            0x10 => Ok(Opcode::Jump),
            0x11 => Ok(Opcode::JumpIfNot),
            0x12 => Ok(Opcode::ComputedJump),
            0x13 => Ok(Opcode::PushFlow),
            0x14 => Ok(Opcode::PopFlow),
            0x15 => Ok(Opcode::PopFlowIfNot),
            0x16 => Ok(Opcode::Assert),
            0x20 => Ok(Opcode::Self_),
            0x21 => Ok(Opcode::Context),
            0x22 => Ok(Opcode::ContextFailSilent),
            0x23 => Ok(Opcode::CallByName),
            0x24 => Ok(Opcode::CallFinal),
            0x30 => Ok(Opcode::IntConst),
            0x31 => Ok(Opcode::FloatConst),
            0x32 => Ok(Opcode::ByteConst),
            0x33 => Ok(Opcode::IntZero),
            0x34 => Ok(Opcode::IntOne),
            0x35 => Ok(Opcode::True),
            0x36 => Ok(Opcode::False),
            0x37 => Ok(Opcode::StringConst),
            0x38 => Ok(Opcode::NameConst),
            0x39 => Ok(Opcode::ObjectConst),
            0x3A => Ok(Opcode::NoObject),
            0x3B => Ok(Opcode::SkipOffsetConst),
            0x40 => Ok(Opcode::PrimitiveCast),
            0x50 => Ok(Opcode::Return),
            0x51 => Ok(Opcode::EndFunctionParms),
            0x52 => Ok(Opcode::Nothing),
            0x53 => Ok(Opcode::EndOfScript),
            0x58 => Ok(Opcode::Breakpoint),
            0x59 => Ok(Opcode::Tracepoint),
            0x5A => Ok(Opcode::WireTracepoint),
            _ => Err(()),
        }
    }
}

/// Primitive-cast kind, the operand of [`Opcode::PrimitiveCast`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    IntToFloat = 0x00,
    FloatToInt = 0x01,
    IntToBool = 0x02,
    BoolToInt = 0x03,
    ObjectToBool = 0x04,
    IntToStr = 0x05,
    FloatToStr = 0x06,
}

impl CastKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastKind::IntToFloat => "IntToFloat",
            CastKind::FloatToInt => "FloatToInt",
            CastKind::IntToBool => "IntToBool",
            CastKind::BoolToInt => "BoolToInt",
            CastKind::ObjectToBool => "ObjectToBool",
            CastKind::IntToStr => "IntToStr",
            CastKind::FloatToStr => "FloatToStr",
        }
    }

    pub fn all() -> &'static [CastKind] {
        &[
            CastKind::IntToFloat,
            CastKind::FloatToInt,
            CastKind::IntToBool,
            CastKind::BoolToInt,
            CastKind::ObjectToBool,
            CastKind::IntToStr,
            CastKind::FloatToStr,
        ]
    }
}

impl TryFrom<u8> for CastKind {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(CastKind::IntToFloat),
            0x01 => Ok(CastKind::FloatToInt),
            0x02 => Ok(CastKind::IntToBool),
            0x03 => Ok(CastKind::BoolToInt),
            0x04 => Ok(CastKind::ObjectToBool),
            0x05 => Ok(CastKind::IntToStr),
            0x06 => Ok(CastKind::FloatToStr),
            _ => Err(()),
        }
    }
}
