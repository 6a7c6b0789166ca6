//! Bytecode validator — static analysis before execution
//!
//! Performs four checks over a function's bytecode:
//! 1. **Decode pass** — every byte is a known opcode with its operand bytes
//!    present; cast kinds are known
//! 2. **Jump targets** — all jump/skip destinations are within bounds and
//!    land on an instruction boundary
//! 3. **Slot refs** — inline local-slot operands are within the function's
//!    locals block
//! 4. **Terminator** — non-empty bytecode ends with the end-of-script
//!    sentinel
//!
//! Advisory at call sites: the loader and tests use it, the interpreter does
//! not depend on it.

use super::opcode::{CastKind, Opcode};
use crate::function::FunctionDescriptor;
use std::collections::HashSet;

/// A validation error with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Byte offset in the instruction stream where the error was detected.
    pub offset: usize,
    /// What went wrong.
    pub kind: ValidationErrorKind,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "offset {:#06x}: {}", self.offset, self.kind)
    }
}

/// Kinds of errors the validator can detect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A byte that is not a recognised opcode.
    UnknownOpcode(u8),
    /// A cast kind that is not recognised.
    UnknownCast(u8),
    /// The instruction stream ended before an opcode's operands.
    TruncatedInstruction { opcode: &'static str },
    /// A jump/skip target falls outside the bytecode.
    JumpOutOfBounds { target: usize, len: usize },
    /// A jump/skip target does not land on an instruction boundary.
    JumpMisaligned { target: usize },
    /// An inline slot operand exceeds the function's locals block.
    SlotOutOfRange { slot: u16, locals: u16 },
    /// A string operand holds invalid UTF-8.
    InvalidUtf8,
    /// Non-empty bytecode does not end with the end-of-script sentinel.
    MissingTerminator,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOpcode(b) => write!(f, "unknown opcode {:#04x}", b),
            Self::UnknownCast(b) => write!(f, "unknown cast kind {:#04x}", b),
            Self::TruncatedInstruction { opcode } => {
                write!(f, "instruction {} is truncated (missing operand bytes)", opcode)
            }
            Self::JumpOutOfBounds { target, len } => {
                write!(f, "jump target {} is out of bounds (len={})", target, len)
            }
            Self::JumpMisaligned { target } => {
                write!(f, "jump target {} does not land on an instruction boundary", target)
            }
            Self::SlotOutOfRange { slot, locals } => {
                write!(f, "slot {} out of range (locals={})", slot, locals)
            }
            Self::InvalidUtf8 => write!(f, "string operand is not valid UTF-8"),
            Self::MissingTerminator => {
                write!(f, "bytecode does not end with EndOfScript")
            }
        }
    }
}

/// Validate a function's bytecode, collecting all errors found.
///
/// Returns `Ok(())` if no issues are found, otherwise `Err(errors)` with
/// every detected problem. Does NOT short-circuit on the first error.
/// Native functions and empty bodies are trivially valid.
pub fn validate(function: &FunctionDescriptor) -> Result<(), Vec<ValidationError>> {
    let code = function.code();
    if code.is_empty() {
        return Ok(());
    }

    let mut errors: Vec<ValidationError> = Vec::new();
    let mut boundaries: HashSet<usize> = HashSet::new();
    let mut jump_sites: Vec<(usize, usize)> = Vec::new();
    let locals = function.locals_slots();

    let mut offset = 0;
    let mut last_opcode = None;
    while offset < code.len() {
        boundaries.insert(offset);
        let at = offset;
        let byte = code[offset];
        offset += 1;

        let Ok(op) = Opcode::try_from(byte) else {
            errors.push(ValidationError {
                offset: at,
                kind: ValidationErrorKind::UnknownOpcode(byte),
            });
            continue;
        };
        last_opcode = Some(op);

        let truncated = |errors: &mut Vec<ValidationError>| {
            errors.push(ValidationError {
                offset: at,
                kind: ValidationErrorKind::TruncatedInstruction {
                    opcode: op.mnemonic(),
                },
            });
        };

        match op {
            // [u16 slot], checked against the locals block
            Opcode::LocalVariable | Opcode::LocalOutVariable => {
                match read_u16(code, &mut offset) {
                    Some(slot) => {
                        if slot >= locals {
                            errors.push(ValidationError {
                                offset: at,
                                kind: ValidationErrorKind::SlotOutOfRange { slot, locals },
                            });
                        }
                    }
                    None => truncated(&mut errors),
                }
            }
            // [u16 field]; field layout belongs to the host class, not us
            Opcode::InstanceVariable => {
                if read_u16(code, &mut offset).is_none() {
                    truncated(&mut errors);
                }
            }
            // [u32 code offset]
            Opcode::Jump
            | Opcode::JumpIfNot
            | Opcode::PushFlow
            | Opcode::Context
            | Opcode::ContextFailSilent
            | Opcode::SkipOffsetConst => match read_u32(code, &mut offset) {
                Some(target) => jump_sites.push((at, target as usize)),
                None => truncated(&mut errors),
            },
            // [u32 data]
            Opcode::CallFinal | Opcode::IntConst | Opcode::FloatConst | Opcode::ObjectConst => {
                if read_u32(code, &mut offset).is_none() {
                    truncated(&mut errors);
                }
            }
            // [u16 len][bytes]
            Opcode::CallByName | Opcode::StringConst | Opcode::NameConst => {
                match read_u16(code, &mut offset) {
                    Some(len) => {
                        let end = offset + len as usize;
                        match code.get(offset..end) {
                            Some(bytes) => {
                                if std::str::from_utf8(bytes).is_err() {
                                    errors.push(ValidationError {
                                        offset: at,
                                        kind: ValidationErrorKind::InvalidUtf8,
                                    });
                                }
                                offset = end;
                            }
                            None => {
                                truncated(&mut errors);
                                offset = code.len();
                            }
                        }
                    }
                    None => truncated(&mut errors),
                }
            }
            // [u16 line][u8 fatal]
            Opcode::Assert => {
                if read_u16(code, &mut offset).is_none() || read_u8(code, &mut offset).is_none() {
                    truncated(&mut errors);
                }
            }
            // [u8 cast kind]
            Opcode::PrimitiveCast => match read_u8(code, &mut offset) {
                Some(kind) => {
                    if CastKind::try_from(kind).is_err() {
                        errors.push(ValidationError {
                            offset: at,
                            kind: ValidationErrorKind::UnknownCast(kind),
                        });
                    }
                }
                None => truncated(&mut errors),
            },
            // [u8 data]
            Opcode::ByteConst => {
                if read_u8(code, &mut offset).is_none() {
                    truncated(&mut errors);
                }
            }
            // No operands
            Opcode::Let
            | Opcode::LetObj
            | Opcode::ComputedJump
            | Opcode::PopFlow
            | Opcode::PopFlowIfNot
            | Opcode::Self_
            | Opcode::IntZero
            | Opcode::IntOne
            | Opcode::True
            | Opcode::False
            | Opcode::NoObject
            | Opcode::Return
            | Opcode::EndFunctionParms
            | Opcode::Nothing
            | Opcode::EndOfScript
            | Opcode::Breakpoint
            | Opcode::Tracepoint
            | Opcode::WireTracepoint => {}
        }
    }

    for (at, target) in jump_sites {
        if target >= code.len() {
            errors.push(ValidationError {
                offset: at,
                kind: ValidationErrorKind::JumpOutOfBounds {
                    target,
                    len: code.len(),
                },
            });
        } else if !boundaries.contains(&target) {
            errors.push(ValidationError {
                offset: at,
                kind: ValidationErrorKind::JumpMisaligned { target },
            });
        }
    }

    if last_opcode != Some(Opcode::EndOfScript) {
        errors.push(ValidationError {
            offset: code.len().saturating_sub(1),
            kind: ValidationErrorKind::MissingTerminator,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn read_u8(code: &[u8], offset: &mut usize) -> Option<u8> {
    let v = code.get(*offset).copied()?;
    *offset += 1;
    Some(v)
}

fn read_u16(code: &[u8], offset: &mut usize) -> Option<u16> {
    let bytes = code.get(*offset..*offset + 2)?;
    *offset += 2;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(code: &[u8], offset: &mut usize) -> Option<u32> {
    let bytes = code.get(*offset..*offset + 4)?;
    *offset += 4;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
