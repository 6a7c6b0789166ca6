//! Bytecode disassembler
//!
//! Converts a function's bytecode back to a human-readable assembly-like
//! listing. Used for diagnostics and snapshot tests.
//!
//! # Format
//! ```text
//! === add_one (2 params, 2 slots) ===
//! 0000  Return
//! 0001  IntConst 42
//! 0006  EndOfScript
//! ```

use super::opcode::{CastKind, Opcode};
use crate::function::FunctionDescriptor;
use std::fmt::Write;

/// Disassemble a function's bytecode to a listing.
pub fn disassemble(function: &FunctionDescriptor) -> String {
    let mut output = String::new();
    writeln!(
        output,
        "=== {} ({} params, {} slots) ===",
        function.name(),
        function.params_slots(),
        function.locals_slots()
    )
    .unwrap();

    if function.is_native() {
        writeln!(output, "<native>").unwrap();
        return output;
    }

    let code = function.code();
    let mut offset = 0;
    while offset < code.len() {
        let line = disassemble_instruction(code, &mut offset);
        writeln!(output, "{}", line).unwrap();
    }
    output
}

/// Disassemble the instruction at `offset`, advancing past it.
fn disassemble_instruction(code: &[u8], offset: &mut usize) -> String {
    let at = *offset;
    let byte = code[*offset];
    *offset += 1;

    let Ok(op) = Opcode::try_from(byte) else {
        return format!("{:04x}  <unknown {:#04x}>", at, byte);
    };

    let operands = match op {
        Opcode::LocalVariable | Opcode::InstanceVariable | Opcode::LocalOutVariable => {
            fmt_u16(code, offset)
        }
        Opcode::Jump
        | Opcode::JumpIfNot
        | Opcode::PushFlow
        | Opcode::Context
        | Opcode::ContextFailSilent
        | Opcode::SkipOffsetConst => fmt_offset(code, offset),
        Opcode::CallFinal | Opcode::ObjectConst => fmt_u32(code, offset),
        Opcode::IntConst => fmt_i32(code, offset),
        Opcode::FloatConst => fmt_f32(code, offset),
        Opcode::ByteConst => fmt_u8(code, offset),
        Opcode::CallByName | Opcode::StringConst | Opcode::NameConst => fmt_string(code, offset),
        Opcode::Assert => {
            let line = fmt_u16(code, offset);
            let fatal = fmt_u8(code, offset);
            format!("{} fatal={}", line.trim(), fatal.trim())
        }
        Opcode::PrimitiveCast => fmt_cast(code, offset),
        _ => String::new(),
    };

    if operands.is_empty() {
        format!("{:04x}  {}", at, op.mnemonic())
    } else {
        format!("{:04x}  {} {}", at, op.mnemonic(), operands)
    }
}

fn fmt_u8(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset).copied() {
        Some(v) => {
            *offset += 1;
            format!("{}", v)
        }
        None => "<truncated>".to_string(),
    }
}

fn fmt_u16(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset..*offset + 2) {
        Some(bytes) => {
            *offset += 2;
            format!("{}", u16::from_le_bytes([bytes[0], bytes[1]]))
        }
        None => {
            *offset = code.len();
            "<truncated>".to_string()
        }
    }
}

fn fmt_u32(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset..*offset + 4) {
        Some(bytes) => {
            *offset += 4;
            format!("{}", u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        None => {
            *offset = code.len();
            "<truncated>".to_string()
        }
    }
}

fn fmt_offset(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset..*offset + 4) {
        Some(bytes) => {
            *offset += 4;
            format!(
                "-> {:04x}",
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            )
        }
        None => {
            *offset = code.len();
            "<truncated>".to_string()
        }
    }
}

fn fmt_i32(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset..*offset + 4) {
        Some(bytes) => {
            *offset += 4;
            format!("{}", i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        None => {
            *offset = code.len();
            "<truncated>".to_string()
        }
    }
}

fn fmt_f32(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset..*offset + 4) {
        Some(bytes) => {
            *offset += 4;
            format!("{}", f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        None => {
            *offset = code.len();
            "<truncated>".to_string()
        }
    }
}

fn fmt_string(code: &[u8], offset: &mut usize) -> String {
    let Some(bytes) = code.get(*offset..*offset + 2) else {
        *offset = code.len();
        return "<truncated>".to_string();
    };
    let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    *offset += 2;
    match code.get(*offset..*offset + len) {
        Some(raw) => {
            *offset += len;
            match std::str::from_utf8(raw) {
                Ok(s) => format!("\"{}\"", s),
                Err(_) => "<invalid utf-8>".to_string(),
            }
        }
        None => {
            *offset = code.len();
            "<truncated>".to_string()
        }
    }
}

fn fmt_cast(code: &[u8], offset: &mut usize) -> String {
    match code.get(*offset).copied() {
        Some(byte) => {
            *offset += 1;
            match CastKind::try_from(byte) {
                Ok(kind) => kind.mnemonic().to_string(),
                Err(()) => format!("<unknown cast {:#04x}>", byte),
            }
        }
        None => "<truncated>".to_string(),
    }
}
