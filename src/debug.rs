//! Disassembler (§2): a debug-only facility that renders a `Chunk`'s instruction
//! stream to the diagnostic stream. Gated behind the `debug_trace_execution`
//! feature and routed through `log::trace!` (§7.1) so it's inert unless both the
//! feature is compiled in and `RUST_LOG=trace` is set at runtime.

use crate::chunk::Chunk;
use crate::object::Obj;
use crate::opcode::OpCode;
use crate::value::Value;

fn simple_instruction(name: &str) -> usize {
    log::trace!("{name}");
    1
}

fn constant_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.read_u8(offset + 1);
    log::trace!("{name:<16} {index:4} '{}'", chunk.get_constant(index));
    2
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.read_u8(offset + 1);
    log::trace!("{name:<16} {slot:4}");
    2
}

fn jump_instruction(name: &str, sign: i64, chunk: &Chunk, offset: usize) -> usize {
    let jump = chunk.read_u16(offset + 1) as i64;
    let target = offset as i64 + 3 + sign * jump;
    log::trace!("{name:<16} {offset:4} -> {target}");
    3
}

fn closure_instruction(chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.read_u8(offset + 1);
    let constant = chunk.get_constant(index);
    log::trace!("{:<16} {index:4} '{}'", "OP_CLOSURE", constant);

    let upvalue_count = match constant {
        Value::Obj(Obj::Function(f)) => f.upvalue_count,
        _ => 0,
    };
    let mut consumed = 2;
    for _ in 0..upvalue_count {
        let is_local = chunk.read_u8(offset + consumed);
        let upvalue_index = chunk.read_u8(offset + consumed + 1);
        log::trace!(
            "{:04}      |                     {} {}",
            offset + consumed,
            if is_local != 0 { "local" } else { "upvalue" },
            upvalue_index
        );
        consumed += 2;
    }
    consumed
}

/// Renders one instruction at `offset` and returns its total size in bytes
/// (opcode + operands), so callers can advance to the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    if !log::log_enabled!(log::Level::Trace) {
        return 1;
    }

    let line = chunk.get_line(offset);
    let line_marker = if offset > 0 && line == chunk.get_line(offset - 1) {
        "   |".to_string()
    } else {
        format!("{line:4}")
    };

    let op = match OpCode::try_from(chunk.read_u8(offset)) {
        Ok(op) => op,
        Err(byte) => {
            log::trace!("{offset:04} {line_marker} Unknown opcode {byte}");
            return 1;
        }
    };

    log::trace!("{offset:04} {line_marker} {}", op.name());
    match op {
        OpCode::Closure => closure_instruction(chunk, offset),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(op.name(), 1, chunk, offset),
        OpCode::Loop => jump_instruction(op.name(), -1, chunk, offset),
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal => constant_instruction(op.name(), chunk, offset),
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call
        | OpCode::BuildList => byte_instruction(op.name(), chunk, offset),
        _ => simple_instruction(op.name()),
    }
}

/// Walks an entire chunk front to back, used when tracing a freshly compiled
/// function before its first call.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    log::trace!("== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        offset += disassemble_instruction(chunk, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn walks_every_instruction_without_panicking() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Number(1.0));
        chunk.write_op_u8(OpCode::Constant, idx, 1);
        chunk.write_op(OpCode::Return, 1);
        disassemble_chunk(&chunk, "test");
    }
}
