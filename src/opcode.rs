//! The instruction set in §6 of the design doc. Each variant is the opcode byte;
//! operands (if any) follow immediately in the chunk's code stream and are decoded
//! by the VM, not carried in this enum.

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Constant = 0,
    Nil,
    True,
    False,
    Pop,
    Dup,
    GetLocal,
    SetLocal,
    GetGlobal,
    DefineGlobal,
    SetGlobal,
    GetUpvalue,
    SetUpvalue,
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    Negate,
    Print,
    Jump,
    JumpIfFalse,
    Loop,
    Call,
    Closure,
    CloseUpvalue,
    BuildList,
    IndexSubscr,
    StoreSubscr,
    Return,
}

impl OpCode {
    /// Number of operand bytes that directly follow this opcode in the code stream
    /// (not counting the variable-length upvalue descriptor list on `Closure`,
    /// which the VM decodes one descriptor at a time).
    pub const fn operand_len(self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::Call
            | OpCode::Closure
            | OpCode::BuildList => 1,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => 2,
            _ => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Pop => "OP_POP",
            OpCode::Dup => "OP_DUP",
            OpCode::GetLocal => "OP_GET_LOCAL",
            OpCode::SetLocal => "OP_SET_LOCAL",
            OpCode::GetGlobal => "OP_GET_GLOBAL",
            OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::SetGlobal => "OP_SET_GLOBAL",
            OpCode::GetUpvalue => "OP_GET_UPVALUE",
            OpCode::SetUpvalue => "OP_SET_UPVALUE",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Print => "OP_PRINT",
            OpCode::Jump => "OP_JUMP",
            OpCode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::Loop => "OP_LOOP",
            OpCode::Call => "OP_CALL",
            OpCode::Closure => "OP_CLOSURE",
            OpCode::CloseUpvalue => "OP_CLOSE_UPVALUE",
            OpCode::BuildList => "OP_BUILD_LIST",
            OpCode::IndexSubscr => "OP_INDEX_SUBSCR",
            OpCode::StoreSubscr => "OP_STORE_SUBSCR",
            OpCode::Return => "OP_RETURN",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        use OpCode::*;
        Ok(match value {
            0 => Constant,
            1 => Nil,
            2 => True,
            3 => False,
            4 => Pop,
            5 => Dup,
            6 => GetLocal,
            7 => SetLocal,
            8 => GetGlobal,
            9 => DefineGlobal,
            10 => SetGlobal,
            11 => GetUpvalue,
            12 => SetUpvalue,
            13 => Equal,
            14 => Greater,
            15 => Less,
            16 => Add,
            17 => Subtract,
            18 => Multiply,
            19 => Divide,
            20 => Not,
            21 => Negate,
            22 => Print,
            23 => Jump,
            24 => JumpIfFalse,
            25 => Loop,
            26 => Call,
            27 => Closure,
            28 => CloseUpvalue,
            29 => BuildList,
            30 => IndexSubscr,
            31 => StoreSubscr,
            32 => Return,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_every_opcode() {
        let all = [
            OpCode::Constant,
            OpCode::Nil,
            OpCode::True,
            OpCode::False,
            OpCode::Pop,
            OpCode::Dup,
            OpCode::GetLocal,
            OpCode::SetLocal,
            OpCode::GetGlobal,
            OpCode::DefineGlobal,
            OpCode::SetGlobal,
            OpCode::GetUpvalue,
            OpCode::SetUpvalue,
            OpCode::Equal,
            OpCode::Greater,
            OpCode::Less,
            OpCode::Add,
            OpCode::Subtract,
            OpCode::Multiply,
            OpCode::Divide,
            OpCode::Not,
            OpCode::Negate,
            OpCode::Print,
            OpCode::Jump,
            OpCode::JumpIfFalse,
            OpCode::Loop,
            OpCode::Call,
            OpCode::Closure,
            OpCode::CloseUpvalue,
            OpCode::BuildList,
            OpCode::IndexSubscr,
            OpCode::StoreSubscr,
            OpCode::Return,
        ];
        for op in all {
            let byte: u8 = op.into();
            assert_eq!(OpCode::try_from(byte).unwrap(), op);
        }
    }
}
