use core::fmt;

use crate::op::{ImmKind, Op};
use crate::unit::Offset;

/// A decoded immediate operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Imm {
    LocalId(u32),
    ParamId(u32),
    ArgCount(u32),
    LitStr(u32),
    BranchOffset(i32),
    Int64(i64),
}

impl Imm {
    pub fn kind(&self) -> ImmKind {
        match self {
            Imm::LocalId(_) => ImmKind::LocalId,
            Imm::ParamId(_) => ImmKind::ParamId,
            Imm::ArgCount(_) => ImmKind::ArgCount,
            Imm::LitStr(_) => ImmKind::LitStr,
            Imm::BranchOffset(_) => ImmKind::BranchOffset,
            Imm::Int64(_) => ImmKind::Int64,
        }
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        match *self {
            Imm::LocalId(v) | Imm::ParamId(v) | Imm::ArgCount(v) | Imm::LitStr(v) => {
                out.extend_from_slice(&v.to_le_bytes())
            }
            Imm::BranchOffset(v) => out.extend_from_slice(&v.to_le_bytes()),
            Imm::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// `bytes` must be exactly `kind.encoded_len()` long.
    pub(crate) fn decode(kind: ImmKind, bytes: &[u8]) -> Imm {
        debug_assert_eq!(bytes.len(), kind.encoded_len());
        match kind {
            ImmKind::LocalId => Imm::LocalId(read_u32(bytes)),
            ImmKind::ParamId => Imm::ParamId(read_u32(bytes)),
            ImmKind::ArgCount => Imm::ArgCount(read_u32(bytes)),
            ImmKind::LitStr => Imm::LitStr(read_u32(bytes)),
            ImmKind::BranchOffset => Imm::BranchOffset(read_u32(bytes) as i32),
            ImmKind::Int64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Imm::Int64(i64::from_le_bytes(buf))
            }
        }
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imm::LocalId(id) => write!(f, "L:{id}"),
            Imm::ParamId(id) | Imm::ArgCount(id) => write!(f, "{id}"),
            Imm::LitStr(id) => write!(f, "S:{id}"),
            Imm::BranchOffset(disp) => write!(f, "{disp:+}"),
            Imm::Int64(v) => write!(f, "{v}"),
        }
    }
}

/// A single decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instr {
    pub offset: Offset,
    pub len: u8,
    pub op: Op,
    pub imms: Vec<Imm>,
}

impl Instr {
    /// Offset of the sequentially next instruction.
    pub fn next_offset(&self) -> Option<Offset> {
        self.offset.checked_add(u32::from(self.len))
    }

    pub fn branch_offset(&self) -> Option<i32> {
        self.imms.iter().find_map(|imm| match imm {
            Imm::BranchOffset(disp) => Some(*disp),
            _ => None,
        })
    }

    /// Absolute branch target (`offset + displacement`), if it is representable.
    pub fn branch_target(&self) -> Option<Offset> {
        let disp = self.branch_offset()?;
        let target = i64::from(self.offset) + i64::from(disp);
        Offset::try_from(target).ok()
    }

    pub fn param_id(&self) -> Option<u32> {
        self.imms.iter().find_map(|imm| match imm {
            Imm::ParamId(id) => Some(*id),
            _ => None,
        })
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op.name())?;
        for imm in &self.imms {
            write!(f, " {imm}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_target_is_relative_to_instruction_start() {
        let jmp = Instr {
            offset: 11,
            len: 5,
            op: Op::Jmp,
            imms: vec![Imm::BranchOffset(20)],
        };
        assert_eq!(jmp.branch_target(), Some(31));
        assert_eq!(jmp.next_offset(), Some(16));

        let back = Instr {
            imms: vec![Imm::BranchOffset(-12)],
            ..jmp.clone()
        };
        assert_eq!(back.branch_target(), None);
    }

    #[test]
    fn renders_mnemonic_and_immediates() {
        let fpass = Instr {
            offset: 0,
            len: 9,
            op: Op::FPassL,
            imms: vec![Imm::ParamId(0), Imm::LocalId(2)],
        };
        assert_eq!(fpass.to_string(), "FPassL 0 L:2");

        let jmp = Instr {
            offset: 0,
            len: 5,
            op: Op::JmpZ,
            imms: vec![Imm::BranchOffset(7)],
        };
        assert_eq!(jmp.to_string(), "JmpZ +7");
    }
}
