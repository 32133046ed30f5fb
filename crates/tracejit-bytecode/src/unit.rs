use thiserror::Error;

use crate::instr::{Imm, Instr};
use crate::op::{ImmKind, Op};

/// Byte offset into a unit's bytecode.
pub type Offset = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of bytecode decoding instruction at offset {offset}")]
    UnexpectedEof { offset: Offset },
    #[error("invalid opcode byte {byte:#04x} at offset {offset}")]
    InvalidOpcode { offset: Offset, byte: u8 },
}

impl DecodeError {
    /// Offset of the instruction that failed to decode.
    pub fn offset(&self) -> Offset {
        match *self {
            DecodeError::UnexpectedEof { offset } | DecodeError::InvalidOpcode { offset, .. } => {
                offset
            }
        }
    }
}

/// A compiled code unit: the flat bytecode shared by the functions defined in it.
///
/// Encoding: one opcode byte followed by the immediates listed by [`Op::imm_kinds`], each
/// little-endian (`Int64` is 8 bytes, every other immediate is 4 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unit {
    bytecode: Vec<u8>,
}

/// Offset one past the end of `len` bytes of bytecode.
///
/// Panics if `len` doesn't fit in an [`Offset`]: units are limited to 4 GiB.
fn end_offset(len: usize) -> Offset {
    Offset::try_from(len)
        .unwrap_or_else(|_| panic!("{len} bytes of bytecode exceed the 4 GiB offset range"))
}

impl Unit {
    /// Panics if `bytecode` is 4 GiB or larger.
    pub fn new(bytecode: Vec<u8>) -> Self {
        end_offset(bytecode.len());
        Self { bytecode }
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn len(&self) -> Offset {
        end_offset(self.bytecode.len())
    }

    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }

    /// Decode the instruction starting at `offset`.
    pub fn decode(&self, offset: Offset) -> Result<Instr, DecodeError> {
        let start = offset as usize;
        let byte = *self
            .bytecode
            .get(start)
            .ok_or(DecodeError::UnexpectedEof { offset })?;
        let op = Op::from_byte(byte).ok_or(DecodeError::InvalidOpcode { offset, byte })?;

        let kinds = op.imm_kinds();
        let mut imms = Vec::with_capacity(kinds.len());
        let mut cursor = start + 1;
        for &kind in kinds {
            let end = cursor + kind.encoded_len();
            let bytes = self
                .bytecode
                .get(cursor..end)
                .ok_or(DecodeError::UnexpectedEof { offset })?;
            imms.push(Imm::decode(kind, bytes));
            cursor = end;
        }

        Ok(Instr {
            offset,
            len: (cursor - start) as u8,
            op,
            imms,
        })
    }

    /// Decode every instruction in `[start, past)` in order.
    ///
    /// Iteration stops after the first error.
    pub fn instrs(&self, start: Offset, past: Offset) -> Instrs<'_> {
        Instrs {
            unit: self,
            cursor: Some(start),
            past,
        }
    }
}

pub struct Instrs<'a> {
    unit: &'a Unit,
    cursor: Option<Offset>,
    past: Offset,
}

impl Iterator for Instrs<'_> {
    type Item = Result<Instr, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor.filter(|offset| *offset < self.past)?;
        match self.unit.decode(offset) {
            Ok(instr) => {
                self.cursor = instr.next_offset();
                Some(Ok(instr))
            }
            Err(err) => {
                self.cursor = None;
                Some(Err(err))
            }
        }
    }
}

/// Assembles bytecode for a [`Unit`].
#[derive(Debug, Clone, Default)]
pub struct UnitEmitter {
    bytecode: Vec<u8>,
}

impl UnitEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next emitted instruction will start at.
    pub fn offset(&self) -> Offset {
        end_offset(self.bytecode.len())
    }

    /// Append `op` with `imms`, returning the offset of the emitted instruction.
    ///
    /// Panics if `imms` does not match the opcode's immediate layout.
    pub fn emit(&mut self, op: Op, imms: &[Imm]) -> Offset {
        let kinds = op.imm_kinds();
        assert!(
            kinds.len() == imms.len() && kinds.iter().zip(imms).all(|(k, imm)| *k == imm.kind()),
            "immediates {imms:?} do not match the {op} layout {kinds:?}"
        );

        let at = self.offset();
        self.bytecode.push(op as u8);
        for imm in imms {
            imm.encode_into(&mut self.bytecode);
        }
        at
    }

    /// Emit a branch to an already known `target`.
    pub fn emit_branch(&mut self, op: Op, target: Offset) -> Offset {
        let disp = i64::from(target) - i64::from(self.offset());
        let disp = i32::try_from(disp).expect("branch displacement overflows i32");
        self.emit(op, &[Imm::BranchOffset(disp)])
    }

    /// Point the branch emitted at `at` to `target`.
    pub fn patch_branch(&mut self, at: Offset, target: Offset) {
        let start = at as usize;
        let op = self
            .bytecode
            .get(start)
            .copied()
            .and_then(Op::from_byte)
            .unwrap_or_else(|| panic!("no instruction emitted at offset {at}"));
        assert_eq!(
            op.imm_kinds().first(),
            Some(&ImmKind::BranchOffset),
            "{op} at offset {at} is not a branch"
        );

        let disp = i64::from(target) - i64::from(at);
        let disp = i32::try_from(disp).expect("branch displacement overflows i32");
        self.bytecode[start + 1..start + 5].copy_from_slice(&disp.to_le_bytes());
    }

    pub fn finish(self) -> Unit {
        Unit::new(self.bytecode)
    }
}
