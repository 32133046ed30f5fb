use core::fmt;
use std::sync::Arc;

use crate::unit::{DecodeError, Offset, Unit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Function metadata: identity, frame shape and the bytecode range it occupies in its unit.
#[derive(Debug, Clone)]
pub struct Func {
    id: FuncId,
    name: String,
    num_locals: u32,
    num_params: u32,
    unit: Arc<Unit>,
    base: Offset,
    past: Offset,
}

impl Func {
    /// A function spanning the whole of `unit`, with no locals or parameters.
    pub fn new(id: FuncId, name: impl Into<String>, unit: Arc<Unit>) -> Self {
        let past = unit.len();
        Self {
            id,
            name: name.into(),
            num_locals: 0,
            num_params: 0,
            unit,
            base: 0,
            past,
        }
    }

    pub fn with_locals(mut self, num_locals: u32) -> Self {
        self.num_locals = num_locals;
        self
    }

    /// Parameters occupy the first `num_params` locals.
    pub fn with_params(mut self, num_params: u32) -> Self {
        self.num_params = num_params;
        self.num_locals = self.num_locals.max(num_params);
        self
    }

    pub fn with_bounds(mut self, base: Offset, past: Offset) -> Self {
        assert!(
            base <= past && past <= self.unit.len(),
            "function bounds [{base}, {past}) outside unit of length {}",
            self.unit.len()
        );
        self.base = base;
        self.past = past;
        self
    }

    pub fn id(&self) -> FuncId {
        self.id
    }

    pub fn full_name(&self) -> &str {
        &self.name
    }

    pub fn num_locals(&self) -> u32 {
        self.num_locals
    }

    pub fn num_params(&self) -> u32 {
        self.num_params
    }

    pub fn unit(&self) -> &Arc<Unit> {
        &self.unit
    }

    /// Offset of the first instruction.
    pub fn base(&self) -> Offset {
        self.base
    }

    /// Offset one past the last instruction.
    pub fn past(&self) -> Offset {
        self.past
    }

    pub fn contains(&self, offset: Offset) -> bool {
        (self.base..self.past).contains(&offset)
    }

    pub fn src_pos(&self, offset: Offset) -> SrcPos {
        SrcPos::new(self.id, offset)
    }
}

/// Identifies a single instruction: a function and a byte offset into its unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SrcPos {
    func: FuncId,
    offset: Offset,
}

impl SrcPos {
    pub fn new(func: FuncId, offset: Offset) -> Self {
        Self { func, offset }
    }

    pub fn func(&self) -> FuncId {
        self.func
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Offset) {
        self.offset = offset;
    }

    /// Position of the instruction that sequentially follows this one in `unit`.
    pub fn advanced(&self, unit: &Unit) -> Result<SrcPos, DecodeError> {
        let instr = unit.decode(self.offset)?;
        let offset = instr
            .next_offset()
            .ok_or(DecodeError::UnexpectedEof {
                offset: self.offset,
            })?;
        Ok(SrcPos::new(self.func, offset))
    }

    pub fn advance(&mut self, unit: &Unit) -> Result<(), DecodeError> {
        *self = self.advanced(unit)?;
        Ok(())
    }
}

impl fmt::Display for SrcPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.func, self.offset)
    }
}
