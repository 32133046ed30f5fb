//! Where a guard applies and what it asserts there.

use core::fmt;

use tracejit_bytecode::Type;

/// A slot in the frame of the function being compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Local { id: u32 },
    /// Slot at a fixed distance from the stack pointer at region entry.
    Stack { offset: i32 },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local { id } => write!(f, "Local{{{id}}}"),
            Location::Stack { offset } => write!(f, "Stack{{{offset}}}"),
        }
    }
}

/// Asserts that the value at `location` has type `ty` when the guarded instruction is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypePred {
    pub location: Location,
    pub ty: Type,
}

impl TypePred {
    pub fn new(location: Location, ty: Type) -> Self {
        Self { location, ty }
    }
}

impl fmt::Display for TypePred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.location, self.ty)
    }
}

/// How an `FPass*` instruction passes its argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamByRef {
    Yes,
    No,
}

impl From<bool> for ParamByRef {
    fn from(by_ref: bool) -> Self {
        if by_ref {
            ParamByRef::Yes
        } else {
            ParamByRef::No
        }
    }
}

impl fmt::Display for ParamByRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamByRef::Yes => f.write_str("by reference"),
            ParamByRef::No => f.write_str("by value"),
        }
    }
}

/// Asserts that, for the pending call whose activation record sits `ar_sp_offset` slots from
/// the stack pointer, the by-reference bits selected by `mask` equal `vals`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReffinessPred {
    pub mask: Vec<bool>,
    pub vals: Vec<bool>,
    pub ar_sp_offset: i32,
}

impl fmt::Display for ReffinessPred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset: {} mask: ", self.ar_sp_offset)?;
        write_bits(f, &self.mask)?;
        f.write_str(" vals: ")?;
        write_bits(f, &self.vals)
    }
}

fn write_bits(f: &mut fmt::Formatter<'_>, bits: &[bool]) -> fmt::Result {
    for bit in bits {
        f.write_str(if *bit { "1" } else { "0" })?;
    }
    Ok(())
}
