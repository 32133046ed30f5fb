use bitflags::bitflags;

bitflags! {
    /// Per-opcode properties consulted by block formation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct InstrFlags: u8 {
        /// Control never falls through to the next instruction.
        const TF = 1 << 0;
        /// The instruction may transfer control somewhere other than the next instruction.
        const CF = 1 << 1;
        /// Part of the call protocol (`FPush*`, `FPass*`, `FCall`).
        const FF = 1 << 2;
    }
}

/// Layout of a single encoded immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImmKind {
    LocalId,
    ParamId,
    ArgCount,
    LitStr,
    /// Signed displacement relative to the start of the branch instruction.
    BranchOffset,
    Int64,
}

impl ImmKind {
    pub const fn encoded_len(self) -> usize {
        match self {
            ImmKind::Int64 => 8,
            ImmKind::LocalId
            | ImmKind::ParamId
            | ImmKind::ArgCount
            | ImmKind::LitStr
            | ImmKind::BranchOffset => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Op {
    Nop = 0x00,
    Int = 0x01,
    Null = 0x02,
    True = 0x03,
    False = 0x04,
    PopC = 0x05,
    CGetL = 0x06,
    SetL = 0x07,
    Add = 0x08,
    Sub = 0x09,
    Mul = 0x0a,
    Lt = 0x0b,
    Not = 0x0c,
    Print = 0x0d,
    Jmp = 0x10,
    JmpZ = 0x11,
    JmpNZ = 0x12,
    FPushFuncD = 0x20,
    FPassC = 0x21,
    FPassL = 0x22,
    FPassV = 0x23,
    FCall = 0x24,
    RetC = 0x30,
    Throw = 0x31,
}

struct OpInfo {
    name: &'static str,
    imms: &'static [ImmKind],
    flags: InstrFlags,
}

const NO_IMMS: &[ImmKind] = &[];
const NF: InstrFlags = InstrFlags::empty();

impl Op {
    pub const ALL: [Op; 24] = [
        Op::Nop,
        Op::Int,
        Op::Null,
        Op::True,
        Op::False,
        Op::PopC,
        Op::CGetL,
        Op::SetL,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Lt,
        Op::Not,
        Op::Print,
        Op::Jmp,
        Op::JmpZ,
        Op::JmpNZ,
        Op::FPushFuncD,
        Op::FPassC,
        Op::FPassL,
        Op::FPassV,
        Op::FCall,
        Op::RetC,
        Op::Throw,
    ];

    pub fn from_byte(byte: u8) -> Option<Op> {
        Op::ALL.iter().copied().find(|op| *op as u8 == byte)
    }

    const fn info(self) -> OpInfo {
        let (name, imms, flags): (&'static str, &'static [ImmKind], InstrFlags) = match self {
            Op::Nop => ("Nop", NO_IMMS, NF),
            Op::Int => ("Int", &[ImmKind::Int64], NF),
            Op::Null => ("Null", NO_IMMS, NF),
            Op::True => ("True", NO_IMMS, NF),
            Op::False => ("False", NO_IMMS, NF),
            Op::PopC => ("PopC", NO_IMMS, NF),
            Op::CGetL => ("CGetL", &[ImmKind::LocalId], NF),
            Op::SetL => ("SetL", &[ImmKind::LocalId], NF),
            Op::Add => ("Add", NO_IMMS, NF),
            Op::Sub => ("Sub", NO_IMMS, NF),
            Op::Mul => ("Mul", NO_IMMS, NF),
            Op::Lt => ("Lt", NO_IMMS, NF),
            Op::Not => ("Not", NO_IMMS, NF),
            Op::Print => ("Print", NO_IMMS, NF),
            Op::Jmp => (
                "Jmp",
                &[ImmKind::BranchOffset],
                InstrFlags::TF.union(InstrFlags::CF),
            ),
            Op::JmpZ => ("JmpZ", &[ImmKind::BranchOffset], InstrFlags::CF),
            Op::JmpNZ => ("JmpNZ", &[ImmKind::BranchOffset], InstrFlags::CF),
            Op::FPushFuncD => (
                "FPushFuncD",
                &[ImmKind::ArgCount, ImmKind::LitStr],
                InstrFlags::FF,
            ),
            Op::FPassC => ("FPassC", &[ImmKind::ParamId], InstrFlags::FF),
            Op::FPassL => (
                "FPassL",
                &[ImmKind::ParamId, ImmKind::LocalId],
                InstrFlags::FF,
            ),
            Op::FPassV => ("FPassV", &[ImmKind::ParamId], InstrFlags::FF),
            Op::FCall => (
                "FCall",
                &[ImmKind::ArgCount],
                InstrFlags::CF.union(InstrFlags::FF),
            ),
            Op::RetC => ("RetC", NO_IMMS, InstrFlags::TF.union(InstrFlags::CF)),
            Op::Throw => ("Throw", NO_IMMS, InstrFlags::TF.union(InstrFlags::CF)),
        };
        OpInfo { name, imms, flags }
    }

    pub const fn name(self) -> &'static str {
        self.info().name
    }

    pub const fn imm_kinds(self) -> &'static [ImmKind] {
        self.info().imms
    }

    pub const fn flags(self) -> InstrFlags {
        self.info().flags
    }
}

impl core::fmt::Display for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn instr_flags(op: Op) -> InstrFlags {
    op.flags()
}

pub fn instr_allows_fallthrough(op: Op) -> bool {
    !op.flags().contains(InstrFlags::TF)
}

pub fn instr_is_control_flow(op: Op) -> bool {
    op.flags().contains(InstrFlags::CF)
}

pub fn is_fcall(op: Op) -> bool {
    op == Op::FCall
}

pub fn is_fpass(op: Op) -> bool {
    matches!(op, Op::FPassC | Op::FPassL | Op::FPassV)
}

/// Control flow that matters for block formation. Calls return to the next instruction, so
/// they may appear in the middle of a block.
pub fn instr_is_non_call_control_flow(op: Op) -> bool {
    instr_is_control_flow(op) && !is_fcall(op)
}
