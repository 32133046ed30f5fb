//! Bytecode collaborator for the region-selection core.
//!
//! - [`Unit`]/[`UnitEmitter`]: flat bytecode and an assembler for it.
//! - [`Op`]/[`InstrFlags`]: the opcode table (immediate layout + control-flow flags).
//! - [`Func`]/[`SrcPos`]: function metadata and instruction positions.
//! - [`types`]: the value type lattice referenced by predictions.

mod func;
mod instr;
mod op;
pub mod types;
mod unit;

pub use func::{Func, FuncId, SrcPos};
pub use instr::{Imm, Instr};
pub use op::{
    instr_allows_fallthrough, instr_flags, instr_is_control_flow, instr_is_non_call_control_flow,
    is_fcall, is_fpass, ImmKind, InstrFlags, Op,
};
pub use types::{DataType, RuntimeType, Type};
pub use unit::{DecodeError, Instrs, Offset, Unit, UnitEmitter};
