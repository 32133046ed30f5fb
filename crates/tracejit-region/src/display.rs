//! Human-readable rendering of regions for logs and test failures.

use core::fmt;

use crate::block::Block;
use crate::region::{LiveType, PreLiveAr, Region};

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Block {} ({}) length {}",
            self.start(),
            self.func().full_name(),
            self.length()
        )?;
        for step in self.instrs() {
            let (pos, instr) = match step {
                Ok(step) => step,
                Err(err) => return writeln!(f, "    <{err}>"),
            };
            for pred in self.type_preds_at(pos) {
                writeln!(f, "  predict: {pred}")?;
            }
            for pred in self.reffiness_preds_at(pos) {
                writeln!(f, "  predict reffiness: {pred}")?;
            }
            match self.param_by_ref_at(pos) {
                Some(by_ref) => writeln!(f, "    {}  {instr} (passed {by_ref})", pos.offset())?,
                None => writeln!(f, "    {}  {instr}", pos.offset())?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Region ({} blocks):", self.blocks().len())?;
        for block in self.blocks() {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

impl fmt::Display for LiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.location, self.ty)
    }
}

impl fmt::Display for PreLiveAr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AR@{}: {} ({})",
            self.stack_off,
            self.func.full_name(),
            self.obj_or_cls
        )
    }
}
