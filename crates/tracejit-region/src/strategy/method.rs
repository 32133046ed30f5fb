use std::collections::BTreeSet;

use tracing::debug;
use tracejit_bytecode::{instr_allows_fallthrough, instr_is_non_call_control_flow, Instr, Offset};

use crate::block::Block;
use crate::error::RegionError;
use crate::location::TypePred;
use crate::region::{Region, RegionContext};
use crate::strategy::RegionStrategy;

/// A region covering a whole function, split into basic blocks.
///
/// Only selected at function entry. Block leaders are the entry, every branch target, and
/// every instruction after one that can't fall through or that transfers control other than
/// by calling.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodStrategy;

impl RegionStrategy for MethodStrategy {
    fn name(&self) -> &'static str {
        "method"
    }

    fn select(&self, ctx: &RegionContext) -> Result<Option<Region>, RegionError> {
        let func = &ctx.func;
        if ctx.offset != func.base() {
            debug!(
                offset = ctx.offset,
                base = func.base(),
                "method regions start at function entry"
            );
            return Ok(None);
        }

        let instrs = func
            .unit()
            .instrs(func.base(), func.past())
            .collect::<Result<Vec<Instr>, _>>()
            .map_err(|source| RegionError::Decode {
                pos: func.src_pos(source.offset()),
                source,
            })?;
        if instrs.is_empty() {
            return Err(RegionError::Unsupported(format!(
                "{} has no instructions",
                func.full_name()
            )));
        }

        let boundaries: BTreeSet<Offset> = instrs.iter().map(|i| i.offset).collect();
        let mut leaders = BTreeSet::from([func.base()]);
        for instr in &instrs {
            if let Some(disp) = instr.branch_offset() {
                let target = i64::from(instr.offset) + i64::from(disp);
                let target = Offset::try_from(target)
                    .ok()
                    .filter(|t| func.contains(*t))
                    .ok_or(RegionError::BranchOutOfRange {
                        from: func.src_pos(instr.offset),
                        target,
                        base: func.base(),
                        past: func.past(),
                    })?;
                if !boundaries.contains(&target) {
                    return Err(RegionError::Unsupported(format!(
                        "branch at {} lands inside an instruction at {target}",
                        func.src_pos(instr.offset)
                    )));
                }
                leaders.insert(target);
            }
            if !instr_allows_fallthrough(instr.op) || instr_is_non_call_control_flow(instr.op) {
                if let Some(next) = instr.next_offset().filter(|n| boundaries.contains(n)) {
                    leaders.insert(next);
                }
            }
        }

        let mut blocks: Vec<Block> = Vec::with_capacity(leaders.len());
        for instr in &instrs {
            if leaders.contains(&instr.offset) {
                blocks.push(Block::new(func.clone(), instr.offset, 0));
            }
            // The first instruction is always a leader.
            if let Some(block) = blocks.last_mut() {
                block.add_instruction();
            }
        }

        let entry = ctx.src_pos();
        if let Some(block) = blocks.first_mut() {
            for live in &ctx.live_types {
                block.add_predicted(entry, TypePred::new(live.location, live.ty));
            }
        }

        debug!(
            func = func.full_name(),
            blocks = blocks.len(),
            instrs = instrs.len(),
            "method region"
        );
        Ok(Some(Region::new(blocks)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::location::Location;
    use tracejit_bytecode::{Func, FuncId, Imm, Op, Type, Unit, UnitEmitter};

    // if ($0) { print 1; } return null;
    fn diamond() -> Arc<Func> {
        let mut e = UnitEmitter::new();
        e.emit(Op::CGetL, &[Imm::LocalId(0)]); // 0
        let br = e.emit(Op::JmpZ, &[Imm::BranchOffset(0)]); // 5
        e.emit(Op::Int, &[Imm::Int64(1)]); // 10
        e.emit(Op::Print, &[]); // 19
        e.emit(Op::PopC, &[]); // 20
        let join = e.emit(Op::Null, &[]); // 21
        e.emit(Op::RetC, &[]); // 22
        e.patch_branch(br, join);
        Arc::new(Func::new(FuncId(2), "diamond", Arc::new(e.finish())).with_params(1))
    }

    #[test]
    fn splits_at_branches_and_targets() {
        let func = diamond();
        let ctx = RegionContext::new(func.clone(), 0)
            .with_live_type(Location::Local { id: 0 }, Type::BOOL);
        let region = MethodStrategy.select(&ctx).unwrap().unwrap();

        let shape: Vec<_> = region
            .blocks()
            .iter()
            .map(|b| (b.start().offset(), b.length()))
            .collect();
        assert_eq!(shape, vec![(0, 2), (10, 3), (21, 2)]);
        assert_eq!(region.instr_count(), 7);
        assert_eq!(region.blocks()[0].type_preds().count(), 1);
        assert_eq!(region.blocks()[1].type_preds().count(), 0);
    }

    #[test]
    fn declines_away_from_entry() {
        let ctx = RegionContext::new(diamond(), 10);
        assert_eq!(MethodStrategy.select(&ctx), Ok(None));
    }

    #[test]
    fn branch_out_of_function_is_an_error() {
        let mut e = UnitEmitter::new();
        e.emit(Op::Jmp, &[Imm::BranchOffset(100)]);
        let func = Arc::new(Func::new(FuncId(3), "wild", Arc::new(e.finish())));
        let err = MethodStrategy
            .select(&RegionContext::new(func, 0))
            .unwrap_err();
        assert!(matches!(err, RegionError::BranchOutOfRange { target: 100, .. }), "{err}");
    }

    #[test]
    fn undecodable_body_is_an_error() {
        let unit = Unit::new(vec![Op::Nop as u8, 0xee]);
        let func = Arc::new(Func::new(FuncId(3), "junk", Arc::new(unit)));
        let err = MethodStrategy
            .select(&RegionContext::new(func.clone(), 0))
            .unwrap_err();
        assert_eq!(
            err,
            RegionError::Decode {
                pos: func.src_pos(1),
                source: tracejit_bytecode::DecodeError::InvalidOpcode { offset: 1, byte: 0xee },
            }
        );
    }
}
