//! Tracelet → region conversion.
//!
//! The tracelet's instructions become blocks: a `Jmp` that isn't the final instruction means
//! the tracer followed a taken forward jump, so the block ends there and a new one starts at the
//! jump target. Facts the tracer depended on are lifted to guards on the first instruction of
//! the first block.

use std::mem;

use tracing::trace;
use tracejit_bytecode::{is_fpass, Offset, Op, Type};

use crate::block::Block;
use crate::error::RegionError;
use crate::location::{Location, ParamByRef, ReffinessPred, TypePred};
use crate::region::Region;
use crate::tracelet::{LocationSpace, TraceLocation, Tracelet};

/// Build a region from `tlet`.
///
/// Contract violations in the tracelet (out-of-sequence instructions, backward trace-through,
/// dependencies outside the stack and locals) panic; only decode failures are reported as
/// errors.
pub fn region_from_tracelet(tlet: &Tracelet) -> Result<Region, RegionError> {
    let func = &tlet.func;
    let unit = func.unit();
    let mut sk = tlet.start;
    debug_assert!(
        tlet.instrs.first().map_or(true, |ni| ni.source == sk),
        "tracelet starts at {sk} but its first instruction is elsewhere"
    );

    let mut blocks = Vec::new();
    let mut cur = Block::new(func.clone(), sk.offset(), 0);

    let last = tlet.instrs.len().saturating_sub(1);
    for (i, ni) in tlet.instrs.iter().enumerate() {
        debug_assert_eq!(ni.source, sk, "tracelet instruction out of sequence");

        cur.add_instruction();
        if !ni.no_op && is_fpass(ni.op()) {
            cur.set_param_by_ref(sk, ParamByRef::from(ni.prepped_by_ref));
        }

        if ni.op() == Op::Jmp && i != last {
            // The tracer continued through this jump: the next instruction is its target.
            let disp = ni.instr.branch_offset().unwrap_or_default();
            let dest = i64::from(ni.offset()) + i64::from(disp);
            debug_assert!(
                dest > i64::from(sk.offset()),
                "only forward jumps can be traced through (Jmp at {sk} targets {dest})"
            );
            let dest = Offset::try_from(dest).map_err(|_| RegionError::BranchOutOfRange {
                from: sk,
                target: dest,
                base: func.base(),
                past: func.past(),
            })?;
            sk.set_offset(dest);

            blocks.push(mem::replace(&mut cur, Block::new(func.clone(), dest, 0)));
        } else {
            sk = sk
                .advanced(unit)
                .map_err(|source| RegionError::Decode { pos: sk, source })?;
        }
    }
    blocks.push(cur);

    let front = &mut blocks[0];
    for (loc, dep) in &tlet.dependencies {
        if dep.rtt.is_vague() || loc.is_this() {
            continue;
        }
        let pred = TypePred::new(region_location(loc), Type::from_runtime_type(dep.rtt));
        front.add_predicted(tlet.start, pred);
    }

    for (ar_sp_offset, record) in &tlet.ref_deps.ar_map {
        front.add_reffiness_pred(
            tlet.start,
            ReffinessPred {
                mask: record.mask.clone(),
                vals: record.vals.clone(),
                ar_sp_offset: *ar_sp_offset,
            },
        );
    }

    let region = Region::new(blocks);
    trace!("converted tracelet:\n{tlet}into region:\n{region}");
    Ok(region)
}

/// Translate a tracer location into the region's frame coordinates.
///
/// Panics if the location can't be represented: a guard on a truncated slot would check the
/// wrong value.
fn region_location(loc: &TraceLocation) -> Location {
    match loc.space {
        LocationSpace::Stack => match i32::try_from(-1 - loc.offset) {
            Ok(offset) => Location::Stack { offset },
            Err(_) => panic!("stack dependency {loc} is out of frame range"),
        },
        LocationSpace::Local => match u32::try_from(loc.offset) {
            Ok(id) => Location::Local { id },
            Err(_) => panic!("local dependency {loc} is out of range"),
        },
        space => unreachable!("tracelet dependency in unsupported location space {space:?}"),
    }
}
