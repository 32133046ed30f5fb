use tracing::debug;

use crate::block::Block;
use crate::error::RegionError;
use crate::location::TypePred;
use crate::region::{Region, RegionContext};
use crate::strategy::RegionStrategy;

/// A region of exactly one bytecode instruction.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneBcStrategy;

impl RegionStrategy for OneBcStrategy {
    fn name(&self) -> &'static str {
        "onebc"
    }

    fn select(&self, ctx: &RegionContext) -> Result<Option<Region>, RegionError> {
        let func = &ctx.func;
        if !func.contains(ctx.offset) {
            return Err(RegionError::Unsupported(format!(
                "offset {} is outside {} [{}, {})",
                ctx.offset,
                func.full_name(),
                func.base(),
                func.past()
            )));
        }

        let pos = ctx.src_pos();
        let instr = func
            .unit()
            .decode(ctx.offset)
            .map_err(|source| RegionError::Decode { pos, source })?;
        debug!(%pos, %instr, "one-instruction region");

        let mut block = Block::new(func.clone(), ctx.offset, 1);
        for live in &ctx.live_types {
            block.add_predicted(pos, TypePred::new(live.location, live.ty));
        }
        Ok(Some(Region::new(vec![block])))
    }
}
