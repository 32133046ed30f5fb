use std::sync::Arc;

use tracejit_bytecode::{Func, Offset, SrcPos, Type};

use crate::block::Block;
use crate::location::Location;

/// A compilation unit for the code generator: blocks in execution order.
///
/// The first block starts at the region entry. Once built, a region is only read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    blocks: Vec<Block>,
}

impl Region {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn entry(&self) -> Option<SrcPos> {
        self.blocks.first().map(Block::start)
    }

    /// Total instruction count across all blocks.
    pub fn instr_count(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.length())).sum()
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

/// A type known to hold for a location when the region is entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveType {
    pub location: Location,
    pub ty: Type,
}

/// An activation record pushed (by `FPush*`) but not yet consumed by its call.
#[derive(Clone, Debug)]
pub struct PreLiveAr {
    pub stack_off: u32,
    pub func: Arc<Func>,
    pub obj_or_cls: Type,
}

/// What the request layer knows about the place a region is being selected for.
#[derive(Clone, Debug)]
pub struct RegionContext {
    pub func: Arc<Func>,
    pub offset: Offset,
    pub live_types: Vec<LiveType>,
    pub pre_live_ars: Vec<PreLiveAr>,
}

impl RegionContext {
    pub fn new(func: Arc<Func>, offset: Offset) -> Self {
        Self {
            func,
            offset,
            live_types: Vec::new(),
            pre_live_ars: Vec::new(),
        }
    }

    pub fn with_live_type(mut self, location: Location, ty: Type) -> Self {
        self.live_types.push(LiveType { location, ty });
        self
    }

    pub fn src_pos(&self) -> SrcPos {
        self.func.src_pos(self.offset)
    }
}
