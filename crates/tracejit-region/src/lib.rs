//! Region construction for the tracing JIT.
//!
//! A [`Region`] is the unit handed to the code generator: an ordered list of [`Block`]s, each a
//! straight run of bytecode annotated with the guards that must hold when it executes.
//!
//! - [`builder`]: converts a recorded [`Tracelet`] into a region, splitting at traced-through
//!   jumps and lifting the trace's dependencies into entry guards.
//! - [`strategy`]: the one-instruction and whole-method region shapes.
//! - [`selector`]: picks a strategy from [`RegionSelectorConfig`] and absorbs failures, so
//!   callers only ever see "a region" or "no region".

pub mod block;
pub mod builder;
pub mod config;
mod display;
pub mod error;
pub mod location;
pub mod region;
pub mod selector;
pub mod strategy;
pub mod tracelet;

pub use block::{Block, BlockInstrs, CHECK_INVARIANTS};
pub use builder::region_from_tracelet;
pub use config::{RegionMode, RegionSelectorConfig, UnknownRegionMode, REGION_SELECTOR_ENV};
pub use error::RegionError;
pub use location::{Location, ParamByRef, ReffinessPred, TypePred};
pub use region::{LiveType, PreLiveAr, Region, RegionContext};
pub use selector::RegionSelector;
pub use strategy::{MethodStrategy, OneBcStrategy, RegionStrategy};
pub use tracelet::{
    DynLocation, LocationSpace, NormalizedInstruction, RefDeps, RefDepsRecord, TraceLocation,
    Tracelet, TraceletRecorder,
};
