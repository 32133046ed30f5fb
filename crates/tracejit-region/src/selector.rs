//! Picks the region to compile for a request, according to the configured [`RegionMode`].
//!
//! Selection never fails outward: strategy errors are logged and reported as "no region", and
//! the caller falls back to compiling the tracelet directly.

use tracing::{debug, trace, warn};

use crate::builder::region_from_tracelet;
use crate::config::{RegionMode, RegionSelectorConfig};
use crate::error::RegionError;
use crate::region::{Region, RegionContext};
use crate::strategy::{MethodStrategy, OneBcStrategy, RegionStrategy};
use crate::tracelet::Tracelet;

pub struct RegionSelector {
    config: RegionSelectorConfig,
    mode: RegionMode,
    one_bc: Box<dyn RegionStrategy>,
    method: Box<dyn RegionStrategy>,
}

impl RegionSelector {
    pub fn new(config: RegionSelectorConfig) -> Self {
        Self::with_strategies(config, Box::new(OneBcStrategy), Box::new(MethodStrategy))
    }

    /// Use `one_bc` and `method` in place of the built-in strategies for the `onebc` and
    /// `method` modes.
    pub fn with_strategies(
        config: RegionSelectorConfig,
        one_bc: Box<dyn RegionStrategy>,
        method: Box<dyn RegionStrategy>,
    ) -> Self {
        let mode = config.mode();
        Self {
            config,
            mode,
            one_bc,
            method,
        }
    }

    pub fn config(&self) -> &RegionSelectorConfig {
        &self.config
    }

    pub fn mode(&self) -> RegionMode {
        self.mode
    }

    /// Select a region for `ctx`, or `None` if the caller should use its tracelet compiler.
    ///
    /// In [`RegionMode::Tracelet`] the caller must supply the tracelet; omitting it panics.
    pub fn select_region(&self, ctx: &RegionContext, tracelet: Option<&Tracelet>) -> Option<Region> {
        debug!(
            func = ctx.func.full_name(),
            offset = ctx.offset,
            mode = %self.mode,
            "selecting region"
        );
        for live in &ctx.live_types {
            debug!(location = %live.location, ty = %live.ty, "  live type");
        }
        for ar in &ctx.pre_live_ars {
            debug!(
                stack_off = ar.stack_off,
                callee = ar.func.full_name(),
                obj_or_cls = %ar.obj_or_cls,
                "  pre-live AR"
            );
        }

        let tracelet = match self.mode {
            RegionMode::Tracelet => {
                Some(tracelet.expect("tracelet region mode requires a tracelet"))
            }
            _ => None,
        };

        match self.dispatch(ctx, tracelet) {
            Ok(Some(region)) => {
                trace!("selected region:\n{region}");
                Some(region)
            }
            Ok(None) => {
                debug!("no region selectable; using tracelet compiler");
                None
            }
            Err(err) => {
                warn!(
                    func = ctx.func.full_name(),
                    offset = ctx.offset,
                    mode = %self.mode,
                    "region selection failed: {err}"
                );
                debug!("no region selectable; using tracelet compiler");
                None
            }
        }
    }

    fn dispatch(
        &self,
        ctx: &RegionContext,
        tracelet: Option<&Tracelet>,
    ) -> Result<Option<Region>, RegionError> {
        match (self.mode, tracelet) {
            (RegionMode::Disabled, _) => Ok(None),
            (RegionMode::OneBc, _) => self.run(self.one_bc.as_ref(), ctx),
            (RegionMode::Method, _) => self.run(self.method.as_ref(), ctx),
            (RegionMode::Tracelet, Some(tlet)) => region_from_tracelet(tlet).map(Some),
            (RegionMode::Tracelet, None) => unreachable!("tracelet presence checked by caller"),
        }
    }

    fn run(
        &self,
        strategy: &dyn RegionStrategy,
        ctx: &RegionContext,
    ) -> Result<Option<Region>, RegionError> {
        trace!(strategy = strategy.name(), "running region strategy");
        strategy.select(ctx)
    }
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new(RegionSelectorConfig::default())
    }
}
