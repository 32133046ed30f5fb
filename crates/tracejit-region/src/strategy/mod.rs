//! Region-building strategies other than tracelet conversion.
//!
//! Each strategy looks at a [`RegionContext`] and either produces a region, declines
//! (`Ok(None)`), or fails. The selector treats declining and failing the same way; the
//! distinction only shows up in logs.

mod method;
mod one_bc;

pub use method::MethodStrategy;
pub use one_bc::OneBcStrategy;

use crate::error::RegionError;
use crate::region::{Region, RegionContext};

pub trait RegionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn select(&self, ctx: &RegionContext) -> Result<Option<Region>, RegionError>;
}
