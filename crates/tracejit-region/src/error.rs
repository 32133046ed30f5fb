use thiserror::Error;
use tracejit_bytecode::{DecodeError, Offset, SrcPos};

/// Recoverable failure while selecting a region. The selector turns any of these into "no
/// region"; contract violations are panics instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("failed to decode instruction at {pos}: {source}")]
    Decode {
        pos: SrcPos,
        #[source]
        source: DecodeError,
    },
    #[error("branch at {from} targets {target}, outside of [{base}, {past})")]
    BranchOutOfRange {
        from: SrcPos,
        target: i64,
        base: Offset,
        past: Offset,
    },
    #[error("unsupported region: {0}")]
    Unsupported(String),
}
