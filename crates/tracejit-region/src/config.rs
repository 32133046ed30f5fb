use core::fmt;
use core::str::FromStr;

use thiserror::Error;
use tracing::warn;

/// Environment variable naming the region selection mode.
pub const REGION_SELECTOR_ENV: &str = "TRACEJIT_REGION_SELECTOR";

/// How regions are chosen for a compilation request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegionMode {
    /// No regions; the caller uses its tracelet compiler.
    #[default]
    Disabled,
    /// One instruction per region.
    OneBc,
    /// Whole function per region, at function entry only.
    Method,
    /// Regions converted from recorded tracelets.
    Tracelet,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown region selector {0:?} (expected \"\", \"onebc\", \"method\" or \"tracelet\")")]
pub struct UnknownRegionMode(pub String);

impl FromStr for RegionMode {
    type Err = UnknownRegionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(RegionMode::Disabled),
            "onebc" => Ok(RegionMode::OneBc),
            "method" => Ok(RegionMode::Method),
            "tracelet" => Ok(RegionMode::Tracelet),
            other => Err(UnknownRegionMode(other.to_owned())),
        }
    }
}

impl fmt::Display for RegionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegionMode::Disabled => "disabled",
            RegionMode::OneBc => "onebc",
            RegionMode::Method => "method",
            RegionMode::Tracelet => "tracelet",
        })
    }
}

/// Selector configuration. Read once (usually via [`RegionSelectorConfig::from_env`]) and
/// handed to the selector; nothing here is global.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionSelectorConfig {
    pub selector: String,
}

impl RegionSelectorConfig {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn from_env() -> Self {
        Self {
            selector: std::env::var(REGION_SELECTOR_ENV).unwrap_or_default(),
        }
    }

    /// The configured mode. Unrecognized values are a configuration error: fatal in debug
    /// builds, and treated as [`RegionMode::Disabled`] otherwise.
    pub fn mode(&self) -> RegionMode {
        match self.selector.parse::<RegionMode>() {
            Ok(mode) => mode,
            Err(err) => {
                warn!(selector = %self.selector, "{err}; region selection disabled");
                if cfg!(debug_assertions) {
                    panic!("{err}");
                }
                RegionMode::Disabled
            }
        }
    }
}
