//! Release-dependent `collStats` serialization
//!
//! The same at-rest collection reports slightly different statistics
//! depending on the server release that serves it. A [`StatsProfile`] picks
//! one release's shape so a test can record under one profile, switch, and
//! validate under another.
//!
//! | Field | 2.4 | 2.6 | 2.8 |
//! |-------|-----|-----|-----|
//! | `avgObjSize` | double | int | int |
//! | `systemFlags` | yes | yes | no |
//! | `paddingFactor` | yes | yes | no |
//! | `paddingFactorNote` | no | no | yes |
//! | `capped` | only when true | only when true | always |
//! | `maxSize` (capped) | no | no | yes |
//! | `indexDetails` | no | no | yes |

use std::fmt;

/// Server release whose `collStats` shape is emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatsProfile {
    /// 2.4 series
    V2_4,
    /// 2.6 series
    #[default]
    V2_6,
    /// 2.8 series
    V2_8,
}

impl StatsProfile {
    /// Every profile, oldest first
    pub const ALL: [StatsProfile; 3] = [StatsProfile::V2_4, StatsProfile::V2_6, StatsProfile::V2_8];

    /// Release string, e.g. `"2.6"`
    pub fn release(&self) -> &'static str {
        match self {
            StatsProfile::V2_4 => "2.4",
            StatsProfile::V2_6 => "2.6",
            StatsProfile::V2_8 => "2.8",
        }
    }

    /// `avgObjSize` is reported as a double
    pub fn fractional_avg_obj_size(&self) -> bool {
        matches!(self, StatsProfile::V2_4)
    }

    /// `systemFlags` is reported
    pub fn reports_system_flags(&self) -> bool {
        !matches!(self, StatsProfile::V2_8)
    }

    /// `paddingFactor` is reported (otherwise `paddingFactorNote`)
    pub fn reports_padding_factor(&self) -> bool {
        !matches!(self, StatsProfile::V2_8)
    }

    /// `capped: false` is reported for uncapped collections
    pub fn reports_capped_false(&self) -> bool {
        matches!(self, StatsProfile::V2_8)
    }

    /// `maxSize` is reported for capped collections
    pub fn reports_max_size(&self) -> bool {
        matches!(self, StatsProfile::V2_8)
    }

    /// `indexDetails` is reported
    pub fn reports_index_details(&self) -> bool {
        matches!(self, StatsProfile::V2_8)
    }
}

impl fmt::Display for StatsProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.release())
    }
}

/// Deployment context that leaks into `collStats` behind a router
///
/// When set, statistics carry `sharded` and `primary`. Neither says
/// anything about the collection's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardingContext {
    /// Whether the collection is sharded
    pub sharded: bool,
    /// Name of the primary shard
    pub primary: String,
}

impl Default for ShardingContext {
    fn default() -> Self {
        Self {
            sharded: false,
            primary: "shard0000".to_string(),
        }
    }
}
