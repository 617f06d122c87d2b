use clap::ArgEnum;

pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 10;
pub const DEFAULT_GH_PATH: &str = "gh";

/// Which organization a maintenance command acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ArgEnum)]
pub enum Side {
    Source,
    Target,
}
