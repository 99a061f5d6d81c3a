//! The bundled problem domains. Each reads a plain-text instance from a
//! reader (the driver hands it stdin) and plugs into the engines through
//! the [`crate::search::Domain`] trait.

mod blocksworld;
mod pancake;
mod synth_tree;
mod tiles;
mod vacuum;

pub use blocksworld::Blocksworld;
pub use pancake::Pancake;
pub use synth_tree::SynthTree;
pub use tiles::Tiles;
pub use vacuum::Vacuum;

use thiserror::Error;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[clap(rename_all = "kebab-case")]
pub enum DomainName {
    Pancake,
    Blocksworld,
    Tiles,
    Vacuum,
    SynthTree,
}

/// Edge-cost model for the weighted domains. Domains that support only a
/// subset treat the rest as `unit`.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[clap(rename_all = "kebab-case")]
pub enum CostModel {
    #[default]
    Unit,
    Heavy,
    Sqrt,
    Inverse,
    Reverse,
    Revinv,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read instance: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed instance: {0}")]
    Malformed(String),
}

pub(crate) fn malformed(message: impl Into<String>) -> ParseError {
    ParseError::Malformed(message.into())
}
