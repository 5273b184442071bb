pub mod packer;
pub mod strategy;
pub mod tokens;

pub use strategy::{plan_units, ChunkingParams, Strategy};
pub use tokens::{CharEstimator, TokenEstimator};
