#![deny(unused_variables)]

pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod partition;
pub mod types;

#[path = "../shared/table.rs"]
pub mod table;

#[path = "../shared/files.rs"]
pub mod files;

#[path = "../tables/mod.rs"]
pub mod tables;

pub mod shared {
    pub use super::{files, table};
}

pub use config::{EngineConfig, GeographyDirection, Model};
pub use engine::{InferenceEngine, InferenceRequest, InferenceResult, ProxyModel, ReferenceTables, TableSource};
pub use error::BifsgError;
pub use partition::{PartitionIndex, PartitionedLoader};
pub use table::ProbabilityTable;
pub use types::{Direction, NUM_RACES, Proxy, RaceCategory, RaceDistribution, Resolution};
