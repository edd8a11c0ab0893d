//! Chain building: classification, ordering, and caching of step chains.

mod builder;
mod classifier;

pub use builder::{Chain, ChainRegistry};
