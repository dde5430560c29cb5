pub mod aggregate;
pub mod flatten;
pub mod harvest;
pub mod selector;
pub mod writer;

#[cfg(test)]
mod tests;

pub use aggregate::{Aggregator, Harvest};
pub use flatten::fetch_flat_comments;
pub use harvest::{Harvester, Interrupted};
pub use selector::{DateRange, Decision, PostSelector};
pub use writer::{format_download_time, partial_path, render, write_snapshot};
