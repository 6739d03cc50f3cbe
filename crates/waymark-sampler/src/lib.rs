//! Power-law QA sampling: per-key occurrence counters that capture a
//! snapshot at 1, 2, 4, ... 512, 1000 and every 1000th occurrence after that,
//! so storage grows with the log of the event count.

pub mod checkpoint;
pub mod collector;
pub mod persist;
pub mod sampler;
pub mod snapshot;

pub use checkpoint::is_checkpoint;
pub use collector::QaMilestoneCollector;
pub use persist::SamplerExport;
pub use sampler::{PowerLawSampler, SamplerConfig, SamplerStats};
pub use snapshot::QaMilestoneSnapshot;
