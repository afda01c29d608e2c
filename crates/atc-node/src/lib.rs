//! Host for a single ATC engine replica: configuration, sector layout,
//! shared state, synthetic traffic and the tick loops.

pub mod config;
pub mod error;
pub mod layout;
pub mod loops;
pub mod sim;
pub mod state;

pub use config::Config;
pub use error::{NodeError, NodeResult};
pub use layout::{SectorLayout, SectorSpec};
pub use sim::TrafficGenerator;
pub use state::{BroadcastSink, EventEnvelope, NodeState};
