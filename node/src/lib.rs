// Library interface shared by the node runtime and the `rami` front-end

pub mod config;
pub mod consensus;
pub mod game;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use config::NodeConfig;
pub use consensus::{start_node, NodeHandle, NodeSnapshot, ProposeOutcome};
pub use game::{Card, DrawSource, GameSummary, PlayerId, RamiGame};
