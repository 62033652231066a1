//! Shared types, traits and error hierarchy for Switchboard.

pub mod error;
pub mod message;
pub mod provider;
pub mod signal;
pub mod tool;
pub mod util;

pub use error::{ApiError, ConfigError, SwitchboardError, ToolError};
pub use message::*;
pub use signal::{RoutingSignal, SpecialistResult};
pub use tool::*;
pub use util::{BoxFuture, truncate_for_display, truncate_str};
