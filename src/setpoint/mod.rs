pub mod command;
pub mod queue;

pub use command::SetpointCommand;
pub use queue::{SetpointQueue, SetpointPublisher};
