pub mod format;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod queue;

pub use notifier::{AlertTransport, Notifier, TelegramTransport};
pub use orchestrator::{Bot, LiveBot};
pub use queue::WaitingQueue;
