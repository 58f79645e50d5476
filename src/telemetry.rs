//! Telemetry domain: timestamps, message ids, and the channel event bus.

mod types;

pub mod bus;
pub mod events;

pub use bus::EventBus;
pub use events::{ChannelEvent, HealthEventData, QueueEventData};
pub use types::{new_message_id, now_millis};
