//! Integration tests for uniform channel orchestration and frame handling

mod channel_registry;
mod end_to_end;
mod frame_protocol;
mod health_monitor;
