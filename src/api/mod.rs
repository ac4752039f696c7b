//! HTTP surface: the command endpoint and health checks

pub mod dispatch;
pub mod health;
