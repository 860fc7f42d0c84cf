//! HTTP handlers for the gateway management API.

pub mod api_keys;
pub mod catalog;
pub mod deliveries;
pub mod webhooks;
