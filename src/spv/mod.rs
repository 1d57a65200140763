//! Simplified payment verification

pub mod light_client;

pub use light_client::LightClient;
