// Infrastructure layer - Backend transports, wire formats and configuration
pub mod backend_client;
pub mod config;
pub mod wire;
pub mod ws_feed;
