//! gymhost: an HTTP server that hosts simulation environment sessions.
//!
//! Callers create sessions from the environment catalog, then reset, step
//! and record them by instance id. See [`commands::GymApi`] for the
//! operations and [`web_server`] for the routes.

pub mod commands;
pub mod config;
pub mod envs;
pub mod error;
pub mod monitor;
pub mod session;
pub mod spaces;
pub mod upload;
pub mod web_server;

pub use commands::GymApi;
pub use config::ServerConfig;
pub use error::{GymError, GymResult};

/// Run the server until it is shut down
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    web_server::serve(config).await
}
