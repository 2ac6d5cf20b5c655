pub mod artifact;
pub mod config;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerErr};
pub use server::{ArtifactServer, ServeMode, serve};
