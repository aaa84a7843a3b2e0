//! Domain layer for wall-remote.
//!
//! Pure types with no I/O beyond reading a config file: runtime
//! configuration and endpoint derivation.  Nothing here touches tokio or a
//! socket, which keeps it testable without a network.

pub mod config;
pub mod endpoint;

pub use config::{load_config_file, parse_config, ConfigError, ConfigFile, RemoteConfig};
pub use endpoint::endpoint_from_origin;
