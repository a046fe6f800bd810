use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Directory that holds one sub-directory per database.
pub const DEFAULT_ROOT: &str = "./databases";
/// Port the statement listener binds by default.
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolved settings for the server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub listen: SocketAddr,
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Replaces each default that was given explicitly on the command line.
    pub fn with_overrides(
        mut self,
        root: Option<PathBuf>,
        listen: Option<SocketAddr>,
        log_level: Option<String>,
    ) -> Self {
        if let Some(root) = root {
            self.root = root;
        }
        if let Some(listen) = listen {
            self.listen = listen;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.root, PathBuf::from("./databases"));
        assert_eq!(config.listen.to_string(), "127.0.0.1:8888");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let listen: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::default().with_overrides(
            Some(PathBuf::from("/tmp/dbs")),
            Some(listen),
            None,
        );
        assert_eq!(config.root, PathBuf::from("/tmp/dbs"));
        assert_eq!(config.listen, listen);
        assert_eq!(config.log_level, "info");
    }
}
