//! Resolved startup configuration.
//!
//! Built once in `main` from the command line and injected into the server;
//! nothing reads configuration through globals.

/// Static server settings, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
