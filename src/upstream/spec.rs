//! Backend specifications accepted by `Upstream::create`.

use serde::{Deserialize, Serialize};

use crate::mock::RequestLogging;

/// Weight of a backend when neither its config nor the positional list gives one.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Host used for bare-port specs.
pub const DEFAULT_HOST: &str = "127.0.0.1";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Structured backend spec.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// `0` binds an ephemeral port.
    pub port: u16,

    /// Overrides the positional weight.
    #[serde(default)]
    pub weight: Option<f64>,

    /// Overrides the pool's request logging.
    #[serde(default)]
    pub logging: Option<RequestLogging>,
}

/// One pool member: a bare port or a structured config.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ServerSpec {
    Port(u16),
    Config(ServerConfig),
}

impl ServerSpec {
    pub fn host(&self) -> &str {
        match self {
            ServerSpec::Port(_) => DEFAULT_HOST,
            ServerSpec::Config(c) => &c.host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ServerSpec::Port(port) => *port,
            ServerSpec::Config(c) => c.port,
        }
    }

    /// `host:port` as configured (before an ephemeral port is resolved).
    pub fn label(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// Explicit weight > positional weight > `DEFAULT_WEIGHT`.
    pub fn resolve_weight(&self, positional: Option<f64>) -> f64 {
        let explicit = match self {
            ServerSpec::Port(_) => None,
            ServerSpec::Config(c) => c.weight,
        };
        explicit.or(positional).unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn logging(&self) -> Option<RequestLogging> {
        match self {
            ServerSpec::Port(_) => None,
            ServerSpec::Config(c) => c.logging,
        }
    }
}

impl From<u16> for ServerSpec {
    fn from(port: u16) -> Self {
        ServerSpec::Port(port)
    }
}

impl From<ServerConfig> for ServerSpec {
    fn from(config: ServerConfig) -> Self {
        ServerSpec::Config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_resolution_order() {
        let bare = ServerSpec::from(8083);
        assert_eq!(bare.resolve_weight(None), DEFAULT_WEIGHT);
        assert_eq!(bare.resolve_weight(Some(10.0)), 10.0);

        let explicit = ServerSpec::from(ServerConfig {
            host: "127.0.0.1".into(),
            port: 8084,
            weight: Some(3.0),
            logging: None,
        });
        assert_eq!(explicit.resolve_weight(Some(10.0)), 3.0);
        assert_eq!(explicit.label(), "127.0.0.1:8084");
    }

    #[test]
    fn deserializes_ports_and_tables() {
        #[derive(Deserialize)]
        struct Doc {
            servers: Vec<ServerSpec>,
        }
        let doc: Doc = toml::from_str(
            r#"servers = [8083, { port = 8084, weight = 2.5 }, { host = "localhost", port = 8085, logging = "access" }]"#,
        )
        .unwrap();

        assert_eq!(doc.servers[0], ServerSpec::Port(8083));
        assert_eq!(doc.servers[1].resolve_weight(None), 2.5);
        assert_eq!(doc.servers[1].host(), DEFAULT_HOST);
        assert_eq!(doc.servers[2].host(), "localhost");
        assert_eq!(doc.servers[2].logging(), Some(RequestLogging::Access));
    }
}
