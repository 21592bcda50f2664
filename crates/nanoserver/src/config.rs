use anyhow::Context;
use nanoruntime::RuntimeConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 50051;

/// Listener and runtime settings, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub node_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `BIND_ADDRESS` wins over `SERVER_HOST` + `SERVER_PORT`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_address = match lookup("BIND_ADDRESS").filter(|address| !address.is_empty()) {
            Some(address) => address,
            None => {
                let host = lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
                let port = match lookup("SERVER_PORT") {
                    Some(port) => port
                        .parse::<u16>()
                        .with_context(|| format!("SERVER_PORT is not a valid port: {:?}", port))?,
                    None => DEFAULT_PORT,
                };
                format!("{}:{}", host, port)
            }
        };

        let node_timeout_ms = lookup("NODE_TIMEOUT_MS")
            .map(|millis| {
                millis
                    .parse::<u64>()
                    .with_context(|| format!("NODE_TIMEOUT_MS is not a number: {:?}", millis))
            })
            .transpose()?;

        Ok(Self {
            bind_address,
            node_timeout_ms,
        })
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_execution_time_ms: self.node_timeout_ms,
        }
    }
}
