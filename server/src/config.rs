use std::{env, fs, path::PathBuf, time::Duration};

use model::arch::{GraphBuilder, ModelSpec};

use crate::{Result, ServeMode, ServerErr};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 12345;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 30_000;

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub seed: Option<u64>,
    pub model_spec: Option<PathBuf>,
    pub mode: ServeMode,
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            seed: None,
            model_spec: None,
            mode: ServeMode::default(),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    /// Reads `HOST`, `PORT`, `INIT_SEED`, `MODEL_SPEC`, `SERVE_MODE` and `WRITE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration out of an arbitrary variable lookup, unset variables take their defaults.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, if set.
    ///
    /// # Returns
    /// The configuration or a `Config` error naming the first unparsable variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(seed) = lookup("INIT_SEED") {
            config.seed = Some(parse("INIT_SEED", &seed)?);
        }
        if let Some(path) = lookup("MODEL_SPEC") {
            config.model_spec = Some(PathBuf::from(path));
        }
        if let Some(mode) = lookup("SERVE_MODE") {
            config.mode = parse("SERVE_MODE", &mode)?;
        }
        if let Some(ms) = lookup("WRITE_TIMEOUT_MS") {
            let ms: u64 = parse("WRITE_TIMEOUT_MS", &ms)?;
            if ms == 0 {
                return Err(ServerErr::Config(
                    "WRITE_TIMEOUT_MS must be greater than zero".to_string(),
                ));
            }
            config.write_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The builder of the model to serve, `INIT_SEED` taking precedence over a seed in the `MODEL_SPEC` file.
    pub fn model_builder(&self) -> Result<GraphBuilder> {
        let builder = match &self.model_spec {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    ServerErr::Config(format!("failed to read MODEL_SPEC {}: {e}", path.display()))
                })?;
                let spec: ModelSpec = serde_json::from_str(&raw).map_err(|e| {
                    ServerErr::Config(format!("invalid MODEL_SPEC {}: {e}", path.display()))
                })?;
                GraphBuilder::from_spec(spec)
            }
            None => GraphBuilder::classifier(),
        };

        Ok(match self.seed {
            Some(seed) => builder.seed(seed),
            None => builder,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerErr::Config(format!("{key}={value:?}: {e}")))
}
