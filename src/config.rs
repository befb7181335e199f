use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub relay: RelayConfig,
    pub recordings: RecordingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Messages queued per connection before sends start failing
    pub outbound_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingsConfig {
    pub path: PathBuf,
    pub url_prefix: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load defaults, then the optional file at `path`, then `RELAY__*` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "signal-relay")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8000)?
            .set_default("relay.outbound_buffer", 64)?
            .set_default("recordings.path", "recordings")?
            .set_default("recordings.url_prefix", "/recordings")?
            .set_default("recordings.max_upload_bytes", 512 * 1024 * 1024)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}
