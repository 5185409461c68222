use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionDefaults,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct SessionDefaults {
    /// Keep-alive notification refresh period.
    pub heartbeat_secs: u64,
    /// Default chunk duration for sessions started without one; 0 disables
    /// chunk rotation (single-file sessions).
    pub chunk_secs: u64,
    /// Directory for generated output paths.
    pub recordings_path: String,
}

impl Config {
    /// Load from an optional config file layered over built-in defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "taperd")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 7770i64)?
            .set_default("session.heartbeat_secs", 30i64)?
            .set_default("session.chunk_secs", 0i64)?
            .set_default("session.recordings_path", "recordings")?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bridge_url(&self) -> String {
        format!("http://{}:{}", self.service.http.bind, self.service.http.port)
    }
}
