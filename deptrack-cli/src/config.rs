use anyhow::{Context, Result};
use deptrack_stream::{BackoffPolicy, StreamConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::ensure_deptrack_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamSection,
    pub report: ReportSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub url: String,
    /// Bearer credential for the notification endpoint.
    pub token: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    /// IANA zone used for dates printed on reports.
    pub timezone: String,
    pub branding_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for StreamSection {
    fn default() -> Self {
        let backoff = BackoffPolicy::default();
        Self {
            url: "http://localhost:3000/api/notifications/stream".to_string(),
            token: None,
            max_attempts: backoff.max_attempts,
            base_delay_ms: backoff.base_delay.as_millis() as u64,
            max_delay_ms: backoff.max_delay.as_millis() as u64,
            channel_capacity: 64,
        }
    }
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            branding_image: None,
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StreamSection {
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            channel_capacity: self.channel_capacity,
            ..StreamConfig::new(self.url.clone(), self.token.clone())
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_deptrack_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let p = config_path()?;
    let mut cfg = load_config()?;
    if cfg.stream.token.is_some() {
        cfg.stream.token = Some("********".to_string());
    }
    println!("# {}", p.display());
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg = parse_config(
            r#"
            [stream]
            token = "abc"
            max_attempts = 3

            [report]
            timezone = "America/Chicago"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.stream.token.as_deref(), Some("abc"));
        assert_eq!(cfg.stream.max_attempts, 3);
        assert_eq!(cfg.stream.base_delay_ms, 1000);
        assert_eq!(cfg.report.timezone, "America/Chicago");
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn stream_section_maps_to_client_tunables() {
        let mut section = StreamSection::default();
        section.max_delay_ms = 5_000;
        let sc = section.to_stream_config();
        assert_eq!(sc.max_attempts, 5);
        assert_eq!(sc.base_delay, Duration::from_secs(1));
        assert_eq!(sc.max_delay, Duration::from_secs(5));
        assert_eq!(sc.channel_capacity, 64);
        assert_eq!(sc.credential, None);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let cfg = parse_config(&s).unwrap();
        assert_eq!(cfg.stream.url, StreamSection::default().url);
        assert_eq!(cfg.report.branding_image, None);
    }
}
