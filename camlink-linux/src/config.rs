//! Load config from file and environment.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration. File: ~/.config/camlink/config.toml or /etc/camlink/config.toml.
/// Env overrides: CAMLINK_FRAME_BIND, CAMLINK_STATS_BIND, CAMLINK_REPLY_ADDR, CAMLINK_STATS_ADDR,
/// CAMLINK_IMAGE_DIR, CAMLINK_CHUNK_SIZE, CAMLINK_PACING_MS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// UDP address receiving image frames from the camera (default 0.0.0.0:47000).
    #[serde(default = "default_frame_bind")]
    pub frame_bind: SocketAddr,
    /// UDP address receiving the camera's latency statistics (disabled if unset).
    #[serde(default)]
    pub stats_bind: Option<SocketAddr>,
    /// Where processed image frames are sent (default 127.0.0.1:47001).
    #[serde(default = "default_reply_addr")]
    pub reply_addr: SocketAddr,
    /// Where our own latency statistics are published (disabled if unset).
    #[serde(default)]
    pub stats_addr: Option<SocketAddr>,
    /// Directory for received and processed images (default received_images).
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// Reply fragment size in bytes (default 2048).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Delay between reply frames in ms (default 50).
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Latency samples kept in the rolling window (default 100).
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
    /// Seconds without a fragment before an incomplete transfer is dropped (default 10).
    #[serde(default = "default_idle_timeout_ticks")]
    pub idle_timeout_ticks: u64,
}

fn default_frame_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 47000))
}
fn default_reply_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 47001))
}
fn default_image_dir() -> PathBuf {
    PathBuf::from("received_images")
}
fn default_chunk_size() -> usize {
    camlink_core::DEFAULT_CHUNK_SIZE
}
fn default_pacing_ms() -> u64 {
    50
}
fn default_latency_window() -> usize {
    camlink_core::latency::DEFAULT_WINDOW
}
fn default_idle_timeout_ticks() -> u64 {
    camlink_core::session::DEFAULT_IDLE_TIMEOUT_TICKS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_bind: default_frame_bind(),
            stats_bind: None,
            reply_addr: default_reply_addr(),
            stats_addr: None,
            image_dir: default_image_dir(),
            chunk_size: default_chunk_size(),
            pacing_ms: default_pacing_ms(),
            latency_window: default_latency_window(),
            idle_timeout_ticks: default_idle_timeout_ticks(),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(a) = var("CAMLINK_FRAME_BIND").and_then(|s| s.parse().ok()) {
        c.frame_bind = a;
    }
    if let Some(a) = var("CAMLINK_STATS_BIND").and_then(|s| s.parse().ok()) {
        c.stats_bind = Some(a);
    }
    if let Some(a) = var("CAMLINK_REPLY_ADDR").and_then(|s| s.parse().ok()) {
        c.reply_addr = a;
    }
    if let Some(a) = var("CAMLINK_STATS_ADDR").and_then(|s| s.parse().ok()) {
        c.stats_addr = Some(a);
    }
    if let Some(d) = var("CAMLINK_IMAGE_DIR") {
        c.image_dir = PathBuf::from(d);
    }
    if let Some(n) = var("CAMLINK_CHUNK_SIZE").and_then(|s| s.parse().ok()) {
        c.chunk_size = n;
    }
    if let Some(n) = var("CAMLINK_PACING_MS").and_then(|s| s.parse().ok()) {
        c.pacing_ms = n;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/camlink/config.toml"));
    }
    out.push(PathBuf::from("/etc/camlink/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => log::warn!("ignoring invalid config {}: {}", p.display(), e),
                },
                Err(e) => log::warn!("cannot read config {}: {}", p.display(), e),
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.frame_bind, default_frame_bind());
        assert_eq!(c.chunk_size, 2048);
        assert_eq!(c.pacing_ms, 50);
        assert_eq!(c.latency_window, 100);
        assert!(c.stats_addr.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let c: Config = toml::from_str(
            r#"
            reply_addr = "10.0.0.5:9000"
            stats_addr = "10.0.0.5:9001"
            image_dir = "/var/lib/camlink"
            chunk_size = 4096
            "#,
        )
        .unwrap();
        assert_eq!(c.reply_addr, "10.0.0.5:9000".parse().unwrap());
        assert_eq!(c.stats_addr, Some("10.0.0.5:9001".parse().unwrap()));
        assert_eq!(c.image_dir, PathBuf::from("/var/lib/camlink"));
        assert_eq!(c.chunk_size, 4096);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("proxy_port = 3128").is_err());
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let mut c = Config::default();
        apply_env(&mut c, |key| match key {
            "CAMLINK_CHUNK_SIZE" => Some("1024".into()),
            "CAMLINK_PACING_MS" => Some("not-a-number".into()),
            "CAMLINK_STATS_ADDR" => Some("127.0.0.1:5555".into()),
            _ => None,
        });
        assert_eq!(c.chunk_size, 1024);
        assert_eq!(c.pacing_ms, 50);
        assert_eq!(c.stats_addr, Some("127.0.0.1:5555".parse().unwrap()));
    }
}
