// src/config.rs
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::ai::AiConfig;

const ENV_FEEDS_PATH: &str = "RADAR_FEEDS_PATH";

/// One configured source feed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub day_range_default: u32,
    pub enrich_throttle_ms: u64,
    pub collect_interval_hours: u64,
    pub analyze_interval_hours: u64,
    pub ai: AiConfig,
    pub feeds: Vec<FeedSpec>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Read configuration from the environment (plus the feed list file).
    ///
    /// A missing AI credential is a fatal configuration error: the process
    /// must refuse to start rather than fail later mid-run.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("AI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("AI_API_KEY is required but not set"))?;

        let ai = AiConfig {
            api_url: env_or(
                "AI_API_URL",
                "https://api.openai.com/v1/chat/completions".to_string(),
            ),
            api_key,
            model: env_or("AI_MODEL", "gpt-4o-mini".to_string()),
        };

        Ok(Self {
            bind_addr: env_or("RADAR_BIND", SocketAddr::from(([0, 0, 0, 0], 8080))),
            data_dir: PathBuf::from(env_or("RADAR_DATA_DIR", "data".to_string())),
            day_range_default: env_or("RADAR_DAY_RANGE", 14u32).max(1),
            enrich_throttle_ms: env_or("RADAR_ENRICH_THROTTLE_MS", 500u64),
            collect_interval_hours: env_or("RADAR_COLLECT_INTERVAL_HOURS", 6u64).max(1),
            analyze_interval_hours: env_or("RADAR_ANALYZE_INTERVAL_HOURS", 24u64).max(1),
            ai,
            feeds: load_feeds_default()?,
        })
    }
}

/// Load the feed list from an explicit path. Supports TOML or JSON.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

/// Load the feed list using env var + fallbacks:
/// 1) $RADAR_FEEDS_PATH
/// 2) config/feeds.toml
/// 3) config/feeds.json
/// No file at all means no feeds, which is valid (analysis-only deploys).
pub fn load_feeds_default() -> Result<Vec<FeedSpec>> {
    if let Ok(p) = std::env::var(ENV_FEEDS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        }
        bail!("RADAR_FEEDS_PATH points to non-existent path");
    }
    let toml_p = PathBuf::from("config/feeds.toml");
    if toml_p.exists() {
        return load_feeds_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feeds.json");
    if json_p.exists() {
        return load_feeds_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedSpec>> {
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feed list format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSpec>> {
    #[derive(Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedSpec>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<FeedSpec>> {
    let v: Vec<FeedSpec> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

fn clean_list(items: Vec<FeedSpec>) -> Vec<FeedSpec> {
    let mut out: Vec<FeedSpec> = Vec::new();
    for it in items {
        let name = it.name.trim().to_string();
        let url = it.url.trim().to_string();
        if name.is_empty() || url.is_empty() {
            continue;
        }
        if out.iter().any(|f| f.name == name) {
            continue;
        }
        out.push(FeedSpec { name, url });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_formats_parse_with_dedup_and_trim() {
        let toml = r#"
[[feeds]]
name = " kol-feed "
url = "https://example.com/kol"

[[feeds]]
name = "kol-feed"
url = "https://example.com/dup"

[[feeds]]
name = ""
url = "https://example.com/empty"
"#;
        let out = parse_toml(toml).expect("toml");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "kol-feed");
        assert_eq!(out[0].url, "https://example.com/kol");

        let json = r#"[{"name":"onchain","url":" https://example.com/oc "}]"#;
        let out = parse_json(json).expect("json");
        assert_eq!(out[0].url, "https://example.com/oc");
    }

    #[test]
    fn unknown_format_is_an_error() {
        assert!(parse_feeds("not a feed list", "txt").is_err());
    }
}
