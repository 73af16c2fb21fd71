use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::mpd_client::MpdHost;

const DEFAULT_PORT: u16 = 6600;
const DEFAULT_BACKGROUND: &str = "#000000";

#[derive(Debug, Parser)]
#[command(name = "artbox", version, about = "Album art window for MPD")]
pub struct Cli {
    /// Config file path (default: config.toml under the user config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// MPD host (default: $XDG_RUNTIME_DIR/mpd/socket if present, else localhost)
    #[arg(long)]
    host: Option<String>,

    /// MPD port
    #[arg(long)]
    port: Option<u16>,

    /// Window background color
    #[arg(long, value_name = "COLOR")]
    background_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    background_color: Option<String>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Resolved startup parameters, immutable after load.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: MpdHost,
    pub port: u16,
    pub background_color: String,
}

impl Config {
    /// Merge CLI flags over the config file over built-in defaults. A
    /// `--config` file must exist; the default one may be absent.
    pub fn load(cli: Cli) -> Result<Config> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => FileConfig::read(&path)?,
                _ => FileConfig::default(),
            },
        };

        let runtime_dir = env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        let host = resolve_host(cli.host.or(file.host), runtime_dir.as_deref())?;

        Ok(Config {
            host,
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            background_color: cli
                .background_color
                .or(file.background_color)
                .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("artbox").join("config.toml"))
}

/// A configured host starting with `/` names a unix socket, anything else
/// a TCP hostname. With no host configured, probe for the conventional
/// per-user MPD socket before falling back to localhost. The runtime dir
/// must be set for the probe (an empty value just skips it).
fn resolve_host(configured: Option<String>, runtime_dir: Option<&Path>) -> Result<MpdHost> {
    if let Some(host) = configured {
        return Ok(if host.starts_with('/') {
            MpdHost::Socket(PathBuf::from(host))
        } else {
            MpdHost::Tcp(host)
        });
    }

    let runtime_dir = runtime_dir.context("XDG_RUNTIME_DIR is not set")?;
    if !runtime_dir.as_os_str().is_empty() {
        let socket = runtime_dir.join("mpd").join("socket");
        if socket.exists() {
            return Ok(MpdHost::Socket(socket));
        }
    }

    Ok(MpdHost::Tcp("localhost".to_string()))
}
