use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `TOPO_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "topo.toml";

/// Application settings loaded from `topo.toml`.
///
/// Every field is optional; a missing file yields [`AppConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Show the debug HUD (log tail, listener counts).
    pub debug: bool,
    /// Background colour as `#rrggbb`.
    pub clear_color: String,
    pub clock: ClockConfig,
    pub viewport: ViewportConfig,
    pub resources: Vec<ResourceSpec>,
}

/// Frame clock settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Time between frames driven by the host loop.
    pub tick_interval_ms: u64,
    /// Upper bound for the per-frame delta handed to listeners.
    pub delta_cap_ms: u64,
}

/// Viewport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewportConfig {
    pub device_pixel_ratio: f64,
    pub pixel_ratio_cap: f64,
}

/// An asset to load at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub name: String,
    pub source: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            clear_color: "#08001f".to_string(),
            clock: ClockConfig::default(),
            viewport: ViewportConfig::default(),
            resources: Vec::new(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            delta_cap_ms: 60,
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            pixel_ratio_cap: 2.0,
        }
    }
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl AppConfig {
    /// Parse and validate config TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse topo config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file. Relative resource sources are
    /// resolved against the file's directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read topo config at {}", path.display()))?;

        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid topo config at {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_sources(base);
        }
        Ok(config)
    }

    /// Locate and load the config for this process.
    ///
    /// `TOPO_CONFIG` names the file explicitly and must exist. Otherwise
    /// `topo.toml` in the working directory is used when present, and the
    /// defaults when not. `TOPO_DEBUG=1` forces debug mode either way.
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os("TOPO_CONFIG") {
            Some(path) => Self::from_path(&PathBuf::from(path))?,
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if local.is_file() {
                    Self::from_path(&local)?
                } else {
                    tracing::info!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    Self::default()
                }
            }
        };

        if env_flag("TOPO_DEBUG") {
            config.debug = true;
        }
        Ok(config)
    }

    /// Validate field values after parsing.
    pub fn validate(&self) -> Result<()> {
        parse_hex_color(&self.clear_color)
            .with_context(|| format!("clear_color must be #rrggbb: {}", self.clear_color))?;

        if self.clock.tick_interval_ms == 0 {
            bail!("clock.tick_interval_ms must be greater than zero");
        }
        if self.clock.delta_cap_ms == 0 {
            bail!("clock.delta_cap_ms must be greater than zero");
        }

        validate_ratio("viewport.device_pixel_ratio", self.viewport.device_pixel_ratio)?;
        validate_ratio("viewport.pixel_ratio_cap", self.viewport.pixel_ratio_cap)?;

        validate_resources(&self.resources)
    }

    /// The clear colour as RGB components.
    pub fn clear_color_rgb(&self) -> Result<(u8, u8, u8)> {
        parse_hex_color(&self.clear_color)
    }

    fn resolve_sources(&mut self, base: &Path) {
        for resource in &mut self.resources {
            let source = Path::new(&resource.source);
            if source.is_relative() && !base.as_os_str().is_empty() {
                resource.source = base.join(source).to_string_lossy().into_owned();
            }
        }
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("yes") | Ok("on")
    )
}

fn parse_hex_color(raw: &str) -> Result<(u8, u8, u8)> {
    let Some(hex) = raw.strip_prefix('#') else {
        bail!("colour {raw:?} does not start with '#'");
    };
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("colour {raw:?} is not six hex digits");
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

fn validate_ratio(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{field} must be a positive number, got {value}");
    }
    Ok(())
}

fn validate_resources(resources: &[ResourceSpec]) -> Result<()> {
    let mut seen = BTreeSet::new();

    for resource in resources {
        if resource.name.trim().is_empty() {
            bail!("resources entries must have a name");
        }
        if resource.source.trim().is_empty() {
            bail!("resource {:?} has an empty source", resource.name);
        }
        if !seen.insert(resource.name.as_str()) {
            bail!("resources contains duplicate name {:?}", resource.name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r##"
debug = true
clear_color = "#ff8000"

[clock]
tick_interval_ms = 33
delta_cap_ms = 100

[viewport]
device_pixel_ratio = 3.0
pixel_ratio_cap = 1.5

[[resources]]
name = "matcapRed"
source = "textures/matcap-red.png"

[[resources]]
name = "noise"
source = "/abs/noise.jpg"
"##;

    #[test]
    fn parses_full_config() {
        let config = AppConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert!(config.debug);
        assert_eq!(config.clear_color_rgb().unwrap(), (0xff, 0x80, 0x00));
        assert_eq!(config.clock.tick_interval_ms, 33);
        assert_eq!(config.clock.delta_cap_ms, 100);
        assert_eq!(config.viewport.pixel_ratio_cap, 1.5);
        assert_eq!(config.resources.len(), 2);
        assert_eq!(
            config.resources[0],
            ResourceSpec::new("matcapRed", "textures/matcap-red.png")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.clear_color_rgb().unwrap(), (0x08, 0x00, 0x1f));
        assert_eq!(config.clock.delta_cap_ms, 60);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config = AppConfig::from_toml_str("[clock]\ntick_interval_ms = 50\n").unwrap();
        assert_eq!(config.clock.tick_interval_ms, 50);
        assert_eq!(config.clock.delta_cap_ms, 60);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_toml_str("fullscreen = true\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to parse topo config TOML"));
    }

    #[test]
    fn bad_colour_is_rejected() {
        let raw = FULL_CONFIG.replace("#ff8000", "orange");
        let err = AppConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("clear_color must be #rrggbb"));

        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#gggggg").is_err());
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let raw = FULL_CONFIG.replace("tick_interval_ms = 33", "tick_interval_ms = 0");
        let err = AppConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("clock.tick_interval_ms must be greater than zero"));
    }

    #[test]
    fn non_positive_ratio_is_rejected() {
        let raw = FULL_CONFIG.replace("pixel_ratio_cap = 1.5", "pixel_ratio_cap = 0.0");
        let err = AppConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("viewport.pixel_ratio_cap must be a positive number"));
    }

    #[test]
    fn duplicate_resource_names_are_rejected() {
        let raw = FULL_CONFIG.replace("name = \"noise\"", "name = \"matcapRed\"");
        let err = AppConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("resources contains duplicate name"));
    }

    #[test]
    fn empty_resource_source_is_rejected() {
        let raw = FULL_CONFIG.replace("source = \"/abs/noise.jpg\"", "source = \"\"");
        let err = AppConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("has an empty source"));
    }

    #[test]
    fn from_path_resolves_relative_sources() {
        let dir = std::env::temp_dir().join(format!("topo-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("topo.toml");
        std::fs::write(&path, FULL_CONFIG).unwrap();

        let config = AppConfig::from_path(&path).unwrap();
        assert_eq!(
            PathBuf::from(&config.resources[0].source),
            dir.join("textures/matcap-red.png")
        );
        assert_eq!(config.resources[1].source, "/abs/noise.jpg");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = AppConfig::from_path(Path::new("/definitely/not/here/topo.toml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to read topo config"));
    }
}
