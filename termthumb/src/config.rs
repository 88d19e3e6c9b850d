// ABOUTME: Render configuration plus TOML settings loading, validation, and hierarchical merging
// ABOUTME: Supports XDG config locations and environment overrides for protocol and cache size

use crate::constants::{defaults, env as env_names};
use crate::protocols::GraphicsProtocol;
use crate::thumbnail::cache::{ClearOnOverflow, EvictionPolicy, LeastRecentlyUsed};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// What a thumbnail looks like: size in cells, protocol, and color mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    width: u32,
    height: u32,
    pub protocol: GraphicsProtocol,
    pub colored: bool,
}

impl RenderConfig {
    /// Zero dimensions fall back to the defaults
    pub fn new(width: u32, height: u32, protocol: GraphicsProtocol, colored: bool) -> Self {
        let mut config = Self {
            protocol,
            colored,
            ..Default::default()
        };
        config.set_dimensions(width, height);
        config
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns whether anything changed; zero values are ignored
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: defaults::WIDTH,
            height: defaults::HEIGHT,
            protocol: GraphicsProtocol::Ascii,
            colored: true,
        }
    }
}

/// Cache eviction strategy selectable from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvictionKind {
    #[default]
    Clear,
    Lru,
}

/// Settings file contents; every field is optional so files can be layered.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ThumbnailSettings {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub protocol: Option<GraphicsProtocol>,
    #[serde(default)]
    pub colored: Option<bool>,
    #[serde(default)]
    pub cache_capacity: Option<usize>,
    #[serde(default)]
    pub eviction: Option<EvictionKind>,
    #[serde(default)]
    pub dither: Option<bool>,
}

impl ThumbnailSettings {
    /// Load settings from standard XDG-compliant locations, then apply env overrides
    pub fn load() -> Result<Self> {
        let paths = Self::get_config_paths();
        Self::load_from_paths(&paths)?.apply_env_overrides()
    }

    /// Load settings from file paths in increasing order of precedence.
    ///
    /// Missing files are skipped; files that exist but do not parse are errors.
    pub fn load_from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut settings = ThumbnailSettings::default();

        for path in paths {
            let path = path.as_ref();
            if !path.is_file() {
                continue;
            }
            // Later paths override earlier ones
            settings = settings.merge(Self::load_from_file(path)?);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a single file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;

        let settings: ThumbnailSettings = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML settings file: {}",
                path.as_ref().display()
            )
        })?;

        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.as_ref().display()))?;
        Ok(settings)
    }

    /// Standard settings file paths, lowest precedence first
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. User config directory fallback
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(
                home_dir
                    .join(".config")
                    .join("termthumb")
                    .join("config.toml"),
            );
        }

        // 2. XDG config home
        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            paths.push(
                PathBuf::from(config_home)
                    .join("termthumb")
                    .join("config.toml"),
            );
        }

        // 3. Project-specific settings (highest precedence)
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("termthumb.toml"));
        }

        paths
    }

    /// Merge field by field, giving precedence to `other`
    pub fn merge(self, other: ThumbnailSettings) -> ThumbnailSettings {
        ThumbnailSettings {
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            protocol: other.protocol.or(self.protocol),
            colored: other.colored.or(self.colored),
            cache_capacity: other.cache_capacity.or(self.cache_capacity),
            eviction: other.eviction.or(self.eviction),
            dither: other.dither.or(self.dither),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == Some(0) {
            return Err(anyhow!("width must be greater than zero"));
        }
        if self.height == Some(0) {
            return Err(anyhow!("height must be greater than zero"));
        }
        if self.cache_capacity == Some(0) {
            return Err(anyhow!("cache_capacity must be greater than zero"));
        }
        Ok(())
    }

    /// Apply `TERMTHUMB_PROTOCOL` and `TERMTHUMB_CACHE_CAPACITY`
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(env_names::FORCE_PROTOCOL) {
            match value.parse::<GraphicsProtocol>() {
                Ok(protocol) => self.protocol = Some(protocol),
                Err(e) => log::warn!("Ignoring {}: {}", env_names::FORCE_PROTOCOL, e),
            }
        }

        if let Ok(value) = std::env::var(env_names::CACHE_CAPACITY) {
            let capacity = value.trim().parse::<usize>().with_context(|| {
                format!("{} must be a positive integer, got '{}'", env_names::CACHE_CAPACITY, value)
            })?;
            self.cache_capacity = Some(capacity);
        }

        self.validate()?;
        Ok(self)
    }

    /// Render configuration, using `fallback_protocol` when none is set
    pub fn render_config(&self, fallback_protocol: GraphicsProtocol) -> RenderConfig {
        let default = RenderConfig::default();
        RenderConfig::new(
            self.width.unwrap_or(default.width()),
            self.height.unwrap_or(default.height()),
            self.protocol.unwrap_or(fallback_protocol),
            self.colored.unwrap_or(default.colored),
        )
    }

    pub fn capacity(&self) -> usize {
        self.cache_capacity.unwrap_or(defaults::CACHE_CAPACITY)
    }

    pub fn dithering(&self) -> bool {
        self.dither.unwrap_or(true)
    }

    pub fn eviction_policy(&self) -> Box<dyn EvictionPolicy> {
        match self.eviction.unwrap_or_default() {
            EvictionKind::Clear => Box::new(ClearOnOverflow),
            EvictionKind::Lru => Box::new(LeastRecentlyUsed::new()),
        }
    }
}
