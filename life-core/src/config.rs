//! # Configuration - Run Parameters
//!
//! Everything a run needs beyond the pattern itself: where to find the
//! pattern and kernels, which backend to use, and how big the view is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LifeError, LifeResult};

/// Master configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    /// Pattern file settings
    pub pattern: PatternConfig,

    /// Kernel source settings
    pub kernels: KernelConfig,

    /// Compute backend preference
    pub compute: ComputeConfig,

    /// View settings
    pub view: ViewConfig,

    /// Run length
    pub simulation: SimulationConfig,
}

/// Pattern file location
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// RLE file to seed the grid from
    pub path: PathBuf,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("samples/glider_gun.rle"),
        }
    }
}

/// Kernel source location
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// WGSL file to compile instead of the embedded kernels
    pub path: Option<PathBuf>,
}

/// Compute backend configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Preferred backend
    pub backend: ComputeBackendType,

    /// Rank discrete GPUs above integrated ones
    pub prefer_discrete: bool,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: ComputeBackendType::Auto,
            prefer_discrete: true,
        }
    }
}

/// Available compute backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeBackendType {
    /// GPU if an adapter exists, otherwise CPU
    Auto,
    /// Single-threaded reference backend
    Cpu,
    /// GPU with wgpu
    Gpu,
}

impl std::str::FromStr for ComputeBackendType {
    type Err = LifeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            other => Err(LifeError::config(format!(
                "unknown backend '{}' (expected auto, cpu or gpu)",
                other
            ))),
        }
    }
}

/// View extent in cells
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Visible columns (headless runs; the terminal size wins in visual mode)
    pub width: u32,

    /// Visible rows
    pub height: u32,

    /// Tick period in visual mode (milliseconds)
    pub frame_interval_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            frame_interval_ms: 16,
        }
    }
}

/// Run length
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Stop after this many generations; `None` runs until quit
    pub generations: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            generations: Some(100),
        }
    }
}

impl LifeConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> LifeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| LifeError::Serialization(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> LifeResult<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| LifeError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - LIFE_PATTERN: RLE file (default: samples/glider_gun.rle)
    /// - LIFE_KERNELS: WGSL kernel file (default: embedded)
    /// - LIFE_BACKEND: "auto", "cpu" or "gpu" (default: auto)
    /// - LIFE_VIEW_WIDTH / LIFE_VIEW_HEIGHT: view extent (default: 512)
    /// - LIFE_GENERATIONS: generation cap (default: 100)
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("LIFE_PATTERN") {
            self.pattern.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("LIFE_KERNELS") {
            self.kernels.path = Some(PathBuf::from(path));
        }
        if let Some(val) = lookup("LIFE_BACKEND") {
            match val.parse() {
                Ok(backend) => self.compute.backend = backend,
                Err(e) => tracing::warn!("Ignoring LIFE_BACKEND: {}", e),
            }
        }
        if let Some(v) = lookup("LIFE_VIEW_WIDTH").and_then(|s| s.parse().ok()) {
            self.view.width = v;
        }
        if let Some(v) = lookup("LIFE_VIEW_HEIGHT").and_then(|s| s.parse().ok()) {
            self.view.height = v;
        }
        if let Some(v) = lookup("LIFE_GENERATIONS").and_then(|s| s.parse().ok()) {
            self.simulation.generations = Some(v);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LifeConfig::default();
        assert_eq!(config.pattern.path, PathBuf::from("samples/glider_gun.rle"));
        assert!(config.kernels.path.is_none());
        assert_eq!(config.compute.backend, ComputeBackendType::Auto);
        assert_eq!((config.view.width, config.view.height), (512, 512));
        assert_eq!(config.simulation.generations, Some(100));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LIFE_PATTERN", "glider.rle"),
            ("LIFE_BACKEND", "CPU"),
            ("LIFE_VIEW_WIDTH", "80"),
            ("LIFE_GENERATIONS", "7"),
            ("LIFE_VIEW_HEIGHT", "not a number"),
        ]
        .into_iter()
        .collect();

        let config = LifeConfig::default().with_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.pattern.path, PathBuf::from("glider.rle"));
        assert_eq!(config.compute.backend, ComputeBackendType::Cpu);
        assert_eq!(config.view.width, 80);
        assert_eq!(config.view.height, 512);
        assert_eq!(config.simulation.generations, Some(7));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: LifeConfig =
            serde_json::from_str(r#"{ "compute": { "backend": "Gpu" } }"#).unwrap();
        assert_eq!(config.compute.backend, ComputeBackendType::Gpu);
        assert!(config.compute.prefer_discrete);
        assert_eq!(config.view.width, 512);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("life-config-{}.json", std::process::id()));
        let mut config = LifeConfig::default();
        config.view.width = 64;
        config.simulation.generations = None;
        config.save(&path).unwrap();

        let loaded = LifeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.view.width, 64);
        assert_eq!(loaded.simulation.generations, None);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("gpu".parse::<ComputeBackendType>().unwrap(), ComputeBackendType::Gpu);
        assert!("tpu".parse::<ComputeBackendType>().is_err());
    }
}
