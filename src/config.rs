//! Configuration loaded from `foldrun.toml`.
//!
//! [`Config`] holds every deployment-specific path and tool parameter.
//! Values absent from the file fall back to sensible defaults. A handful of
//! environment variables take precedence over the file so deployments can
//! relocate data without editing it.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Top-level configuration for the job supervisor.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root under which per-job inputs, outputs and logs live.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub alphafold: AlphaFoldConfig,

    #[serde(default)]
    pub proteinmpnn: ProteinMpnnConfig,
}

/// Settings for the containerized AlphaFold pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct AlphaFoldConfig {
    /// Container image to run.
    #[serde(default = "default_af_image")]
    pub image: String,

    /// Root of the pre-staged reference databases.
    #[serde(default = "default_af_db_dir")]
    pub db_dir: PathBuf,

    /// Pass `--gpus all` to the container runtime.
    #[serde(default = "default_true")]
    pub use_gpu: bool,

    /// Value for docker `--shm-size`.
    #[serde(default = "default_shm_size")]
    pub shm_size: String,

    /// Value for the `JAX_PLATFORM_NAME` container env var.
    #[serde(default = "default_jax_platform")]
    pub jax_platform: String,
}

/// Settings for the direct ProteinMPNN script invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProteinMpnnConfig {
    /// Python interpreter used to run the script.
    #[serde(default = "default_mpnn_python")]
    pub python: String,

    /// Path to `protein_mpnn_run.py`.
    #[serde(default = "default_mpnn_script")]
    pub script: PathBuf,

    /// Directory holding the vanilla model weights.
    #[serde(default = "default_mpnn_weights")]
    pub weights_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data/appjobs")
}

fn default_af_image() -> String {
    "alphafold:cuda12jax".to_string()
}

fn default_af_db_dir() -> PathBuf {
    PathBuf::from("/data/af_download_data")
}

fn default_true() -> bool {
    true
}

fn default_shm_size() -> String {
    "16g".to_string()
}

fn default_jax_platform() -> String {
    "cuda".to_string()
}

fn default_mpnn_python() -> String {
    "python3".to_string()
}

fn default_mpnn_script() -> PathBuf {
    PathBuf::from("/data/tools/proteinmpnn_official/protein_mpnn_run.py")
}

fn default_mpnn_weights() -> PathBuf {
    PathBuf::from("/data/tools/proteinmpnn_official/vanilla_model_weights")
}

impl Default for AlphaFoldConfig {
    fn default() -> Self {
        Self {
            image: default_af_image(),
            db_dir: default_af_db_dir(),
            use_gpu: default_true(),
            shm_size: default_shm_size(),
            jax_platform: default_jax_platform(),
        }
    }
}

impl Default for ProteinMpnnConfig {
    fn default() -> Self {
        Self {
            python: default_mpnn_python(),
            script: default_mpnn_script(),
            weights_dir: default_mpnn_weights(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            alphafold: AlphaFoldConfig::default(),
            proteinmpnn: ProteinMpnnConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `foldrun.toml` in the current directory.
    /// Falls back to defaults if the file does not exist, then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("foldrun.toml"))
    }

    /// Load configuration from an explicit path, applying environment
    /// overrides afterwards.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    // Environment variables win over the file for deployment paths.
    fn apply_env(&mut self) {
        if let Some(v) = non_empty_env("FOLDRUN_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env("AF_IMAGE") {
            self.alphafold.image = v;
        }
        if let Some(v) = non_empty_env("AF_DB_DIR") {
            self.alphafold.db_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env("MPNN_PYTHON") {
            self.proteinmpnn.python = v;
        }
        if let Some(v) = non_empty_env("MPNN_SCRIPT") {
            self.proteinmpnn.script = PathBuf::from(v);
        }
        if let Some(v) = non_empty_env("MPNN_WEIGHTS_DIR") {
            self.proteinmpnn.weights_dir = PathBuf::from(v);
        }
    }

    /// Per-job input trees live under this directory.
    pub fn input_base(&self) -> PathBuf {
        self.data_dir.join("inputs")
    }

    /// Per-job output trees live under this directory.
    pub fn output_base(&self) -> PathBuf {
        self.data_dir.join("outputs")
    }

    /// Combined job logs (and their sentinel exit files) live here.
    pub fn log_base(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}
