// src/config.rs

//! Build configuration
//!
//! Defaults reproduce the stock packaging. An optional TOML file can
//! override any of them:
//!
//! ```toml
//! template_dir = "scripts/pkg_data"
//!
//! [vendor]
//! name = "xilinx"
//! full = "Xilinx Inc"
//! email = "support@xilinx.com"
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Package vendor identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vendor {
    /// Short name, used as the changelog distribution tag
    pub name: String,
    /// Full name, used as maintainer
    pub full: String,
    /// Contact email
    pub email: String,
}

impl Default for Vendor {
    fn default() -> Self {
        Self {
            name: "xilinx".to_string(),
            full: "Xilinx Inc".to_string(),
            email: "support@xilinx.com".to_string(),
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub vendor: Vendor,

    /// Scriptlet templates and dkms.conf, relative to the project root
    pub template_dir: PathBuf,

    /// Generated version header, relative to the project root
    pub version_header: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            vendor: Vendor::default(),
            template_dir: PathBuf::from("scripts/pkg_data"),
            version_header: PathBuf::from("api/build/ami_version.h"),
        }
    }
}

impl BuildConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Template directory resolved against the project root
    pub fn template_dir_in(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.template_dir)
    }

    /// Version header resolved against the project root
    pub fn version_header_in(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.version_header)
    }
}
