// src/archive.rs

//! Final archive creation
//!
//! The staging tree is turned into a `.deb` by an [`Archiver`]. The stock
//! implementation shells out to `dpkg-deb`; tests substitute their own.

use crate::error::{Error, Result};
use crate::process::{StepCommand, StepRunner};
use std::path::{Path, PathBuf};
use tracing::info;

/// Step name used in logs and errors
pub const STEP_ARCHIVE: &str = "build package";

/// Builds a package archive from a staging tree
pub trait Archiver {
    /// Build `<staging_root>.deb` next to the staging root and return its path
    fn build(&self, runner: &StepRunner, staging_root: &Path) -> Result<PathBuf>;
}

/// Path of the archive built from `staging_root`
///
/// The staging directory name carries dotted versions, so the suffix is
/// appended rather than swapped in with `with_extension`.
pub fn archive_path(staging_root: &Path) -> Result<PathBuf> {
    let name = staging_root
        .file_name()
        .ok_or_else(|| {
            Error::validation(format!(
                "invalid staging root: {}",
                staging_root.display()
            ))
        })?;
    let mut file_name = name.to_os_string();
    file_name.push(".deb");
    Ok(staging_root.with_file_name(file_name))
}

/// `dpkg-deb --build --root-owner-group`
#[derive(Debug, Clone, Copy, Default)]
pub struct DpkgDeb;

impl Archiver for DpkgDeb {
    fn build(&self, runner: &StepRunner, staging_root: &Path) -> Result<PathBuf> {
        let command = StepCommand::new("dpkg-deb", "dpkg-deb.log")
            .args(["--build", "--root-owner-group"])
            .arg(staging_root.to_string_lossy());
        runner.run(STEP_ARCHIVE, &command)?;

        let package = archive_path(staging_root)?;
        info!("Built {}", package.display());
        Ok(package)
    }
}
