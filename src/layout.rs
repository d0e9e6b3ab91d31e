// src/layout.rs

//! Staging tree layout and source-to-destination path mapping
//!
//! Driver sources keep their directory structure below a versioned source
//! prefix (`usr/src/<name>-<version>`), so DKMS can build them in place.
//! API headers are flattened into a single include directory
//! (`usr/include/<name>`). Flattening can make two headers claim the same
//! destination; [`detect_collisions`] reports those so the payload can be
//! refused instead of silently overwriting one header with another.

use crate::error::{Error, Result};
use crate::system::Distribution;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Driver source tree, relative to the project root
pub const DRIVER_DIR: &str = "driver";
/// Public API header tree, relative to the project root
pub const API_INCLUDE_DIR: &str = "api/include";
/// File extensions packaged from the driver tree
const DRIVER_SOURCE_EXTENSIONS: [&str; 2] = ["c", "h"];

/// A payload file: where it comes from and where it lands
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileMapping {
    /// Absolute path on the build host
    pub source: PathBuf,
    /// Destination relative to the staging root
    pub dest: PathBuf,
}

impl FileMapping {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

/// Walk `root` in file-name order, yielding regular files
///
/// Symlinks to files are included; symlinked directories are not descended.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::MissingSourceTree(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.path().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Map driver `.c`/`.h` files under `<project_root>/driver`
///
/// Destinations are `staging_subdir` joined with the path relative to the
/// project root, so `driver/x/y.c` maps to `<staging_subdir>/driver/x/y.c`.
pub fn map_driver_sources(project_root: &Path, staging_subdir: &Path) -> Result<Vec<FileMapping>> {
    let mut mappings = Vec::new();
    for path in walk_files(&project_root.join(DRIVER_DIR))? {
        let packaged = path
            .extension()
            .is_some_and(|ext| DRIVER_SOURCE_EXTENSIONS.iter().any(|e| ext == *e));
        if !packaged {
            continue;
        }
        let relative = path
            .strip_prefix(project_root)
            .map_err(|_| Error::MissingSourceTree(project_root.to_path_buf()))?;
        mappings.push(FileMapping::new(&path, staging_subdir.join(relative)));
    }
    Ok(mappings)
}

/// Map every file under `<project_root>/api/include` into one flat directory
pub fn map_headers(project_root: &Path, staging_subdir: &Path) -> Result<Vec<FileMapping>> {
    let mut mappings = Vec::new();
    for path in walk_files(&project_root.join(API_INCLUDE_DIR))? {
        if let Some(name) = path.file_name() {
            let dest = staging_subdir.join(name);
            mappings.push(FileMapping::new(path, dest));
        }
    }
    Ok(mappings)
}

/// Destinations claimed by more than one distinct source
///
/// Returns `(dest, sources)` pairs ordered by destination.
pub fn detect_collisions(mappings: &[FileMapping]) -> Vec<(PathBuf, Vec<PathBuf>)> {
    let mut by_dest: BTreeMap<&Path, Vec<PathBuf>> = BTreeMap::new();
    for mapping in mappings {
        let sources = by_dest.entry(mapping.dest.as_path()).or_default();
        if !sources.contains(&mapping.source) {
            sources.push(mapping.source.clone());
        }
    }
    by_dest
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(dest, sources)| (dest.to_path_buf(), sources))
        .collect()
}

/// Fixed destination prefixes inside the staging root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    name: String,
    version: String,
    debian_family: bool,
}

impl StagingLayout {
    pub fn new(name: &str, version: &str, distribution: Distribution) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            debian_family: distribution.is_debian_family(),
        }
    }

    /// Control metadata directory
    pub fn debian_dir(&self) -> PathBuf {
        PathBuf::from("DEBIAN")
    }

    /// Versioned DKMS source directory: `usr/src/<name>-<version>`
    pub fn usr_src_dir(&self) -> PathBuf {
        PathBuf::from(format!("usr/src/{}-{}", self.name, self.version))
    }

    /// Flat header directory: `usr/include/<name>`
    pub fn usr_include_dir(&self) -> PathBuf {
        Path::new("usr/include").join(&self.name)
    }

    /// Tool binaries
    pub fn usr_bin_dir(&self) -> PathBuf {
        PathBuf::from("usr/local/bin")
    }

    /// Package documentation, holds the changelog
    pub fn doc_dir(&self) -> PathBuf {
        Path::new("usr/share/doc").join(&self.name)
    }

    /// pkg-config directory, which differs between dpkg and rpm systems
    pub fn pkg_config_dir(&self) -> PathBuf {
        if self.debian_family {
            PathBuf::from("usr/lib/pkgconfig")
        } else {
            PathBuf::from("usr/share/pkgconfig")
        }
    }

    /// `<pkg_config_dir>/<pc_name>.pc`
    pub fn pkg_config_file(&self, pc_name: &str) -> PathBuf {
        self.pkg_config_dir().join(format!("{}.pc", pc_name))
    }
}
