// src/control.rs

//! Package descriptor and DEBIAN/ control metadata
//!
//! The control file grammar wants one `Key: value` field per line, with
//! multi-line values continued on lines starting with a single space.

use crate::error::Result;
use crate::layout::FileMapping;
use crate::system::Architecture;
use md5::{Digest, Md5};
use std::fs;
use std::path::Path;

/// Default control `Priority`
pub const DEFAULT_PRIORITY: &str = "optional";
/// Default control `Section`
pub const DEFAULT_SECTION: &str = "devel";

/// Immutable description of one package
///
/// Built once per flavor; each flavor owns its own instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    name: String,
    version: String,
    release: String,
    summary: String,
    description: Vec<String>,
    changelog: Vec<String>,
    dependencies: Vec<String>,
    conflicts: Vec<String>,
    maintainer: String,
    section: String,
    priority: String,
}

impl PackageDescriptor {
    /// Start building a descriptor
    pub fn builder(
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
    ) -> PackageDescriptorBuilder {
        let name = name.into();
        PackageDescriptorBuilder {
            descriptor: PackageDescriptor {
                summary: format!("{} package", name),
                name,
                version: version.into(),
                release: release.into(),
                description: Vec::new(),
                changelog: Vec::new(),
                dependencies: Vec::new(),
                conflicts: Vec::new(),
                maintainer: String::new(),
                section: DEFAULT_SECTION.to_string(),
                priority: DEFAULT_PRIORITY.to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    /// `version-release`, as used in the control file and changelog
    pub fn full_version(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn description(&self) -> &[String] {
        &self.description
    }

    pub fn changelog(&self) -> &[String] {
        &self.changelog
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    pub fn maintainer(&self) -> &str {
        &self.maintainer
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn priority(&self) -> &str {
        &self.priority
    }

    /// `<name>_<version>-<release>_<arch>`: staging dir and `.deb` stem
    pub fn package_stem(&self, arch: Architecture) -> String {
        format!("{}_{}_{}", self.name, self.full_version(), arch)
    }
}

/// Builder for [`PackageDescriptor`]
#[derive(Debug, Clone)]
pub struct PackageDescriptorBuilder {
    descriptor: PackageDescriptor,
}

impl PackageDescriptorBuilder {
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.descriptor.summary = summary.into();
        self
    }

    pub fn description_line(mut self, line: impl Into<String>) -> Self {
        self.descriptor.description.push(line.into());
        self
    }

    pub fn changelog_line(mut self, line: impl Into<String>) -> Self {
        self.descriptor.changelog.push(line.into());
        self
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn conflicts<I, S>(mut self, conflicts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.conflicts.extend(conflicts.into_iter().map(Into::into));
        self
    }

    pub fn maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.descriptor.maintainer = maintainer.into();
        self
    }

    pub fn build(self) -> PackageDescriptor {
        self.descriptor
    }
}

/// Render the DEBIAN/control file
pub fn render_control(descriptor: &PackageDescriptor, arch: Architecture) -> String {
    let mut fields = vec![
        format!("Package: {}", descriptor.name()),
        format!("Architecture: {}", arch),
        format!("Version: {}", descriptor.full_version()),
        format!("Priority: {}", descriptor.priority()),
        format!("Description: {}", descriptor.description().join("\n ")),
        format!("Maintainer: {}", descriptor.maintainer()),
        format!("Section: {}", descriptor.section()),
    ];

    if !descriptor.dependencies().is_empty() {
        fields.push(format!("Depends: {}", descriptor.dependencies().join(", ")));
    }
    if !descriptor.conflicts().is_empty() {
        fields.push(format!("Conflicts: {}", descriptor.conflicts().join(", ")));
    }

    // dpkg-deb rejects a control file without a final newline
    fields.push(String::new());
    fields.join("\n")
}

/// Render DEBIAN/md5sums for staged payload files
///
/// Hashes the copies inside `staging_root`, so whatever was rewritten during
/// staging (e.g. `dkms.conf`) is hashed as shipped.
pub fn render_md5sums(staging_root: &Path, mappings: &[FileMapping]) -> Result<String> {
    let mut out = String::new();
    for mapping in mappings {
        let content = fs::read(staging_root.join(&mapping.dest))?;
        out.push_str(&format!(
            "{}  {}\n",
            compute_md5(&content),
            mapping.dest.display()
        ));
    }
    Ok(out)
}

/// Compute MD5 hash of content (for md5sums file)
fn compute_md5(content: &[u8]) -> String {
    let hash = Md5::digest(content);
    format!("{:x}", hash)
}
