// src/flavor.rs

//! Package flavors
//!
//! A flavor is everything that differs between the kernel driver source
//! package and the user-space tool package: name, dependency and conflict
//! lists, which scriptlets ship, the pre-build steps that must succeed before
//! staging, the descriptor text, the payload and the pkg-config module.
//! The assembler is the same for both; it is handed a [`FlavorManifest`].

use crate::config::Vendor;
use crate::control::PackageDescriptor;
use crate::error::Result;
use crate::layout::{FileMapping, StagingLayout, map_driver_sources, map_headers};
use crate::pkgconfig::PkgConfig;
use crate::process::StepCommand;
use crate::scriptlet::ScriptletKind;
use crate::system::SystemInfo;
use crate::version::VersionInfo;
use std::fmt;
use std::path::{Path, PathBuf};

/// Driver flavor package name
pub const DRIVER_PACKAGE: &str = "ami";
/// Tool flavor package name
pub const TOOL_PACKAGE: &str = "amitool";
/// Tool binary name, relative to `app/build`
pub const TOOL_BINARY: &str = "ami_tool";

const DRIVER_DEPENDENCIES: [&str; 7] = [
    "libc6",
    "gcc",
    "make",
    "dkms",
    "grep",
    "gawk",
    "linux-headers",
];
const TOOL_DEPENDENCIES: [&str; 3] = ["libc6", "grep", "gawk"];

/// Which package is being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Driver,
    Tool,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pre-build steps to skip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOptions {
    /// Do not run the version generation scripts
    pub skip_version_generation: bool,
    /// Do not run the driver compile check (driver flavor only)
    pub skip_driver_build: bool,
}

/// One pre-build step and the file it must leave behind
#[derive(Debug, Clone)]
pub struct BuildStep {
    /// Step name for logs and errors
    pub name: String,
    pub command: StepCommand,
    /// Expected output, relative to the project root
    pub expected: Option<PathBuf>,
}

impl BuildStep {
    pub fn new(name: impl Into<String>, command: StepCommand) -> Self {
        Self {
            name: name.into(),
            command,
            expected: None,
        }
    }

    pub fn expecting(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected = Some(path.into());
        self
    }
}

/// A file to stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEntry {
    /// Copied byte for byte, permissions preserved
    Copy(FileMapping),
    /// dkms.conf template, staged with its version token replaced
    DkmsConf(FileMapping),
}

impl PayloadEntry {
    pub fn mapping(&self) -> &FileMapping {
        match self {
            Self::Copy(m) | Self::DkmsConf(m) => m,
        }
    }
}

/// Everything flavor-specific the assembler needs
#[derive(Debug, Clone)]
pub struct FlavorManifest {
    flavor: Flavor,
    name: String,
    pc_module: String,
    dependencies: Vec<String>,
    conflicts: Vec<String>,
    scriptlets: Vec<ScriptletKind>,
    build_steps: Vec<BuildStep>,
}

impl FlavorManifest {
    /// Manifest for `flavor` with its stock build steps
    pub fn for_flavor(flavor: Flavor, project_root: &Path, options: StepOptions) -> Self {
        match flavor {
            Flavor::Driver => Self::driver(project_root, options),
            Flavor::Tool => Self::tool(project_root, options),
        }
    }

    /// Kernel driver source package, installed through DKMS
    pub fn driver(project_root: &Path, options: StepOptions) -> Self {
        let mut steps = Vec::new();
        if !options.skip_version_generation {
            steps.push(ami_version_step(project_root));
            steps.push(
                BuildStep::new(
                    "get GCQ version",
                    StepCommand::shell("./getVersion.sh gcq", "getVersion_gcq.log")
                        .dir(&project_root.join("driver/gcq-driver")),
                )
                .expecting("driver/gcq-driver/src/gcq_version.h"),
            );
        }
        if !options.skip_driver_build {
            steps.push(
                BuildStep::new(
                    "driver compilation confidence check",
                    StepCommand::shell("cd driver && make clean && make", "driver_make.log")
                        .dir(project_root),
                )
                .expecting("driver/ami.ko"),
            );
            steps.push(BuildStep::new(
                "clean driver",
                StepCommand::shell("cd driver && make clean", "driver_make_clean.log")
                    .dir(project_root),
            ));
        }

        Self {
            flavor: Flavor::Driver,
            name: DRIVER_PACKAGE.to_string(),
            pc_module: DRIVER_PACKAGE.to_string(),
            dependencies: DRIVER_DEPENDENCIES.iter().map(|d| d.to_string()).collect(),
            conflicts: Vec::new(),
            scriptlets: vec![
                ScriptletKind::PostInstall,
                ScriptletKind::PreRemove,
                ScriptletKind::PreInstall,
            ],
            build_steps: steps,
        }
    }

    /// User-space tool package
    pub fn tool(project_root: &Path, options: StepOptions) -> Self {
        let mut steps = Vec::new();
        if !options.skip_version_generation {
            steps.push(ami_version_step(project_root));
        }
        steps.push(
            BuildStep::new(
                "build AMI library",
                StepCommand::shell("cd api && make clean && make", "api_make.log")
                    .dir(project_root),
            )
            .expecting("api/build/libami.so"),
        );
        steps.push(
            BuildStep::new(
                "build ami_tool",
                StepCommand::shell("cd app && make clean && make PROFILE=RAVE", "app_make.log")
                    .dir(project_root),
            )
            .expecting(Path::new("app/build").join(TOOL_BINARY)),
        );

        Self {
            flavor: Flavor::Tool,
            name: TOOL_PACKAGE.to_string(),
            pc_module: TOOL_BINARY.to_string(),
            dependencies: TOOL_DEPENDENCIES.iter().map(|d| d.to_string()).collect(),
            conflicts: Vec::new(),
            scriptlets: vec![ScriptletKind::PreInstall],
            build_steps: steps,
        }
    }

    /// Replace the pre-build steps
    pub fn with_build_steps(mut self, steps: Vec<BuildStep>) -> Self {
        self.build_steps = steps;
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// pkg-config module name, the `.pc` file stem
    pub fn pc_module(&self) -> &str {
        &self.pc_module
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    /// Scriptlets shipped, in the order they are rendered
    pub fn scriptlets(&self) -> &[ScriptletKind] {
        &self.scriptlets
    }

    pub fn build_steps(&self) -> &[BuildStep] {
        &self.build_steps
    }

    /// Build this flavor's descriptor
    pub fn descriptor(
        &self,
        version: &VersionInfo,
        release_suffix: &str,
        system: &SystemInfo,
        vendor: &Vendor,
        build_date_short: &str,
    ) -> PackageDescriptor {
        let kind = match self.flavor {
            Flavor::Driver => format!("{} driver package", self.name),
            Flavor::Tool => format!("{} package", self.name),
        };

        PackageDescriptor::builder(&self.name, version.version(), version.release(release_suffix))
            .summary(kind.clone())
            .description_line(format!("{} {}.", vendor.full, kind))
            .description_line(format!("Built on {}.", build_date_short))
            .description_line(format!(
                "Built with {} version {} and architecture {}.",
                system.distribution, system.release, system.arch
            ))
            .changelog_line(format!("{}. Built on {}.", kind, build_date_short))
            .dependencies(self.dependencies.iter().cloned())
            .conflicts(self.conflicts.iter().cloned())
            .maintainer(vendor.full.clone())
            .build()
    }

    /// Payload for this flavor, relative to the staging root
    ///
    /// Mapping only; nothing is copied here. Fails if a source tree or a
    /// single required file is absent.
    pub fn payload(
        &self,
        project_root: &Path,
        template_dir: &Path,
        layout: &StagingLayout,
    ) -> Result<Vec<PayloadEntry>> {
        let mut entries = Vec::new();
        match self.flavor {
            Flavor::Driver => {
                let src_dir = layout.usr_src_dir();
                entries.extend(
                    map_driver_sources(project_root, &src_dir)?
                        .into_iter()
                        .map(PayloadEntry::Copy),
                );
                entries.push(PayloadEntry::Copy(FileMapping::new(
                    project_root.join("driver/Makefile"),
                    src_dir.join("driver/Makefile"),
                )));
                entries.push(PayloadEntry::DkmsConf(FileMapping::new(
                    template_dir.join("dkms.conf"),
                    src_dir.join("dkms.conf"),
                )));
                entries.extend(
                    map_headers(project_root, &layout.usr_include_dir())?
                        .into_iter()
                        .map(PayloadEntry::Copy),
                );
            }
            Flavor::Tool => {
                entries.push(PayloadEntry::Copy(FileMapping::new(
                    project_root.join("app/build").join(TOOL_BINARY),
                    layout.usr_bin_dir().join(TOOL_BINARY),
                )));
            }
        }
        Ok(entries)
    }

    /// pkg-config module for this flavor
    pub fn pkg_config(&self, descriptor: &PackageDescriptor, layout: &StagingLayout) -> PkgConfig {
        let pc = PkgConfig::for_package(descriptor);
        match self.flavor {
            Flavor::Driver => pc
                .variable("includedir", format!("/{}", layout.usr_include_dir().display()))
                .cflags("-I${includedir}"),
            Flavor::Tool => pc.variable("bindir", format!("/{}", layout.usr_bin_dir().display())),
        }
    }
}

fn ami_version_step(project_root: &Path) -> BuildStep {
    BuildStep::new(
        "get AMI version",
        StepCommand::shell("./scripts/getVersion.sh ami", "getVersion_ami.log").dir(project_root),
    )
    .expecting("api/include/ami_version.h.in")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{Architecture, Distribution};

    fn system() -> SystemInfo {
        SystemInfo {
            distribution: Distribution::Ubuntu,
            release: "22.04".to_string(),
            arch: Architecture::Amd64,
        }
    }

    fn version() -> VersionInfo {
        VersionInfo::extract(
            "#define GIT_TAG \"1.2.3\"\n\
             #define GIT_TAG_VER_DEV_COMMITS (7)\n\
             #define GIT_HASH \"abcdef1234567890\"\n",
        )
    }

    #[test]
    fn test_driver_manifest() {
        let manifest = FlavorManifest::driver(Path::new("/proj"), StepOptions::default());
        assert_eq!(manifest.name(), "ami");
        assert_eq!(manifest.dependencies().len(), 7);
        assert!(manifest.conflicts().is_empty());
        assert_eq!(
            manifest.scriptlets(),
            &[
                ScriptletKind::PostInstall,
                ScriptletKind::PreRemove,
                ScriptletKind::PreInstall
            ]
        );
        let names: Vec<_> = manifest.build_steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "get AMI version",
                "get GCQ version",
                "driver compilation confidence check",
                "clean driver"
            ]
        );
    }

    #[test]
    fn test_skip_flags() {
        let options = StepOptions {
            skip_version_generation: true,
            skip_driver_build: true,
        };
        assert!(FlavorManifest::driver(Path::new("/proj"), options).build_steps().is_empty());

        // the tool binary is always built
        let tool = FlavorManifest::tool(Path::new("/proj"), options);
        assert_eq!(tool.build_steps().len(), 2);
        assert_eq!(
            tool.build_steps()[1].expected.as_deref(),
            Some(Path::new("app/build/ami_tool"))
        );
    }

    #[test]
    fn test_driver_descriptor() {
        let manifest = FlavorManifest::driver(Path::new("/proj"), StepOptions::default());
        let d = manifest.descriptor(
            &version(),
            "20250101",
            &system(),
            &Vendor::default(),
            "Wed Jan 01 2025",
        );
        assert_eq!(d.full_version(), "1.2.3-7.abcdef12.20250101");
        assert_eq!(d.summary(), "ami driver package");
        assert_eq!(
            d.description(),
            &[
                "Xilinx Inc ami driver package.".to_string(),
                "Built on Wed Jan 01 2025.".to_string(),
                "Built with Ubuntu version 22.04 and architecture amd64.".to_string(),
            ]
        );
        assert_eq!(d.changelog(), &["ami driver package. Built on Wed Jan 01 2025.".to_string()]);
        assert_eq!(d.maintainer(), "Xilinx Inc");
    }

    #[test]
    fn test_tool_descriptor() {
        let manifest = FlavorManifest::tool(Path::new("/proj"), StepOptions::default());
        let d = manifest.descriptor(
            &version(),
            "1",
            &system(),
            &Vendor::default(),
            "Wed Jan 01 2025",
        );
        assert_eq!(d.name(), "amitool");
        assert_eq!(d.description()[0], "Xilinx Inc amitool package.");
        assert_eq!(d.dependencies(), &["libc6", "grep", "gawk"]);
    }

    #[test]
    fn test_tool_payload() {
        let manifest = FlavorManifest::tool(Path::new("/proj"), StepOptions::default());
        let layout = StagingLayout::new("amitool", "1.2.3", Distribution::Ubuntu);
        let payload = manifest
            .payload(Path::new("/proj"), Path::new("/proj/scripts/pkg_data"), &layout)
            .unwrap();
        assert_eq!(
            payload,
            vec![PayloadEntry::Copy(FileMapping::new(
                "/proj/app/build/ami_tool",
                "usr/local/bin/ami_tool"
            ))]
        );
    }

    #[test]
    fn test_driver_payload() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in ["driver/ami.c", "driver/Makefile", "api/include/ami.h"] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, rel).unwrap();
        }
        let manifest = FlavorManifest::driver(root, StepOptions::default());
        let layout = StagingLayout::new("ami", "1.2.3", Distribution::Ubuntu);
        let payload = manifest
            .payload(root, &root.join("scripts/pkg_data"), &layout)
            .unwrap();

        let dests: Vec<_> = payload.iter().map(|e| e.mapping().dest.clone()).collect();
        assert_eq!(
            dests,
            vec![
                PathBuf::from("usr/src/ami-1.2.3/driver/ami.c"),
                PathBuf::from("usr/src/ami-1.2.3/driver/Makefile"),
                PathBuf::from("usr/src/ami-1.2.3/dkms.conf"),
                PathBuf::from("usr/include/ami/ami.h"),
            ]
        );
        assert!(matches!(payload[2], PayloadEntry::DkmsConf(_)));
    }

    #[test]
    fn test_pkg_config() {
        let layout = StagingLayout::new("ami", "1.2.3", Distribution::Ubuntu);
        let manifest = FlavorManifest::driver(Path::new("/proj"), StepOptions::default());
        let d = manifest.descriptor(
            &version(),
            "1",
            &system(),
            &Vendor::default(),
            "Wed Jan 01 2025",
        );
        let text = manifest.pkg_config(&d, &layout).render();
        assert!(text.starts_with("includedir=/usr/include/ami\n"));
        assert!(text.contains("Cflags: -I${includedir}"));

        let tool = FlavorManifest::tool(Path::new("/proj"), StepOptions::default());
        let text = tool.pkg_config(&d, &layout).render();
        assert!(text.starts_with("bindir=/usr/local/bin\n"));
    }

    #[test]
    fn test_pc_module_names() {
        let driver = FlavorManifest::driver(Path::new("/proj"), StepOptions::default());
        assert_eq!(driver.pc_module(), "ami");

        let tool = FlavorManifest::tool(Path::new("/proj"), StepOptions::default());
        assert_eq!(tool.name(), "amitool");
        assert_eq!(tool.pc_module(), "ami_tool");
    }
}
