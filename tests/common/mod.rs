// tests/common/mod.rs

//! Shared fixtures for assembler integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use drvpkg::archive::archive_path;
use drvpkg::process::StepRunner;
use drvpkg::{
    Archiver, AssembleOptions, BuildConfig, Error, FlavorManifest, PackageAssembler, Result,
    SystemInfo, SystemProbe,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const VERSION_HEADER: &str = "\
#define GIT_BRANCH \"main\"
#define GIT_TAG \"1.2.3-dirty\"
#define GIT_TAG_VER_DEV_COMMITS (7)
#define GIT_HASH \"abcdef1234567890\"
";

pub const SCRIPTLET_TEMPLATE: &str = "\
#!/bin/sh
MODULE_NAME=$1
MODULE_VERSION_STRING=$2
echo \"$MODULE_NAME $MODULE_VERSION_STRING\"
";

pub const DKMS_TEMPLATE: &str = "\
PACKAGE_NAME=\"ami\"
PACKAGE_VERSION=\"@PKGVER@\"
MAKE[0]=\"make -C driver\"
";

/// Probe returning fixed host information
pub struct FakeProbe {
    pub dist: &'static str,
    pub release: &'static str,
    pub arch: &'static str,
}

impl FakeProbe {
    pub fn ubuntu() -> Self {
        Self {
            dist: "Ubuntu",
            release: "22.04",
            arch: "amd64",
        }
    }
}

impl SystemProbe for FakeProbe {
    fn probe(&self, _runner: &StepRunner) -> Result<SystemInfo> {
        SystemInfo::from_raw(self.dist, self.release, self.arch)
    }
}

/// Archiver that writes a placeholder `.deb` next to the staging root
pub struct FakeArchiver;

impl Archiver for FakeArchiver {
    fn build(&self, _runner: &StepRunner, staging_root: &Path) -> Result<PathBuf> {
        assert!(staging_root.join("DEBIAN/control").is_file());
        let package = archive_path(staging_root)?;
        fs::write(&package, b"!<arch>\n")?;
        Ok(package)
    }
}

/// Archiver that fails like a dpkg-deb error
pub struct FailingArchiver;

impl Archiver for FailingArchiver {
    fn build(&self, runner: &StepRunner, staging_root: &Path) -> Result<PathBuf> {
        Err(Error::ExternalCommand {
            step: "build package".to_string(),
            command: format!(
                "dpkg-deb --build --root-owner-group {}",
                staging_root.display()
            ),
            detail: "Unexpected non-zero return code (2)".to_string(),
            log: Some(runner.log_dir().join("dpkg-deb.log")),
        })
    }
}

/// Archiver that reports success without producing anything
pub struct SilentArchiver;

impl Archiver for SilentArchiver {
    fn build(&self, _runner: &StepRunner, staging_root: &Path) -> Result<PathBuf> {
        archive_path(staging_root)
    }
}

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Project checkout with driver sources, headers, templates and a generated
/// version header.
///
/// Returns (TempDir, project_root) - keep the TempDir alive.
pub fn project_tree() -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("project");

    write(&root, "driver/ami_driver.c", "int ami_init(void) { return 0; }\n");
    write(&root, "driver/ami_pcie.h", "#define AMI_BAR 0\n");
    write(&root, "driver/gcq-driver/src/gcq_main.c", "int gcq;\n");
    write(&root, "driver/Makefile", "obj-m += ami.o\n");
    write(&root, "driver/README.md", "not packaged\n");
    write(&root, "api/include/ami.h", "#pragma once\n");
    write(&root, "api/include/ami_device.h", "#pragma once\n");
    write(&root, "api/build/ami_version.h", VERSION_HEADER);
    for name in ["preinst.sh", "postinst.sh", "prerm.sh"] {
        write(&root, &format!("scripts/pkg_data/{}", name), SCRIPTLET_TEMPLATE);
    }
    write(&root, "scripts/pkg_data/dkms.conf", DKMS_TEMPLATE);

    (temp, root)
}

pub fn build_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

pub fn options(project: &Path, output: &Path) -> AssembleOptions {
    AssembleOptions::new(project, output, build_date())
}

pub fn assembler<P: SystemProbe, A: Archiver>(
    manifest: FlavorManifest,
    options: AssembleOptions,
    probe: P,
    archiver: A,
) -> PackageAssembler<P, A> {
    PackageAssembler::with_collaborators(manifest, BuildConfig::new(), options, probe, archiver)
}
