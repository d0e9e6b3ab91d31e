// src/lib.rs

//! drvpkg: Debian packages for the AMI kernel driver and its tool
//!
//! Builds two package flavors from one project checkout:
//!
//! - `ami`: driver sources and headers, built on the target by DKMS
//! - `amitool`: the `ami_tool` user-space binary
//!
//! # Architecture
//!
//! - Pure builders: version extraction, scriptlet rendering, control and
//!   changelog text are plain functions over owned data
//! - One assembler: a state machine driven by a per-flavor manifest
//! - Collaborators at the seams: host probing and archiving are traits, so
//!   the whole pipeline runs in tests without `lsb_release` or `dpkg-deb`

pub mod archive;
pub mod assembler;
pub mod changelog;
pub mod config;
pub mod control;
mod error;
pub mod flavor;
pub mod layout;
pub mod pkgconfig;
pub mod process;
pub mod scriptlet;
pub mod system;
pub mod version;

pub use archive::{Archiver, DpkgDeb};
pub use assembler::{AssembleOptions, AssemblyState, PackageAssembler, PackageOutput};
pub use config::{BuildConfig, Vendor};
pub use control::PackageDescriptor;
pub use error::{Error, Result, StepError};
pub use flavor::{Flavor, FlavorManifest, StepOptions};
pub use system::{Architecture, CommandProbe, Distribution, SystemInfo, SystemProbe};
pub use version::VersionInfo;
