// src/system.rs

//! Host system identification
//!
//! The distribution id, its release and the package architecture come from
//! external tools (`lsb_release`, `dpkg`, `uname`). Values outside the fixed
//! allow-lists stop the run.

use crate::error::{Error, Result};
use crate::process::{StepCommand, StepRunner, check_file_exists};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Step name used in logs and errors
pub const STEP_SYSTEM_INFO: &str = "get system info";

/// Supported distributions, as reported by `lsb_release -is`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    CentOs,
    Ubuntu,
    RedHatEnterprise,
    RedHatEnterpriseWorkstation,
    Suse,
}

impl Distribution {
    /// Every supported distribution, in allow-list order
    pub fn all() -> &'static [Distribution] {
        &[
            Self::CentOs,
            Self::Ubuntu,
            Self::RedHatEnterprise,
            Self::RedHatEnterpriseWorkstation,
            Self::Suse,
        ]
    }

    /// Distribution id string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CentOs => "CentOS",
            Self::Ubuntu => "Ubuntu",
            Self::RedHatEnterprise => "RedHatEnterprise",
            Self::RedHatEnterpriseWorkstation => "RedHatEnterpriseWorkstation",
            Self::Suse => "SUSE",
        }
    }

    /// Whether the distribution uses dpkg
    pub fn is_debian_family(&self) -> bool {
        matches!(self, Self::Ubuntu)
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Invalid Distribution ID: {}. Supported values are {}",
                    s,
                    allow_list(Self::all().iter().map(Self::as_str))
                ))
            })
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported package architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    Amd64,
    Ppc64le,
    Ppc64,
}

impl Architecture {
    pub fn all() -> &'static [Architecture] {
        &[Self::X86_64, Self::Amd64, Self::Ppc64le, Self::Ppc64]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Amd64 => "amd64",
            Self::Ppc64le => "ppc64le",
            Self::Ppc64 => "ppc64",
        }
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Invalid architecture: {}. Supported values are {}",
                    s,
                    allow_list(Self::all().iter().map(Self::as_str))
                ))
            })
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn allow_list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    format!("[{}]", values.collect::<Vec<_>>().join(", "))
}

/// Validated host information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub distribution: Distribution,
    /// Distribution release, e.g. `22.04`
    pub release: String,
    pub arch: Architecture,
}

impl SystemInfo {
    /// Validate raw tool output against the allow-lists
    pub fn from_raw(dist_id: &str, release: &str, arch: &str) -> Result<Self> {
        let distribution: Distribution = dist_id.parse()?;
        let arch: Architecture = arch.parse()?;
        Ok(Self {
            distribution,
            release: release.to_string(),
            arch,
        })
    }
}

/// Source of host information
///
/// Probes run their commands through the caller's runner so the output
/// lands in the run's log directory.
pub trait SystemProbe {
    fn probe(&self, runner: &StepRunner) -> Result<SystemInfo>;
}

/// Probe that asks `lsb_release` and `dpkg`/`uname`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandProbe;

fn first_line_of(runner: &StepRunner, command: StepCommand) -> Result<String> {
    let output = runner.run(STEP_SYSTEM_INFO, &command)?;
    check_file_exists(&output.log)?;
    output.first_line()
}

impl SystemProbe for CommandProbe {
    fn probe(&self, runner: &StepRunner) -> Result<SystemInfo> {
        info!("Get distribution ID");
        let dist_id = first_line_of(
            runner,
            StepCommand::new("lsb_release", "lsb_release_is.log").arg("-is"),
        )?;
        let distribution: Distribution = dist_id.parse()?;
        info!("Current distribution ID: {}", distribution);

        let release = first_line_of(
            runner,
            StepCommand::new("lsb_release", "lsb_release_rs.log").arg("-rs"),
        )?;

        // rpm systems have no dpkg; the machine name is the package arch there
        let arch = if distribution.is_debian_family() {
            first_line_of(
                runner,
                StepCommand::new("dpkg", "dpkg_print_arch.log").arg("--print-architecture"),
            )?
        } else {
            first_line_of(runner, StepCommand::new("uname", "uname_m.log").arg("-m"))?
        };

        SystemInfo::from_raw(distribution.as_str(), &release, &arch)
    }
}
