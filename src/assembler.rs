// src/assembler.rs

//! Package assembly state machine
//!
//! One run walks a fixed sequence of states:
//!
//! ```text
//! Init -> SystemInfoResolved -> VersionResolved -> ScriptletsRendered
//!      -> StagingPopulated -> Archived -> Done
//! ```
//!
//! Any error moves the assembler to `Failed` and is returned together with the
//! name of the step that produced it. There are no retries and nothing is
//! cleaned up after a failure; the output directory is left for inspection.

use crate::archive::{Archiver, DpkgDeb, STEP_ARCHIVE};
use crate::changelog::{self, render_changelog};
use crate::config::BuildConfig;
use crate::control::{PackageDescriptor, render_control, render_md5sums};
use crate::error::{Error, Result, StepError};
use crate::flavor::{BuildStep, FlavorManifest, PayloadEntry};
use crate::layout::{FileMapping, StagingLayout, detect_collisions};
use crate::pkgconfig::render_dkms_conf;
use crate::process::{StepRunner, check_file_exists};
use crate::scriptlet::{RenderedScriptlet, ScriptletTemplate};
use crate::system::{CommandProbe, STEP_SYSTEM_INFO, SystemInfo, SystemProbe};
use crate::version::VersionInfo;
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const STEP_PREPARE: &str = "prepare output directory";
pub const STEP_VERSION: &str = "get version";
pub const STEP_SCRIPTLETS: &str = "render scriptlets";
pub const STEP_STAGING: &str = "populate staging";

/// Permission bits of the staging root
const STAGING_ROOT_MODE: u32 = 0o755;

/// Assembly phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Nothing done yet
    Init,
    /// Distribution, release and architecture known and validated
    SystemInfoResolved,
    /// Pre-build steps done, version read, descriptor built
    VersionResolved,
    /// Scriptlet templates rendered
    ScriptletsRendered,
    /// Staging tree complete
    StagingPopulated,
    /// Archive built and renamed
    Archived,
    /// Run complete
    Done,
    /// A step failed; absorbing
    Failed,
}

impl AssemblyState {
    /// Returns true once the run can make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-run settings
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Project checkout holding `driver/`, `api/`, `app/`, `scripts/`
    pub project_dir: PathBuf,
    /// Run directory; staging tree, logs and the package land here
    pub output_dir: PathBuf,
    /// Trailing release component
    pub pkg_release: String,
    /// Remove an existing output directory instead of refusing it
    pub force: bool,
    pub build_date: NaiveDate,
}

impl AssembleOptions {
    /// Options with the release defaulting to the build date (`YYYYMMDD`)
    pub fn new(
        project_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        build_date: NaiveDate,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            output_dir: output_dir.into(),
            pkg_release: build_date.format("%Y%m%d").to_string(),
            force: false,
            build_date,
        }
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.pkg_release = release.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Per-step log directory
    pub fn log_dir(&self) -> PathBuf {
        self.output_dir.join("log")
    }

    /// Build date as shown in descriptions and the changelog
    pub fn build_date_short(&self) -> String {
        self.build_date.format("%a %b %d %Y").to_string()
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PackageOutput {
    /// Final package, named after the distribution release
    pub package: PathBuf,
    pub staging_root: PathBuf,
    pub log_dir: PathBuf,
    pub descriptor: PackageDescriptor,
    pub system: SystemInfo,
}

/// Drives one flavor from a project checkout to a `.deb`
pub struct PackageAssembler<P = CommandProbe, A = DpkgDeb> {
    manifest: FlavorManifest,
    config: BuildConfig,
    options: AssembleOptions,
    probe: P,
    archiver: A,
    runner: StepRunner,
    state: AssemblyState,
    prepared: bool,
}

impl PackageAssembler {
    /// Assembler using the host tools for probing and archiving
    pub fn new(manifest: FlavorManifest, config: BuildConfig, options: AssembleOptions) -> Self {
        Self::with_collaborators(manifest, config, options, CommandProbe, DpkgDeb)
    }
}

impl<P: SystemProbe, A: Archiver> PackageAssembler<P, A> {
    pub fn with_collaborators(
        manifest: FlavorManifest,
        config: BuildConfig,
        options: AssembleOptions,
        probe: P,
        archiver: A,
    ) -> Self {
        let runner = StepRunner::new(options.log_dir());
        Self {
            manifest,
            config,
            options,
            probe,
            archiver,
            runner,
            state: AssemblyState::Init,
            prepared: false,
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn options(&self) -> &AssembleOptions {
        &self.options
    }

    pub fn manifest(&self) -> &FlavorManifest {
        &self.manifest
    }

    /// Create the output and log directories
    ///
    /// An existing output directory is removed when `force` is set and
    /// refused otherwise. Called by [`run`](Self::run) if not called first;
    /// calling it early lets the caller attach a log file before the steps.
    pub fn prepare_output(&mut self) -> std::result::Result<(), StepError> {
        if self.prepared {
            return Ok(());
        }
        self.step(STEP_PREPARE, |a| a.prepare_output_dir())?;
        self.prepared = true;
        Ok(())
    }

    /// Run every remaining step
    pub fn run(&mut self) -> std::result::Result<PackageOutput, StepError> {
        if self.state != AssemblyState::Init {
            return Err(StepError::new(
                STEP_PREPARE,
                Error::validation(format!("assembler already ran (state {})", self.state)),
            ));
        }
        info!(
            "Assembling {} package ({}) into {}",
            self.manifest.name(),
            self.manifest.flavor(),
            self.options.output_dir.display()
        );

        self.prepare_output()?;

        let system = self.step(STEP_SYSTEM_INFO, |a| a.probe.probe(&a.runner))?;
        info!(
            "System: {} {} ({})",
            system.distribution, system.release, system.arch
        );
        self.advance(AssemblyState::SystemInfoResolved);

        let steps = self.manifest.build_steps().to_vec();
        for build_step in &steps {
            self.step(&build_step.name, |a| a.run_build_step(build_step))?;
        }

        let descriptor = self.step(STEP_VERSION, |a| a.resolve_version(&system))?;
        self.advance(AssemblyState::VersionResolved);

        let scriptlets = self.step(STEP_SCRIPTLETS, |a| a.render_scriptlets(&descriptor))?;
        self.advance(AssemblyState::ScriptletsRendered);

        let staging_root = self.step(STEP_STAGING, |a| {
            a.populate_staging(&descriptor, &system, &scriptlets)
        })?;
        self.advance(AssemblyState::StagingPopulated);

        let package = self.step(STEP_ARCHIVE, |a| {
            a.archive(&descriptor, &system, &staging_root)
        })?;
        self.advance(AssemblyState::Archived);

        self.advance(AssemblyState::Done);
        info!("Package: {}", package.display());

        Ok(PackageOutput {
            package,
            staging_root,
            log_dir: self.options.log_dir(),
            descriptor,
            system,
        })
    }

    fn advance(&mut self, state: AssemblyState) {
        debug!("Assembly state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Run one named step, timing it and recording failure
    fn step<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> std::result::Result<T, StepError> {
        info!("********** Starting step: {}", name);
        let start = Instant::now();
        match f(self) {
            Ok(value) => {
                info!(
                    "********** Step '{}' done in {:.2}s",
                    name,
                    start.elapsed().as_secs_f64()
                );
                Ok(value)
            }
            Err(e) => {
                error!("Step '{}' failed: {}", name, e);
                self.state = AssemblyState::Failed;
                Err(StepError::new(name, e))
            }
        }
    }

    fn prepare_output_dir(&self) -> Result<()> {
        let output = &self.options.output_dir;
        if output.exists() {
            if !self.options.force {
                return Err(Error::validation(format!(
                    "Output directory already exists: {}. Use --force to overwrite",
                    output.display()
                )));
            }
            warn!("Removing existing output directory: {}", output.display());
            fs::remove_dir_all(output)?;
        }

        info!("Creating output directory: {}", output.display());
        fs::create_dir_all(output)?;
        fs::create_dir_all(self.options.log_dir())?;
        Ok(())
    }

    fn run_build_step(&self, build_step: &BuildStep) -> Result<()> {
        self.runner.run(&build_step.name, &build_step.command)?;
        if let Some(expected) = &build_step.expected {
            check_file_exists(&self.options.project_dir.join(expected))?;
        }
        Ok(())
    }

    fn resolve_version(&self, system: &SystemInfo) -> Result<PackageDescriptor> {
        let header = self.config.version_header_in(&self.options.project_dir);
        let version = VersionInfo::from_header_file(&header)?;
        match (&version.tag, version.semver()) {
            (None, _) => warn!(
                "No version tag in {}, packaging as {}",
                header.display(),
                version.version()
            ),
            (Some(tag), None) => warn!("Version tag {} is not a semantic version", tag),
            (Some(_), Some(parsed)) => debug!(
                "Semantic version: major {}, minor {}, patch {}",
                parsed.major, parsed.minor, parsed.patch
            ),
        }
        info!("Version: {}", version);

        let descriptor = self.manifest.descriptor(
            &version,
            &self.options.pkg_release,
            system,
            &self.config.vendor,
            &self.options.build_date_short(),
        );
        info!("Package version: {}", descriptor.full_version());
        Ok(descriptor)
    }

    /// Render every scriptlet of the flavor
    ///
    /// Each rendered body is also left in the output directory under its
    /// template name.
    fn render_scriptlets(&self, descriptor: &PackageDescriptor) -> Result<Vec<RenderedScriptlet>> {
        let template_dir = self.config.template_dir_in(&self.options.project_dir);
        let mut rendered = Vec::new();
        for kind in self.manifest.scriptlets() {
            let template = ScriptletTemplate::load(&template_dir, *kind)?;
            let scriptlet = template.render(descriptor.name(), descriptor.version())?;

            let copy = self.options.output_dir.join(kind.template_name());
            info!("Writing {} scriptlet: {}", kind, copy.display());
            fs::write(&copy, scriptlet.body())?;
            rendered.push(scriptlet);
        }
        Ok(rendered)
    }

    fn populate_staging(
        &self,
        descriptor: &PackageDescriptor,
        system: &SystemInfo,
        scriptlets: &[RenderedScriptlet],
    ) -> Result<PathBuf> {
        let project_dir = &self.options.project_dir;
        let layout =
            StagingLayout::new(descriptor.name(), descriptor.version(), system.distribution);
        let payload = self.manifest.payload(
            project_dir,
            &self.config.template_dir_in(project_dir),
            &layout,
        )?;

        // Refuse the payload before anything is written
        let mut shipped: Vec<FileMapping> = payload.iter().map(|e| e.mapping().clone()).collect();
        check_payload(&shipped)?;

        let staging_root = self
            .options
            .output_dir
            .join(descriptor.package_stem(system.arch));
        info!("Creating staging directory: {}", staging_root.display());
        fs::create_dir_all(&staging_root)?;
        fs::set_permissions(&staging_root, fs::Permissions::from_mode(STAGING_ROOT_MODE))?;

        let debian_dir = staging_root.join(layout.debian_dir());
        fs::create_dir_all(&debian_dir)?;

        let control = debian_dir.join("control");
        info!("Writing control file: {}", control.display());
        fs::write(&control, render_control(descriptor, system.arch))?;

        for scriptlet in scriptlets {
            let path = debian_dir.join(scriptlet.kind().control_name());
            debug!("Staging scriptlet {}", path.display());
            scriptlet.write_to(&path)?;
        }

        for entry in &payload {
            stage_entry(&staging_root, entry, descriptor.version())?;
        }
        info!("Staged {} payload files", payload.len());

        let changelog_text =
            render_changelog(descriptor, &self.config.vendor, &self.options.build_date_short());
        let archive = changelog::pack(&changelog_text, &staging_root.join(layout.doc_dir()))?;
        shipped.push(staged_mapping(&staging_root, &archive)?);

        let pc_dest = layout.pkg_config_file(self.manifest.pc_module());
        let pc_path = staging_root.join(&pc_dest);
        if let Some(parent) = pc_path.parent() {
            fs::create_dir_all(parent)?;
        }
        info!("Writing pkg-config file: {}", pc_path.display());
        fs::write(&pc_path, self.manifest.pkg_config(descriptor, &layout).render())?;
        shipped.push(FileMapping::new(&pc_path, pc_dest));

        fs::write(debian_dir.join("md5sums"), render_md5sums(&staging_root, &shipped)?)?;

        Ok(staging_root)
    }

    /// Build the archive and rename it after the distribution release
    fn archive(
        &self,
        descriptor: &PackageDescriptor,
        system: &SystemInfo,
        staging_root: &Path,
    ) -> Result<PathBuf> {
        let built = self.archiver.build(&self.runner, staging_root)?;
        check_file_exists(&built)?;

        let renamed = self.options.output_dir.join(format!(
            "{}_{}.deb",
            descriptor.package_stem(system.arch),
            system.release
        ));
        info!("Copying {} to {}", built.display(), renamed.display());
        fs::copy(&built, &renamed)?;
        fs::remove_file(&built)?;
        check_file_exists(&renamed)?;
        Ok(renamed)
    }
}

/// Reject colliding destinations and absent sources
fn check_payload(mappings: &[FileMapping]) -> Result<()> {
    let collisions = detect_collisions(mappings);
    if !collisions.is_empty() {
        let mut claims = Vec::new();
        for (dest, sources) in &collisions {
            let sources: Vec<_> = sources.iter().map(|s| s.display().to_string()).collect();
            error!("{} claimed by: {}", dest.display(), sources.join(", "));
            claims.push(dest.display().to_string());
        }
        return Err(Error::validation(format!(
            "payload destinations claimed by more than one source: {}",
            claims.join(", ")
        )));
    }

    for mapping in mappings {
        if !mapping.source.is_file() {
            return Err(Error::MissingArtifact(mapping.source.clone()));
        }
    }
    Ok(())
}

fn stage_entry(staging_root: &Path, entry: &PayloadEntry, version: &str) -> Result<()> {
    let mapping = entry.mapping();
    let dest = staging_root.join(&mapping.dest);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match entry {
        PayloadEntry::Copy(_) => {
            debug!("{} -> {}", mapping.source.display(), dest.display());
            fs::copy(&mapping.source, &dest)?;
        }
        PayloadEntry::DkmsConf(_) => {
            info!("Writing {} for version {}", dest.display(), version);
            let template = fs::read_to_string(&mapping.source)?;
            fs::write(&dest, render_dkms_conf(&template, version))?;
        }
    }
    Ok(())
}

/// Mapping for a file generated inside the staging tree
fn staged_mapping(staging_root: &Path, path: &Path) -> Result<FileMapping> {
    let dest = path
        .strip_prefix(staging_root)
        .map_err(|_| Error::MissingArtifact(path.to_path_buf()))?;
    Ok(FileMapping::new(path, dest))
}
