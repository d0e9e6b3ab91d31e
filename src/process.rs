// src/process.rs

//! External command execution for build steps
//!
//! Every command runs synchronously with stdout and stderr both redirected
//! into one per-step log file. The runner waits for exit and then checks the
//! status against what the step expects. There is no timeout: a hung tool
//! hangs the run.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Prefix of tool diagnostics that fail a step even on a zero exit code
const LOG_ERROR_MARKER: &str = "ERROR: [";

/// A command to run as part of a build step
#[derive(Debug, Clone)]
pub struct StepCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    log_name: String,
    expect_fail: bool,
}

impl StepCommand {
    /// A program with arguments, logged to `<log_dir>/<log_name>`
    pub fn new(program: impl Into<String>, log_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            log_name: log_name.into(),
            expect_fail: false,
        }
    }

    /// A shell snippet run through `sh -c`
    pub fn shell(script: impl Into<String>, log_name: impl Into<String>) -> Self {
        Self::new("sh", log_name).arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// The step succeeds only if the command exits non-zero
    pub fn expect_fail(mut self) -> Self {
        self.expect_fail = true;
        self
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    /// Command line as shown in logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of a finished step command
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Exit code, or -1 if terminated by signal
    pub code: i32,
    /// Log file holding combined stdout/stderr
    pub log: PathBuf,
}

impl StepOutput {
    /// First line of the captured output, trimmed of the line ending
    pub fn first_line(&self) -> Result<String> {
        let file = File::open(&self.log)?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Runs step commands with output captured under a log directory
#[derive(Debug, Clone)]
pub struct StepRunner {
    log_dir: PathBuf,
}

impl StepRunner {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Run `command` for `step`, failing on an unexpected exit status
    pub fn run(&self, step: &str, command: &StepCommand) -> Result<StepOutput> {
        let cmd_str = command.display();
        info!("Executing: $ {}", cmd_str);

        if which::which(&command.program).is_err() {
            return Err(Error::ExternalCommand {
                step: step.to_string(),
                command: cmd_str,
                detail: format!("'{}' not found in PATH", command.program),
                log: None,
            });
        }

        fs::create_dir_all(&self.log_dir)?;
        let log_path = self.log_dir.join(&command.log_name);
        info!("Log file: {}", log_path.display());

        let log_file = File::create(&log_path)?;
        let stderr_file = log_file.try_clone()?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file));
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| Error::ExternalCommand {
            step: step.to_string(),
            command: cmd_str.clone(),
            detail: format!("failed to spawn: {}", e),
            log: Some(log_path.clone()),
        })?;
        let code = status.code().unwrap_or(-1);
        debug!("'{}' exited with code {}", cmd_str, code);

        let failure = |detail: String| Error::ExternalCommand {
            step: step.to_string(),
            command: cmd_str.clone(),
            detail,
            log: Some(log_path.clone()),
        };

        // commands run to fail are expected to print errors
        let flagged = if command.expect_fail {
            Vec::new()
        } else {
            scan_log_errors(&log_path)?
        };
        if !flagged.is_empty() {
            for line in &flagged {
                error!("{}", line);
            }
            return Err(failure(format!(
                "messages containing pattern \"{}\" found",
                LOG_ERROR_MARKER
            )));
        }

        if !command.expect_fail && !status.success() {
            return Err(failure(format!(
                "Unexpected non-zero return code ({})",
                code
            )));
        }
        if command.expect_fail && status.success() {
            return Err(failure("Unexpected zero return code".to_string()));
        }

        Ok(StepOutput {
            code,
            log: log_path,
        })
    }
}

/// Lines in a step log that start with the tool error marker
fn scan_log_errors(log: &Path) -> Result<Vec<String>> {
    let file = File::open(log)?;
    let mut flagged = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.starts_with(LOG_ERROR_MARKER) {
            flagged.push(line);
        }
    }
    Ok(flagged)
}

/// Check that a step produced `path`
pub fn check_file_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::MissingArtifact(path.to_path_buf()));
    }
    info!("Successfully generated: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner() -> (TempDir, StepRunner) {
        let dir = tempfile::tempdir().unwrap();
        let runner = StepRunner::new(dir.path().join("log"));
        (dir, runner)
    }

    #[test]
    fn test_display() {
        let cmd = StepCommand::new("dpkg-deb", "dpkg-deb.log")
            .args(["--build", "--root-owner-group"])
            .arg("/out/pkg");
        assert_eq!(cmd.display(), "dpkg-deb --build --root-owner-group /out/pkg");
    }

    #[test]
    fn test_combined_output_captured() {
        let (_dir, runner) = runner();
        let cmd = StepCommand::shell("echo out; echo err 1>&2", "echo.log");
        let output = runner.run("echo", &cmd).unwrap();
        assert_eq!(output.code, 0);
        let log = fs::read_to_string(&output.log).unwrap();
        assert!(log.contains("out"));
        assert!(log.contains("err"));
        assert_eq!(output.first_line().unwrap(), "out");
    }

    #[test]
    fn test_non_zero_exit_fails() {
        let (_dir, runner) = runner();
        let cmd = StepCommand::shell("exit 3", "fail.log");
        let err = runner.run("failing step", &cmd).unwrap_err();
        match err {
            Error::ExternalCommand { step, detail, log, .. } => {
                assert_eq!(step, "failing step");
                assert!(detail.contains("(3)"));
                assert!(log.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expect_fail() {
        let (_dir, runner) = runner();
        let failing = StepCommand::shell("exit 1", "a.log").expect_fail();
        assert_eq!(runner.run("s", &failing).unwrap().code, 1);

        let passing = StepCommand::shell("true", "b.log").expect_fail();
        assert!(runner.run("s", &passing).is_err());
    }

    #[test]
    fn test_error_marker_in_log_fails() {
        let (_dir, runner) = runner();
        let cmd = StepCommand::shell("echo 'ERROR: [BUILD-1] broken'", "marker.log");
        assert!(runner.run("s", &cmd).is_err());
    }

    #[test]
    fn test_error_marker_ignored_when_failure_expected() {
        let (_dir, runner) = runner();
        let cmd = StepCommand::shell("echo 'ERROR: [BUILD-1] broken'; exit 2", "marker.log")
            .expect_fail();
        assert_eq!(runner.run("s", &cmd).unwrap().code, 2);
    }

    #[test]
    fn test_missing_program() {
        let (_dir, runner) = runner();
        let cmd = StepCommand::new("definitely-not-a-real-tool-xyz", "x.log");
        assert!(matches!(
            runner.run("s", &cmd),
            Err(Error::ExternalCommand { log: None, .. })
        ));
    }

    #[test]
    fn test_working_directory() {
        let (dir, runner) = runner();
        let cmd = StepCommand::shell("pwd", "pwd.log").dir(dir.path());
        let output = runner.run("s", &cmd).unwrap();
        let pwd = PathBuf::from(output.first_line().unwrap());
        assert_eq!(pwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_check_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ami.ko");
        assert!(check_file_exists(&file).is_err());
        fs::write(&file, b"elf").unwrap();
        assert!(check_file_exists(&file).is_ok());
        assert!(check_file_exists(dir.path()).is_err());
    }
}
