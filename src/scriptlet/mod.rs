// src/scriptlet/mod.rs

//! Maintainer scriptlet rendering
//!
//! Scriptlet templates are plain shell scripts that take the module name and
//! version as positional arguments. Packaging bakes both values into the
//! script by replacing the assignment lines:
//!
//! - `#!/bin/sh` is blanked (the rendered script gets its own interpreter line)
//! - `MODULE_NAME=$1` becomes `MODULE_NAME=<name>`
//! - `MODULE_VERSION_STRING=$2` becomes `MODULE_VERSION_STRING=<version>`
//!
//! A template that lacks either assignment line is rejected rather than
//! rendered unchanged.

use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shebang line blanked out of every template
pub const SHEBANG_PLACEHOLDER: &str = "#!/bin/sh";
/// Name assignment placeholder
pub const NAME_PLACEHOLDER: &str = "MODULE_NAME=$1";
/// Version assignment placeholder
pub const VERSION_PLACEHOLDER: &str = "MODULE_VERSION_STRING=$2";

/// Header prepended to every rendered script
const SCRIPT_HEADER: [&str; 2] = ["#!/bin/bash", "set -e"];

/// Permission bits for scriptlets in DEBIAN/
pub const SCRIPTLET_MODE: u32 = 0o775;

/// Debian maintainer script kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptletKind {
    PreInstall,
    PostInstall,
    PreRemove,
}

impl ScriptletKind {
    /// File name inside DEBIAN/
    pub fn control_name(&self) -> &'static str {
        match self {
            Self::PreInstall => "preinst",
            Self::PostInstall => "postinst",
            Self::PreRemove => "prerm",
        }
    }

    /// Template file name in the template directory
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::PreInstall => "preinst.sh",
            Self::PostInstall => "postinst.sh",
            Self::PreRemove => "prerm.sh",
        }
    }
}

impl fmt::Display for ScriptletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.control_name())
    }
}

/// A scriptlet template loaded from disk
#[derive(Debug, Clone)]
pub struct ScriptletTemplate {
    kind: ScriptletKind,
    path: PathBuf,
    text: String,
}

impl ScriptletTemplate {
    /// Create a template from in-memory text
    pub fn new(kind: ScriptletKind, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            text: text.into(),
        }
    }

    /// Load the template for `kind` from `template_dir`
    pub fn load(template_dir: &Path, kind: ScriptletKind) -> Result<Self> {
        let path = template_dir.join(kind.template_name());
        if !path.is_file() {
            return Err(Error::MissingArtifact(path));
        }
        let text = fs::read_to_string(&path)?;
        Ok(Self::new(kind, path, text))
    }

    pub fn kind(&self) -> ScriptletKind {
        self.kind
    }

    /// Render with name and version substituted
    pub fn render(&self, package_name: &str, version: &str) -> Result<RenderedScriptlet> {
        let template = self.path.display().to_string();
        let lines = render_lines(&template, &self.text, package_name, version)?;
        Ok(RenderedScriptlet {
            kind: self.kind,
            lines,
        })
    }
}

/// Substitute placeholders in `template_text` and split into lines
///
/// `template` only names the template in error messages.
pub fn render_lines(
    template: &str,
    template_text: &str,
    package_name: &str,
    version: &str,
) -> Result<Vec<String>> {
    for placeholder in [NAME_PLACEHOLDER, VERSION_PLACEHOLDER] {
        if !template_text.split('\n').any(|line| line == placeholder) {
            return Err(Error::template(template, placeholder));
        }
    }

    let name_line = format!("MODULE_NAME={}", package_name);
    let version_line = format!("MODULE_VERSION_STRING={}", version);
    let mut name_done = false;
    let mut version_done = false;

    let lines = template_text
        .split('\n')
        .map(|line| {
            if line == SHEBANG_PLACEHOLDER {
                String::new()
            } else if line == NAME_PLACEHOLDER && !name_done {
                name_done = true;
                name_line.clone()
            } else if line == VERSION_PLACEHOLDER && !version_done {
                version_done = true;
                version_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    debug!("Rendered scriptlet template {}", template);
    Ok(lines)
}

/// A scriptlet with name and version baked in
///
/// Each flavor renders its own copies; instances are never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScriptlet {
    kind: ScriptletKind,
    lines: Vec<String>,
}

impl RenderedScriptlet {
    pub fn kind(&self) -> ScriptletKind {
        self.kind
    }

    /// Rendered template body, without the interpreter header
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Body as written next to the staging tree for inspection
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }

    /// Full script: bash interpreter, `set -e`, then the body
    pub fn to_script(&self) -> String {
        SCRIPT_HEADER
            .iter()
            .map(|s| s.to_string())
            .chain(self.lines.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the full script to `path` and mark it executable
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_script())?;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(SCRIPTLET_MODE);
        fs::set_permissions(path, perms)?;
        Ok(())
    }
}
