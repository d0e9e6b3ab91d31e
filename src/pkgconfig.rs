// src/pkgconfig.rs

//! pkg-config module files and dkms.conf version substitution

use crate::control::PackageDescriptor;

/// Version token in the dkms.conf template
pub const DKMS_VERSION_TOKEN: &str = "@PKGVER@";

/// A pkg-config `.pc` module description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgConfig {
    variables: Vec<(String, String)>,
    name: String,
    description: String,
    version: String,
    cflags: Option<String>,
}

impl PkgConfig {
    /// Module named after the package, described by its summary
    pub fn for_package(descriptor: &PackageDescriptor) -> Self {
        Self {
            variables: Vec::new(),
            name: descriptor.name().to_string(),
            description: descriptor.summary().to_string(),
            version: descriptor.version().to_string(),
            cflags: None,
        }
    }

    /// Add a `name=value` variable line
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    pub fn cflags(mut self, cflags: impl Into<String>) -> Self {
        self.cflags = Some(cflags.into());
        self
    }

    /// Render the `.pc` file text
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .variables
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        lines.push(String::new());
        lines.push(format!("Name: {}", self.name));
        lines.push(format!("Description: {}", self.description));
        lines.push(format!("Version: {}", self.version));
        if let Some(cflags) = &self.cflags {
            lines.push(format!("Cflags: {}", cflags));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Replace every `@PKGVER@` in a dkms.conf template
pub fn render_dkms_conf(template: &str, version: &str) -> String {
    template.replace(DKMS_VERSION_TOKEN, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_pc() {
        let descriptor = PackageDescriptor::builder("ami", "1.2.3", "0..1")
            .summary("ami driver package")
            .build();
        let pc = PkgConfig::for_package(&descriptor)
            .variable("includedir", "/usr/include/ami")
            .cflags("-I${includedir}");
        assert_eq!(
            pc.render(),
            "includedir=/usr/include/ami\n\nName: ami\nDescription: ami driver package\n\
             Version: 1.2.3\nCflags: -I${includedir}\n"
        );
    }

    #[test]
    fn test_tool_pc_without_cflags() {
        let descriptor = PackageDescriptor::builder("amitool", "2.0.0", "0..1").build();
        let text = PkgConfig::for_package(&descriptor)
            .variable("bindir", "/usr/local/bin")
            .render();
        assert!(text.starts_with("bindir=/usr/local/bin\n\nName: amitool\n"));
        assert!(text.contains("Description: amitool package\n"));
        assert!(!text.contains("Cflags"));
    }

    #[test]
    fn test_dkms_conf() {
        let template = "PACKAGE_NAME=\"ami\"\nPACKAGE_VERSION=\"@PKGVER@\"\nBUILT_MODULE_NAME[0]=\"ami\"\n";
        let conf = render_dkms_conf(template, "1.2.3");
        assert!(conf.contains("PACKAGE_VERSION=\"1.2.3\""));
        assert!(!conf.contains(DKMS_VERSION_TOKEN));
    }
}
