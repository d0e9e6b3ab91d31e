// src/version/mod.rs

//! Version extraction from the generated version header
//!
//! The build generates a C header with `#define` lines such as:
//!
//! ```text
//! #define GIT_TAG                   "1.2.3-dirty"
//! #define GIT_TAG_VER_DEV_COMMITS   (7)
//! #define GIT_HASH                  "abcdef1234"
//! ```
//!
//! Each field is searched independently, line by line, and the first match
//! wins. Missing fields degrade to defaults; extraction never fails.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Version used when the header carries no tag
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Number of hash characters kept in the release string
const HASH_PREFIX_LEN: usize = 8;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)GIT_TAG.*?"(\d+\.\d+\.\d+).*"$"#).unwrap());
static DEV_COMMITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)GIT_TAG_VER_DEV_COMMITS.*?\((\d+)\)$").unwrap());
static HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)GIT_HASH.*?"(.*?)"$"#).unwrap());

/// Version metadata pulled from the generated header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionInfo {
    /// `MAJOR.MINOR.PATCH` with any qualifier stripped, if a tag was found
    pub tag: Option<String>,
    /// Commits since the tag, digits as written in the header
    pub dev_commits: Option<String>,
    /// Full git hash, empty if absent
    pub git_hash: String,
}

impl VersionInfo {
    /// Extract version fields from header text
    pub fn extract(header_text: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(header_text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        Self {
            tag: capture(&TAG_RE),
            dev_commits: capture(&DEV_COMMITS_RE),
            git_hash: capture(&HASH_RE).unwrap_or_default(),
        }
    }

    /// Read and extract from a header file on disk
    pub fn from_header_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingArtifact(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::extract(&text))
    }

    /// Package version: the tag, or `0.0.0` without one
    pub fn version(&self) -> &str {
        self.tag.as_deref().unwrap_or(FALLBACK_VERSION)
    }

    /// The tag as a semantic version
    ///
    /// `None` for tags the header pattern accepts but semver rejects, such
    /// as components with leading zeros.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.version()).ok()
    }

    /// Commits since the tag, `0` without a count
    pub fn dev_commits(&self) -> &str {
        self.dev_commits.as_deref().unwrap_or("0")
    }

    /// Short hash: at most the first eight characters
    pub fn short_hash(&self) -> String {
        self.git_hash.chars().take(HASH_PREFIX_LEN).collect()
    }

    /// Package release: `{commits}.{short hash}.{suffix}`
    pub fn release(&self, suffix: &str) -> String {
        format!("{}.{}.{}", self.dev_commits(), self.short_hash(), suffix)
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} dev commits, hash '{}')",
            self.version(),
            self.dev_commits(),
            self.short_hash()
        )
    }
}

/// Extract `(version, release)` from header text in one call
pub fn extract(header_text: &str, release_suffix: &str) -> (String, String) {
    let info = VersionInfo::extract(header_text);
    (info.version().to_string(), info.release(release_suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"
#ifndef _AMI_DRIVER_VERSION_H_
#define _AMI_DRIVER_VERSION_H_

#define GIT_TAG                   "1.0.0"
#define GIT_TAG_VER_MAJOR         (1)
#define GIT_TAG_VER_MINOR         (0)
#define GIT_TAG_VER_PATCH         (0)
#define GIT_TAG_VER_DEV_COMMITS   (0)

#define GIT_HASH                  "3944a1e8674722115a4263d0ac47b8e45108dfa1"
#define GIT_DATE                  "20250722"
#define GIT_BRANCH                ""
#define GIT_STATUS                (0)

#endif
"#;

    #[test]
    fn test_extract_full_header() {
        let info = VersionInfo::extract(HEADER);
        assert_eq!(info.version(), "1.0.0");
        assert_eq!(info.dev_commits(), "0");
        assert_eq!(info.short_hash(), "3944a1e8");
        assert_eq!(info.release("20250722"), "0.3944a1e8.20250722");
    }

    #[test]
    fn test_extract_dirty_tag() {
        let text = "#define GIT_TAG \"1.2.3-dirty\"\n\
                    #define GIT_TAG_VER_DEV_COMMITS (7)\n\
                    #define GIT_HASH \"abcdef1234\"\n";
        let (version, release) = extract(text, "20250101");
        assert_eq!(version, "1.2.3");
        assert_eq!(release, "7.abcdef12.20250101");
    }

    #[test]
    fn test_extract_empty_header() {
        let (version, release) = extract("", "20250101");
        assert_eq!(version, "0.0.0");
        assert_eq!(release, "0..20250101");
    }

    #[test]
    fn test_first_match_wins() {
        let text = "#define GIT_TAG \"2.0.1\"\n#define GIT_TAG \"3.0.0\"\n";
        assert_eq!(VersionInfo::extract(text).version(), "2.0.1");
    }

    #[test]
    fn test_tag_must_end_line_with_quote() {
        // The pattern is anchored per line, so a trailing comment disqualifies it
        let text = "#define GIT_TAG \"1.2.3\" /* tag */\n";
        assert_eq!(VersionInfo::extract(text).tag, None);
    }

    #[test]
    fn test_non_semver_tag_is_absent() {
        let text = "#define GIT_TAG \"release-7\"\n";
        assert_eq!(VersionInfo::extract(text).version(), FALLBACK_VERSION);
    }

    #[test]
    fn test_short_hash_shorter_than_prefix() {
        let text = "#define GIT_HASH \"abc\"\n";
        let info = VersionInfo::extract(text);
        assert_eq!(info.release("1"), "0.abc.1");
    }

    #[test]
    fn test_commit_count_digits_kept() {
        let text = "#define GIT_TAG_VER_DEV_COMMITS (007)\n\
                    #define GIT_HASH \"abcdef1234\"\n";
        assert_eq!(VersionInfo::extract(text).release("1"), "007.abcdef12.1");

        let huge = "#define GIT_TAG_VER_DEV_COMMITS (123456789012345678901234567890)\n";
        assert_eq!(
            VersionInfo::extract(huge).release("1"),
            "123456789012345678901234567890..1"
        );
    }

    #[test]
    fn test_empty_hash_value() {
        let text = "#define GIT_HASH \"\"\n#define GIT_TAG_VER_DEV_COMMITS (12)\n";
        assert_eq!(VersionInfo::extract(text).release("r"), "12..r");
    }

    #[test]
    fn test_release_shape() {
        let re = Regex::new(r"^\d+\.([0-9a-f]{8})?\.[0-9]+$").unwrap();
        for text in [
            "",
            HEADER,
            "#define GIT_TAG_VER_DEV_COMMITS (3)\n",
            "#define GIT_HASH \"0123456789abcdef\"\n",
        ] {
            let release = VersionInfo::extract(text).release("20250101");
            assert!(re.is_match(&release), "bad release: {}", release);
        }
    }

    #[test]
    fn test_semver() {
        let info = VersionInfo::extract("#define GIT_TAG \"1.4.2\"\n");
        assert_eq!(info.semver(), Some(semver::Version::new(1, 4, 2)));
    }

    #[test]
    fn test_leading_zero_tag_kept_without_semver() {
        let info = VersionInfo::extract("#define GIT_TAG \"01.4.2\"\n");
        assert_eq!(info.version(), "01.4.2");
        assert_eq!(info.semver(), None);
    }

    #[test]
    fn test_from_header_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = VersionInfo::from_header_file(&dir.path().join("ami_version.h")).unwrap_err();
        assert!(matches!(err, Error::MissingArtifact(_)));
    }
}
