// src/changelog.rs

//! Debian changelog generation
//!
//! Each package ships a single changelog stanza under
//! `usr/share/doc/<name>/changelog.Debian.gz`.

use crate::config::Vendor;
use crate::control::PackageDescriptor;
use crate::error::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Builder as TarBuilder;
use tracing::{info, warn};

/// Uncompressed changelog file name
pub const CHANGELOG_FILE: &str = "changelog.Debian";
/// Packed changelog file name
pub const CHANGELOG_ARCHIVE: &str = "changelog.Debian.gz";

/// Render the changelog stanza
///
/// `build_date_short` is the `%a %b %d %Y` build date.
pub fn render_changelog(
    descriptor: &PackageDescriptor,
    vendor: &Vendor,
    build_date_short: &str,
) -> String {
    let mut lines = vec![
        String::new(),
        format!(
            "{} ({}) {}; urgency=medium",
            descriptor.name(),
            descriptor.full_version(),
            vendor.name
        ),
        String::new(),
    ];
    lines.extend(descriptor.changelog().iter().map(|msg| format!("  * {}", msg)));
    lines.push(String::new());
    lines.push(format!(
        "-- {} <{}> {} 00:00:00 +0000",
        vendor.full, vendor.email, build_date_short
    ));
    lines.push(String::new());
    lines.join("\n")
}

/// Write `text` into `dir` and pack it as `changelog.Debian.gz`
///
/// The uncompressed file never outlives this call, whether packing succeeds
/// or not.
pub fn pack(text: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let plain = dir.join(CHANGELOG_FILE);
    let archive = dir.join(CHANGELOG_ARCHIVE);

    info!("Writing changelog file: {}", plain.display());
    fs::write(&plain, text)?;

    let packed = pack_file(&plain, &archive);
    let removed = fs::remove_file(&plain);

    match (packed, removed) {
        (Ok(()), Ok(())) => Ok(archive),
        (Err(e), removed) => {
            if let Err(rm) = removed {
                warn!("Failed to remove {}: {}", plain.display(), rm);
            }
            let _ = fs::remove_file(&archive);
            Err(e)
        }
        (Ok(()), Err(e)) => Err(Error::Io(e)),
    }
}

/// Gzipped tarball holding the single file `source`
fn pack_file(source: &Path, output: &Path) -> Result<()> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = TarBuilder::new(encoder);

    let name = source
        .file_name()
        .ok_or_else(|| Error::MissingArtifact(source.to_path_buf()))?;
    archive.append_path_with_name(source, name)?;

    let encoder = archive.into_inner()?;
    encoder.finish()?;
    Ok(())
}
