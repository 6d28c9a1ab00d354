//! Archive extraction and binary placement.
//!
//! Release archives come in two shapes: `.zip` for Windows and gzip-compressed
//! tarballs (`.tar.gz` / `.tgz`) everywhere else. Their internal layout varies
//! between projects:
//!
//! ```text
//! tool_1.2.3_linux_amd64.tar.gz        tool-v1.2.3-x86_64-apple-darwin.tar.gz
//!   tool                                 tool-v1.2.3-x86_64-apple-darwin/
//!   LICENSE                                bin/tool
//!   README.md                              doc/...
//! ```
//!
//! Whatever the layout, the executable is flattened to `<dest>/<tool>` and
//! marked executable on Unix.

use crate::error::{Result, SetupError};
use flate2::read::GzDecoder;
use std::fs;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;
use walkdir::WalkDir;

/// Archive formats release assets are published in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Format implied by a file name's extension
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

/// Unpack `archive_path` into `into`, using the format implied by `asset_name`.
pub fn extract_archive(archive_path: &Path, asset_name: &str, into: &Path) -> Result<()> {
    let kind = ArchiveKind::from_name(asset_name).ok_or_else(|| {
        SetupError::Extraction(format!("unsupported archive format: {}", asset_name))
    })?;

    fs::create_dir_all(into)?;
    let file = fs::File::open(archive_path)?;

    match kind {
        ArchiveKind::TarGz => {
            let mut archive = Archive::new(GzDecoder::new(file));
            archive
                .unpack(into)
                .map_err(|e| SetupError::Extraction(format!("{}: {}", asset_name, e)))?;
        }
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| SetupError::Extraction(format!("{}: {}", asset_name, e)))?;
            archive
                .extract(into)
                .map_err(|e| SetupError::Extraction(format!("{}: {}", asset_name, e)))?;
        }
    }

    debug!(archive = %archive_path.display(), into = %into.display(), ?kind, "Extracted archive");
    Ok(())
}

/// Find `executable` anywhere under `extracted`, preferring the shallowest match.
pub fn find_executable(extracted: &Path, executable: &str) -> Option<PathBuf> {
    WalkDir::new(extracted)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == executable)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

/// Flatten `executable` from the extracted tree into `dest` and make it runnable.
///
/// # Errors
///
/// Returns [`SetupError::Extraction`] if the archive did not contain the executable.
pub fn place_executable(extracted: &Path, executable: &str, dest: &Path) -> Result<PathBuf> {
    let found = find_executable(extracted, executable).ok_or_else(|| {
        SetupError::Extraction(format!("`{}` not found in archive", executable))
    })?;

    fs::create_dir_all(dest)?;
    let target = dest.join(executable);
    if target.exists() {
        fs::remove_file(&target)?;
    }
    fs::copy(&found, &target)?;
    set_executable(&target)?;

    debug!(from = %found.display(), to = %target.display(), "Placed executable");
    Ok(target)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        for (name, data) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_archive_kind_from_name() {
        assert_eq!(ArchiveKind::from_name("tool_windows_amd64.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("tool_linux_amd64.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("tool.TGZ"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("tool.tar.xz"), None);
    }

    #[test]
    fn test_tar_gz_nested_layout_is_flattened() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("tool-v1.0.0/README.md", b"readme"),
                ("tool-v1.0.0/bin/tool", b"#!/bin/sh\necho tool\n"),
            ],
        );

        let extracted = temp.path().join("extracted");
        extract_archive(&archive, "tool.tar.gz", &extracted).unwrap();
        let dest = temp.path().join("bin");
        let binary = place_executable(&extracted, "tool", &dest).unwrap();

        assert_eq!(binary, dest.join("tool"));
        assert_eq!(fs::read(&binary).unwrap(), b"#!/bin/sh\necho tool\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&binary).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_zip_flat_layout() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.zip");
        write_zip(&archive, &[("tool.exe", b"MZ binary"), ("LICENSE", b"MIT")]);

        let extracted = temp.path().join("extracted");
        extract_archive(&archive, "tool_windows_amd64.zip", &extracted).unwrap();
        let binary = place_executable(&extracted, "tool.exe", &temp.path().join("bin")).unwrap();

        assert_eq!(fs::read(binary).unwrap(), b"MZ binary");
    }

    #[test]
    fn test_shallowest_match_wins() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/tool"), b"deep").unwrap();
        fs::write(temp.path().join("a/tool"), b"shallow").unwrap();

        let found = find_executable(temp.path(), "tool").unwrap();
        assert_eq!(fs::read(found).unwrap(), b"shallow");
    }

    #[test]
    fn test_missing_executable_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.tar.gz");
        write_tar_gz(&archive, &[("other-tool", b"nope")]);

        let extracted = temp.path().join("extracted");
        extract_archive(&archive, "tool.tar.gz", &extracted).unwrap();
        let err = place_executable(&extracted, "tool", &temp.path().join("bin")).unwrap_err();
        assert!(matches!(err, SetupError::Extraction(_)));
    }

    #[test]
    fn test_malformed_archive_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let err = extract_archive(&archive, "tool.zip", &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, SetupError::Extraction(_)));
        assert_eq!(err.stage(), "extract");
    }
}
