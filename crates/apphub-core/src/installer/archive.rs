//! Archive extraction into a staging directory, swapped in only when complete.
//!
//! Zip and tar.gz are read in-process. RAR and 7z go through an external
//! extractor (`7z`, then `unrar`/`rar`); 7z archives fall back to the
//! built-in decoder when no tool is installed.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, MAIN_SEPARATOR_STR};
use std::process::{Command, Stdio};

use flate2::read::GzDecoder;

use super::replace_dir;
use crate::error::{UpdateError, UpdateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    Rar,
    SevenZ,
}

/// Container format from the leading magic bytes; the filename extension is
/// not trusted. `None` for anything unsupported (plain files, unknown formats).
pub fn detect_format(path: &Path) -> io::Result<Option<ArchiveFormat>> {
    let mut head = [0u8; 6];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let head = &head[..filled];
    Ok(if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        Some(ArchiveFormat::Zip)
    } else if head.starts_with(&[0x1f, 0x8b]) {
        Some(ArchiveFormat::TarGz)
    } else if head.starts_with(b"Rar!\x1a\x07") {
        Some(ArchiveFormat::Rar)
    } else if head.starts_with(&[b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c]) {
        Some(ArchiveFormat::SevenZ)
    } else {
        None
    })
}

/// Command-line convention of an external extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolArgs {
    /// `7z x -y -o<out> <archive>`
    SevenZip,
    /// `unrar x -o+ -y <archive> <out>/`
    Unrar,
}

#[derive(Debug, Clone, Copy)]
struct ExtractTool {
    program: &'static str,
    args: ToolArgs,
}

/// External extractors tried in order for each format.
#[derive(Debug, Clone, Copy)]
struct Extractors {
    rar: &'static [ExtractTool],
    sevenz: &'static [ExtractTool],
}

const SEVEN_ZIP: ExtractTool = ExtractTool {
    program: "7z",
    args: ToolArgs::SevenZip,
};

const SYSTEM_EXTRACTORS: Extractors = Extractors {
    rar: &[
        SEVEN_ZIP,
        ExtractTool {
            program: "unrar",
            args: ToolArgs::Unrar,
        },
        ExtractTool {
            program: "rar",
            args: ToolArgs::Unrar,
        },
    ],
    sevenz: &[SEVEN_ZIP],
};

pub(super) fn install_archive(package: &Path, dest: &Path) -> UpdateResult<()> {
    install_archive_with(package, dest, &SYSTEM_EXTRACTORS)
}

fn install_archive_with(package: &Path, dest: &Path, tools: &Extractors) -> UpdateResult<()> {
    let fail = |message: String| UpdateError::Extraction {
        path: package.to_path_buf(),
        message,
    };
    let format = detect_format(package)
        .map_err(|e| fail(format!("read package: {e}")))?
        .ok_or_else(|| fail("unsupported archive format".to_string()))?;

    let parent = dest
        .parent()
        .ok_or_else(|| fail(format!("{} has no parent directory", dest.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| UpdateError::io(format!("create {}", parent.display()), e))?;
    // Staging lives next to the destination so the final rename stays on one
    // filesystem. Dropping it on any error removes the partial tree.
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|e| UpdateError::io(format!("create staging dir in {}", parent.display()), e))?;

    let entries = match format {
        ArchiveFormat::Zip => extract_zip(package, staging.path()),
        ArchiveFormat::TarGz => extract_tar_gz(package, staging.path()),
        ArchiveFormat::Rar => extract_rar(package, staging.path(), tools.rar),
        ArchiveFormat::SevenZ => extract_7z(package, staging.path(), tools.sevenz),
    }
    .map_err(fail)?;
    tracing::debug!(?format, entries, staging = %staging.path().display(), "extracted");

    replace_dir(staging.path(), dest)
        .map_err(|e| UpdateError::io(format!("move extracted tree to {}", dest.display()), e))?;
    Ok(())
}

fn extract_rar(package: &Path, out: &Path, tools: &[ExtractTool]) -> Result<usize, String> {
    match extract_with_tools(package, out, tools)? {
        Some(()) => count_files(out).map_err(|e| format!("scan {}: {e}", out.display())),
        None => Err("no RAR extractor found (install 7z or unrar)".to_string()),
    }
}

fn extract_7z(package: &Path, out: &Path, tools: &[ExtractTool]) -> Result<usize, String> {
    if extract_with_tools(package, out, tools)?.is_none() {
        sevenz_rust::decompress_file(package, out).map_err(|e| format!("read 7z: {e}"))?;
    }
    count_files(out).map_err(|e| format!("scan {}: {e}", out.display()))
}

/// Run the first installed tool. `Ok(None)` when none of them is on `PATH`.
fn extract_with_tools(
    package: &Path,
    out: &Path,
    tools: &[ExtractTool],
) -> Result<Option<()>, String> {
    for tool in tools {
        let mut command = Command::new(tool.program);
        match tool.args {
            ToolArgs::SevenZip => {
                let mut target = OsString::from("-o");
                target.push(out);
                command.arg("x").arg("-y").arg(target).arg(package);
            }
            ToolArgs::Unrar => {
                let mut target = out.as_os_str().to_owned();
                target.push(MAIN_SEPARATOR_STR);
                command.arg("x").arg("-o+").arg("-y").arg(package).arg(target);
            }
        }
        let output = match command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
        {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(program = tool.program, "extractor not installed");
                continue;
            }
            Err(e) => return Err(format!("launch {}: {e}", tool.program)),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                tool.program,
                output.status,
                stderr.trim()
            ));
        }
        tracing::debug!(program = tool.program, "extracted with external tool");
        return Ok(Some(()));
    }
    Ok(None)
}

fn count_files(dir: &Path) -> io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += count_files(&entry.path())?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

fn extract_zip(package: &Path, out: &Path) -> Result<usize, String> {
    let file = File::open(package).map_err(|e| format!("open: {e}"))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| format!("read zip: {e}"))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| format!("zip entry {i}: {e}"))?;
        let Some(rel) = entry.enclosed_name() else {
            return Err(format!("zip entry {:?} escapes the install directory", entry.name()));
        };
        let target = out.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| format!("create {}: {e}", target.display()))?;
            continue;
        }
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| format!("create {}: {e}", dir.display()))?;
        }
        let mut file =
            File::create(&target).map_err(|e| format!("create {}: {e}", target.display()))?;
        io::copy(&mut entry, &mut file).map_err(|e| format!("extract {}: {e}", entry.name()))?;
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| format!("chmod {}: {e}", target.display()))?;
        }
    }
    Ok(archive.len())
}

fn extract_tar_gz(package: &Path, out: &Path) -> Result<usize, String> {
    let file = File::open(package).map_err(|e| format!("open: {e}"))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut count = 0;
    for entry in archive.entries().map_err(|e| format!("read tar: {e}"))? {
        let mut entry = entry.map_err(|e| format!("tar entry {count}: {e}"))?;
        let name = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let inside = entry
            .unpack_in(out)
            .map_err(|e| format!("extract {name}: {e}"))?;
        if !inside {
            return Err(format!("tar entry {name:?} escapes the install directory"));
        }
        count += 1;
    }
    Ok(count)
}
