//! Self-installing executables: copied into the install directory and run
//! there, judged only by exit status.

use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use super::replace_dir;
use crate::error::{UpdateError, UpdateResult};

pub(super) fn run_installer(package: &Path, dest: &Path, args: &[String]) -> UpdateResult<()> {
    let fail = |message: String| UpdateError::Install {
        path: package.to_path_buf(),
        message,
    };
    let file_name = package
        .file_name()
        .ok_or_else(|| fail("package path has no file name".to_string()))?;
    let parent = dest
        .parent()
        .ok_or_else(|| fail(format!("{} has no parent directory", dest.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| UpdateError::io(format!("create {}", parent.display()), e))?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|e| UpdateError::io(format!("create staging dir in {}", parent.display()), e))?;
    let staged_exe = staging.path().join(file_name);
    fs::copy(package, &staged_exe)
        .map_err(|e| UpdateError::io(format!("copy installer to {}", staged_exe.display()), e))?;
    make_executable(&staged_exe)
        .map_err(|e| UpdateError::io(format!("chmod {}", staged_exe.display()), e))?;

    // The installer sees its final location as working directory.
    replace_dir(staging.path(), dest)
        .map_err(|e| UpdateError::io(format!("move installer to {}", dest.display()), e))?;
    let exe = dest.join(file_name);

    tracing::info!(exe = %exe.display(), ?args, "running installer");
    let status = Command::new(&exe)
        .args(args)
        .current_dir(dest)
        .stdin(Stdio::null())
        .status();
    let failure = match status {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => format!("installer exited with {status}"),
        Err(e) => format!("failed to start {}: {e}", exe.display()),
    };
    tracing::warn!(exe = %exe.display(), %failure, "installer failed");
    if let Err(e) = fs::remove_dir_all(dest) {
        tracing::warn!(dest = %dest.display(), error = %e, "could not remove failed install");
    }
    Err(fail(failure))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
