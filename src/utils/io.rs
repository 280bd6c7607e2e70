//! Filesystem helpers with consistent error wrapping.

use std::path::Path;

use crate::error::{Error, Result};

/// Create a directory (and parents) if absent.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
    })
}

/// Copy a file, failing with the source path in context.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    std::fs::copy(src, dest).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("copy {} -> {}", src.display(), dest.display())),
        )
    })?;
    Ok(())
}

/// Write a file and mark it executable (0o755 on unix).
pub fn write_executable(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("chmod {}", path.display())))
        })?;
    }

    Ok(())
}
