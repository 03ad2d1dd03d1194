//! Writing rendered plugin configuration to disk.
//!
//! Files are written to a temporary file next to the destination and then renamed over it, so a
//! reader sees either the old content or the new content, never a partial write.  In dry-run
//! mode the content goes to a sink and nothing on disk changes.

use crate::error::{self, Result};
use snafu::{OptionExt, ResultExt};
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const RENDERED_FILE_MODE: u32 = 0o644;

/// How a plugin should render its configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render without writing anything to disk
    pub dry_run: bool,
    /// Directory the rendered files are written to
    pub manifest_dir: PathBuf,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            manifest_dir: PathBuf::from(constants::MANIFEST_DIR),
        }
    }
}

/// The outcome of a render: what was produced and where it belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub path: PathBuf,
    pub content: String,
    /// Whether `content` was written to `path`
    pub written: bool,
}

/// Write `content` to `path`, creating parent directories as needed.  With `dry_run`, the
/// content is written to a sink instead; returns whether the file was written.
pub fn write_file<P>(path: P, content: &[u8], dry_run: bool) -> Result<bool>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if dry_run {
        debug!("Dry run, not writing '{}'", path.display());
        io::sink()
            .write_all(content)
            .context(error::FileWriteSnafu { path })?;
        return Ok(false);
    }

    let dir = path.parent().context(error::NoParentDirSnafu { path })?;
    fs::create_dir_all(dir).context(error::MkdirSnafu { dir })?;

    // Create the file as a temporary file in the destination directory first and finish writing
    // to it before swapping it in, so the rename stays on one filesystem.
    let mut temp_file = NamedTempFile::new_in(dir).context(error::CreateTempfileSnafu { dir })?;
    temp_file
        .write_all(content)
        .context(error::FileWriteSnafu { path })?;
    fs::set_permissions(
        temp_file.path(),
        Permissions::from_mode(RENDERED_FILE_MODE),
    )
    .context(error::FileModeSnafu {
        path,
        mode: RENDERED_FILE_MODE,
    })?;

    debug!("Writing rendered file to '{}'", path.display());
    // Create the file if it does not exist. If it does exist, atomically replace it.
    temp_file
        .persist(path)
        .context(error::PersistFileSnafu { path })?;

    Ok(true)
}
