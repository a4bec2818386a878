//! Shared filesystem helpers built on `cap-std` and `camino`.
//!
//! The persistent cache tier and the request journal both write into
//! directories shared between concurrent requests and processes. Writers go
//! through [`write_atomic`] so readers never observe a half-written file.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Resolve an ambient directory for the given path and return the directory with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Create `dir` and any missing ancestors.
pub fn ensure_dir(dir: &Utf8Path) -> io::Result<()> {
    if dir.as_str().is_empty() || dir == Utf8Path::new("/") {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(dir)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Ensure the parent directory for `path` exists, handling absolute paths safely for cap-std.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Replace the contents of `path` with `contents` in one step.
///
/// The bytes are written to a uniquely named sibling first and then renamed
/// over the target, so concurrent readers see either the previous file or the
/// complete new one.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, file_name) = open_dir_and_file(path)?;
    let temp_name = temp_sibling_name(&file_name);
    dir.write(&temp_name, contents)?;
    if let Err(err) = dir.rename(&temp_name, &dir, &file_name) {
        let _cleanup = dir.remove_file(&temp_name);
        return Err(err);
    }
    Ok(())
}

/// A file read by [`read_if_fresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshFile {
    /// File contents.
    pub contents: Vec<u8>,
    /// Time left before the file turns stale.
    pub remaining: Duration,
}

/// Read `path` when it exists and was modified no more than `max_age` ago.
///
/// Returns `Ok(None)` for missing or stale files. Modification times in the
/// future count as fresh with the full `max_age` remaining.
pub fn read_if_fresh(path: &Utf8Path, max_age: Duration) -> io::Result<Option<FreshFile>> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let modified = match dir.metadata(name.as_str()) {
        Ok(meta) => meta.modified()?.into_std(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    let Some(remaining) = max_age.checked_sub(age) else {
        return Ok(None);
    };
    match dir.read(name.as_str()) {
        Ok(contents) => Ok(Some(FreshFile {
            contents,
            remaining,
        })),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Append `line` plus a newline to `path`, creating the file when missing.
pub fn append_line(path: &Utf8Path, line: &str) -> io::Result<()> {
    use std::io::Write as _;

    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    let mut options = fs_utf8::OpenOptions::new();
    options.create(true).append(true);
    let mut file = dir.open_with(name.as_str(), &options)?;
    let mut buffer = String::with_capacity(line.len() + 1);
    buffer.push_str(line);
    buffer.push('\n');
    file.write_all(buffer.as_bytes())
}

/// Split an absolute or relative parent path into an ambient base directory and a relative suffix.
pub fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other("non-UTF-8 parent path"))?;

    Ok((dir, relative))
}

fn temp_sibling_name(file_name: &str) -> String {
    let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(".{file_name}.{}.{sequence}.tmp", std::process::id())
}
