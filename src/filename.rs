//! Numbered output file names
//!
//! A name is split into `base`, an optional trailing `-N` counter and an
//! extension: `shots/capture-3.gif` is (`shots/capture`, 3, `.gif`).

use std::io;
use std::path::{Path, PathBuf};

use crate::config::OutputMethod;

/// Extension including the dot, never crossing a path separator
fn extension(name: &str) -> &str {
    for (i, ch) in name.char_indices().rev() {
        if std::path::is_separator(ch) {
            break;
        }
        if ch == '.' {
            return &name[i..];
        }
    }
    ""
}

/// Replace the extension of `name`, adding one if there is none
pub fn with_extension(name: &str, ext: &str) -> String {
    let stem = &name[..name.len() - extension(name).len()];
    format!("{stem}.{ext}")
}

fn parse_increment(name: &str) -> (&str, u64, &str) {
    let mut ext = extension(name);
    let mut stem = &name[..name.len() - ext.len()];

    // A bare dotfile is all stem
    if stem.is_empty() && !ext.is_empty() {
        stem = ext;
        ext = "";
    }
    if stem.is_empty() {
        return ("", 0, "");
    }

    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_digit())
        .last()
        .map_or(stem.len(), |(i, _)| i);
    let number = stem[digits_start..].parse().unwrap_or(0);
    let base = &stem[..digits_start];
    let base = base.strip_suffix('-').unwrap_or(base);

    (base, number, ext)
}

/// Bump the counter of `name`, starting at 1 when it has none
///
/// ```text
/// capture.gif   -> capture-1.gif
/// capture-1.gif -> capture-2.gif
/// ```
///
/// A counter that cannot be bumped becomes part of the base.
pub fn increment_filename(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let (base, number, ext) = parse_increment(name);
    match number.checked_add(1) {
        Some(next) => format!("{base}-{next}{ext}"),
        None => format!("{base}-{number}-1{ext}"),
    }
}

/// Set the counter of `name` to `counter`
pub fn replace_incremented_filename(name: &str, counter: u64) -> String {
    let (base, _, ext) = parse_increment(name);
    format!("{base}-{counter}{ext}")
}

/// One past the highest counter among existing files sharing the base name
/// and extension of `name`, together with that counter
///
/// A missing or unreadable directory counts as holding no matches. Fails
/// when the highest existing counter is already `u64::MAX`.
pub fn next_latest_incremented_filename(name: &str) -> anyhow::Result<(String, u64)> {
    let (base, _, ext) = parse_increment(name);
    let base_path = Path::new(base);

    let (dir, prefix) = if base.ends_with(std::path::is_separator) {
        (base_path, "")
    } else {
        let dir = base_path.parent().unwrap_or(Path::new(""));
        let prefix = base_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        (dir, prefix)
    };

    let highest = match highest_counter(dir, prefix, ext) {
        Ok(highest) => highest,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to scan {} for numbered files: {}", dir.display(), e);
            }
            0
        }
    };

    let Some(next) = highest.checked_add(1) else {
        anyhow::bail!("No file number left after {base}-{highest}{ext}");
    };
    Ok((format!("{base}-{next}{ext}"), next))
}

fn highest_counter(dir: &Path, prefix: &str, ext: &str) -> io::Result<u64> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    let mut highest = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.starts_with(prefix) {
            continue;
        }
        let (_, number, other_ext) = parse_increment(file_name);
        if other_ext == ext && number > highest {
            highest = number;
        }
    }
    Ok(highest)
}

/// File the next session writes to, plus the counter it starts from
///
/// Overwrite keeps the configured path. New-file keeps it while nothing
/// exists there yet, and otherwise moves past the highest numbered sibling.
pub fn next_output(path: &Path, method: OutputMethod) -> anyhow::Result<(PathBuf, u64)> {
    if method == OutputMethod::Overwrite {
        return Ok((path.to_path_buf(), 0));
    }

    match path.try_exists() {
        Ok(false) => return Ok((path.to_path_buf(), 0)),
        Ok(true) => {}
        Err(e) => {
            log::warn!("Failed to check {}: {}", path.display(), e);
            return Ok((path.to_path_buf(), 0));
        }
    }

    let (name, counter) = next_latest_incremented_filename(&path.to_string_lossy())?;
    Ok((PathBuf::from(name), counter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_filename() {
        let cases = [
            ("filename.png", "filename-1.png"),
            ("filename-1.png", "filename-2.png"),
            ("filename-x.png", "filename-x-1.png"),
            ("filename-.png", "filename-1.png"),
            ("", ""),
            (".file", ".file-1"),
            ("-.file", "-1.file"),
            ("/home/u/screen-1.gif", "/home/u/screen-2.gif"),
            ("filename", "filename-1"),
            ("filename-1", "filename-2"),
            ("5", "-6"),
            ("-", "-1"),
            (
                "capture-18446744073709551615.gif",
                "capture-18446744073709551615-1.gif",
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(increment_filename(input), expected, "input={input:?}");
        }
    }

    #[test]
    fn test_extension_does_not_cross_directories() {
        assert_eq!(extension("shots.d/capture"), "");
        assert_eq!(increment_filename("shots.d/capture"), "shots.d/capture-1");
    }

    #[test]
    fn test_replace_incremented_filename() {
        assert_eq!(replace_incremented_filename("capture.png", 0), "capture-0.png");
        assert_eq!(replace_incremented_filename("capture-7.png", 3), "capture-3.png");
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("out/capture.gif", "png"), "out/capture.png");
        assert_eq!(with_extension("capture", "gif"), "capture.gif");
    }

    #[test]
    fn test_next_latest_scans_siblings() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["capture.gif", "capture-2.gif", "capture-9.png", "other-5.gif"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let target = dir.path().join("capture.gif");
        let (next, counter) = next_latest_incremented_filename(&target.to_string_lossy()).unwrap();
        assert_eq!(counter, 3);
        assert_eq!(PathBuf::from(next), dir.path().join("capture-3.gif"));
    }

    #[test]
    fn test_next_latest_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("capture.gif");
        let (_, counter) = next_latest_incremented_filename(&target.to_string_lossy()).unwrap();
        assert_eq!(counter, 1);
    }

    #[test]
    fn test_next_latest_refuses_exhausted_counter() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("capture.gif");
        std::fs::write(&target, b"").unwrap();
        std::fs::write(dir.path().join("capture-18446744073709551615.gif"), b"").unwrap();

        let err = next_latest_incremented_filename(&target.to_string_lossy()).unwrap_err();
        assert!(err.to_string().contains("No file number left"), "{err}");
        assert!(next_output(&target, OutputMethod::NewFile).is_err());
        assert_eq!(
            next_output(&target, OutputMethod::Overwrite).unwrap(),
            (target.clone(), 0)
        );
    }

    #[test]
    fn test_next_output() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("capture.gif");

        assert_eq!(next_output(&target, OutputMethod::NewFile).unwrap(), (target.clone(), 0));

        std::fs::write(&target, b"").unwrap();
        assert_eq!(next_output(&target, OutputMethod::Overwrite).unwrap(), (target.clone(), 0));
        assert_eq!(
            next_output(&target, OutputMethod::NewFile).unwrap(),
            (dir.path().join("capture-1.gif"), 1)
        );
    }
}
