//! Datalist files: one `path [format [weight]]` entry per line.
//!
//! Blank lines and lines starting with `#` are ignored. Relative paths are relative to the
//! directory of the datalist containing them and entries with format `-1` are datalists
//! themselves.
use std::fs;
use std::path::{Path, PathBuf};

use swathinfo::{Entry, Error, FormatHint, Result};
use tracing::debug;

/// Nesting limit, which also stops datalists that include themselves.
const MAX_DEPTH: usize = 16;

/// Read all swath file entries from the datalist at `path`, expanding nested datalists.
///
/// # Errors
/// [Error::Io] naming the datalist if it, or a nested datalist, cannot be read, and
/// [Error::UnsupportedFormat] for an invalid format field or excessive nesting.
pub fn read(path: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::default();
    read_into(path, 0, &mut entries)?;
    Ok(entries)
}

fn read_into(path: &Path, depth: usize, entries: &mut Vec<Entry>) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: format!("datalists nested more than {MAX_DEPTH} deep"),
        });
    }
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else {
            continue;
        };
        let hint = match fields.next() {
            Some(s) => s.parse::<FormatHint>().map_err(|reason| Error::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: format!("line {}: {reason}", lineno + 1),
            })?,
            None => FormatHint::Auto,
        };
        let entry_path = resolve(base, name);
        if hint == FormatHint::Datalist {
            debug!(?entry_path, "expanding nested datalist");
            read_into(&entry_path, depth + 1, entries)?;
        } else {
            entries.push(Entry::new(entry_path, hint));
        }
    }
    Ok(())
}

fn resolve(base: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
