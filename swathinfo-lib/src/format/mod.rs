//! Swath data format registry and decoders.
//!
//! A [Decoder] turns the bytes of one swath data file into a lazy sequence of [Ping]s. The
//! [Registry] maps integer format ids to decoders and performs format auto-detection.
mod bytes;
mod hsatlraw;
mod mb1;
mod reson7k;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::nav::LonFlip;
use crate::prelude::*;
use crate::record::{FormatInfo, Ping};

pub use hsatlraw::HsAtlRaw;
pub use mb1::MbariMb1;
pub use reson7k::Reson7k;

/// Lazy, finite, non-restartable sequence of decoded pings.
///
/// The first `Err` ends the sequence.
pub type Pings = Box<dyn Iterator<Item = Result<Ping>> + Send>;

/// Number of leading file bytes handed to [Decoder::probe].
pub const PROBE_LEN: usize = 64;

/// Decodes one family of swath data formats.
pub trait Decoder: Send + Sync {
    fn info(&self) -> FormatInfo;

    /// File name suffixes, without the dot, conventionally used for this format in addition to
    /// the generic `mb<id>` suffix.
    fn extensions(&self) -> &[&'static str] {
        &[]
    }

    /// Returns true if `header`, the first (up to) [PROBE_LEN] bytes of a file, looks like
    /// this format.
    fn probe(&self, header: &[u8]) -> bool;

    /// Open `path` and return its pings.
    ///
    /// # Errors
    /// [Error::Io] if the file cannot be opened.
    fn open(&self, path: &Path, lonflip: LonFlip) -> Result<Pings>;
}

/// Format selection requested by the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatHint {
    /// Detect from file contents and name
    #[default]
    Auto,
    Id(i32),
    /// The input is a list of swath files rather than a swath file
    Datalist,
}

impl From<i32> for FormatHint {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Auto,
            -1 => Self::Datalist,
            id => Self::Id(id),
        }
    }
}

impl FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .map(Self::from)
            .map_err(|_| format!("invalid format id {s:?}"))
    }
}

impl Display for FormatHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Datalist => write!(f, "datalist"),
        }
    }
}

/// Maps format ids to [Decoder]s.
///
/// # Example
/// ```
/// use swathinfo::format::{FormatHint, Registry};
///
/// let registry = Registry::default();
/// let decoder = registry
///     .resolve(FormatHint::Id(21), std::path::Path::new("survey.mb21"))
///     .unwrap();
/// assert_eq!(decoder.info().name, "MBF_HSATLRAW");
/// ```
#[derive(Clone)]
pub struct Registry {
    decoders: BTreeMap<i32, Arc<dyn Decoder>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(HsAtlRaw));
        registry.register(Arc::new(Reson7k));
        registry.register(Arc::new(MbariMb1));
        registry
    }
}

impl Registry {
    /// A registry with no decoders.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::default(),
        }
    }

    /// Add `decoder`, replacing any decoder already registered for its id.
    pub fn register(&mut self, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(decoder.info().id, decoder);
    }

    #[must_use]
    pub fn get(&self, id: i32) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(&id).cloned()
    }

    /// Info for all registered formats in ascending id order.
    pub fn formats(&self) -> impl Iterator<Item = FormatInfo> + '_ {
        self.decoders.values().map(|d| d.info())
    }

    /// Select the decoder for `path`.
    ///
    /// An explicit id never touches the file. Auto-detection probes the leading bytes with
    /// every decoder in ascending id order. A single match wins. Multiple matches are
    /// disambiguated by the file extension, and no match falls back to the extension alone.
    ///
    /// # Errors
    /// [Error::UnsupportedFormat] for unknown ids, datalist hints, and inconclusive detection.
    /// [Error::Io] if the file must be read for detection and cannot be.
    pub fn resolve(&self, hint: FormatHint, path: &Path) -> Result<Arc<dyn Decoder>> {
        match hint {
            FormatHint::Id(id) => self
                .get(id)
                .ok_or_else(|| Error::unsupported(path, format!("unknown format id {id}"))),
            FormatHint::Datalist => Err(Error::unsupported(
                path,
                "a datalist cannot be decoded as swath data",
            )),
            FormatHint::Auto => self.detect(path),
        }
    }

    fn detect(&self, path: &Path) -> Result<Arc<dyn Decoder>> {
        let mut header = Vec::with_capacity(PROBE_LEN);
        File::open(path)
            .and_then(|f| f.take(PROBE_LEN as u64).read_to_end(&mut header))
            .map_err(|err| Error::io(path, err))?;

        let matches: Vec<i32> = self
            .decoders
            .iter()
            .filter(|(_, d)| d.probe(&header))
            .map(|(id, _)| *id)
            .collect();
        trace!(?path, ?matches, "probed header");
        let by_extension = self.extension_id(path);

        let id = match matches.as_slice() {
            [id] => *id,
            [] => by_extension.ok_or_else(|| {
                Error::unsupported(path, "no decoder recognizes the file contents or name")
            })?,
            _ => match by_extension {
                Some(id) if matches.contains(&id) => id,
                _ => {
                    return Err(Error::unsupported(
                        path,
                        format!("ambiguous contents; candidate formats {matches:?}"),
                    ))
                }
            },
        };
        debug!(?path, format = id, "detected format");
        // id came from the registry, so lookup cannot fail
        self.get(id)
            .ok_or_else(|| Error::unsupported(path, format!("unknown format id {id}")))
    }

    /// Format id implied by the file extension, if it names a registered format.
    fn extension_id(&self, path: &Path) -> Option<i32> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if let Some(id) = ext.strip_prefix("mb").and_then(|s| s.parse::<i32>().ok()) {
            return self.decoders.contains_key(&id).then_some(id);
        }
        self.decoders
            .iter()
            .find(|(_, d)| d.extensions().contains(&ext.as_str()))
            .map(|(id, _)| *id)
    }
}

/// Opens `path` for a decoder, mapping failures to [Error::Io].
pub(crate) fn open_file(path: &Path) -> Result<std::io::BufReader<File>> {
    File::open(path)
        .map(std::io::BufReader::new)
        .map_err(|err| Error::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, dat: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(dat).unwrap();
        path
    }

    #[test_case(0, FormatHint::Auto)]
    #[test_case(-1, FormatHint::Datalist)]
    #[test_case(21, FormatHint::Id(21))]
    #[test_case(-7, FormatHint::Id(-7))]
    fn hint_from_int(value: i32, expected: FormatHint) {
        assert_eq!(FormatHint::from(value), expected);
    }

    #[test]
    fn hint_from_str() {
        assert_eq!("88".parse::<FormatHint>(), Ok(FormatHint::Id(88)));
        assert!("garbage".parse::<FormatHint>().is_err());
    }

    #[test]
    fn default_registry_formats() {
        let ids: Vec<i32> = Registry::default().formats().map(|f| f.id).collect();
        assert_eq!(ids, vec![21, 88, 241]);
    }

    #[test]
    fn unknown_id_does_not_touch_file() {
        let zult = Registry::default().resolve(FormatHint::Id(9999), Path::new("/does/not/exist"));
        let err = zult.err().expect("should fail");
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn detect_missing_file_is_io() {
        let zult = Registry::default().resolve(FormatHint::Auto, Path::new("/does/not/exist.mb21"));
        let err = zult.err().expect("should fail");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/does/not/exist.mb21"));
    }

    #[test]
    fn detect_by_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "noext", b"ERGNHYDI header\n");
        let decoder = Registry::default().resolve(FormatHint::Auto, &path).unwrap();
        assert_eq!(decoder.info().id, 21);
    }

    #[test]
    fn detect_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "empty.s7k", b"");
        let decoder = Registry::default().resolve(FormatHint::Auto, &path).unwrap();
        assert_eq!(decoder.info().id, 88);

        let path = write_tmp(&dir, "empty.MB241", b"");
        let decoder = Registry::default().resolve(FormatHint::Auto, &path).unwrap();
        assert_eq!(decoder.info().id, 241);
    }

    #[test]
    fn detect_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "garbage.dat", &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        let err = Registry::default()
            .resolve(FormatHint::Auto, &path)
            .err()
            .expect("should fail");
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    struct Always(i32);

    impl Decoder for Always {
        fn info(&self) -> FormatInfo {
            FormatInfo {
                id: self.0,
                name: format!("ALWAYS{}", self.0),
                description: String::new(),
                attributes: String::new(),
            }
        }

        fn probe(&self, _header: &[u8]) -> bool {
            true
        }

        fn open(&self, _path: &Path, _lonflip: LonFlip) -> Result<Pings> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    #[test]
    fn ambiguous_detection() {
        let mut registry = Registry::empty();
        registry.register(Arc::new(Always(1)));
        registry.register(Arc::new(Always(2)));
        let dir = tempfile::tempdir().unwrap();

        let path = write_tmp(&dir, "x.dat", b"abc");
        let err = registry
            .resolve(FormatHint::Auto, &path)
            .err()
            .expect("should be ambiguous");
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

        let path = write_tmp(&dir, "x.mb2", b"abc");
        let decoder = registry.resolve(FormatHint::Auto, &path).unwrap();
        assert_eq!(decoder.info().id, 2);
    }
}
