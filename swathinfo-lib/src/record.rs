//! Format independent representation of decoded swath data.
//!
//! Every decoder normalizes its native records into [Ping]s. No format specific flag values
//! or coordinate conventions survive past this point.
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality state of a single beam or pixel.
///
/// Exactly one state applies to every sample.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    #[default]
    Good,
    /// The sensor produced no valid return; decoded value is exactly zero.
    Zero,
    /// Marked invalid by a quality-control process.
    Flagged,
}

/// One bathymetry and amplitude sounding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// Depth in meters, positive down.
    pub depth: f64,
    /// Across-track distance from the navigation fix in meters, starboard positive.
    pub acrosstrack: f64,
    /// Along-track distance from the navigation fix in meters, forward positive.
    pub alongtrack: f64,
    pub amplitude: f64,
    pub flag: Flag,
}

impl Beam {
    #[must_use]
    pub fn new(depth: f64, acrosstrack: f64, flag: Flag) -> Self {
        Self {
            depth,
            acrosstrack,
            flag,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_alongtrack(mut self, alongtrack: f64) -> Self {
        self.alongtrack = alongtrack;
        self
    }

    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }
}

/// One sidescan intensity sample.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub value: f64,
    pub flag: Flag,
}

impl Pixel {
    /// Pixel whose flag follows from its value alone, i.e., zero is [Flag::Zero].
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        let flag = if value == 0.0 { Flag::Zero } else { Flag::Good };
        Self { value, flag }
    }
}

/// Vessel/sonar navigation at the time of a ping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavFix {
    /// Decimal degrees, already normalized to the configured longitude convention.
    pub longitude: f64,
    pub latitude: f64,
    /// Speed over ground in km/h
    pub speed: f64,
    /// Degrees in [0, 360)
    pub heading: f64,
    /// Transducer depth in meters
    pub sonar_depth: f64,
    /// Transducer height above the bottom in meters
    pub altitude: f64,
}

impl NavFix {
    /// Conversion factor from km/h to knots.
    pub const KNOTS_PER_KMH: f64 = 0.53996;

    #[must_use]
    pub fn speed_knots(&self) -> f64 {
        self.speed * Self::KNOTS_PER_KMH
    }
}

/// One sonar transmit/receive cycle.
///
/// A ping with no beams and no pixels is valid and represents a navigation-only record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub time: DateTime<Utc>,
    pub nav: NavFix,
    pub beams: Vec<Beam>,
    pub pixels: Vec<Pixel>,
}

impl Ping {
    #[must_use]
    pub fn new(time: DateTime<Utc>, nav: NavFix) -> Self {
        Self {
            time,
            nav,
            beams: Vec::default(),
            pixels: Vec::default(),
        }
    }

    #[must_use]
    pub fn is_nav_only(&self) -> bool {
        self.beams.is_empty() && self.pixels.is_empty()
    }

    /// Depth of the good beam closest to nadir, or 0 if there are no good beams.
    #[must_use]
    pub fn nadir_depth(&self) -> f64 {
        self.beams
            .iter()
            .filter(|b| b.flag == Flag::Good)
            .min_by(|a, b| a.acrosstrack.abs().total_cmp(&b.acrosstrack.abs()))
            .map_or(0.0, |b| b.depth)
    }

    /// Altitude computed from the nadir depth for formats that do not record one.
    pub(crate) fn derive_altitude(&mut self) {
        let nadir = self.nadir_depth();
        self.nav.altitude = if nadir > 0.0 {
            nadir - self.nav.sonar_depth
        } else {
            0.0
        };
    }
}

/// Registry metadata describing a swath data format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    /// Integer format identifier, e.g., 21
    pub id: i32,
    /// Short name, e.g., `MBF_HSATLRAW`
    pub name: String,
    pub description: String,
    /// Free-text description of what the format carries
    pub attributes: String,
}

/// A swath data file with its resolved format. Immutable once identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwathFile {
    pub path: PathBuf,
    pub format: FormatInfo,
}

impl SwathFile {
    /// File name component used for reporting.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(
                || self.path.to_string_lossy(),
                |name| name.to_string_lossy(),
            )
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ping() -> Ping {
        let mut ping = Ping::new(
            Utc.with_ymd_and_hms(2001, 11, 5, 0, 1, 44).unwrap(),
            NavFix {
                sonar_depth: 5.0,
                ..Default::default()
            },
        );
        ping.beams = vec![
            Beam::new(110.0, -20.0, Flag::Good),
            Beam::new(0.0, -1.0, Flag::Zero),
            Beam::new(105.0, 2.5, Flag::Good),
            Beam::new(90.0, 0.5, Flag::Flagged),
        ];
        ping
    }

    #[test]
    fn nadir_depth_uses_closest_good_beam() {
        assert_eq!(ping().nadir_depth(), 105.0);
    }

    #[test]
    fn nadir_depth_without_good_beams_is_zero() {
        let mut ping = ping();
        ping.beams.retain(|b| b.flag != Flag::Good);
        assert_eq!(ping.nadir_depth(), 0.0);
    }

    #[test]
    fn derived_altitude_is_relative_to_sonar() {
        let mut ping = ping();
        ping.derive_altitude();
        assert_eq!(ping.nav.altitude, 100.0);
    }

    #[test]
    fn pixel_flag_from_value() {
        assert_eq!(Pixel::from_value(0.0).flag, Flag::Zero);
        assert_eq!(Pixel::from_value(12.0).flag, Flag::Good);
    }

    #[test]
    fn nav_only_ping() {
        let mut ping = ping();
        assert!(!ping.is_nav_only());
        ping.beams.clear();
        assert!(ping.is_nav_only());
    }
}
