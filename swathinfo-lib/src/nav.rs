//! Geodesy helpers shared by decoders and the summary.
use serde::{Deserialize, Serialize};

use crate::record::{Beam, NavFix};

/// Mean Earth radius (km) used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Longitude convention applied by decoders.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LonFlip {
    /// [-360, 0)
    West,
    /// [-180, 180]
    #[default]
    Centered,
    /// [0, 360)
    East,
}

impl LonFlip {
    /// Longitude `lon` in this convention.
    #[must_use]
    pub fn apply(&self, lon: f64) -> f64 {
        let mut lon = lon;
        match self {
            Self::West => {
                while lon >= 0.0 {
                    lon -= 360.0;
                }
                while lon < -360.0 {
                    lon += 360.0;
                }
            }
            Self::Centered => {
                while lon > 180.0 {
                    lon -= 360.0;
                }
                while lon < -180.0 {
                    lon += 360.0;
                }
            }
            Self::East => {
                while lon < 0.0 {
                    lon += 360.0;
                }
                while lon >= 360.0 {
                    lon -= 360.0;
                }
            }
        }
        lon
    }
}

impl TryFrom<i32> for LonFlip {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::West),
            0 => Ok(Self::Centered),
            1 => Ok(Self::East),
            _ => Err(format!("lonflip must be -1, 0, or 1; got {value}")),
        }
    }
}

/// Heading in degrees wrapped into [0, 360).
#[must_use]
pub fn wrap_heading(heading: f64) -> f64 {
    let h = heading % 360.0;
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

/// Degrees of longitude and latitude per meter at `latitude`.
#[must_use]
pub fn coor_scale(latitude: f64) -> (f64, f64) {
    const C1: f64 = 111_412.84;
    const C2: f64 = -93.5;
    const C3: f64 = 0.118;
    const C4: f64 = 111_132.92;
    const C5: f64 = -559.82;
    const C6: f64 = 1.175;
    const C7: f64 = 0.0023;

    let radlat = latitude.to_radians();
    let mtodeglon =
        1.0 / (C1 * radlat.cos() + C2 * (3.0 * radlat).cos() + C3 * (5.0 * radlat).cos()).abs();
    let mtodeglat = 1.0
        / (C4
            + C5 * (2.0 * radlat).cos()
            + C6 * (4.0 * radlat).cos()
            + C7 * (6.0 * radlat).cos())
        .abs();
    (mtodeglon, mtodeglat)
}

/// Geographic position `(lon, lat)` of a beam footprint.
#[must_use]
pub fn beam_position(nav: &NavFix, beam: &Beam) -> (f64, f64) {
    let (mtodeglon, mtodeglat) = coor_scale(nav.latitude);
    let heading = nav.heading.to_radians();
    let (headingx, headingy) = (heading.sin(), heading.cos());
    let lon = nav.longitude
        + headingy * mtodeglon * beam.acrosstrack
        + headingx * mtodeglon * beam.alongtrack;
    let lat = nav.latitude - headingx * mtodeglat * beam.acrosstrack
        + headingy * mtodeglat * beam.alongtrack;
    (lon, lat)
}

/// Haversine distance in km between two fixes.
#[must_use]
pub fn distance_km(a: &NavFix, b: &NavFix) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = (b.longitude - a.longitude).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Fills in speed for formats that do not record one, from the previous fix.
///
/// `elapsed_secs` is the time between the fixes; non-positive intervals leave speed at 0.
pub(crate) fn derive_speed(prev: &NavFix, cur: &mut NavFix, elapsed_secs: f64) {
    cur.speed = if elapsed_secs > 0.0 {
        distance_km(prev, cur) / (elapsed_secs / 3600.0)
    } else {
        0.0
    };
}
