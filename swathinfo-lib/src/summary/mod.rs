//! Running statistics over a stream of pings.
mod merge;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::nav::{beam_position, distance_km};
use crate::record::{Flag, NavFix, Ping};

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;
const MICROMETERS_PER_KM: f64 = 1e9;

/// Closed interval of observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Smallest interval containing both.
    #[must_use]
    pub fn union(&self, other: &Bounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Widen `bounds` to include `value`, starting it if nothing was observed yet.
fn extend(bounds: &mut Option<Bounds>, value: f64) {
    let value = Bounds::new(value);
    *bounds = Some(bounds.map_or(value, |b| b.union(&value)));
}

/// Beam or pixel counts for one data category.
///
/// `good + zero + flagged == total` always holds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Largest number of beams or pixels seen in a single ping.
    pub max_per_ping: usize,
    pub total: usize,
    pub good: usize,
    pub zero: usize,
    pub flagged: usize,
}

impl Counts {
    fn add<I>(&mut self, flags: I)
    where
        I: ExactSizeIterator<Item = Flag>,
    {
        self.max_per_ping = self.max_per_ping.max(flags.len());
        for flag in flags {
            self.total += 1;
            match flag {
                Flag::Good => self.good += 1,
                Flag::Zero => self.zero += 1,
                Flag::Flagged => self.flagged += 1,
            }
        }
    }

    #[must_use]
    pub fn percent_good(&self) -> f64 {
        percent(self.good, self.total)
    }

    #[must_use]
    pub fn percent_zero(&self) -> f64 {
        percent(self.zero, self.total)
    }

    #[must_use]
    pub fn percent_flagged(&self) -> f64 {
        percent(self.flagged, self.total)
    }
}

/// `100 * count / total`, or 0 when there is nothing to count.
fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

/// Observed value ranges.
///
/// A bound is `None` until a contributing value is observed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Navigation fixes and good beam footprints
    pub longitude: Option<Bounds>,
    /// Navigation fixes and good beam footprints
    pub latitude: Option<Bounds>,
    pub sonar_depth: Option<Bounds>,
    pub altitude: Option<Bounds>,
    /// Good beams only
    pub depth: Option<Bounds>,
    /// Good beams only
    pub amplitude: Option<Bounds>,
}

/// Statistics accumulated over a stream of pings.
///
/// Create one per input with [Summary::default], feed it every ping in stream order with
/// [Summary::add], then read the derived values. Summaries of independent inputs combine with
/// [Summary::merge].
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use swathinfo::record::{Beam, Flag, NavFix, Ping};
/// use swathinfo::Summary;
///
/// let mut ping = Ping::new(Utc.with_ymd_and_hms(2001, 11, 5, 0, 0, 0).unwrap(), NavFix::default());
/// ping.beams.push(Beam::new(100.0, 0.0, Flag::Good));
/// ping.beams.push(Beam::new(0.0, 10.0, Flag::Zero));
///
/// let mut summary = Summary::default();
/// summary.add(&ping);
/// assert_eq!(summary.bathymetry.total, 2);
/// assert_eq!(summary.bathymetry.percent_good(), 50.0);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of pings added
    pub records: usize,
    /// Pings with neither beams nor pixels
    pub nav_only_records: usize,
    pub bathymetry: Counts,
    /// Beams counted for their amplitude; tracks [Summary::bathymetry].
    pub amplitude: Counts,
    pub sidescan: Counts,
    /// Sum of the positive time steps between consecutive pings.
    pub elapsed_micros: i64,
    /// Great circle distance between consecutive fixes in micrometers.
    pub track_micrometers: u64,
    pub limits: Limits,
    /// Earliest ping
    pub start: Option<Ping>,
    /// Latest ping
    pub end: Option<Ping>,
}

impl Summary {
    /// Fold `ping` into the running statistics. `ping` must not be earlier in the stream than
    /// the previously added ping.
    pub fn add(&mut self, ping: &Ping) {
        self.records += 1;
        if ping.is_nav_only() {
            self.nav_only_records += 1;
        }

        self.bathymetry.add(ping.beams.iter().map(|b| b.flag));
        self.amplitude.add(ping.beams.iter().map(|b| b.flag));
        self.sidescan.add(ping.pixels.iter().map(|p| p.flag));

        let nav = &ping.nav;
        let limits = &mut self.limits;
        extend(&mut limits.longitude, nav.longitude);
        extend(&mut limits.latitude, nav.latitude);
        extend(&mut limits.sonar_depth, nav.sonar_depth);
        extend(&mut limits.altitude, nav.altitude);
        for beam in ping.beams.iter().filter(|b| b.flag == Flag::Good) {
            extend(&mut limits.depth, beam.depth);
            extend(&mut limits.amplitude, beam.amplitude);
            let (lon, lat) = beam_position(nav, beam);
            extend(&mut limits.longitude, lon);
            extend(&mut limits.latitude, lat);
        }

        if let Some(prev) = &self.end {
            let delta = (ping.time - prev.time).num_microseconds().unwrap_or(0);
            if delta > 0 {
                self.elapsed_micros += delta;
            } else if delta < 0 {
                debug!(prev = %prev.time, time = %ping.time, "time went backwards; ignoring step");
            }
            self.track_micrometers += track_micrometers(&prev.nav, nav);
        }
        if self.start.is_none() {
            self.start = Some(ping.clone());
        }
        self.end = Some(ping.clone());
    }

    /// [Summary::add] in value form.
    #[must_use]
    pub fn fold(mut self, ping: &Ping) -> Self {
        self.add(ping);
        self
    }

    #[must_use]
    pub fn total_time_hours(&self) -> f64 {
        self.elapsed_micros as f64 / MICROS_PER_HOUR
    }

    #[must_use]
    pub fn track_length_km(&self) -> f64 {
        self.track_micrometers as f64 / MICROMETERS_PER_KM
    }

    /// Track length over elapsed time, or 0 if no time elapsed.
    #[must_use]
    pub fn average_speed_kmh(&self) -> f64 {
        let hours = self.total_time_hours();
        if hours > 0.0 {
            self.track_length_km() / hours
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn average_speed_knots(&self) -> f64 {
        self.average_speed_kmh() * NavFix::KNOTS_PER_KMH
    }
}

fn track_micrometers(a: &NavFix, b: &NavFix) -> u64 {
    let km = distance_km(a, b);
    if km.is_finite() {
        (km * MICROMETERS_PER_KM).round() as u64
    } else {
        0
    }
}
