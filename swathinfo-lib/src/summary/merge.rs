use std::cmp::Ordering;

use super::{Bounds, Counts, Limits, Summary};
use crate::record::Ping;

impl Summary {
    /// Combine the summaries of two independent inputs.
    ///
    /// Counts and totals add, bounds widen and start/end of data are taken from whichever
    /// summary has the earlier start or later end. The operation is associative and
    /// commutative so batches may be merged in any grouping. No track length or elapsed time is
    /// added for the gap between inputs.
    #[must_use]
    pub fn merge(self, other: Summary) -> Summary {
        Summary {
            records: self.records + other.records,
            nav_only_records: self.nav_only_records + other.nav_only_records,
            bathymetry: self.bathymetry.merge(&other.bathymetry),
            amplitude: self.amplitude.merge(&other.amplitude),
            sidescan: self.sidescan.merge(&other.sidescan),
            elapsed_micros: self.elapsed_micros + other.elapsed_micros,
            track_micrometers: self.track_micrometers + other.track_micrometers,
            limits: self.limits.merge(&other.limits),
            start: pick(self.start, other.start, Ordering::Less),
            end: pick(self.end, other.end, Ordering::Greater),
        }
    }
}

impl Counts {
    fn merge(&self, other: &Counts) -> Counts {
        Counts {
            max_per_ping: self.max_per_ping.max(other.max_per_ping),
            total: self.total + other.total,
            good: self.good + other.good,
            zero: self.zero + other.zero,
            flagged: self.flagged + other.flagged,
        }
    }
}

impl Limits {
    fn merge(&self, other: &Limits) -> Limits {
        Limits {
            longitude: union(self.longitude, other.longitude),
            latitude: union(self.latitude, other.latitude),
            sonar_depth: union(self.sonar_depth, other.sonar_depth),
            altitude: union(self.altitude, other.altitude),
            depth: union(self.depth, other.depth),
            amplitude: union(self.amplitude, other.amplitude),
        }
    }
}

fn union(a: Option<Bounds>, b: Option<Bounds>) -> Option<Bounds> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    }
}

/// Total order used to choose between candidate start/end pings: time, then position.
fn ping_order(a: &Ping, b: &Ping) -> Ordering {
    a.time
        .cmp(&b.time)
        .then_with(|| a.nav.longitude.total_cmp(&b.nav.longitude))
        .then_with(|| a.nav.latitude.total_cmp(&b.nav.latitude))
}

/// The candidate that orders as `wanted` relative to the other; `a` on a complete tie.
fn pick(a: Option<Ping>, b: Option<Ping>, wanted: Ordering) -> Option<Ping> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if ping_order(&b, &a) == wanted {
                Some(b)
            } else {
                Some(a)
            }
        }
        (a, b) => a.or(b),
    }
}
