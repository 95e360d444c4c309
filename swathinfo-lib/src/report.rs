//! Rendering of a finalized [Summary].
//!
//! Both output styles are produced from one [Report] whose values are already formatted
//! strings, so every number displays with identical digits in either style.
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use handlebars::{handlebars_helper, Handlebars};
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::record::{Ping, SwathFile};
use crate::summary::{Bounds, Counts, Summary};

/// Output style.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Human readable report
    #[default]
    Text,
    /// Structured mapping of sections to fields
    Json,
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "0" => Ok(Self::Text),
            "json" | "1" => Ok(Self::Json),
            _ => Err(format!("invalid output style {s:?}")),
        }
    }
}

impl Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Percentage, width 5 with 2 decimals, e.g., `" 2.54"`.
#[must_use]
pub fn fmt_percent(value: f64) -> String {
    fmt_percent_width(value, 5)
}

/// Percentage with 2 decimals right aligned to `width`.
#[must_use]
pub fn fmt_percent_width(value: f64, width: usize) -> String {
    format!("{:width$.2}", positive_zero(value))
}

/// Fixed 4 decimal value, e.g., `"462.6000"`.
#[must_use]
pub fn fmt_decimal(value: f64) -> String {
    format!("{:.4}", positive_zero(value))
}

/// Longitude or latitude with 9 decimals, signed only when negative.
#[must_use]
pub fn fmt_coordinate(value: f64) -> String {
    format!("{:.9}", positive_zero(value))
}

/// Component form, e.g., `"11 05 2001 00:01:44.000000  JD309"`.
#[must_use]
pub fn fmt_time(time: &DateTime<Utc>) -> String {
    format!(
        "{}  JD{}",
        time.format("%m %d %Y %H:%M:%S%.6f"),
        time.ordinal()
    )
}

/// ISO 8601 with microseconds and no zone suffix, e.g., `"2001-11-05T00:01:44.000000"`.
#[must_use]
pub fn fmt_time_iso(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Avoids rendering `-0.0000` for values that rounded to, or are, negative zero.
fn positive_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub swath_data_file: String,
    pub mbio_data_format_id: String,
    pub format_name: String,
    pub informal_description: String,
    /// Format attributes with line breaks replaced by `;`
    pub attributes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTotals {
    pub number_of_records: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamData {
    pub max_beams_per_ping: String,
    pub number_beams: String,
    pub number_good_beams: String,
    pub percent_good_beams: String,
    pub number_zero_beams: String,
    pub percent_zero_beams: String,
    pub number_flagged_beams: String,
    pub percent_flagged_beams: String,
}

impl From<&Counts> for BeamData {
    fn from(counts: &Counts) -> Self {
        Self {
            max_beams_per_ping: counts.max_per_ping.to_string(),
            number_beams: counts.total.to_string(),
            number_good_beams: counts.good.to_string(),
            percent_good_beams: fmt_percent(counts.percent_good()),
            number_zero_beams: counts.zero.to_string(),
            percent_zero_beams: fmt_percent(counts.percent_zero()),
            number_flagged_beams: counts.flagged.to_string(),
            percent_flagged_beams: fmt_percent(counts.percent_flagged()),
        }
    }
}

impl BeamData {
    /// Amplitude counts. The good percentage is one column wider than the others, matching
    /// the established mbinfo output.
    fn amplitude(counts: &Counts) -> Self {
        Self {
            percent_good_beams: fmt_percent_width(counts.percent_good(), 6),
            ..Self::from(counts)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelData {
    pub max_pixels_per_ping: String,
    pub number_of_pixels: String,
    pub number_good_pixels: String,
    pub percent_good_pixels: String,
    pub number_zero_pixels: String,
    pub percent_zero_pixels: String,
    pub number_flagged_pixels: String,
    pub percent_flagged_pixels: String,
}

impl From<&Counts> for PixelData {
    fn from(counts: &Counts) -> Self {
        Self {
            max_pixels_per_ping: counts.max_per_ping.to_string(),
            number_of_pixels: counts.total.to_string(),
            number_good_pixels: counts.good.to_string(),
            percent_good_pixels: fmt_percent(counts.percent_good()),
            number_zero_pixels: counts.zero.to_string(),
            percent_zero_pixels: fmt_percent(counts.percent_zero()),
            number_flagged_pixels: counts.flagged.to_string(),
            percent_flagged_pixels: fmt_percent(counts.percent_flagged()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTotals {
    pub total_time_hours: String,
    pub total_track_length_km: String,
    pub average_speed_km_per_hr: String,
    pub average_speed_knots: String,
}

/// Start or end of data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub time: String,
    pub time_iso: String,
    pub longitude: String,
    pub latitude: String,
    pub depth_meters: String,
    pub speed_km_per_hour: String,
    pub speed_knots: String,
    pub heading_degrees: String,
    pub sonar_depth_meters: String,
    pub sonar_altitude_meters: String,
}

impl From<Option<&Ping>> for DataPoint {
    fn from(ping: Option<&Ping>) -> Self {
        let nav = ping.map(|p| p.nav).unwrap_or_default();
        Self {
            time: ping.map(|p| fmt_time(&p.time)).unwrap_or_default(),
            time_iso: ping.map(|p| fmt_time_iso(&p.time)).unwrap_or_default(),
            longitude: fmt_coordinate(nav.longitude),
            latitude: fmt_coordinate(nav.latitude),
            depth_meters: fmt_decimal(ping.map_or(0.0, Ping::nadir_depth)),
            speed_km_per_hour: fmt_decimal(nav.speed),
            speed_knots: fmt_decimal(nav.speed_knots()),
            heading_degrees: fmt_decimal(nav.heading),
            sonar_depth_meters: fmt_decimal(nav.sonar_depth),
            sonar_altitude_meters: fmt_decimal(nav.altitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub minimum_longitude: String,
    pub maximum_longitude: String,
    pub minimum_latitude: String,
    pub maximum_latitude: String,
    pub minimum_sonar_depth: String,
    pub maximum_sonar_depth: String,
    pub minimum_altitude: String,
    pub maximum_altitude: String,
    pub minimum_depth: String,
    pub maximum_depth: String,
    pub minimum_amplitude: String,
    pub maximum_amplitude: String,
}

/// `(min, max)` formatted with `fmt`; unobserved bounds render as zero.
fn bounds(bounds: Option<Bounds>, fmt: fn(f64) -> String) -> (String, String) {
    let b = bounds.unwrap_or(Bounds::new(0.0));
    (fmt(b.min), fmt(b.max))
}

/// A finalized summary as displayable strings.
///
/// Field order is the section order of both output styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub file_info: FileInfo,
    pub data_totals: DataTotals,
    pub bathymetry_data: BeamData,
    pub amplitude_data: BeamData,
    pub sidescan_data: PixelData,
    pub navigation_totals: NavigationTotals,
    pub start_of_data: DataPoint,
    pub end_of_data: DataPoint,
    pub limits: Limits,
    /// Shown by the text style only
    #[serde(skip)]
    number_of_nav_records: String,
    #[serde(skip)]
    attribute_lines: Vec<String>,
}

impl Report {
    #[must_use]
    pub fn new(file: &SwathFile, summary: &Summary) -> Self {
        let (minimum_longitude, maximum_longitude) =
            bounds(summary.limits.longitude, fmt_coordinate);
        let (minimum_latitude, maximum_latitude) = bounds(summary.limits.latitude, fmt_coordinate);
        let (minimum_sonar_depth, maximum_sonar_depth) =
            bounds(summary.limits.sonar_depth, fmt_decimal);
        let (minimum_altitude, maximum_altitude) = bounds(summary.limits.altitude, fmt_decimal);
        let (minimum_depth, maximum_depth) = bounds(summary.limits.depth, fmt_decimal);
        let (minimum_amplitude, maximum_amplitude) = bounds(summary.limits.amplitude, fmt_decimal);

        Report {
            file_info: FileInfo {
                swath_data_file: file.file_name(),
                mbio_data_format_id: file.format.id.to_string(),
                format_name: file.format.name.clone(),
                informal_description: file.format.description.clone(),
                attributes: file.format.attributes.replace('\n', ";"),
            },
            data_totals: DataTotals {
                number_of_records: summary.records.to_string(),
            },
            bathymetry_data: BeamData::from(&summary.bathymetry),
            amplitude_data: BeamData::amplitude(&summary.amplitude),
            sidescan_data: PixelData::from(&summary.sidescan),
            navigation_totals: NavigationTotals {
                total_time_hours: fmt_decimal(summary.total_time_hours()),
                total_track_length_km: fmt_decimal(summary.track_length_km()),
                average_speed_km_per_hr: fmt_decimal(summary.average_speed_kmh()),
                average_speed_knots: fmt_decimal(summary.average_speed_knots()),
            },
            start_of_data: DataPoint::from(summary.start.as_ref()),
            end_of_data: DataPoint::from(summary.end.as_ref()),
            limits: Limits {
                minimum_longitude,
                maximum_longitude,
                minimum_latitude,
                maximum_latitude,
                minimum_sonar_depth,
                maximum_sonar_depth,
                minimum_altitude,
                maximum_altitude,
                minimum_depth,
                maximum_depth,
                minimum_amplitude,
                maximum_amplitude,
            },
            number_of_nav_records: summary.nav_only_records.to_string(),
            attribute_lines: file.format.attributes.lines().map(str::to_string).collect(),
        }
    }

    /// Render in `style`. Rendering has no side effects; the same report always renders to
    /// the same bytes.
    ///
    /// # Errors
    /// [Error::Render] if serialization or templating fails.
    pub fn render(&self, style: Style) -> Result<String> {
        match style {
            Style::Text => self.to_text(),
            Style::Json => self.to_json(),
        }
    }

    /// Pretty printed JSON mapping of section names to fields.
    ///
    /// # Errors
    /// [Error::Render] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::Render(err.to_string()))
    }

    /// Human readable report.
    ///
    /// # Errors
    /// [Error::Render] if templating fails.
    pub fn to_text(&self) -> Result<String> {
        handlebars_helper!(left_pad: |width: u64, v: Json| {
            let v = match v {
                serde_json::Value::String(s) => s.to_owned(),
                serde_json::Value::Null => String::new(),
                _ => v.to_string(),
            };
            format!("{v:>width$}", width = width as usize)
        });
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        hb.register_helper("lpad", Box::new(left_pad));
        hb.register_template_string("report", TEXT_TEMPLATE)
            .map_err(|err| Error::Render(err.to_string()))?;

        #[derive(Serialize)]
        struct Context<'a> {
            #[serde(flatten)]
            report: &'a Report,
            number_of_nav_records: &'a str,
            attribute_lines: &'a [String],
        }
        let context = Context {
            report: self,
            number_of_nav_records: &self.number_of_nav_records,
            attribute_lines: &self.attribute_lines,
        };
        hb.render("report", &context)
            .map_err(|err| Error::Render(err.to_string()))
    }
}

const TEXT_TEMPLATE: &str = r"
Swath Data File:      {{ file_info.swath_data_file }}
MBIO Data Format ID:  {{ file_info.mbio_data_format_id }}
Format name:          {{ file_info.format_name }}
Informal Description: {{ file_info.informal_description }}
Attributes:           {{ #each attribute_lines }}{{ #if @first }}{{ this }}{{ else }}
                      {{ this }}{{ /if }}{{ /each }}

Data Totals:
Number of Records:                    {{ lpad 8 data_totals.number_of_records }}
Number of Navigation-Only Records:    {{ lpad 8 number_of_nav_records }}
Bathymetry Data ({{ bathymetry_data.max_beams_per_ping }} beams):
  Number of Beams:         {{ lpad 8 bathymetry_data.number_beams }}
  Number of Good Beams:    {{ lpad 8 bathymetry_data.number_good_beams }}     {{ bathymetry_data.percent_good_beams }}%
  Number of Zero Beams:    {{ lpad 8 bathymetry_data.number_zero_beams }}     {{ bathymetry_data.percent_zero_beams }}%
  Number of Flagged Beams: {{ lpad 8 bathymetry_data.number_flagged_beams }}     {{ bathymetry_data.percent_flagged_beams }}%
Amplitude Data ({{ amplitude_data.max_beams_per_ping }} beams):
  Number of Beams:         {{ lpad 8 amplitude_data.number_beams }}
  Number of Good Beams:    {{ lpad 8 amplitude_data.number_good_beams }}     {{ amplitude_data.percent_good_beams }}%
  Number of Zero Beams:    {{ lpad 8 amplitude_data.number_zero_beams }}     {{ amplitude_data.percent_zero_beams }}%
  Number of Flagged Beams: {{ lpad 8 amplitude_data.number_flagged_beams }}     {{ amplitude_data.percent_flagged_beams }}%
Sidescan Data ({{ sidescan_data.max_pixels_per_ping }} pixels):
  Number of Pixels:        {{ lpad 8 sidescan_data.number_of_pixels }}
  Number of Good Pixels:   {{ lpad 8 sidescan_data.number_good_pixels }}     {{ sidescan_data.percent_good_pixels }}%
  Number of Zero Pixels:   {{ lpad 8 sidescan_data.number_zero_pixels }}     {{ sidescan_data.percent_zero_pixels }}%
  Number of Flagged Pixels:{{ lpad 8 sidescan_data.number_flagged_pixels }}     {{ sidescan_data.percent_flagged_pixels }}%

Navigation Totals:
Total Time:         {{ lpad 10 navigation_totals.total_time_hours }} hours
Total Track Length: {{ lpad 10 navigation_totals.total_track_length_km }} km
Average Speed:      {{ lpad 10 navigation_totals.average_speed_km_per_hr }} km/hr ({{ navigation_totals.average_speed_knots }} knots)

Start of Data:
Time:  {{ start_of_data.time }}  ISO Time: {{ start_of_data.time_iso }}
Lon: {{ lpad 15 start_of_data.longitude }}     Lat: {{ lpad 14 start_of_data.latitude }}     Depth: {{ lpad 10 start_of_data.depth_meters }} meters
Speed: {{ lpad 10 start_of_data.speed_km_per_hour }} km/hr ({{ start_of_data.speed_knots }} knots)  Heading: {{ lpad 9 start_of_data.heading_degrees }} degrees
Sonar Depth: {{ lpad 10 start_of_data.sonar_depth_meters }} m  Sonar Altitude: {{ lpad 10 start_of_data.sonar_altitude_meters }} m

End of Data:
Time:  {{ end_of_data.time }}  ISO Time: {{ end_of_data.time_iso }}
Lon: {{ lpad 15 end_of_data.longitude }}     Lat: {{ lpad 14 end_of_data.latitude }}     Depth: {{ lpad 10 end_of_data.depth_meters }} meters
Speed: {{ lpad 10 end_of_data.speed_km_per_hour }} km/hr ({{ end_of_data.speed_knots }} knots)  Heading: {{ lpad 9 end_of_data.heading_degrees }} degrees
Sonar Depth: {{ lpad 10 end_of_data.sonar_depth_meters }} m  Sonar Altitude: {{ lpad 10 end_of_data.sonar_altitude_meters }} m

Limits:
Minimum Longitude:   {{ lpad 15 limits.minimum_longitude }}   Maximum Longitude:   {{ lpad 15 limits.maximum_longitude }}
Minimum Latitude:    {{ lpad 15 limits.minimum_latitude }}   Maximum Latitude:    {{ lpad 15 limits.maximum_latitude }}
Minimum Sonar Depth: {{ lpad 15 limits.minimum_sonar_depth }}   Maximum Sonar Depth: {{ lpad 15 limits.maximum_sonar_depth }}
Minimum Altitude:    {{ lpad 15 limits.minimum_altitude }}   Maximum Altitude:    {{ lpad 15 limits.maximum_altitude }}
Minimum Depth:       {{ lpad 15 limits.minimum_depth }}   Maximum Depth:       {{ lpad 15 limits.maximum_depth }}
Minimum Amplitude:   {{ lpad 15 limits.minimum_amplitude }}   Maximum Amplitude:   {{ lpad 15 limits.maximum_amplitude }}
";
