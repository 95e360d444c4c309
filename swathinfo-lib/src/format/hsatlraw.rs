//! `MBF_HSATLRAW` (21): line oriented ASCII Hydrosweep DS survey records.
//!
//! Every line begins with an 8 character record label followed by whitespace separated fields.
//! A survey ping is an `ERGNMESS` line followed by its beam value lines and takes its position
//! from the most recent `ERGNPOSI` line.
use std::io::{BufRead, Lines};
use std::iter::Enumerate;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::trace;

use super::{open_file, Decoder, Pings};
use crate::nav::LonFlip;
use crate::prelude::*;
use crate::record::{Beam, Flag, FormatInfo, NavFix, Ping};

/// Hydrosweep DS beam count.
pub const MAX_BEAMS: usize = 59;

const POSITION: &str = "ERGNPOSI";
const SURVEY: &str = "ERGNMESS";
const DEPTHS: &str = "ERGNEICH";
const ACROSSTRACK: &str = "ERGNQUER";
const ALONGTRACK: &str = "ERGNLAEN";
const AMPLITUDES: &str = "ERGNAMPL";

pub struct HsAtlRaw;

impl Decoder for HsAtlRaw {
    fn info(&self) -> FormatInfo {
        FormatInfo {
            id: 21,
            name: "MBF_HSATLRAW".to_string(),
            description: "Raw Hydrosweep".to_string(),
            attributes: "Hydrosweep DS, bathymetry and amplitude, 59 beams,\n\
                         ascii, Atlas Electronik."
                .to_string(),
        }
    }

    fn probe(&self, header: &[u8]) -> bool {
        let start = header
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(header.len());
        let header = &header[start..];
        header.starts_with(b"ERGN") || header.starts_with(b"##")
    }

    fn open(&self, path: &Path, lonflip: LonFlip) -> Result<Pings> {
        let reader = open_file(path)?;
        Ok(Box::new(decode(reader, path, lonflip)))
    }
}

/// Decode survey pings from `reader`; `path` is only used for error reporting.
pub fn decode<R>(reader: R, path: &Path, lonflip: LonFlip) -> impl Iterator<Item = Result<Ping>>
where
    R: BufRead + Send,
{
    HsPingIter {
        lines: reader.lines().enumerate(),
        pending: None,
        fix: None,
        path: path.to_path_buf(),
        lonflip,
        count: 0,
        done: false,
    }
}

#[derive(Debug, Clone, Copy)]
struct Position {
    longitude: f64,
    latitude: f64,
}

#[derive(Debug)]
struct PartialPing {
    line: usize,
    time: DateTime<Utc>,
    nav: NavFix,
    num_beams: usize,
    depths: Option<Vec<f64>>,
    acrosstrack: Option<Vec<f64>>,
    alongtrack: Option<Vec<f64>>,
    amplitudes: Option<Vec<f64>>,
}

struct HsPingIter<R>
where
    R: BufRead,
{
    lines: Enumerate<Lines<R>>,
    // line read ahead that belongs to the next ping
    pending: Option<(usize, String)>,
    fix: Option<Position>,
    path: PathBuf,
    lonflip: LonFlip,
    count: usize,
    done: bool,
}

impl<R> HsPingIter<R>
where
    R: BufRead,
{
    fn error<S: Into<String>>(&self, line: usize, reason: S) -> Error {
        Error::decode(
            &self.path,
            self.count,
            format!("line {}: {}", line + 1, reason.into()),
        )
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        match self.lines.next() {
            None => Ok(None),
            Some((num, Ok(line))) => Ok(Some((num, line))),
            Some((num, Err(err))) => Err(self.error(num, format!("read failed: {err}"))),
        }
    }

    fn parse_position(&self, num: usize, fields: &[&str]) -> Result<Position> {
        if fields.len() != 8 {
            return Err(self.error(num, format!("{POSITION} needs 8 fields, got {}", fields.len())));
        }
        // time is carried but the survey record time is authoritative
        parse_time(&fields[..6]).ok_or_else(|| self.error(num, "invalid position time"))?;
        let longitude = parse_f64(fields[6]).ok_or_else(|| self.error(num, "invalid longitude"))?;
        let latitude = parse_f64(fields[7]).ok_or_else(|| self.error(num, "invalid latitude"))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(self.error(num, format!("latitude {latitude} out of range")));
        }
        Ok(Position {
            longitude: self.lonflip.apply(longitude),
            latitude,
        })
    }

    fn start_ping(&self, num: usize, fields: &[&str]) -> Result<PartialPing> {
        if fields.len() != 10 {
            return Err(self.error(num, format!("{SURVEY} needs 10 fields, got {}", fields.len())));
        }
        let Some(fix) = self.fix else {
            return Err(self.error(num, "survey record before any position record"));
        };
        let time = parse_time(&fields[..6]).ok_or_else(|| self.error(num, "invalid time"))?;
        let values: Vec<f64> = fields[6..9]
            .iter()
            .map(|s| parse_f64(s))
            .collect::<Option<_>>()
            .ok_or_else(|| self.error(num, "invalid survey value"))?;
        let (heading, speed, sonar_depth) = (values[0], values[1], values[2]);
        if !(0.0..=360.0).contains(&heading) {
            return Err(self.error(num, format!("heading {heading} out of range")));
        }
        let num_beams = fields[9]
            .parse::<usize>()
            .map_err(|_| self.error(num, "invalid beam count"))?;
        if !(1..=MAX_BEAMS).contains(&num_beams) {
            return Err(self.error(num, format!("beam count {num_beams} not in 1..={MAX_BEAMS}")));
        }

        Ok(PartialPing {
            line: num,
            time,
            nav: NavFix {
                longitude: fix.longitude,
                latitude: fix.latitude,
                speed,
                heading: crate::nav::wrap_heading(heading),
                sonar_depth,
                altitude: 0.0,
            },
            num_beams,
            depths: None,
            acrosstrack: None,
            alongtrack: None,
            amplitudes: None,
        })
    }

    fn beam_values(&self, num: usize, label: &str, fields: &[&str], want: usize) -> Result<Vec<f64>> {
        if fields.len() != want {
            return Err(self.error(
                num,
                format!("{label} has {} values, expected {want}", fields.len()),
            ));
        }
        fields
            .iter()
            .map(|s| parse_f64(s))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| self.error(num, format!("invalid {label} value")))
    }

    fn finish(&self, partial: PartialPing) -> Result<Ping> {
        let Some(depths) = partial.depths else {
            return Err(self.error(partial.line, format!("survey record without {DEPTHS}")));
        };
        let Some(acrosstrack) = partial.acrosstrack else {
            return Err(self.error(partial.line, format!("survey record without {ACROSSTRACK}")));
        };
        let n = partial.num_beams;
        let alongtrack = partial.alongtrack.unwrap_or_else(|| vec![0.0; n]);
        let amplitudes = partial.amplitudes.unwrap_or_else(|| vec![0.0; n]);

        let mut ping = Ping::new(partial.time, partial.nav);
        ping.beams = (0..n)
            .map(|i| {
                let (depth, flag) = depth_flag(depths[i]);
                Beam::new(depth, acrosstrack[i], flag)
                    .with_alongtrack(alongtrack[i])
                    .with_amplitude(amplitudes[i])
            })
            .collect();
        ping.derive_altitude();
        Ok(ping)
    }

    fn step(&mut self) -> Result<Option<Ping>> {
        let mut current: Option<PartialPing> = None;
        loop {
            let Some((num, line)) = self.next_line()? else {
                return current.map(|p| self.finish(p)).transpose();
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("##") {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            let label = fields[0];

            match label {
                DEPTHS | ACROSSTRACK | ALONGTRACK | AMPLITUDES => {
                    let Some(partial) = current.as_mut() else {
                        return Err(self.error(num, format!("{label} outside a survey record")));
                    };
                    let values = self.beam_values(num, label, &fields[1..], partial.num_beams)?;
                    let slot = match label {
                        DEPTHS => &mut partial.depths,
                        ACROSSTRACK => &mut partial.acrosstrack,
                        ALONGTRACK => &mut partial.alongtrack,
                        _ => &mut partial.amplitudes,
                    };
                    *slot = Some(values);
                }
                POSITION | SURVEY if current.is_none() => {
                    if label == POSITION {
                        self.fix = Some(self.parse_position(num, &fields[1..])?);
                    } else {
                        current = Some(self.start_ping(num, &fields[1..])?);
                    }
                }
                POSITION | SURVEY => {
                    // belongs to the next ping
                    self.pending = Some((num, line));
                    return current.take().map(|p| self.finish(p)).transpose();
                }
                _ if is_label(label) => {
                    trace!(line = num + 1, label, "skipping record");
                }
                _ if current.is_some() => {
                    self.pending = Some((num, line));
                    return current.take().map(|p| self.finish(p)).transpose();
                }
                _ => return Err(self.error(num, format!("unrecognized record {label:?}"))),
            }
        }
    }
}

impl<R> Iterator for HsPingIter<R>
where
    R: BufRead,
{
    type Item = Result<Ping>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(ping)) => {
                self.count += 1;
                Some(Ok(ping))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Hydrosweep depth convention: 0 is no return, negative values are flagged soundings.
fn depth_flag(value: f64) -> (f64, Flag) {
    if value == 0.0 {
        (0.0, Flag::Zero)
    } else if value < 0.0 {
        (-value, Flag::Flagged)
    } else {
        (value, Flag::Good)
    }
}

/// Hydrosweep record labels that carry nothing needed for summarizing.
fn is_label(s: &str) -> bool {
    s == "LSTERGNM" || (s.len() == 8 && s.starts_with("ERGN"))
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse `Y M D h m s.ffffff` fields.
fn parse_time(fields: &[&str]) -> Option<DateTime<Utc>> {
    let year = fields[0].parse::<i32>().ok()?;
    let month = fields[1].parse::<u32>().ok()?;
    let day = fields[2].parse::<u32>().ok()?;
    let hour = fields[3].parse::<u32>().ok()?;
    let minute = fields[4].parse::<u32>().ok()?;
    let seconds = parse_f64(fields[5]).filter(|s| (0.0..60.0).contains(s))?;
    let micros = (seconds * 1e6).round() as i64;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?
        + chrono::Duration::microseconds(micros);
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const PING: &str = "\
ERGNHYDI test header
ERGNPOSI 2001 11 05 00 01 44.000000 235.5 40.8
ERGNMESS 2001 11 05 00 01 44.250000 324.5 1.44 2.0 3
ERGNEICH 100.0 0.0 -99.0
ERGNQUER -10.0 0.0 10.0
ERGNAMPL 5.0 6.0 7.0
";

    fn decode_str(dat: &str) -> Vec<Result<Ping>> {
        decode(dat.as_bytes(), Path::new("test.mb21"), LonFlip::Centered).collect()
    }

    #[test]
    fn probe() {
        assert!(HsAtlRaw.probe(b"ERGNHYDI"));
        assert!(HsAtlRaw.probe(b"\n  ## comment"));
        assert!(!HsAtlRaw.probe(b"\x00\x00\xff\xff"));
        assert!(!HsAtlRaw.probe(b""));
    }

    #[test]
    fn single_ping() {
        let pings = decode_str(PING);
        assert_eq!(pings.len(), 1);
        let ping = pings[0].as_ref().unwrap();

        assert_eq!(ping.time.nanosecond(), 250_000_000);
        assert!((ping.nav.longitude + 124.5).abs() < 1e-9);
        assert_eq!(ping.nav.latitude, 40.8);
        assert_eq!(ping.nav.heading, 324.5);
        assert_eq!(ping.nav.speed, 1.44);
        assert_eq!(ping.nav.sonar_depth, 2.0);

        let flags: Vec<Flag> = ping.beams.iter().map(|b| b.flag).collect();
        assert_eq!(flags, vec![Flag::Good, Flag::Zero, Flag::Flagged]);
        assert_eq!(ping.beams[2].depth, 99.0);
        assert_eq!(ping.beams[0].amplitude, 5.0);
        // only the good beam is a nadir candidate
        assert_eq!(ping.nav.altitude, 98.0);
    }

    #[test]
    fn lonflip_applies_to_positions() {
        let pings: Vec<Result<Ping>> =
            decode(PING.as_bytes(), Path::new("x"), LonFlip::East).collect();
        assert_eq!(pings[0].as_ref().unwrap().nav.longitude, 235.5);
    }

    #[test]
    fn consecutive_pings_and_unknown_records() {
        let dat = format!("{PING}ERGNPARA 1 2 3\nLSTERGNM\n{}", &PING[21..]);
        let pings = decode_str(&dat);
        assert_eq!(pings.len(), 2);
        assert!(pings.iter().all(Result::is_ok));
    }

    #[test]
    fn missing_depths_is_decode_error() {
        let dat = "ERGNPOSI 2001 11 05 00 01 44.0 235.5 40.8\n\
                   ERGNMESS 2001 11 05 00 01 44.0 324.5 1.44 2.0 1\n\
                   ERGNQUER 0.0\n";
        let pings = decode_str(dat);
        assert_eq!(pings.len(), 1);
        let err = pings[0].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn survey_before_position_is_decode_error() {
        let pings = decode_str("ERGNMESS 2001 11 05 00 01 44.0 324.5 1.44 2.0 1\n");
        assert_eq!(pings[0].as_ref().unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn value_count_mismatch_is_decode_error() {
        let dat = PING.replace("ERGNEICH 100.0 0.0 -99.0", "ERGNEICH 100.0 0.0");
        let pings = decode_str(&dat);
        assert_eq!(pings.len(), 1, "decoding stops at the first error");
        assert!(pings[0].is_err());
    }

    #[test]
    fn out_of_range_heading_is_decode_error() {
        let dat = PING.replace("324.5 1.44", "400.0 1.44");
        assert!(decode_str(&dat)[0].is_err());
    }

    #[test]
    fn garbage_line_is_decode_error() {
        let dat = format!("{PING}this is not hydrosweep\n");
        let pings = decode_str(&dat);
        assert!(pings[0].is_ok());
        let err = pings[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("line 7"), "{err}");
    }

    #[test]
    fn unknown_uppercase_label_is_decode_error() {
        let dat = format!("{PING}GARBAGEX 1 2 3\n");
        let pings = decode_str(&dat);
        assert_eq!(pings.len(), 2);
        assert!(pings[0].is_ok());
        let err = pings[1].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("GARBAGEX"), "{err}");

        let dat = format!("GARBAGEX 1 2 3\n{PING}");
        let pings = decode_str(&dat);
        assert_eq!(pings.len(), 1);
        assert!(pings[0].is_err());
    }

    #[test]
    fn empty_input() {
        assert!(decode_str("").is_empty());
    }
}
