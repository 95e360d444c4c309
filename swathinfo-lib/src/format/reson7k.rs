//! `MBF_RESON7KR` (88): Teledyne Reson 7k data record frames.
//!
//! Only the subset needed for summarization is decoded. Navigation, depth and altitude records
//! update the current vessel state; every bathymetry record starts a ping, and a later side
//! scan record with the same ping number supplies its pixels.
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::{debug, trace, warn};

use super::bytes::{byte_sum, Bytes, Fields};
use super::{open_file, Decoder, Pings};
use crate::nav::{wrap_heading, LonFlip};
use crate::prelude::*;
use crate::record::{Beam, Flag, FormatInfo, NavFix, Ping, Pixel};

/// Sync pattern, at offset 4 of every frame.
pub const SYNC: u32 = 0x0000_FFFF;
/// Data record frame length.
pub const FRAME_LEN: usize = 64;
pub const CHECKSUM_LEN: usize = 4;
/// Records larger than this are treated as corrupt frames.
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

pub const ALTITUDE: u32 = 1006;
pub const DEPTH: u32 = 1008;
pub const NAVIGATION: u32 = 1015;
pub const BATHYMETRY: u32 = 7006;
pub const SIDESCAN: u32 = 7007;

const BATHY_HEADER_LEN: usize = 24;
const BATHY_OPTIONAL_LEN: usize = 45;
const SIDESCAN_HEADER_LEN: usize = 64;
/// Quality bit set when a beam was manually edited.
const QUALITY_EDITED: u8 = 0x80;
/// Brightness and colinearity tests both passed.
const QUALITY_PASSED: u8 = 0x03;

pub struct Reson7k;

impl Decoder for Reson7k {
    fn info(&self) -> FormatInfo {
        FormatInfo {
            id: 88,
            name: "MBF_RESON7KR".to_string(),
            description: "Reson 7k raw".to_string(),
            attributes: "Reson 7k series multibeam sonars, bathymetry, amplitude,\n\
                         sidescan, variable beams, binary, Teledyne Reson."
                .to_string(),
        }
    }

    fn extensions(&self) -> &[&'static str] {
        &["s7k"]
    }

    fn probe(&self, header: &[u8]) -> bool {
        header.len() >= 8 && header[4..8] == SYNC.to_le_bytes()
    }

    fn open(&self, path: &Path, lonflip: LonFlip) -> Result<Pings> {
        let reader = open_file(path)?;
        Ok(Box::new(decode(reader, path, lonflip)))
    }
}

/// Decode pings from the 7k records in `reader`; `path` is only used for error reporting.
pub fn decode<R>(reader: R, path: &Path, lonflip: LonFlip) -> impl Iterator<Item = Result<Ping>>
where
    R: Read + Send,
{
    Reson7kPingIter {
        bytes: Bytes::new(reader),
        path: path.to_path_buf(),
        lonflip,
        state: VesselState::default(),
        pending: None,
        records: 0,
        done: false,
    }
}

/// Data record frame fields used by the decoder.
#[derive(Debug, Clone)]
struct Frame {
    raw: [u8; FRAME_LEN],
    /// Offset of the record data section from the start of the frame.
    data_start: usize,
    size: usize,
    optional_offset: usize,
    time: Option<DateTime<Utc>>,
    record_type: u32,
    flags: u16,
}

impl Frame {
    /// Parse `buf`; returns `None` if it does not hold a plausible frame.
    fn parse(buf: &[u8; FRAME_LEN]) -> Option<Self> {
        let mut fields = Fields::new(buf);
        let _version = fields.u16();
        let offset = fields.u16() as usize;
        let sync = fields.u32();
        let size = fields.u32() as usize;
        let optional_offset = fields.u32() as usize;
        let _optional_id = fields.u32();
        let year = fields.u16();
        let day = fields.u16();
        let seconds = fields.f32();
        let hours = fields.u8();
        let minutes = fields.u8();
        fields.skip(2);
        let record_type = fields.u32();
        fields.skip(4 + 2 + 2 + 4);
        let flags = fields.u16();

        let data_start = offset + 4;
        if sync != SYNC
            || !(FRAME_LEN + CHECKSUM_LEN..=MAX_RECORD_LEN).contains(&size)
            || data_start < FRAME_LEN
            || data_start > size - CHECKSUM_LEN
            || optional_offset > size - CHECKSUM_LEN
        {
            return None;
        }
        Some(Frame {
            raw: *buf,
            data_start,
            size,
            optional_offset,
            time: frame_time(year, day, seconds, hours, minutes),
            record_type,
            flags,
        })
    }

    fn has_checksum(&self) -> bool {
        self.flags & 0x1 != 0
    }

    /// Record data section, excluding optional data.
    fn data<'a>(&self, rec: &'a [u8]) -> &'a [u8] {
        let end = if self.optional_offset > self.data_start {
            self.optional_offset
        } else {
            self.size - CHECKSUM_LEN
        };
        &rec[self.data_start..end]
    }

    fn optional<'a>(&self, rec: &'a [u8]) -> Option<&'a [u8]> {
        (self.optional_offset >= self.data_start)
            .then(|| &rec[self.optional_offset..self.size - CHECKSUM_LEN])
    }
}

fn frame_time(year: u16, day: u16, seconds: f32, hours: u8, minutes: u8) -> Option<DateTime<Utc>> {
    if !(0.0..61.0).contains(&seconds) || hours > 23 || minutes > 59 {
        return None;
    }
    let date = NaiveDate::from_yo_opt(i32::from(year), u32::from(day))?;
    let micros = (f64::from(seconds) * 1e6).round() as i64;
    let naive = date.and_hms_opt(u32::from(hours), u32::from(minutes), 0)?
        + Duration::microseconds(micros);
    Some(Utc.from_utc_datetime(&naive))
}

/// Most recent values from the navigation, depth and altitude records.
#[derive(Debug, Default, Clone, Copy)]
struct VesselState {
    /// km/h
    speed: f64,
    sonar_depth: Option<f64>,
    altitude: Option<f64>,
}

struct Reson7kPingIter<R>
where
    R: Read + Send,
{
    bytes: Bytes<R>,
    path: PathBuf,
    lonflip: LonFlip,
    state: VesselState,
    /// Bathymetry ping waiting for its side scan record, with its ping number.
    pending: Option<(u32, Ping)>,
    records: usize,
    done: bool,
}

impl<R> Reson7kPingIter<R>
where
    R: Read + Send,
{
    fn error<S: Into<String>>(&self, reason: S) -> Error {
        Error::decode(
            &self.path,
            self.records,
            format!("offset {}: {}", self.bytes.offset(), reason.into()),
        )
    }

    /// Read the next frame, scanning forward over bytes that are not a frame.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut skipped = 0usize;
        loop {
            let mut buf = [0u8; FRAME_LEN];
            match self.bytes.fill(&mut buf) {
                Ok(true) => {}
                Ok(false) => {
                    if skipped > 0 {
                        warn!(path = ?self.path, skipped, "no frame found before end of file");
                    }
                    return Ok(None);
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof && skipped > 0 => {
                    warn!(path = ?self.path, skipped, "no frame found before end of file");
                    return Ok(None);
                }
                Err(err) => return Err(self.error(format!("reading frame: {err}"))),
            }

            if let Some(frame) = Frame::parse(&buf) {
                if skipped > 0 {
                    warn!(path = ?self.path, skipped, offset = self.bytes.offset() - FRAME_LEN, "resynchronized");
                }
                return Ok(Some(frame));
            }

            // Next candidate frame start, i.e., where the sync pattern would follow the 4 byte
            // version and offset fields. Candidates whose sync runs past the buffer are retried.
            let sync = SYNC.to_le_bytes();
            let start = (1..=FRAME_LEN - 8)
                .find(|&i| buf[i + 4..i + 8] == sync)
                .unwrap_or(FRAME_LEN - 7);
            trace!(offset = self.bytes.offset(), start, "scanning for sync");
            self.bytes.push(&buf[start..]);
            skipped += start;
        }
    }

    fn read_record(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        let mut rec = vec![0u8; frame.size];
        rec[..FRAME_LEN].copy_from_slice(&frame.raw);
        if let Err(err) = self.bytes.fill(&mut rec[FRAME_LEN..]) {
            return Err(self.error(format!("truncated record {}: {err}", frame.record_type)));
        }
        Ok(rec)
    }

    fn handle(&mut self, frame: &Frame, rec: &[u8]) -> Result<Option<Ping>> {
        match frame.record_type {
            ALTITUDE => {
                let mut fields = self.fields(frame.data(rec), 4)?;
                self.state.altitude = Some(self.finite(fields.f32(), "altitude")?);
            }
            DEPTH => {
                let mut fields = self.fields(frame.data(rec), 8)?;
                fields.skip(4);
                self.state.sonar_depth = Some(self.finite(fields.f32(), "sonar depth")?);
            }
            NAVIGATION => {
                let mut fields = self.fields(frame.data(rec), 41)?;
                fields.skip(1 + 8 + 8 + 4 + 4 + 4);
                self.state.speed = self.finite(fields.f32(), "speed")? * 3.6;
            }
            BATHYMETRY => {
                let (number, ping) = self.bathymetry(frame, rec)?;
                if let Some((_, prev)) = self.pending.replace((number, ping)) {
                    return Ok(Some(prev));
                }
            }
            SIDESCAN => self.sidescan(frame, rec)?,
            other => trace!(record_type = other, size = frame.size, "skipping record"),
        }
        Ok(None)
    }

    fn finite(&self, value: f32, what: &str) -> Result<f64> {
        if value.is_finite() {
            Ok(f64::from(value))
        } else {
            Err(self.error(format!("invalid {what} {value}")))
        }
    }

    fn fields<'a>(&self, dat: &'a [u8], needed: usize) -> Result<Fields<'a>> {
        if dat.len() < needed {
            return Err(self.error(format!(
                "record data too short; needed {needed} bytes, got {}",
                dat.len()
            )));
        }
        Ok(Fields::new(dat))
    }

    fn bathymetry(&self, frame: &Frame, rec: &[u8]) -> Result<(u32, Ping)> {
        let time = frame
            .time
            .ok_or_else(|| self.error("invalid bathymetry record time"))?;
        let dat = frame.data(rec);
        let mut fields = self.fields(dat, BATHY_HEADER_LEN)?;
        let _sonar_id = fields.u64();
        let number = fields.u32();
        let _multiping = fields.u16();
        let num_beams = fields.u32() as usize;
        if dat.len() < BATHY_HEADER_LEN + num_beams * 9 {
            return Err(self.error(format!("bathymetry data too short for {num_beams} beams")));
        }
        fields.skip(1 + 1 + 4);
        let ranges: Vec<f32> = (0..num_beams).map(|_| fields.f32()).collect();
        let qualities: Vec<u8> = (0..num_beams).map(|_| fields.u8()).collect();
        let intensities: Vec<f32> = (0..num_beams).map(|_| fields.f32()).collect();

        let optional = frame
            .optional(rec)
            .ok_or_else(|| self.error("bathymetry record has no optional data"))?;
        let mut fields = self.fields(optional, BATHY_OPTIONAL_LEN + num_beams * 20)?;
        let _frequency = fields.f32();
        let latitude = fields.f64().to_degrees();
        let longitude = fields.f64().to_degrees();
        let heading = f64::from(fields.f32()).to_degrees();
        let _height_source = fields.u8();
        fields.skip(4 * 4);
        let vehicle_depth = self.finite(fields.f32(), "vehicle depth")?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(self.error(format!("latitude {latitude} out of range")));
        }
        if !longitude.is_finite() || !heading.is_finite() {
            return Err(self.error("invalid navigation value"));
        }

        let mut ping = Ping::new(
            time,
            NavFix {
                longitude: self.lonflip.apply(longitude),
                latitude,
                speed: self.state.speed,
                heading: wrap_heading(heading),
                sonar_depth: self.state.sonar_depth.unwrap_or(vehicle_depth),
                altitude: 0.0,
            },
        );
        for i in 0..num_beams {
            let depth = self.finite(fields.f32(), "beam depth")?;
            let alongtrack = self.finite(fields.f32(), "beam alongtrack")?;
            let acrosstrack = self.finite(fields.f32(), "beam acrosstrack")?;
            let amplitude = self.finite(intensities[i], "beam intensity")?;
            fields.skip(8);
            let flag = if ranges[i] <= 0.0 {
                Flag::Zero
            } else if qualities[i] & QUALITY_EDITED != 0
                || qualities[i] & QUALITY_PASSED != QUALITY_PASSED
            {
                Flag::Flagged
            } else {
                Flag::Good
            };
            ping.beams.push(
                Beam::new(depth, acrosstrack, flag)
                    .with_alongtrack(alongtrack)
                    .with_amplitude(amplitude),
            );
        }
        match self.state.altitude {
            Some(altitude) => ping.nav.altitude = altitude,
            None => ping.derive_altitude(),
        }
        trace!(ping = number, beams = num_beams, "decoded bathymetry");
        Ok((number, ping))
    }

    fn sidescan(&mut self, frame: &Frame, rec: &[u8]) -> Result<()> {
        let dat = frame.data(rec);
        let mut fields = self.fields(dat, SIDESCAN_HEADER_LEN)?;
        let _sonar_id = fields.u64();
        let number = fields.u32();
        fields.skip(2 + 4 + 4);
        let samples = fields.u32() as usize;
        fields.skip(4 + 7 * 4 + 2 + 2);
        let width = fields.u8() as usize;
        if !matches!(width, 1 | 2 | 4) {
            return Err(self.error(format!("invalid side scan sample size {width}")));
        }
        if dat.len() < SIDESCAN_HEADER_LEN + 2 * samples * width {
            return Err(self.error(format!("side scan data too short for {samples} samples")));
        }

        let Some((pending_number, ping)) = self.pending.as_mut() else {
            debug!(ping = number, "side scan without bathymetry");
            return Ok(());
        };
        if *pending_number != number || !ping.pixels.is_empty() {
            debug!(ping = number, pending = *pending_number, "unmatched side scan");
            return Ok(());
        }
        fields.skip(1);
        ping.pixels = (0..2 * samples)
            .map(|_| {
                let value = match width {
                    1 => u32::from(fields.u8()),
                    2 => u32::from(fields.u16()),
                    _ => fields.u32(),
                };
                Pixel::from_value(f64::from(value))
            })
            .collect();
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Ping>> {
        loop {
            let Some(frame) = self.next_frame()? else {
                return Ok(self.pending.take().map(|(_, ping)| ping));
            };
            let rec = self.read_record(&frame)?;
            if frame.has_checksum() {
                let (body, checksum) = rec.split_at(frame.size - CHECKSUM_LEN);
                let checksum =
                    u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
                if byte_sum(body) != checksum {
                    return Err(self.error(format!(
                        "checksum mismatch in record {}",
                        frame.record_type
                    )));
                }
            }
            let ping = self.handle(&frame, &rec)?;
            self.records += 1;
            if ping.is_some() {
                return Ok(ping);
            }
        }
    }
}

impl<R> Iterator for Reson7kPingIter<R>
where
    R: Read + Send,
{
    type Item = Result<Ping>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(ping)) => Some(Ok(ping)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                self.pending = None;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use test_case::test_case;

    fn record(record_type: u32, data: &[u8], optional: &[u8]) -> Vec<u8> {
        let size = FRAME_LEN + data.len() + optional.len() + CHECKSUM_LEN;
        let optional_offset = if optional.is_empty() {
            0
        } else {
            FRAME_LEN + data.len()
        };
        let mut buf = Vec::with_capacity(size);
        buf.extend(5u16.to_le_bytes());
        buf.extend(60u16.to_le_bytes());
        buf.extend(SYNC.to_le_bytes());
        buf.extend((size as u32).to_le_bytes());
        buf.extend((optional_offset as u32).to_le_bytes());
        buf.extend(0u32.to_le_bytes());
        buf.extend(2020u16.to_le_bytes());
        buf.extend(45u16.to_le_bytes());
        buf.extend(12.5f32.to_le_bytes());
        buf.extend([3u8, 4u8]);
        buf.extend(0u16.to_le_bytes());
        buf.extend(record_type.to_le_bytes());
        buf.extend(7125u32.to_le_bytes());
        buf.extend([0u8; 2 + 2 + 4]);
        buf.extend(1u16.to_le_bytes());
        buf.extend([0u8; 2 + 4]);
        buf.extend(1u32.to_le_bytes());
        buf.extend(0u32.to_le_bytes());
        assert_eq!(buf.len(), FRAME_LEN);
        buf.extend(data);
        buf.extend(optional);
        let checksum = byte_sum(&buf);
        buf.extend(checksum.to_le_bytes());
        buf
    }

    fn navigation(speed_ms: f32) -> Vec<u8> {
        let mut dat = vec![0u8];
        dat.extend(0.5f64.to_le_bytes());
        dat.extend((-2.0f64).to_le_bytes());
        for v in [1.0f32, 0.0, 1.0, speed_ms, 0.0, 0.0] {
            dat.extend(v.to_le_bytes());
        }
        record(NAVIGATION, &dat, &[])
    }

    fn sonar_depth(depth: f32) -> Vec<u8> {
        let mut dat = vec![0u8, 0u8, 0, 0];
        dat.extend(depth.to_le_bytes());
        record(DEPTH, &dat, &[])
    }

    fn altitude(altitude: f32) -> Vec<u8> {
        record(ALTITUDE, &altitude.to_le_bytes(), &[])
    }

    /// Beams are `(range, quality, depth, acrosstrack)`.
    fn bathymetry(number: u32, beams: &[(f32, u8, f32, f32)]) -> Vec<u8> {
        bathymetry_at(number, beams, -122.25, 20.0)
    }

    /// Bathymetry at longitude `lon` (degrees) with every beam at `intensity`.
    fn bathymetry_at(
        number: u32,
        beams: &[(f32, u8, f32, f32)],
        lon: f64,
        intensity: f32,
    ) -> Vec<u8> {
        let mut dat = Vec::new();
        dat.extend(7125u64.to_le_bytes());
        dat.extend(number.to_le_bytes());
        dat.extend(0u16.to_le_bytes());
        dat.extend((beams.len() as u32).to_le_bytes());
        dat.extend([0u8, 0u8]);
        dat.extend(1500f32.to_le_bytes());
        for b in beams {
            dat.extend(b.0.to_le_bytes());
        }
        dat.extend(beams.iter().map(|b| b.1));
        for _ in beams {
            dat.extend(intensity.to_le_bytes());
        }

        let mut opt = Vec::new();
        opt.extend(400_000f32.to_le_bytes());
        opt.extend(36.5f64.to_radians().to_le_bytes());
        opt.extend(lon.to_radians().to_le_bytes());
        opt.extend(90f32.to_radians().to_le_bytes());
        opt.push(0);
        for v in [0f32, 0.0, 0.0, 0.0, 4.0] {
            opt.extend(v.to_le_bytes());
        }
        for b in beams {
            for v in [b.2, 0.0, b.3, 0.0, 0.0] {
                opt.extend(v.to_le_bytes());
            }
        }
        record(BATHYMETRY, &dat, &opt)
    }

    fn sidescan(number: u32, port: &[u16], starboard: &[u16]) -> Vec<u8> {
        let mut dat = Vec::new();
        dat.extend(7125u64.to_le_bytes());
        dat.extend(number.to_le_bytes());
        dat.extend(0u16.to_le_bytes());
        dat.extend(0f32.to_le_bytes());
        dat.extend(0u32.to_le_bytes());
        dat.extend((port.len() as u32).to_le_bytes());
        dat.extend(100f32.to_le_bytes());
        dat.extend([0u8; 7 * 4]);
        dat.extend(2u16.to_le_bytes());
        dat.extend(0u16.to_le_bytes());
        dat.extend([2u8, 0u8]);
        assert_eq!(dat.len(), SIDESCAN_HEADER_LEN);
        for v in port.iter().chain(starboard) {
            dat.extend(v.to_le_bytes());
        }
        record(SIDESCAN, &dat, &[])
    }

    fn decode_bytes(dat: &[u8]) -> Vec<Result<Ping>> {
        decode(dat, Path::new("test.s7k"), LonFlip::Centered).collect()
    }

    #[test]
    fn probe() {
        let rec = altitude(1.0);
        assert!(Reson7k.probe(&rec[..super::super::PROBE_LEN]));
        assert!(!Reson7k.probe(b"ERGNHYDI"));
        assert!(!Reson7k.probe(&rec[..6]));
    }

    #[test]
    fn pings_with_state_and_sidescan() {
        let mut dat = navigation(2.0);
        dat.extend(sonar_depth(3.0));
        dat.extend(bathymetry(
            1,
            &[
                (10.0, 0x03, 100.0, -5.0),
                (0.0, 0x03, 0.0, 0.0),
                (10.0, 0x83, 99.0, 1.0),
                (10.0, 0x01, 98.0, 2.0),
            ],
        ));
        dat.extend(sidescan(1, &[0, 5, 6], &[7, 0, 9]));
        dat.extend(altitude(50.0));
        dat.extend(bathymetry(2, &[(10.0, 0x0f, 101.0, 0.0)]));

        let pings: Vec<Ping> = decode_bytes(&dat).into_iter().map(|p| p.unwrap()).collect();
        assert_eq!(pings.len(), 2);

        let first = &pings[0];
        assert_eq!(first.time.year(), 2020);
        assert_eq!(first.time.ordinal(), 45);
        assert_eq!((first.time.hour(), first.time.minute()), (3, 4));
        assert_eq!(first.time.timestamp_subsec_micros(), 500_000);
        assert!((first.nav.latitude - 36.5).abs() < 1e-9);
        assert!((first.nav.longitude + 122.25).abs() < 1e-9);
        assert!((first.nav.heading - 90.0).abs() < 1e-4);
        assert_eq!(first.nav.speed, 7.2);
        assert_eq!(first.nav.sonar_depth, 3.0);
        assert_eq!(first.nav.altitude, 97.0);
        let flags: Vec<Flag> = first.beams.iter().map(|b| b.flag).collect();
        assert_eq!(flags, [Flag::Good, Flag::Zero, Flag::Flagged, Flag::Flagged]);
        assert_eq!(first.beams[0].amplitude, 20.0);
        assert_eq!(first.pixels.len(), 6);
        assert_eq!(
            first.pixels.iter().filter(|p| p.flag == Flag::Zero).count(),
            2
        );

        let second = &pings[1];
        assert!(second.pixels.is_empty());
        assert_eq!(second.nav.altitude, 50.0);
    }

    #[test]
    fn unmatched_sidescan_is_ignored() {
        let mut dat = bathymetry(1, &[(10.0, 0x03, 100.0, 0.0)]);
        dat.extend(sidescan(2, &[1], &[1]));
        let pings = decode_bytes(&dat);
        assert_eq!(pings.len(), 1);
        assert!(pings[0].as_ref().unwrap().pixels.is_empty());
    }

    #[test]
    fn sonar_depth_falls_back_to_vehicle_depth() {
        let dat = bathymetry(1, &[(10.0, 0x03, 100.0, 0.0)]);
        let pings = decode_bytes(&dat);
        let ping = pings[0].as_ref().unwrap();
        assert_eq!(ping.nav.sonar_depth, 4.0);
        assert_eq!(ping.nav.altitude, 96.0);
    }

    #[test]
    fn resync_over_garbage() {
        let mut dat = vec![0xaa; 10];
        dat.extend(bathymetry(1, &[(10.0, 0x03, 100.0, 0.0)]));
        dat.extend([0x55; 3]);
        dat.extend(bathymetry(2, &[(10.0, 0x03, 100.0, 0.0)]));
        let pings = decode_bytes(&dat);
        assert_eq!(pings.len(), 2);
        assert!(pings.iter().all(Result::is_ok));
    }

    #[test]
    fn checksum_mismatch() {
        let mut dat = bathymetry(1, &[(10.0, 0x03, 100.0, 0.0)]);
        dat[FRAME_LEN + 2] ^= 0x01;
        let pings = decode_bytes(&dat);
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].as_ref().unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn bathymetry_without_optional_data() {
        let full = bathymetry(1, &[]);
        // rebuild with the same data section but no optional data
        let data = &full[FRAME_LEN..FRAME_LEN + BATHY_HEADER_LEN];
        let dat = record(BATHYMETRY, data, &[]);
        let pings = decode_bytes(&dat);
        let err = pings[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("optional"), "{err}");
    }

    #[test]
    fn truncated_record() {
        let dat = bathymetry(1, &[(10.0, 0x03, 100.0, 0.0)]);
        let pings = decode_bytes(&dat[..dat.len() - 10]);
        assert_eq!(pings.len(), 1);
        assert!(pings[0].is_err());
    }

    #[test_case(f32::NAN, 0.0, 20.0; "nan depth")]
    #[test_case(100.0, f32::INFINITY, 20.0; "infinite acrosstrack")]
    #[test_case(100.0, 0.0, f32::NAN; "nan intensity")]
    fn non_finite_beam(depth: f32, acrosstrack: f32, intensity: f32) {
        let dat = bathymetry_at(1, &[(10.0, 0x03, depth, acrosstrack)], -122.25, intensity);
        let pings = decode_bytes(&dat);
        assert_eq!(pings.len(), 1);
        let err = pings[0].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("invalid beam"), "{err}");
    }

    #[test]
    fn non_finite_altitude() {
        let mut dat = altitude(f32::NAN);
        dat.extend(bathymetry(1, &[(10.0, 0x03, 100.0, 0.0)]));
        let pings = decode_bytes(&dat);
        assert_eq!(pings.len(), 1);
        let err = pings[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("invalid altitude"), "{err}");
    }

    #[test_case(LonFlip::Centered, -122.25, -122.25; "centered keeps signed")]
    #[test_case(LonFlip::East, -122.25, 237.75; "east from signed")]
    #[test_case(LonFlip::West, -122.25, -122.25; "west keeps negative")]
    #[test_case(LonFlip::West, 237.75, -122.25; "west from east")]
    #[test_case(LonFlip::Centered, 237.75, -122.25; "centered from east")]
    fn lonflip(lonflip: LonFlip, lon: f64, expected: f64) {
        let dat = bathymetry_at(1, &[(10.0, 0x03, 100.0, 0.0)], lon, 20.0);
        let pings: Vec<_> = decode(&dat[..], Path::new("test.s7k"), lonflip).collect();
        let ping = pings[0].as_ref().unwrap();
        assert!((ping.nav.longitude - expected).abs() < 1e-9, "{}", ping.nav.longitude);
    }

    #[test]
    fn empty_input() {
        assert!(decode_bytes(&[]).is_empty());
    }
}
