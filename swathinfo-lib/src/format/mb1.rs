//! `MBF_MBARIMB1` (241): MBARI MB1 binary soundings as published by terrain relative
//! navigation processes.
//!
//! Each record is a fixed header, `beams` beam entries, and a trailing checksum, all little
//! endian. Beam components are relative to the sonar in the vehicle frame.
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tracing::trace;

use super::bytes::{byte_sum, Bytes, Fields};
use super::{open_file, Decoder, Pings};
use crate::nav::{derive_speed, wrap_heading, LonFlip};
use crate::prelude::*;
use crate::record::{Beam, Flag, FormatInfo, NavFix, Ping};

/// Record type id; the bytes `00 31 42 53` in file order.
pub const TYPE_ID: u32 = 0x5342_3100;
pub const HEADER_LEN: usize = 56;
pub const BEAM_LEN: usize = 28;
pub const CHECKSUM_LEN: usize = 4;
pub const MAX_BEAMS: usize = 512;

pub struct MbariMb1;

impl Decoder for MbariMb1 {
    fn info(&self) -> FormatInfo {
        FormatInfo {
            id: 241,
            name: "MBF_MBARIMB1".to_string(),
            description: "MBARI MB1 soundings".to_string(),
            attributes: "MB1 terrain relative navigation soundings, bathymetry only,\n\
                         variable beams, binary, MBARI."
                .to_string(),
        }
    }

    fn extensions(&self) -> &[&'static str] {
        &["mb1"]
    }

    fn probe(&self, header: &[u8]) -> bool {
        header.len() >= 4 && header[..4] == TYPE_ID.to_le_bytes()
    }

    fn open(&self, path: &Path, lonflip: LonFlip) -> Result<Pings> {
        let reader = open_file(path)?;
        Ok(Box::new(decode(reader, path, lonflip)))
    }
}

/// Decode MB1 soundings from `reader`; `path` is only used for error reporting.
pub fn decode<R>(reader: R, path: &Path, lonflip: LonFlip) -> impl Iterator<Item = Result<Ping>>
where
    R: Read + Send,
{
    Mb1PingIter {
        bytes: Bytes::new(reader),
        path: path.to_path_buf(),
        lonflip,
        prev: None,
        count: 0,
        done: false,
    }
}

struct Mb1PingIter<R>
where
    R: Read + Send,
{
    bytes: Bytes<R>,
    path: PathBuf,
    lonflip: LonFlip,
    prev: Option<(DateTime<Utc>, NavFix)>,
    count: usize,
    done: bool,
}

impl<R> Mb1PingIter<R>
where
    R: Read + Send,
{
    fn error<S: Into<String>>(&self, reason: S) -> Error {
        Error::decode(
            &self.path,
            self.count,
            format!("offset {}: {}", self.bytes.offset(), reason.into()),
        )
    }

    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; HEADER_LEN];
        match self.bytes.fill(&mut buf) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => return Err(self.error(format!("truncated header: {err}"))),
        }

        let mut fields = Fields::new(&buf);
        let type_id = fields.u32();
        if type_id != TYPE_ID {
            return Err(self.error(format!("bad record type {type_id:#010x}")));
        }
        let size = fields.u32() as usize;
        let num_beams = u32::from_le_bytes([buf[52], buf[53], buf[54], buf[55]]) as usize;
        if num_beams > MAX_BEAMS {
            return Err(self.error(format!("beam count {num_beams} exceeds {MAX_BEAMS}")));
        }
        let expected = HEADER_LEN + num_beams * BEAM_LEN + CHECKSUM_LEN;
        if size != expected {
            return Err(self.error(format!(
                "record size {size} does not match {num_beams} beams ({expected})"
            )));
        }

        buf.resize(size, 0);
        if let Err(err) = self.bytes.fill(&mut buf[HEADER_LEN..]) {
            return Err(self.error(format!("truncated record: {err}")));
        }
        let (body, checksum) = buf.split_at(size - CHECKSUM_LEN);
        let checksum = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
        if byte_sum(body) != checksum {
            return Err(self.error("checksum mismatch"));
        }
        Ok(Some(buf))
    }

    fn parse(&self, buf: &[u8]) -> Result<Ping> {
        let mut fields = Fields::new(buf);
        fields.skip(8);
        let timestamp = fields.f64();
        let latitude = fields.f64();
        let longitude = fields.f64();
        let sonar_depth = fields.f64();
        let heading = fields.f64();
        let ping_number = fields.i32();
        let num_beams = fields.u32() as usize;

        if !timestamp.is_finite() {
            return Err(self.error("invalid timestamp"));
        }
        let micros = (timestamp * 1e6).round() as i64;
        let time = Utc
            .timestamp_opt(
                micros.div_euclid(1_000_000),
                (micros.rem_euclid(1_000_000) * 1_000) as u32,
            )
            .single()
            .ok_or_else(|| self.error(format!("timestamp {timestamp} out of range")))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(self.error(format!("latitude {latitude} out of range")));
        }
        if !longitude.is_finite() || !heading.is_finite() || !sonar_depth.is_finite() {
            return Err(self.error("invalid navigation value"));
        }

        let mut ping = Ping::new(
            time,
            NavFix {
                longitude: self.lonflip.apply(longitude),
                latitude,
                heading: wrap_heading(heading.to_degrees()),
                sonar_depth,
                ..Default::default()
            },
        );
        for _ in 0..num_beams {
            let number = fields.u32();
            let alongtrack = fields.f64();
            let acrosstrack = fields.f64();
            let down = fields.f64();
            if !(alongtrack.is_finite() && acrosstrack.is_finite() && down.is_finite()) {
                return Err(self.error(format!("invalid beam {number}")));
            }
            let flag = if alongtrack == 0.0 && acrosstrack == 0.0 && down == 0.0 {
                Flag::Zero
            } else {
                Flag::Good
            };
            let depth = if flag == Flag::Zero { 0.0 } else { sonar_depth + down };
            ping.beams
                .push(Beam::new(depth, acrosstrack, flag).with_alongtrack(alongtrack));
        }
        trace!(ping_number, beams = num_beams, "decoded sounding");
        ping.derive_altitude();
        Ok(ping)
    }
}

impl<R> Iterator for Mb1PingIter<R>
where
    R: Read + Send,
{
    type Item = Result<Ping>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let zult = self
            .read_record()
            .and_then(|rec| rec.map(|buf| self.parse(&buf)).transpose());
        match zult {
            Ok(Some(mut ping)) => {
                if let Some((prev_time, prev_nav)) = &self.prev {
                    let elapsed = (ping.time - *prev_time).num_microseconds().unwrap_or(0);
                    derive_speed(prev_nav, &mut ping.nav, elapsed as f64 / 1e6);
                }
                self.prev = Some((ping.time, ping.nav));
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
