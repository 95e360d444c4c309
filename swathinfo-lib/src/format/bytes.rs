use std::io::{self, ErrorKind, Read};

/// Byte source that supports pushing bytes back after reading them, i.e., peek-and-push.
///
/// Binary decoders use this to look at a candidate record header and hand the bytes back when
/// it turns out not to be a header, which is what resynchronization after corrupt data needs.
/// Pushed back bytes are returned again in their original order.
pub(crate) struct Bytes<R>
where
    R: Read + Send,
{
    reader: R,
    num_read: usize,
    cache: Vec<u8>,
}

impl<R> Bytes<R>
where
    R: Read + Send,
{
    pub fn new(reader: R) -> Self {
        Bytes {
            reader,
            num_read: 0,
            cache: Vec::new(),
        }
    }

    /// Fill `buf` completely. Returns `Ok(false)` if the source ended before the first byte
    /// of `buf` could be read.
    ///
    /// # Errors
    /// [ErrorKind::UnexpectedEof] if the source ends part way through `buf`, or any other
    /// read error.
    pub fn fill(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let cached = self.cache.len().min(buf.len());
        buf[..cached].copy_from_slice(&self.cache[..cached]);
        self.cache.drain(..cached);
        if cached == buf.len() {
            return Ok(true);
        }

        let rest = &mut buf[cached..];
        let mut got = 0;
        while got < rest.len() {
            match self.reader.read(&mut rest[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.num_read += got;
        if got == rest.len() {
            Ok(true)
        } else if cached == 0 && got == 0 {
            Ok(false)
        } else {
            Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("needed {} bytes, got {}", buf.len(), cached + got),
            ))
        }
    }

    /// Return bytes to the front of the stream.
    pub fn push(&mut self, dat: &[u8]) {
        let mut restored = dat.to_vec();
        restored.append(&mut self.cache);
        self.cache = restored;
    }

    /// Number of bytes consumed from the start of the stream.
    pub fn offset(&self) -> usize {
        self.num_read - self.cache.len()
    }
}

/// Sequential little-endian field reader over a record buffer.
///
/// Callers check the buffer holds the whole record before reading fields; reading past the
/// end is a bug and panics.
pub(crate) struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Fields { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    pub fn skip(&mut self, num: usize) {
        self.pos += num;
    }

    pub fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    pub fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    pub fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }
}

/// Wrapping byte sum used as a record checksum by several binary formats.
pub(crate) fn byte_sum(dat: &[u8]) -> u32 {
    dat.iter().fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)))
}
