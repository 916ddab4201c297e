//! Save-state stream protocol.
//!
//! Every emulated component persists itself through the [`Serializer`] and
//! [`Deserializer`] wrappers defined here. The format is deliberately plain:
//! big-endian integers written field by field, in the order the owning
//! component declares them, with variable-length byte vectors prefixed by a
//! 64-bit length. There is no in-band type information; producer and consumer
//! agree on the field order or the stream is rejected.

use std::io::{Read, Write};

/// Errors produced while writing or reading a save-state stream.
#[derive(Debug, thiserror::Error)]
pub enum SaveStateError {
    /// Underlying I/O failure, including premature end of stream.
    #[error("save state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream is structurally readable but its content is not a save
    /// state this build can accept (bad format id, bad version, absurd
    /// vector length).
    #[error("bad save state: {0}")]
    BadSaveState(String),
}

/// Sanity cap on length-prefixed vectors.
///
/// The largest legitimate vector in a save state is a 512 KiB CHR image;
/// anything bigger means the stream is corrupt, and refusing it early keeps a
/// bad length prefix from turning into a huge allocation.
const MAX_VEC_LEN: u64 = 1 << 23;

/// Field-by-field save-state writer.
pub struct Serializer<W> {
    writer: W,
}

impl<W: Write> Serializer<W> {
    /// Wrap a byte sink.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consume the serializer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write a single byte.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_u8(&mut self, value: u8) -> Result<(), SaveStateError> {
        self.writer.write_all(&[value])?;
        Ok(())
    }

    /// Write a 16-bit value big-endian.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_u16(&mut self, value: u16) -> Result<(), SaveStateError> {
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Write a 32-bit value big-endian.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_u32(&mut self, value: u32) -> Result<(), SaveStateError> {
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Write a 64-bit value big-endian.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_u64(&mut self, value: u64) -> Result<(), SaveStateError> {
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Write a signed 32-bit value big-endian.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_i32(&mut self, value: i32) -> Result<(), SaveStateError> {
        self.writer.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Write a bool as a single 0/1 byte.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_bool(&mut self, value: bool) -> Result<(), SaveStateError> {
        self.write_u8(u8::from(value))
    }

    /// Write a fixed-size byte region verbatim (no length prefix).
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Write a variable-length byte vector with a u64 length prefix.
    ///
    /// # Errors
    /// Propagates I/O failures from the sink.
    pub fn write_byte_vec(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        self.write_u64(data.len() as u64)?;
        self.write_bytes(data)
    }
}

/// Field-by-field save-state reader.
pub struct Deserializer<R> {
    reader: R,
}

impl<R: Read> Deserializer<R> {
    /// Wrap a byte source.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read a single byte.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_u8(&mut self) -> Result<u8, SaveStateError> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a big-endian 16-bit value.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_u16(&mut self) -> Result<u16, SaveStateError> {
        let mut buf = [0u8; 2];
        self.reader.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Read a big-endian 32-bit value.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_u32(&mut self) -> Result<u32, SaveStateError> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Read a big-endian 64-bit value.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_u64(&mut self) -> Result<u64, SaveStateError> {
        let mut buf = [0u8; 8];
        self.reader.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Read a big-endian signed 32-bit value.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_i32(&mut self) -> Result<i32, SaveStateError> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read a 0/1 byte as a bool. Any nonzero byte reads as `true`.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_bool(&mut self) -> Result<bool, SaveStateError> {
        Ok(self.read_u8()? != 0)
    }

    /// Fill a fixed-size byte region verbatim.
    ///
    /// # Errors
    /// Fails with [`SaveStateError::Io`] on end of stream.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), SaveStateError> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Read a u64-length-prefixed byte vector.
    ///
    /// # Errors
    /// Fails on end of stream, or with [`SaveStateError::BadSaveState`] when
    /// the length prefix exceeds the sanity cap.
    pub fn read_byte_vec(&mut self) -> Result<Vec<u8>, SaveStateError> {
        let len = self.read_u64()?;
        if len > MAX_VEC_LEN {
            return Err(SaveStateError::BadSaveState(format!(
                "vector length {len} exceeds maximum {MAX_VEC_LEN}"
            )));
        }
        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }
}
