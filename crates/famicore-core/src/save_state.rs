//! Whole-machine save states.
//!
//! Stream layout, all big-endian:
//!
//! ```text
//! u32  format id (0xABCD1234)
//! u8   major version
//! u8   minor version
//! u8   patch version
//! ...  Bus state
//! ...  CPU state
//! ...  PPU state
//! ...  APU state
//! ...  Mapper state
//! ```
//!
//! Loading goes through a staging copy of the machine: the stream is
//! deserialized into the copy and committed only if every field read
//! cleanly, so a truncated or mismatched stream can never leave a live
//! machine half-restored. Save and load may only be called between
//! master cycles.

use crate::bus::Bus;
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// Save-state stream identifier.
pub const FORMAT_ID: u32 = 0xABCD_1234;

/// Format version, bumped on any layout change.
pub const VERSION_MAJOR: u8 = 1;
/// Minor version.
pub const VERSION_MINOR: u8 = 0;
/// Patch version.
pub const VERSION_PATCH: u8 = 0;

impl Bus {
    /// Serialize the complete machine state into `writer`.
    ///
    /// # Errors
    /// Propagates stream write failures.
    pub fn save_state<W: Write>(&self, writer: W) -> Result<(), SaveStateError> {
        let mut s = Serializer::new(writer);
        s.write_u32(FORMAT_ID)?;
        s.write_u8(VERSION_MAJOR)?;
        s.write_u8(VERSION_MINOR)?;
        s.write_u8(VERSION_PATCH)?;

        self.serialize_bus(&mut s)?;
        let (cpu, ppu, apu, mapper) = self.components();
        cpu.serialize(&mut s)?;
        ppu.serialize(&mut s)?;
        apu.serialize(&mut s)?;
        mapper.serialize(&mut s)
    }

    /// Restore the machine from a stream produced by [`Bus::save_state`],
    /// atomically: on any error the live machine is untouched.
    ///
    /// # Errors
    ///
    /// [`SaveStateError::BadSaveState`] on a format or version mismatch;
    /// [`SaveStateError::Io`] on a truncated stream.
    pub fn load_state<R: Read>(&mut self, reader: R) -> Result<(), SaveStateError> {
        let mut d = Deserializer::new(reader);

        let format_id = d.read_u32()?;
        if format_id != FORMAT_ID {
            log::warn!("save state rejected: format id {format_id:#010X}");
            return Err(SaveStateError::BadSaveState(format!(
                "format id mismatch: expected {FORMAT_ID:#010X}, found {format_id:#010X}"
            )));
        }
        let major = d.read_u8()?;
        let minor = d.read_u8()?;
        let patch = d.read_u8()?;
        if major != VERSION_MAJOR {
            return Err(SaveStateError::BadSaveState(format!(
                "unsupported save state version {major}.{minor}.{patch}"
            )));
        }

        let mut staging = self.clone();
        staging.deserialize_bus(&mut d)?;
        {
            let (cpu, ppu, apu, mapper) = staging.components_mut();
            cpu.deserialize(&mut d)?;
            ppu.deserialize(&mut d)?;
            apu.deserialize(&mut d)?;
            mapper.deserialize(&mut d)?;
        }

        *self = staging;
        Ok(())
    }
}
