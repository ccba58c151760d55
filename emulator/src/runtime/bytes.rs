//! Byte addressing on top of the word-addressed memory.
//!
//! Byte offsets count two bytes per word, the upper (even) byte first. A
//! [`ByteAccessor`] walks an operand one byte at a time and keeps the word
//! holding the current byte in a buffer.
//!
//! Writing the upper byte of a word only fills the buffer: the word is written
//! when its lower byte is written, or when the sequence is terminated. The
//! terminator must match the sequence:
//!
//!   - after `read_byte` and `modify_byte`, use [`ByteAccessor::post_byte`],
//!     which writes the buffer as-is;
//!   - after `write_byte`, use [`ByteAccessor::update_byte`], which merges the
//!     lower byte currently in memory before writing.
//!
//! [`ByteAccessor::flush`] picks the right one from how the buffer was changed.

use tracing::trace;

use super::bus::Bus;
use super::class::AccessClass;
use super::exception::BoundsViolation;
use crate::constants::{
    lower_byte, replace_lower, replace_upper, to_pa, upper_byte, Address, Byte, Word,
};

type Result<T> = std::result::Result<T, BoundsViolation>;

/// State of the word buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Nothing to write
    Clean,

    /// The upper byte was written, the lower byte in the buffer is stale
    Staged,

    /// The buffered word was read, then modified in place
    Amended,
}

/// Lowest byte and cumulative length touched by an accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Physical byte address
    pub byte_address: Address,

    /// Byte offset, as seen by the caller
    pub byte_offset: Word,

    /// Number of bytes
    pub length: u32,
}

/// A cursor over a byte operand
#[derive(Debug, Clone)]
pub struct ByteAccessor {
    /// Class used for transfers: the requested one with inverted checking
    class: AccessClass,

    /// Current byte offset
    offset: Word,

    /// Address of the buffered word. Biased one word down when the next byte
    /// is an upper byte.
    word_address: Word,
    data_word: Word,
    pending: Pending,

    /// Address of the word whose memory contents are in the buffer
    cached: Option<Word>,

    /// Values at creation, restored by `reset`
    base_offset: Word,
    base_word_address: Word,
    base_byte_address: Address,

    /// Values at the last `set`
    start_offset: Word,
    start_byte_address: Address,

    extent: Extent,

    /// Bytes transferred since the last `set`
    count: u32,
}

impl ByteAccessor {
    /// Prepare byte accesses starting at `byte_offset`.
    ///
    /// With a checked class, the whole block of `block_length` bytes (or only
    /// the starting word if the length is zero) is checked once here, and the
    /// transfers are not checked. With an unchecked class, nothing is checked
    /// here and every transfer is.
    ///
    /// # Errors
    ///
    /// Fails with a bounds violation if a checked block is outside its segment.
    pub fn new(
        bus: &Bus<'_>,
        class: AccessClass,
        byte_offset: Word,
        block_length: u32,
    ) -> Result<Self> {
        let mut accessor = Self {
            class: class.invert_check(),
            offset: byte_offset,
            word_address: 0,
            data_word: 0,
            pending: Pending::Clean,
            cached: None,
            base_offset: byte_offset,
            base_word_address: 0,
            base_byte_address: 0,
            start_offset: byte_offset,
            start_byte_address: 0,
            extent: Extent {
                byte_address: 0,
                byte_offset,
                length: block_length,
            },
            count: 0,
        };

        accessor.locate(bus, block_length)?;
        accessor.base_word_address = accessor.word_address;
        accessor.base_byte_address = accessor.start_byte_address;
        accessor.extent.byte_address = accessor.start_byte_address;
        Ok(accessor)
    }

    /// The class used for transfers
    #[must_use]
    pub fn class(&self) -> AccessClass {
        self.class
    }

    /// The current byte offset
    #[must_use]
    pub fn offset(&self) -> Word {
        self.offset
    }

    /// Change the byte offset directly. [`ByteAccessor::set`] must be called
    /// before the next transfer.
    pub fn offset_mut(&mut self) -> &mut Word {
        &mut self.offset
    }

    /// Whether a buffered byte still has to be written
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.pending != Pending::Clean
    }

    /// Operand extent, including the bytes transferred since the last `set`
    #[must_use]
    pub fn extent(&self) -> Extent {
        let mut extent = self.extent;
        if self.count > 0 {
            if self.start_byte_address < extent.byte_address {
                extent.length += extent.byte_address - self.start_byte_address;
                extent.byte_address = self.start_byte_address;
                extent.byte_offset = self.start_offset;
                extent.length = extent.length.max(self.count);
            } else {
                let count = self.count + (self.start_byte_address - extent.byte_address);
                extent.length = extent.length.max(count);
            }
        }
        extent
    }

    /// Move to the current byte offset, after it was changed through
    /// [`ByteAccessor::offset_mut`].
    ///
    /// # Errors
    ///
    /// Fails if flushing the buffer, or the new starting word for a checked
    /// accessor, is out of bounds.
    pub fn set(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        self.flush(bus)?;
        self.fold_extent();
        self.locate(bus, 0)
    }

    /// Rewind to the starting offset. The extent is kept.
    ///
    /// # Errors
    ///
    /// Fails if flushing the buffer is out of bounds.
    pub fn reset(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        self.flush(bus)?;
        self.fold_extent();
        self.offset = self.base_offset;
        self.start_offset = self.base_offset;
        self.start_byte_address = self.base_byte_address;
        self.word_address = self.base_word_address;
        self.cached = None;
        Ok(())
    }

    /// Fetch the byte at `index` from the current offset, without moving.
    ///
    /// Consecutive lookups in the same word read memory once. Meant for
    /// tables; call [`ByteAccessor::set`] before switching back to sequential
    /// transfers.
    ///
    /// # Errors
    ///
    /// Fails if the entry is out of bounds.
    pub fn lookup_byte(&mut self, bus: &mut Bus<'_>, index: u8) -> Result<Byte> {
        let byte_offset = self.offset.wrapping_add(Word::from(index));
        let word_address = bus.byte_ea(self.class, byte_offset, 0)?;

        if self.cached != Some(word_address) {
            self.flush(bus)?;
            self.word_address = word_address;
            self.load(bus)?;
        }

        Ok(select(self.data_word, byte_offset))
    }

    /// Read the next byte.
    ///
    /// # Errors
    ///
    /// Fails if the byte, or a buffered word written on the way, is out of
    /// bounds.
    pub fn read_byte(&mut self, bus: &mut Bus<'_>) -> Result<Byte> {
        let byte = if self.offset & 1 == 1 {
            if self.count == 0 {
                self.load(bus)?;
            }
            lower_byte(self.data_word)
        } else {
            // Never step over a word that was not written yet
            self.flush(bus)?;
            self.word_address = self.word_address.wrapping_add(1);
            self.load(bus)?;
            upper_byte(self.data_word)
        };

        self.advance();
        Ok(byte)
    }

    /// Write the next byte.
    ///
    /// # Errors
    ///
    /// Fails if the byte is out of bounds.
    pub fn write_byte(&mut self, bus: &mut Bus<'_>, byte: Byte) -> Result<()> {
        if self.offset & 1 == 1 {
            // Starting on a lower byte: keep the upper byte that is there
            if self.count == 0 {
                self.load(bus)?;
            }
            self.data_word = replace_lower(self.data_word, byte);
            self.store(bus)?;
        } else {
            self.word_address = self.word_address.wrapping_add(1);
            self.data_word = replace_upper(self.data_word, byte);
            self.pending = Pending::Staged;
            self.cached = None;
        }

        self.advance();
        Ok(())
    }

    /// Replace the byte last read or written, without moving.
    ///
    /// # Errors
    ///
    /// Fails if the word is out of bounds.
    pub fn modify_byte(&mut self, bus: &mut Bus<'_>, byte: Byte) -> Result<()> {
        if self.offset & 1 == 1 {
            // The last byte was an upper byte, the lower one is still to come
            self.data_word = replace_upper(self.data_word, byte);
            if self.pending == Pending::Clean {
                self.pending = Pending::Amended;
            }
            Ok(())
        } else {
            self.data_word = replace_lower(self.data_word, byte);
            self.store(bus)
        }
    }

    /// Write the buffer as-is. Terminates a sequence of reads and modifies.
    ///
    /// # Errors
    ///
    /// Fails if the word is out of bounds.
    pub fn post_byte(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        if self.is_dirty() {
            self.store(bus)?;
        }
        Ok(())
    }

    /// Write the upper byte of the buffer over the word in memory. Terminates
    /// a sequence of writes.
    ///
    /// # Errors
    ///
    /// Fails if the word is out of bounds.
    pub fn update_byte(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        if self.is_dirty() {
            let current = bus.cpu_read(self.class, Address::from(self.word_address))?;
            self.data_word = replace_lower(self.data_word, lower_byte(current));
            self.store(bus)?;
        }
        Ok(())
    }

    /// Terminate the sequence with the matching discipline
    ///
    /// # Errors
    ///
    /// Fails if the word is out of bounds.
    pub fn flush(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        match self.pending {
            Pending::Clean => Ok(()),
            Pending::Staged => self.update_byte(bus),
            Pending::Amended => self.post_byte(bus),
        }
    }

    fn locate(&mut self, bus: &Bus<'_>, block_length: u32) -> Result<()> {
        let word_address = bus.byte_ea(self.class.invert_check(), self.offset, block_length)?;
        let physical = to_pa(bus.bank_of(self.class), Address::from(word_address));

        self.start_offset = self.offset;
        self.start_byte_address = (physical << 1) | Address::from(self.offset & 1);
        self.word_address = if self.offset & 1 == 0 {
            word_address.wrapping_sub(1)
        } else {
            word_address
        };
        self.cached = None;

        trace!(
            class = %self.class,
            offset = self.offset,
            word = self.word_address,
            "Byte accessor set"
        );
        Ok(())
    }

    fn fold_extent(&mut self) {
        self.extent = self.extent();
        self.count = 0;
    }

    fn load(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        self.data_word = bus.cpu_read(self.class, Address::from(self.word_address))?;
        self.cached = Some(self.word_address);
        Ok(())
    }

    fn store(&mut self, bus: &mut Bus<'_>) -> Result<()> {
        self.pending = Pending::Clean;
        bus.cpu_write(self.class, Address::from(self.word_address), self.data_word)?;
        self.cached = Some(self.word_address);
        Ok(())
    }

    fn advance(&mut self) {
        self.offset = self.offset.wrapping_add(1);
        self.count += 1;
    }
}

fn select(word: Word, byte_offset: Word) -> Byte {
    if byte_offset & 1 == 1 {
        lower_byte(word)
    } else {
        upper_byte(word)
    }
}
