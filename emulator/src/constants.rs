/// A memory word. The store is addressed in units of words.
pub type Word = u16;

/// One half of a [`Word`]
pub type Byte = u8;

/// A physical address: a bank number in the high bits and a logical offset in
/// the low [`LA_WIDTH`] bits.
pub type Address = u32;

/// Width of a logical (bank-relative) address
pub const LA_WIDTH: u32 = 16;

/// Mask for a logical address
pub const LA_MASK: Address = 0o177_777;

/// Mask for the data bits of a stored word
pub const DV_MASK: u32 = 0o177_777;

/// Words in one "K" of memory
pub const KILOWORDS: usize = 1024;

/// Smallest supported memory configuration
pub const MIN_MEMORY_SIZE: usize = 128 * KILOWORDS;

/// Memory is configured in increments of one memory array
pub const MEMORY_INCREMENT: usize = 128 * KILOWORDS;

/// Largest supported memory configuration, also the size of the allocation
pub const MAX_MEMORY_SIZE: usize = 1024 * KILOWORDS;

/// Number of top-of-stack registers
pub const TOS_REGISTER_COUNT: usize = 4;

/// Form a physical address from a bank number and an offset.
///
/// Neither value is masked: an out-of-range bank must produce an address beyond
/// the end of memory instead of wrapping into a valid one.
#[must_use]
pub fn to_pa(bank: Word, offset: Address) -> Address {
    (Address::from(bank) << LA_WIDTH) | offset
}

/// Bank number part of a physical address
#[must_use]
pub const fn to_bank(address: Address) -> Address {
    address >> LA_WIDTH
}

/// Offset part of a physical address
#[must_use]
pub const fn to_offset(address: Address) -> Address {
    address & LA_MASK
}

#[must_use]
pub const fn upper_byte(word: Word) -> Byte {
    word.to_be_bytes()[0]
}

#[must_use]
pub const fn lower_byte(word: Word) -> Byte {
    word.to_be_bytes()[1]
}

/// Replace the upper byte of a word, keeping the lower one
#[must_use]
pub const fn replace_upper(word: Word, byte: Byte) -> Word {
    Word::from_be_bytes([byte, lower_byte(word)])
}

/// Replace the lower byte of a word, keeping the upper one
#[must_use]
pub const fn replace_lower(word: Word, byte: Byte) -> Word {
    Word::from_be_bytes([upper_byte(word), byte])
}
