//! Rendering of byte operands for traces.
//!
//! These helpers read the memory array directly: they are never traced, never
//! checked, and stop at the end of memory instead of failing.

use crate::constants::{lower_byte, upper_byte, Address, Byte};
use crate::runtime::Memory;

/// Longest operand rendered
pub const MAX_OPERAND_LENGTH: usize = 256;

/// Most digits in a packed-decimal operand
pub const MAX_BCD_DIGITS: usize = 32;

fn byte_at(memory: &Memory, byte_address: Address) -> Option<Byte> {
    let word = memory.get(byte_address / 2).ok()?;
    if byte_address & 1 == 1 {
        Some(lower_byte(word))
    } else {
        Some(upper_byte(word))
    }
}

/// Bytes of an operand, up to [`MAX_OPERAND_LENGTH`]
fn operand_bytes(memory: &Memory, byte_address: Address, byte_count: usize) -> Vec<Byte> {
    // Bounded by MAX_OPERAND_LENGTH
    #[allow(clippy::cast_possible_truncation)]
    let byte_count = byte_count.min(MAX_OPERAND_LENGTH) as Address;
    (0..byte_count)
        .map_while(|index| {
            byte_address
                .checked_add(index)
                .and_then(|address| byte_at(memory, address))
        })
        .collect()
}

/// Render a byte string starting at a physical byte address
#[must_use]
pub fn byte_operand(memory: &Memory, byte_address: Address, byte_count: usize) -> String {
    operand_bytes(memory, byte_address, byte_count)
        .into_iter()
        .map(char::from)
        .collect()
}

/// Render a byte string translated through the byte table at `table_address`
#[must_use]
pub fn translated_byte_operand(
    memory: &Memory,
    byte_address: Address,
    byte_count: usize,
    table_address: Address,
) -> String {
    operand_bytes(memory, byte_address, byte_count)
        .into_iter()
        .map_while(|byte| {
            table_address
                .checked_add(Address::from(byte))
                .and_then(|address| byte_at(memory, address))
        })
        .map(char::from)
        .collect()
}

/// Render a packed-decimal number as hexadecimal digits.
///
/// `digit_count` does not include the sign, which is in the nibble following
/// the last digit. Numbers always end in the lower nibble of a byte, so with an
/// even digit count the first upper nibble is unused.
#[must_use]
pub fn bcd_operand(memory: &Memory, byte_address: Address, digit_count: usize) -> String {
    if digit_count > MAX_BCD_DIGITS {
        return String::from("(invalid)");
    }

    let bytes = operand_bytes(memory, byte_address, digit_count / 2 + 1);
    let mut nibbles: Vec<Byte> = bytes.iter().flat_map(|&b| [b >> 4, b & 0xF]).collect();
    if digit_count % 2 == 0 && !nibbles.is_empty() {
        nibbles.remove(0);
    }

    nibbles
        .into_iter()
        .filter_map(|nibble| char::from_digit(u32::from(nibble), 16))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
