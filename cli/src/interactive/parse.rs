use std::str::FromStr;

use hp3000_emulator::constants::{Address, Byte, Word};
use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{char, digit0, hex_digit1, oct_digit1, one_of};
use nom::combinator::{all_consuming, map_res, recognize, value};
use nom::error::{convert_error, VerboseError};
use nom::sequence::{pair, preceded};
use nom::{Finish, IResult};
use thiserror::Error;

/// A number typed at the console.
///
/// A leading `0x` means hexadecimal, a leading `0` means octal, anything else
/// is decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Number(pub u32);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberError {
    #[error("{0:#o} does not fit in a word")]
    Word(u32),

    #[error("{0:#o} does not fit in a byte")]
    Byte(u32),
}

impl Number {
    pub const fn address(self) -> Address {
        self.0
    }

    pub fn word(self) -> Result<Word, NumberError> {
        Word::try_from(self.0).map_err(|_| NumberError::Word(self.0))
    }

    pub fn byte(self) -> Result<Byte, NumberError> {
        Byte::try_from(self.0).map_err(|_| NumberError::Byte(self.0))
    }
}

#[derive(Debug, Error)]
#[error("could not parse number: {0}")]
pub struct ParseNumberError(String);

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_number(s).map_err(|e| ParseNumberError(convert_error(s, e)))
    }
}

fn parse_hexadecimal(input: &str) -> IResult<&str, u32, VerboseError<&str>> {
    preceded(
        tag_no_case("0x"),
        map_res(hex_digit1, |digits| u32::from_str_radix(digits, 16)),
    )(input)
}

fn parse_octal(input: &str) -> IResult<&str, u32, VerboseError<&str>> {
    preceded(
        char('0'),
        map_res(oct_digit1, |digits| u32::from_str_radix(digits, 8)),
    )(input)
}

fn parse_decimal(input: &str) -> IResult<&str, u32, VerboseError<&str>> {
    map_res(
        recognize(pair(one_of("123456789"), digit0)),
        str::parse::<u32>,
    )(input)
}

fn parse_number_inner(input: &str) -> IResult<&str, u32, VerboseError<&str>> {
    alt((
        parse_hexadecimal,
        parse_octal,
        value(0, char('0')),
        parse_decimal,
    ))(input)
}

fn parse_number(input: &str) -> Result<Number, VerboseError<&str>> {
    let (_, ret) = all_consuming(parse_number_inner)(input).finish()?;
    Ok(Number(ret))
}
