pub mod constants;
pub mod format;
pub mod runtime;

pub use self::runtime::{AccessClass, Bus, ByteAccessor, Computer, Memory, Registers};
