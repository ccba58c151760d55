//! Access classifications.
//!
//! Every classified memory access names one of the [`AccessClass`] variants.
//! The class decides which bank register forms the physical address, whether
//! the TOS registers overlay memory, whether the segment bounds are checked and
//! whether the access may write.

use parse_display::{Display, FromStr};

use super::registers::Bank;
use super::registers::Bank::{Data as DB, Program as PB, Stack as SB};
use super::trace::Category;
use super::trace::Category::{Data as D, Fetch as F};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr)]
#[display(style = "snake_case")]
pub enum AccessClass {
    /// Physical address, no TOS overlay
    Absolute,

    /// Physical address, TOS overlay
    AbsoluteMapped,

    /// Instruction fetch, `PBANK` relative
    Fetch,

    /// Instruction fetch, checked against `PB..PL`
    FetchChecked,

    /// Program read, `PBANK` relative
    Program,

    /// Program read, checked against `PB..PL` unless privileged
    ProgramChecked,

    /// Data access, `DBANK` relative
    Data,

    /// Data access, checked against `DL..SM+SR` unless privileged
    DataChecked,

    /// Data access, TOS overlay
    DataMapped,

    /// Data access, TOS overlay, checked against `DL..SM+SR` unless privileged
    DataMappedChecked,

    /// Stack access, `SBANK` relative, TOS overlay
    Stack,

    /// Stack access, TOS overlay, checked against `DL..SM+SR` unless privileged
    StackChecked,

    /// Channel access, physical address
    Dma,
}

/// Fixed attributes of an access class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    /// The bank register implied by the class, `None` if the offset is a
    /// physical address
    pub bank: Option<Bank>,

    pub category: Category,

    /// Name used when tracing
    pub name: &'static str,

    /// Offsets are checked against the segment bounds
    pub checked: bool,

    /// The TOS registers overlay memory
    pub overlay: bool,

    /// The class can be used to write
    pub writable: bool,
}

const fn props(
    bank: Option<Bank>,
    category: Category,
    name: &'static str,
    checked: bool,
    overlay: bool,
    writable: bool,
) -> Properties {
    Properties {
        bank,
        category,
        name,
        checked,
        overlay,
        writable,
    }
}

/// Indexed by [`AccessClass`]
#[rustfmt::skip]
static PROPERTIES: [Properties; 13] = [
    //    bank      category  name                 checked overlay writable
    props(None,     D,        "absolute",          false,  false,  true),  // absolute
    props(None,     D,        "absolute",          false,  true,   true),  // absolute_mapped
    props(Some(PB), F,        "instruction fetch", false,  false,  false), // fetch
    props(Some(PB), F,        "instruction fetch", true,   false,  false), // fetch_checked
    props(Some(PB), D,        "program",           false,  false,  false), // program
    props(Some(PB), D,        "program",           true,   false,  false), // program_checked
    props(Some(DB), D,        "data",              false,  false,  true),  // data
    props(Some(DB), D,        "data",              true,   false,  true),  // data_checked
    props(Some(DB), D,        "data",              false,  true,   true),  // data_mapped
    props(Some(DB), D,        "data",              true,   true,   true),  // data_mapped_checked
    props(Some(SB), D,        "stack",             false,  true,   true),  // stack
    props(Some(SB), D,        "stack",             true,   true,   true),  // stack_checked
    props(None,     D,        "dma",               false,  false,  true),  // dma
];

impl AccessClass {
    pub const ALL: [AccessClass; 13] = [
        AccessClass::Absolute,
        AccessClass::AbsoluteMapped,
        AccessClass::Fetch,
        AccessClass::FetchChecked,
        AccessClass::Program,
        AccessClass::ProgramChecked,
        AccessClass::Data,
        AccessClass::DataChecked,
        AccessClass::DataMapped,
        AccessClass::DataMappedChecked,
        AccessClass::Stack,
        AccessClass::StackChecked,
        AccessClass::Dma,
    ];

    #[must_use]
    pub fn properties(self) -> &'static Properties {
        &PROPERTIES[self as usize]
    }

    #[must_use]
    pub fn bank(self) -> Option<Bank> {
        self.properties().bank
    }

    #[must_use]
    pub fn category(self) -> Category {
        self.properties().category
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.properties().name
    }

    #[must_use]
    pub fn is_checked(self) -> bool {
        self.properties().checked
    }

    #[must_use]
    pub fn is_mapped(self) -> bool {
        self.properties().overlay
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        self.properties().writable
    }

    /// The class of the same kind with the opposite bounds checking.
    ///
    /// `absolute` pairs with `absolute_mapped`, and `dma` has no counterpart.
    #[must_use]
    pub const fn invert_check(self) -> Self {
        use AccessClass as A;
        match self {
            A::Absolute => A::AbsoluteMapped,
            A::AbsoluteMapped => A::Absolute,
            A::Fetch => A::FetchChecked,
            A::FetchChecked => A::Fetch,
            A::Program => A::ProgramChecked,
            A::ProgramChecked => A::Program,
            A::Data => A::DataChecked,
            A::DataChecked => A::Data,
            A::DataMapped => A::DataMappedChecked,
            A::DataMappedChecked => A::DataMapped,
            A::Stack => A::StackChecked,
            A::StackChecked => A::Stack,
            A::Dma => A::Dma,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_test() {
        // The table is indexed by the discriminant
        for (index, class) in AccessClass::ALL.into_iter().enumerate() {
            assert_eq!(class as usize, index);
        }

        assert_eq!(AccessClass::Fetch.category(), Category::Fetch);
        assert_eq!(AccessClass::StackChecked.bank(), Some(Bank::Stack));
        assert_eq!(AccessClass::Dma.bank(), None);
        assert_eq!(AccessClass::DataMappedChecked.name(), "data");
    }

    #[test]
    fn class_name_test() {
        assert_eq!(AccessClass::DataMappedChecked.to_string(), "data_mapped_checked");
        assert_eq!(
            "fetch_checked".parse::<AccessClass>().unwrap(),
            AccessClass::FetchChecked
        );
        assert!("bogus".parse::<AccessClass>().is_err());
    }

    #[test]
    fn invert_check_test() {
        for class in AccessClass::ALL {
            assert_eq!(class.invert_check().invert_check(), class);
            if class.bank().is_some() {
                assert_ne!(class.is_checked(), class.invert_check().is_checked());
            }
        }
    }

    #[test]
    fn writable_test() {
        let read_only: Vec<_> = AccessClass::ALL
            .into_iter()
            .filter(|c| !c.is_writable())
            .collect();
        pretty_assertions::assert_eq!(
            read_only,
            vec![
                AccessClass::Fetch,
                AccessClass::FetchChecked,
                AccessClass::Program,
                AccessClass::ProgramChecked,
            ]
        );
    }
}
