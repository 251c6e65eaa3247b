use thiserror::Error;

/// Stable taxonomy for faults latched by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// A fetched byte matched no opcode family.
    #[error("undecodable opcode byte")]
    Decode = 0x01,
    /// A RAM access fell outside the configured byte store.
    #[error("memory access outside configured ram")]
    MemoryOutOfRange = 0x02,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Decode),
            0x02 => Some(Self::MemoryOutOfRange),
            _ => None,
        }
    }
}

/// A fetched byte that neither matches an opcode exactly nor by its high-nibble family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("byte {byte:#04X} fetched at {address:#010X} is not a valid opcode")]
pub struct DecodeError {
    /// The offending opcode byte.
    pub byte: u8,
    /// Fetch address of the byte.
    pub address: u32,
}

/// Fatal bring-up errors. Ticking must not begin once one of these is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Two devices claim the same address.
    #[error("address {address:#010X} claimed by `{requested}` is already mapped to `{owner}`")]
    OverlappingMapping {
        /// First conflicting address.
        address: u32,
        /// Device whose claim was rejected.
        requested: String,
        /// Device already owning the address.
        owner: String,
    },
    /// A device claim wraps past the top of the 32-bit address space.
    #[error("range of `{name}` starting at {start:#010X} wraps past the end of the address space")]
    RangeWraps {
        /// Device name.
        name: String,
        /// Claimed start address.
        start: u32,
    },
    /// A device was registered after the map was frozen.
    #[error("device `{name}` cannot be mapped after bring-up")]
    MappingSealed {
        /// Device name.
        name: String,
    },
    /// A component the machine cannot run without was never declared.
    #[error("required component `{0}` is missing from the configuration")]
    MissingComponent(&'static str),
    /// A single-instance component was declared twice.
    #[error("component `{0}` is declared more than once")]
    DuplicateComponent(String),
    /// A device configuration string lacks a mandatory key.
    #[error("device configuration `{config}` is missing key `{key}`")]
    MissingKey {
        /// The missing key.
        key: &'static str,
        /// The offending configuration string.
        config: String,
    },
    /// A configuration value could not be parsed.
    #[error("invalid value `{value}` for key `{key}`")]
    InvalidValue {
        /// Key the value belongs to.
        key: String,
        /// Raw value text.
        value: String,
    },
    /// The program image does not fit in RAM.
    #[error("program image of {image} bytes does not fit in {ram} bytes of ram")]
    ImageTooLarge {
        /// Image length in bytes.
        image: usize,
        /// RAM size in bytes.
        ram: usize,
    },
    /// A device backing file could not be opened.
    #[error("device `{name}` could not open `{path}`: {reason}")]
    DeviceIo {
        /// Device name.
        name: String,
        /// Path that failed.
        path: String,
        /// Underlying I/O error text.
        reason: String,
    },
}

/// Fatal run-time errors raised by a tick. The failing tick may leave partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The fetched opcode byte could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A RAM access fell outside the configured byte store.
    #[error("{width}-byte access at {address:#010X} is outside ram")]
    MemoryOutOfRange {
        /// Start address of the access.
        address: u32,
        /// Access width in bytes.
        width: u8,
    },
    /// A tick was attempted after a fatal fault was latched.
    #[error("core is halted by latched fault: {0}")]
    FaultLatched(FaultCode),
}

impl CoreError {
    /// Returns the fault code latched for this error.
    #[must_use]
    pub const fn fault_code(&self) -> FaultCode {
        match self {
            Self::Decode(_) => FaultCode::Decode,
            Self::MemoryOutOfRange { .. } => FaultCode::MemoryOutOfRange,
            Self::FaultLatched(code) => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreError, DecodeError, FaultCode};

    #[test]
    fn stable_code_roundtrip_is_bijective_for_defined_values() {
        for code in 0x01u8..=0x02 {
            let fault = FaultCode::from_u8(code).expect("defined taxonomy code");
            assert_eq!(fault.as_u8(), code);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(FaultCode::from_u8(0x00).is_none());
        assert!(FaultCode::from_u8(0xFF).is_none());
    }

    #[test]
    fn core_errors_map_to_their_fault_codes() {
        let decode = CoreError::from(DecodeError {
            byte: 0xAB,
            address: 4,
        });
        assert_eq!(decode.fault_code(), FaultCode::Decode);
        assert_eq!(
            CoreError::MemoryOutOfRange {
                address: 0x1000,
                width: 4
            }
            .fault_code(),
            FaultCode::MemoryOutOfRange
        );
        assert_eq!(
            CoreError::FaultLatched(FaultCode::Decode).fault_code(),
            FaultCode::Decode
        );
    }

    #[test]
    fn decode_error_message_names_byte_and_address() {
        let error = DecodeError {
            byte: 0x7F,
            address: 0x10,
        };
        assert_eq!(
            error.to_string(),
            "byte 0x7F fetched at 0x00000010 is not a valid opcode"
        );
    }
}
