use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{label} must be `0x` followed by {expected_len} hex characters")]
pub struct HexParseError {
    pub label: &'static str,
    pub expected_len: usize,
}

macro_rules! hex_newtype {
    ($name:ident, $hex_len:expr, $label:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: impl Into<String>) -> Result<Self, HexParseError> {
                let raw: String = raw.into();
                match raw.strip_prefix("0x") {
                    Some(hex)
                        if hex.len() == $hex_len
                            && hex.bytes().all(|b| b.is_ascii_hexdigit()) =>
                    {
                        Ok(Self(raw.to_ascii_lowercase()))
                    }
                    _ => Err(HexParseError {
                        label: $label,
                        expected_len: $hex_len,
                    }),
                }
            }

            /// Builds the identifier from the leading bytes of a digest.
            pub fn from_digest(digest: &[u8]) -> Self {
                let mut out = String::with_capacity(2 + $hex_len);
                out.push_str("0x");
                for byte in digest.iter().take($hex_len / 2) {
                    out.push_str(&format!("{byte:02x}"));
                }
                Self(out)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = HexParseError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Self::parse(raw)
            }
        }

        impl TryFrom<String> for $name {
            type Error = HexParseError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::parse(raw)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

hex_newtype!(Address, 40, "address");
hex_newtype!(TxHash, 64, "transaction hash");

/// Argument/return type of a remote call, used for exact schema matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PrimitiveKind {
    Uint(u16),
    Address,
    Text,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Uint(bits) => write!(f, "uint{bits}"),
            PrimitiveKind::Address => f.write_str("address"),
            PrimitiveKind::Text => f.write_str("string"),
        }
    }
}

const SUPPORTED_UINT_WIDTHS: [u16; 6] = [8, 16, 32, 64, 128, 256];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("unsupported uint width {0}")]
    UnsupportedWidth(u16),
    #[error("value {value} does not fit uint{bits}")]
    WidthOverflow { bits: u16, value: u128 },
}

/// A typed call argument or return value.
///
/// Widths follow the remote ABI surface: uint8 through uint256. Magnitudes
/// are stored as `u128`; the demo ledger never mints values above that, so a
/// declared `uint256` accepts any stored magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Primitive {
    Uint { bits: u16, value: u128 },
    Address(Address),
    Text(String),
}

impl Primitive {
    pub fn uint(bits: u16, value: u128) -> Result<Self, ValueError> {
        if !SUPPORTED_UINT_WIDTHS.contains(&bits) {
            return Err(ValueError::UnsupportedWidth(bits));
        }
        if bits < 128 && value >> bits != 0 {
            return Err(ValueError::WidthOverflow { bits, value });
        }
        Ok(Primitive::Uint { bits, value })
    }

    pub fn uint8(value: u8) -> Self {
        Primitive::Uint {
            bits: 8,
            value: value as u128,
        }
    }

    pub fn uint256(value: u128) -> Self {
        Primitive::Uint { bits: 256, value }
    }

    pub fn address(address: Address) -> Self {
        Primitive::Address(address)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Primitive::Text(text.into())
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Uint { bits, .. } => PrimitiveKind::Uint(*bits),
            Primitive::Address(_) => PrimitiveKind::Address,
            Primitive::Text(_) => PrimitiveKind::Text,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Primitive::Uint { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Primitive::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Primitive::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Uint { value, .. } => write!(f, "{value}"),
            Primitive::Address(address) => write!(f, "{address}"),
            Primitive::Text(text) => write!(f, "{text:?}"),
        }
    }
}

pub const UINT8: PrimitiveKind = PrimitiveKind::Uint(8);
pub const UINT256: PrimitiveKind = PrimitiveKind::Uint(256);

/// A named state-changing remote call. Immutable once constructed; consumed
/// once by the write coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub sender: Address,
    pub contract: Address,
    pub function: String,
    pub args: Vec<Primitive>,
}

impl Operation {
    pub fn new(
        sender: Address,
        contract: Address,
        function: impl Into<String>,
        args: Vec<Primitive>,
    ) -> Self {
        Self {
            sender,
            contract,
            function: function.into(),
            args,
        }
    }
}

/// A named read-only remote call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub contract: Address,
    pub function: String,
    pub args: Vec<Primitive>,
}

impl Query {
    pub fn new(contract: Address, function: impl Into<String>, args: Vec<Primitive>) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey {
            contract: self.contract.clone(),
            function: self.function.clone(),
            args: self.args.clone(),
        }
    }
}

/// Cache identity of a query: contract, function name, argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub contract: Address,
    pub function: String,
    pub args: Vec<Primitive>,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.contract, self.function)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}
