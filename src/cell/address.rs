use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::HashBytes;

/// Internal standard address (`addr_std` without anycast).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StdAddr {
    pub workchain: i8,
    pub account: HashBytes,
}

impl StdAddr {
    /// `10` tag, anycast bit, 8-bit workchain, 256-bit account
    pub const BIT_LEN: u16 = 2 + 1 + 8 + 256;

    pub const fn new(workchain: i8, account: HashBytes) -> Self {
        Self { workchain, account }
    }

    pub fn is_masterchain(&self) -> bool {
        self.workchain == -1
    }
}

impl std::fmt::Display for StdAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.workchain, self.account)
    }
}

impl FromStr for StdAddr {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (workchain, account) = s
            .trim()
            .split_once(':')
            .ok_or(AddressParseError::InvalidFormat)?;

        let workchain = workchain
            .parse::<i8>()
            .map_err(|_| AddressParseError::InvalidWorkchain)?;
        let account = account
            .parse::<HashBytes>()
            .map_err(|_| AddressParseError::InvalidAccount)?;

        Ok(Self { workchain, account })
    }
}

impl Serialize for StdAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StdAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let str = String::deserialize(deserializer)?;
        str.parse().map_err(Error::custom)
    }
}

/// Message address as stored in message bodies: either `addr_none` or `addr_std`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum MsgAddress {
    #[default]
    None,
    Std(StdAddr),
}

impl MsgAddress {
    pub fn as_std(&self) -> Option<&StdAddr> {
        match self {
            Self::None => None,
            Self::Std(addr) => Some(addr),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<StdAddr> for MsgAddress {
    fn from(addr: StdAddr) -> Self {
        Self::Std(addr)
    }
}

impl From<Option<StdAddr>> for MsgAddress {
    fn from(addr: Option<StdAddr>) -> Self {
        addr.map(Self::Std).unwrap_or_default()
    }
}

impl std::fmt::Display for MsgAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Std(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for MsgAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(Self::None),
            s => s.parse().map(Self::Std),
        }
    }
}

#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum AddressParseError {
    #[error("expected `<workchain>:<hex account>`")]
    InvalidFormat,
    #[error("invalid workchain")]
    InvalidWorkchain,
    #[error("invalid account id")]
    InvalidAccount,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    #[test]
    fn parse_and_display() {
        let addr: StdAddr = ADDR.parse().unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(addr.to_string(), ADDR);

        let masterchain: StdAddr = format!("-1:{}", addr.account).parse().unwrap();
        assert!(masterchain.is_masterchain());

        assert_eq!(
            "0:1234".parse::<StdAddr>(),
            Err(AddressParseError::InvalidAccount)
        );
        assert_eq!(
            "128:00".parse::<StdAddr>(),
            Err(AddressParseError::InvalidWorkchain)
        );
        assert_eq!(
            "deadbeef".parse::<StdAddr>(),
            Err(AddressParseError::InvalidFormat)
        );
    }

    #[test]
    fn optional_addresses() {
        assert_eq!("".parse::<MsgAddress>(), Ok(MsgAddress::None));
        assert_eq!("none".parse::<MsgAddress>(), Ok(MsgAddress::None));

        let addr = ADDR.parse::<MsgAddress>().unwrap();
        assert_eq!(addr.as_std().map(ToString::to_string).as_deref(), Some(ADDR));
        assert_eq!(MsgAddress::from(None), MsgAddress::None);
    }

    #[test]
    fn serde_as_string() {
        let addr: StdAddr = ADDR.parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{ADDR}\""));
        assert_eq!(serde_json::from_str::<StdAddr>(&json).unwrap(), addr);
    }
}
