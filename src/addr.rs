use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Deref;
use std::str::FromStr;

use log::*;

/// Buffer size needed for the longest IPv4 presentation form plus NUL.
pub const INET_ADDRSTRLEN: usize = 16;
/// Buffer size needed for the longest IPv6 presentation form plus NUL.
pub const INET6_ADDRSTRLEN: usize = 46;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Family {
    Inet,
    Inet6,
}

impl Family {
    pub(crate) fn as_raw(self) -> libc::c_int {
        match self {
            Family::Inet => libc::AF_INET,
            Family::Inet6 => libc::AF_INET6,
        }
    }

    /// Smallest text buffer `address_to_text` accepts for this family.
    pub fn text_capacity(self) -> usize {
        match self {
            Family::Inet => INET_ADDRSTRLEN,
            Family::Inet6 => INET6_ADDRSTRLEN,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Inet => f.write_str("IPv4"),
            Family::Inet6 => f.write_str("IPv6"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddrError {
    #[error("address missing")]
    AddressMissing,
    #[error("buffer too small: {family} needs {needed} bytes, got {actual}")]
    BufferTooSmall {
        family: Family,
        needed: usize,
        actual: usize,
    },
    #[error("Not a valid {family} address: {text:?}")]
    InvalidText { family: Family, text: String },
}

/// A binary network address, tagged with its family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RawAddress {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl RawAddress {
    pub fn family(&self) -> Family {
        match self {
            RawAddress::V4(_) => Family::Inet,
            RawAddress::V6(_) => Family::Inet6,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RawAddress::V4(octets) => octets,
            RawAddress::V6(octets) => octets,
        }
    }

    pub fn ip(&self) -> IpAddr {
        match *self {
            RawAddress::V4(octets) => IpAddr::V4(Ipv4Addr::from(octets)),
            RawAddress::V6(octets) => IpAddr::V6(Ipv6Addr::from(octets)),
        }
    }

    pub fn to_text(&self) -> TextAddress {
        TextAddress(self.ip().to_string())
    }
}

impl From<IpAddr> for RawAddress {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(v4) => RawAddress::V4(v4.octets()),
            IpAddr::V6(v6) => RawAddress::V6(v6.octets()),
        }
    }
}

impl From<Ipv4Addr> for RawAddress {
    fn from(value: Ipv4Addr) -> Self {
        RawAddress::V4(value.octets())
    }
}

impl From<Ipv6Addr> for RawAddress {
    fn from(value: Ipv6Addr) -> Self {
        RawAddress::V6(value.octets())
    }
}

impl From<RawAddress> for IpAddr {
    fn from(value: RawAddress) -> Self {
        value.ip()
    }
}

impl fmt::Display for RawAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.ip(), f)
    }
}

/// Presentation-format address, never longer than [`TextAddress::MAX_LEN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextAddress(String);

impl TextAddress {
    pub const MAX_LEN: usize = INET6_ADDRSTRLEN - 1;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for TextAddress {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TextAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes the presentation form of `address` into `buf`, NUL terminated,
/// and returns the text part. `buf` is left untouched on error.
pub fn address_to_text<'a>(address: &RawAddress, buf: &'a mut [u8]) -> Result<&'a str, AddrError> {
    let family = address.family();
    let needed = family.text_capacity();
    if buf.len() < needed {
        warn!(
            "Address buffer too small for {family}: {} < {needed}",
            buf.len()
        );
        return Err(AddrError::BufferTooSmall {
            family,
            needed,
            actual: buf.len(),
        });
    }

    let text = address.to_text();
    let len = text.len();
    buf[..len].copy_from_slice(text.as_bytes());
    buf[len] = 0;
    trace!("{family} {:?} => {text}", address.as_bytes());

    // Only ASCII was copied in.
    Ok(std::str::from_utf8(&buf[..len]).unwrap_or_default())
}

pub fn text_to_address(family: Family, text: &str) -> Result<RawAddress, AddrError> {
    if text.is_empty() {
        return Err(AddrError::AddressMissing);
    }
    let invalid = || AddrError::InvalidText {
        family,
        text: text.to_string(),
    };
    match family {
        Family::Inet => Ipv4Addr::from_str(text)
            .map(RawAddress::from)
            .map_err(|_| invalid()),
        Family::Inet6 => Ipv6Addr::from_str(text)
            .map(RawAddress::from)
            .map_err(|_| invalid()),
    }
}
