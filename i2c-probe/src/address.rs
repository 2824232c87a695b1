use crate::{SAFE_PROBE_RANGES, SCAN_FIRST, SCAN_LAST};
use core::{fmt, str::FromStr};

/// A 7-bit address of a device on the bus, within the discoverable range `3..=119`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusAddress(u8);

impl BusAddress {
    /// Creates an address, or `None` if `addr` lies outside the discoverable range.
    pub const fn new(addr: u8) -> Option<Self> {
        if addr >= SCAN_FIRST && addr <= SCAN_LAST {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// The raw 7-bit address.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether a read probe is allowed at this address during discovery.
    pub fn is_safe_probe(self) -> bool {
        SAFE_PROBE_RANGES.iter().any(|r| r.contains(&self.0))
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl From<BusAddress> for u8 {
    fn from(value: BusAddress) -> Self {
        value.0
    }
}

impl TryFrom<u8> for BusAddress {
    type Error = ParseAddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ParseAddressError::OutOfRange)
    }
}

/// Failure to parse a [`BusAddress`] from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAddressError {
    /// Not a decimal or `0x`-prefixed hexadecimal integer.
    Invalid,
    /// A number outside `3..=119`.
    OutOfRange,
}

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("expected a decimal or 0x-prefixed hex address"),
            Self::OutOfRange => write!(f, "address outside {SCAN_FIRST}..={SCAN_LAST}"),
        }
    }
}

impl core::error::Error for ParseAddressError {}

impl FromStr for BusAddress {
    type Err = ParseAddressError;

    /// Accepts `80` as well as `0x50` (or `0X50`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse::<u32>(),
        }
        .map_err(|_| ParseAddressError::Invalid)?;
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(ParseAddressError::OutOfRange)
    }
}

/// A set of 7-bit bus addresses, stored as a bitmap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddressSet(u128);

impl AddressSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Adds an address to the set.
    pub fn insert(&mut self, addr: BusAddress) {
        self.0 |= 1u128 << addr.0;
    }

    /// Whether the set holds `addr`.
    pub fn contains(&self, addr: BusAddress) -> bool {
        self.0 & (1u128 << addr.0) != 0
    }

    /// Number of addresses in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The lowest address in the set.
    pub fn first(&self) -> Option<BusAddress> {
        self.iter().next()
    }

    /// Iterates over the addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = BusAddress> + '_ {
        (SCAN_FIRST..=SCAN_LAST)
            .filter_map(BusAddress::new)
            .filter(|&a| self.contains(a))
    }
}

impl FromIterator<BusAddress> for AddressSet {
    fn from_iter<T: IntoIterator<Item = BusAddress>>(iter: T) -> Self {
        let mut set = Self::new();
        for addr in iter {
            set.insert(addr);
        }
        set
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, addr) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{addr}")?;
        }
        Ok(())
    }
}
