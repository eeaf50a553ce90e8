// src/types.rs
// Fixed-layout message types shared by the whole pipeline.
// - Little-endian on the host, #[repr(C)] with zerocopy for cast to/from bytes
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// USD price with 4 fractional decimal digits (raw = dollars * 10_000).
///
/// Arithmetic is wrapping and unchecked. Overflow or a negative result is a
/// logic error upstream and shows up as a wildly wrong price rather than a
/// panic. Zero is the "unknown / uninitialized" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(FromZeroes, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct Price(u64);

pub const PRICE_SCALE: u64 = 10_000;

impl Price {
    pub const ZERO: Price = Price(0);
    pub const ONE_CENT: Price = Price(100);
    pub const ONE_DOLLAR: Price = Price(PRICE_SCALE);

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Price(raw)
    }

    #[inline]
    pub fn from_dollars(dollars: f64) -> Self {
        Price((dollars * PRICE_SCALE as f64) as u64)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn dollars(self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn abs_diff(self, other: Price) -> Price {
        if self.0 >= other.0 {
            Price(self.0 - other.0)
        } else {
            Price(other.0 - self.0)
        }
    }
}

impl std::ops::Add for Price {
    type Output = Price;
    #[inline]
    fn add(self, rhs: Price) -> Price {
        Price(self.0.wrapping_add(rhs.0))
    }
}

impl std::ops::Sub for Price {
    type Output = Price;
    #[inline]
    fn sub(self, rhs: Price) -> Price {
        Price(self.0.wrapping_sub(rhs.0))
    }
}

impl std::ops::Mul<u64> for Price {
    type Output = Price;
    #[inline]
    fn mul(self, rhs: u64) -> Price {
        Price(self.0.wrapping_mul(rhs))
    }
}

impl std::ops::Div<u64> for Price {
    type Output = Price;
    #[inline]
    fn div(self, rhs: u64) -> Price {
        Price(self.0 / rhs)
    }
}

impl std::ops::AddAssign for Price {
    #[inline]
    fn add_assign(&mut self, rhs: Price) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl std::ops::SubAssign for Price {
    #[inline]
    fn sub_assign(&mut self, rhs: Price) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

/// 8-byte security symbol, NUL right-padded ASCII. Byte-wise equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(FromZeroes, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct SecurityId([u8; 8]);

impl SecurityId {
    /// Builds an id from a symbol, truncating at 8 bytes.
    pub fn new(symbol: &str) -> Self {
        let mut bytes = [0u8; 8];
        let n = symbol.len().min(8);
        bytes[..n].copy_from_slice(&symbol.as_bytes()[..n]);
        SecurityId(bytes)
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        SecurityId(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Symbol without trailing NULs. Empty when the bytes are not UTF-8.
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }

    // u64 view used by the atomic slot tables.
    #[inline]
    pub const fn to_bits(self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        SecurityId(bits.to_le_bytes())
    }
}

impl std::fmt::Display for SecurityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order-book level, 16 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[derive(FromZeroes, FromBytes, AsBytes)]
#[repr(C)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: u64,
}

/// Message type identifiers (u16).
pub mod msg_type {
    pub const MARKET_DATA_L2: u16 = 1;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[derive(FromZeroes, FromBytes, AsBytes)]
#[repr(C)]
pub struct MessageHeader {
    pub seq_no: u32,
    pub length: u16,
    pub msg_type: u16,
}

/// L2 market data record: top 5 levels per side, 192 bytes fixed.
///
/// Bids are sorted strictly descending by price, asks strictly ascending.
/// Only the first `num_*_levels` entries of each array are valid.
#[derive(Debug, Clone, Copy)]
#[derive(FromZeroes, FromBytes, AsBytes)]
#[repr(C)]
pub struct MarketDataL2Message {
    pub header: MessageHeader,
    pub security_id: SecurityId,
    /// Nanoseconds on the steady monotonic clock.
    pub timestamp_ns: u64,
    pub bids: [PriceLevel; 5],
    pub asks: [PriceLevel; 5],
    pub num_bid_levels: u8,
    pub num_ask_levels: u8,
    pub padding: [u8; 6],
}

impl Default for MarketDataL2Message {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

const _: () = assert!(std::mem::size_of::<PriceLevel>() == 16);
const _: () = assert!(std::mem::size_of::<MessageHeader>() == 8);
const _: () = assert!(std::mem::size_of::<MarketDataL2Message>() == 192);
const _: () = assert!(std::mem::align_of::<MarketDataL2Message>() == 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_add_sub_round_trip() {
        let a = Price::from_raw(1_750_000);
        let b = Price::from_raw(500);
        assert_eq!((a + b) - b, a);
        assert_eq!(a + Price::ZERO, a);
    }

    #[test]
    fn price_wrapping_is_defined() {
        let max = Price::from_raw(u64::MAX);
        assert_eq!(max + Price::ONE_CENT, Price::from_raw(99));
        assert_eq!(Price::ZERO - Price::ONE_CENT, Price::from_raw(u64::MAX - 99));
    }

    #[test]
    fn price_dollars_conversion() {
        let p = Price::from_dollars(175.0);
        assert_eq!(p.raw(), 1_750_000);
        assert!((p.dollars() - 175.0).abs() < 1e-9);
        assert_eq!(Price::from_dollars(0.0001).raw(), 1);
    }

    #[test]
    fn price_mul_div() {
        let p = Price::from_dollars(100.0);
        assert_eq!((p * 3).raw(), 3_000_000);
        assert_eq!((p / 4).raw(), 250_000);
        let mid = (Price::from_raw(1_750_000) + Price::from_raw(1_750_500)) / 2;
        assert_eq!(mid.raw(), 1_750_250);
    }

    #[test]
    fn price_abs_diff_symmetric() {
        let a = Price::from_raw(10);
        let b = Price::from_raw(25);
        assert_eq!(a.abs_diff(b), b.abs_diff(a));
        assert_eq!(a.abs_diff(b).raw(), 15);
    }

    #[test]
    fn security_id_round_trip() {
        let id = SecurityId::new("AAPL");
        assert_eq!(id.as_str(), "AAPL");
        assert_eq!(&id.as_bytes()[..5], b"AAPL\0");

        let full = SecurityId::new("CHFJPYXX");
        assert_eq!(full.as_str(), "CHFJPYXX");

        // Longer symbols keep the first 8 bytes.
        let long = SecurityId::new("OVERFLOWING");
        assert_eq!(long.as_str(), "OVERFLOW");
    }

    #[test]
    fn security_id_bits_round_trip() {
        let id = SecurityId::new("NVDA");
        assert_eq!(SecurityId::from_bits(id.to_bits()), id);
        assert_ne!(id.to_bits(), SecurityId::new("TSLA").to_bits());
    }

    #[test]
    fn message_layout() {
        use std::mem::offset_of;
        assert_eq!(offset_of!(MarketDataL2Message, security_id), 8);
        assert_eq!(offset_of!(MarketDataL2Message, timestamp_ns), 16);
        assert_eq!(offset_of!(MarketDataL2Message, bids), 24);
        assert_eq!(offset_of!(MarketDataL2Message, asks), 104);
        assert_eq!(offset_of!(MarketDataL2Message, num_bid_levels), 184);
        assert_eq!(offset_of!(MarketDataL2Message, num_ask_levels), 185);
    }

    #[test]
    fn message_as_bytes() {
        let mut msg = MarketDataL2Message::default();
        msg.header.msg_type = msg_type::MARKET_DATA_L2;
        msg.security_id = SecurityId::new("MSFT");
        let bytes = msg.as_bytes();
        assert_eq!(bytes.len(), 192);
        assert_eq!(&bytes[8..12], b"MSFT");
    }
}
