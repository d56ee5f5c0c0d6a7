//! Windows `FILETIME` values: 100 ns ticks since 1601-01-01 UTC.

use chrono::{DateTime, Utc};
use std::fmt;

use super::ndr::{NdrReader, NdrWriter};
use super::errors::OpcResult;

/// Milliseconds between 1601-01-01 and 1970-01-01.
pub const EPOCH_OFFSET_MS: i64 = 11_644_473_600_000;

const TICKS_PER_MS: u64 = 10_000;

/// A 64-bit tick count split into two 32-bit halves, as on the wire.
///
/// The full tick count does not fit an `f64`, so conversions go through
/// integer milliseconds. Precision below one millisecond is dropped when
/// converting to a [`DateTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileTime {
    pub low: u32,
    pub high: u32,
}

impl FileTime {
    pub const fn new(high: u32, low: u32) -> Self {
        Self { low, high }
    }

    pub const fn from_ticks(ticks: u64) -> Self {
        Self {
            low: ticks as u32,
            high: (ticks >> 32) as u32,
        }
    }

    pub const fn ticks(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    /// Servers send zero when they have no timestamp.
    pub const fn is_zero(self) -> bool {
        self.low == 0 && self.high == 0
    }

    /// Milliseconds since the Unix epoch, negative before 1970.
    pub fn unix_millis(self) -> i64 {
        // u64::MAX / 10_000 < i64::MAX, so the cast is lossless
        (self.ticks() / TICKS_PER_MS) as i64 - EPOCH_OFFSET_MS
    }

    /// Converts to a UTC date, or `None` for the zero value.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.is_zero() {
            return None;
        }
        DateTime::from_timestamp_millis(self.unix_millis())
    }

    /// Converts a UTC date at millisecond precision. Dates before 1601
    /// are not representable.
    pub fn from_datetime(dt: DateTime<Utc>) -> Option<Self> {
        let ms = dt.timestamp_millis().checked_add(EPOCH_OFFSET_MS)?;
        let ms = u64::try_from(ms).ok()?;
        ms.checked_mul(TICKS_PER_MS).map(Self::from_ticks)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now()).unwrap_or_default()
    }

    pub(crate) fn marshal(self, w: &mut NdrWriter) {
        w.write_u32(self.low);
        w.write_u32(self.high);
    }

    pub(crate) fn unmarshal(r: &mut NdrReader) -> OpcResult<Self> {
        let low = r.read_u32()?;
        let high = r.read_u32()?;
        Ok(Self { low, high })
    }
}

impl From<DateTime<Utc>> for FileTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt).unwrap_or_default()
    }
}

impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
            None => f.write_str("(none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_date() {
        let ft = FileTime::new(0x01D4_A164, 0xF03E_4000);
        assert_eq!(ft.ticks(), 131_907_744_000_000_000);
        assert_eq!(ft.unix_millis(), 1_546_300_800_000);
        let dt = ft.to_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2019-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_high_word_precision() {
        let ft = FileTime::new(0x02E5_5FF3, 0x501F_A960);
        assert_eq!(ft.unix_millis(), 9_223_372_036_854);
        let back = FileTime::from_datetime(ft.to_datetime().unwrap()).unwrap();
        assert_eq!(back, ft);
    }

    #[test]
    fn test_roundtrip_truncates_to_milliseconds() {
        let ft = FileTime::from_ticks(133_313_060_967_890_000 + 1234);
        let back = FileTime::from_datetime(ft.to_datetime().unwrap()).unwrap();
        assert_eq!(back.ticks(), 133_313_060_967_890_000);
    }

    #[test]
    fn test_zero_means_no_timestamp() {
        assert!(FileTime::default().to_datetime().is_none());
        assert_eq!(FileTime::default().to_string(), "(none)");
    }

    #[test]
    fn test_before_1601_is_not_representable() {
        let dt = DateTime::from_timestamp_millis(-EPOCH_OFFSET_MS - 1).unwrap();
        assert!(FileTime::from_datetime(dt).is_none());
    }

    #[test]
    fn test_wire_order_is_low_then_high() {
        let mut w = NdrWriter::new();
        FileTime::new(2, 1).marshal(&mut w);
        assert_eq!(w.as_bytes(), &[1, 0, 0, 0, 2, 0, 0, 0]);
        let mut r = NdrReader::new(w.into_bytes());
        assert_eq!(FileTime::unmarshal(&mut r).unwrap(), FileTime::new(2, 1));
    }
}
