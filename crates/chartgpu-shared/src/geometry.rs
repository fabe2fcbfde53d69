//! Point geometry of a series
//!
//! The store's canonical layouts are packed f32: `[x, y]` for point series
//! and `[t, o, h, l, c]` for candlesticks. Strides are a multiple of 4 and
//! known per series type; the ingestion boundary re-packs legacy f64
//! transfers into these layouts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointGeometry {
    /// `[x, y]`, 8 bytes.
    Xy,
    /// `[t, open, high, low, close]`, 20 bytes.
    Ohlc,
}

impl PointGeometry {
    /// Lanes (f32 values) per point.
    pub const fn lanes(self) -> usize {
        match self {
            PointGeometry::Xy => 2,
            PointGeometry::Ohlc => 5,
        }
    }

    /// Canonical in-store stride in bytes.
    pub const fn stride(self) -> usize {
        self.lanes() * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_word_multiples() {
        assert_eq!(PointGeometry::Xy.stride(), 8);
        assert_eq!(PointGeometry::Ohlc.stride(), 20);
        assert_eq!(PointGeometry::Xy.stride() % 4, 0);
        assert_eq!(PointGeometry::Ohlc.stride() % 4, 0);
    }
}
