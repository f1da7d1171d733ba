//! Status code normalization.

use std::ops::RangeInclusive;

/// Codes that pass through unchanged on error paths.
pub const ERROR_BAND: RangeInclusive<i64> = 400..=599;

/// Status used when a failure has no usable code.
pub const DEFAULT_ERROR_STATUS: u16 = 500;

/// Map a failure code to a response status.
///
/// Codes inside [`ERROR_BAND`] are kept; missing, zero and out-of-band
/// codes become [`DEFAULT_ERROR_STATUS`].
pub fn clamp_status(code: Option<i64>) -> u16 {
    match code {
        Some(code) if ERROR_BAND.contains(&code) => code as u16,
        _ => DEFAULT_ERROR_STATUS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_band_codes_kept() {
        assert_eq!(clamp_status(Some(400)), 400);
        assert_eq!(clamp_status(Some(403)), 403);
        assert_eq!(clamp_status(Some(404)), 404);
        assert_eq!(clamp_status(Some(599)), 599);
    }

    #[test]
    fn test_out_of_band_codes_become_500() {
        for code in [None, Some(0), Some(200), Some(399), Some(600), Some(999), Some(-404)] {
            assert_eq!(clamp_status(code), 500, "code {:?}", code);
        }
    }
}
