//! WebIDL argument conversions.

use crate::error::{IdbError, IdbResult};

/// `[EnforceRange] unsigned long` conversion.
///
/// Truncates toward zero and rejects `NaN`, infinities and anything outside
/// `0..=u32::MAX` with `TypeError`.
pub(crate) fn enforce_range_u32(value: f64, what: &str) -> IdbResult<u32> {
    if !value.is_finite() {
        return Err(IdbError::type_error(format!("{what} must be finite, got {value}")));
    }
    let truncated = value.trunc();
    if truncated < 0.0 || truncated > f64::from(u32::MAX) {
        return Err(IdbError::type_error(format!("{what} is out of range: {value}")));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = truncated as u32;
    Ok(count)
}
