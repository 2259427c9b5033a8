//! Maps `Box<dyn Error>` from trait boundaries to typed `CourseError`.
//!
//! The traits in `putt_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `putt_hardware::HwError` downcasting.

use crate::error::CourseError;

/// Map a trait-boundary error to a typed `CourseError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CourseError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<putt_hardware::error::HwError>() {
            return match hw {
                putt_hardware::error::HwError::Storage(_) | putt_hardware::error::HwError::Io(_) => {
                    CourseError::Storage(hw.to_string())
                }
                other => CourseError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("storage") || lower.contains("flash") || lower.contains("nvs") {
        CourseError::Storage(s)
    } else {
        CourseError::Hardware(s)
    }
}
