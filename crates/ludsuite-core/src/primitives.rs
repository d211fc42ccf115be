//! # Registry Primitives
//!
//! Fixed limits for the LUD Suite registry.
//!
//! These are compiled in and immutable at runtime. Every text field that
//! crosses the API or import boundary is checked against them before it
//! reaches storage.

// =============================================================================
// IDENTITY LIMITS
// =============================================================================

/// Maximum length of a username (bytes).
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum length of an email address (bytes).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of a personal or mentee name (bytes).
pub const MAX_NAME_LENGTH: usize = 150;

// =============================================================================
// RECORD LIMITS
// =============================================================================

/// Maximum length of single-line fields such as titles and "other activity".
pub const MAX_SHORT_TEXT_LENGTH: usize = 255;

/// Maximum length of free-text fields (learnings, reflections, feedback).
pub const MAX_TEXT_LENGTH: usize = 10_000;

/// Maximum length of a broadcast notification message.
pub const MAX_NOTIFICATION_LENGTH: usize = 2_000;

/// Maximum length of the duty named on a work-schedule item.
pub const MAX_WORK_ROLE_LENGTH: usize = 50;

/// Activity durations are recorded in quarter hours: 1 = 0.25h, 32 = 8h.
pub const MAX_QUARTER_HOURS: u8 = 32;

/// Lowest program year a mentee can be enrolled in.
pub const FIRST_PROGRAM_YEAR: u8 = 1;

/// Highest program year a mentee can be enrolled in.
pub const LAST_PROGRAM_YEAR: u8 = 4;

/// Year-plan items are grouped into quarters 1..=4 of a program year.
pub const QUARTERS_PER_YEAR: u8 = 4;

/// Lowest value on the assessment rating scale.
pub const MIN_RATING: u8 = 1;

/// Highest value on the assessment rating scale.
pub const MAX_RATING: u8 = 5;

// =============================================================================
// BATCH LIMITS
// =============================================================================

/// Maximum number of rows accepted by a single bulk import.
pub const MAX_IMPORT_ROWS: usize = 10_000;

/// Maximum number of mentors accepted by a single endorser "set" operation.
pub const MAX_MENTORS_PER_ENDORSER: usize = 500;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_years_span_four_years() {
        assert_eq!(LAST_PROGRAM_YEAR - FIRST_PROGRAM_YEAR + 1, 4);
    }

    #[test]
    fn eight_hours_is_the_longest_activity() {
        assert_eq!(u32::from(MAX_QUARTER_HOURS) * 15, 8 * 60);
    }
}
