//! Anti-spam line cap.

use crate::resolver::{LineDatum, ResolutionResult};

/// Most source lines a single reply may display.
pub const MAX_DISPLAYED_LINES: u32 = 50;

/// Sent instead of any excerpt when the cap is exceeded.
pub const SPAM_WARNING: &str =
    "Sorry, but to prevent spam, we limit the number of lines displayed at 50";

/// What survives the spam guard: either excerpts or a warning, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guarded {
    pub items: Vec<LineDatum>,
    pub warning: Option<&'static str>,
}

/// Drop every item when the result displays more than
/// [`MAX_DISPLAYED_LINES`] lines.
pub fn apply(result: ResolutionResult) -> Guarded {
    if result.total_lines > MAX_DISPLAYED_LINES {
        tracing::debug!(
            total_lines = result.total_lines,
            dropped = result.items.len(),
            "Line cap exceeded"
        );
        return Guarded {
            items: Vec::new(),
            warning: Some(SPAM_WARNING),
        };
    }

    Guarded {
        items: result.items,
        warning: None,
    }
}
