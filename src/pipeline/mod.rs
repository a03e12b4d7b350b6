//! Message pipeline: decides what to answer and renders the answer.
//!
//! Flow for one room message:
//! 1. Filter (content present, plain text, not our own)
//! 2. Resolve links via the external resolver
//! 3. Spam guard (line cap)
//! 4. Render code blocks
//! 5. Wrap as a notice reply

pub mod filter;
pub mod format;
pub mod reply;
pub mod spam;

pub use filter::should_process;
pub use format::{render, render_fragment};
pub use reply::build_reply;
pub use spam::{Guarded, MAX_DISPLAYED_LINES, SPAM_WARNING};
