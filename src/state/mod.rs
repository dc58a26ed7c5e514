//! Input mode state
//!
//! Provides the two-state toggle that decides how query-requiring
//! actions read their command:
//! - Speech: microphone capture and transcription (startup default)
//! - Text: the front-end text field

mod machine;

pub use machine::{InputMode, ModeState};
