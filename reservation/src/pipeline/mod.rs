//! The reservation pipeline: a reducer driving one submission at a time from
//! the form through local persistence, remote sync (or the queue) and the
//! chat hand-off, plus queue flushing and connectivity tracking.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod types;


pub use actions::ReservationAction;
pub use environment::{EventSink, IdGenerator, RandomIds, ReservationEnvironment};
pub use reducer::{MIN_NAME_CHARS, ReservationReducer, validate_submission};
pub use types::{
    OutstandingMessage, Phase, PipelineEvent, ReservationState, Submission, SubmissionOutcome,
    confirmation_message,
};
