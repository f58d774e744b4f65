//! Poster photo lookup
//!
//! Everything between "the user picked a photo" and "we know which
//! event it is":
//! - `PendingUpload`: validated image payload with a preview encoding
//! - `PhotoLookupFlow`: one-at-a-time submission state machine
//! - `LookupOutcome`: the three ways the server can resolve a poster

mod flow;
mod outcome;
mod upload;

pub use flow::{LookupBackend, LookupState, PhotoLookupFlow};
pub use outcome::LookupOutcome;
pub use upload::PendingUpload;
