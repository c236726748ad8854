//! Domain models shared by the server and client

pub mod label;
pub mod profile;
pub mod session;
pub mod task;

pub use label::{BoundingBox, Label, Point, Stroke};
pub use profile::UserProfile;
pub use session::{ScoreResult, Session, SessionState, TaskView, Verdict};
pub use task::TaskType;
