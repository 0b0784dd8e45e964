mod calibration;
mod conflict;
mod ingest;
mod member;
mod project;
mod study;

pub use calibration::CalibrationCommands;
pub use conflict::ConflictCommands;
pub use ingest::IngestCommands;
pub use member::MemberCommands;
pub use project::ProjectCommands;
pub use study::StudyCommands;
