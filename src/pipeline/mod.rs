//! The video job pipeline: job state, script checks, per-job workspaces,
//! timeline assembly and the sequencer that drives a job end to end.

pub mod assembly;
pub mod collaborators;
pub mod error;
pub mod job;
pub mod manifest;
pub mod script;
pub mod sequencer;
pub mod status;
pub mod workspace;
