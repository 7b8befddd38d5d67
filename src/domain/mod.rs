// Domain layer - Session state machines, no I/O
pub mod activity;
pub mod error;
pub mod jobs;
pub mod navigation;
pub mod playback;
pub mod process;
pub mod upload;
pub mod velocity;
