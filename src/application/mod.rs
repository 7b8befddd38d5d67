// Application layer - Session objects that own timers and background tasks
pub mod activity_feed;
pub mod analysis_service;
pub mod dashboard_session;
pub mod playback_clock;
pub mod ports;
pub mod process_monitor;
pub mod upload_simulator;
