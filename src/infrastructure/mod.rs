// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_storage;
pub mod mock_engine;
pub mod ndjson_stream;
pub mod scheduler;
pub mod simulated_backend;
