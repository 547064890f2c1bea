// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;

// Domain layer
pub mod job;
pub mod repository;
pub mod template;

// Delivery
pub mod dispatcher;
pub mod queue;
pub mod transport;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod telemetry;
