// CarWise Infrastructure - SQLite Adapter
// Implements: SessionRepository

mod connection;
mod migration;
mod session_repository;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use session_repository::SqliteSessionRepository;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
