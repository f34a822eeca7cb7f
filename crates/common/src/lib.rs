//! Common utilities and shared types for fediseer-rs.
//!
//! This crate provides foundational components used across all fediseer-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **API keys**: Generation and digest helpers in [`api_key`]
//! - **Text**: Domain normalization and free-text sanitation in [`text`]
//!
//! # Example
//!
//! ```no_run
//! use fediseer_common::{Config, AppResult, hash_api_key};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let digest = hash_api_key("my-key");
//!     println!("{} {}", config.trust.root_domain, digest);
//!     Ok(())
//! }
//! ```

pub mod api_key;
pub mod config;
pub mod error;
pub mod text;

pub use api_key::{generate_api_key, hash_api_key};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use text::{normalize_domain, parse_domain_csv, sanitize_text};
