//! # scholarmap
//!
//! Where do your Google Scholar citations come from?
//!
//! ## Modules
//!
//! - [`serpapi`] - SerpApi client and restartable pagination
//! - [`fetcher`] - Articles → citing works → profiles, deduplicated
//! - [`authors`] - Full author lists from raw result HTML
//! - [`reference`] - Static institution table (CSV)
//! - [`resolver`] - Affiliation matching
//! - [`aggregate`] - Counts by institution, country and author
//! - [`render`] - Leaflet map and text rankings
//! - [`export`] - CSV / JSON output
//! - [`cache`] - Optional response cache
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholarmap::{config::Config, pipeline};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new(std::env::var("SERP_API_KEY")?, "qc6CJjYAAAAJ");
//!     let report = pipeline::run(&config).await?;
//!     println!("{}", report.ranking);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod authors;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod pipeline;
pub mod record;
pub mod reference;
pub mod render;
pub mod resolver;
pub mod serpapi;

pub use error::{Result, ScholarMapError};
