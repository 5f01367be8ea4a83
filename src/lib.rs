//! A command-line Vimeo downloader.
//!
//! This library authenticates against the Vimeo API with OAuth2, lists the
//! videos of the authenticated account and downloads their best available
//! renditions. Everything runs sequentially on a single thread.
//!
//! # Architecture
//!
//! - `Config`: credentials and paths from `.env` and the environment
//! - `AuthFlow`: authorization-code flow and token persistence
//! - `VimeoClient`: authenticated REST calls and pagination
//! - `Downloader`: rendition selection and streaming to disk
//! - `BatchReport`: per-video results of a download run
//!
//! # Example
//! ```no_run
//! use vimeo_downloader::{Config, Downloader, DownloadOptions, TokenStore, VimeoClient};
//!
//! async fn example() {
//!     let config = Config::from_env().unwrap();
//!     let token = TokenStore::new(&config.token_file).load_valid().unwrap();
//!     let client = VimeoClient::new(&config.api_base, token).unwrap();
//!     let report = Downloader::new(client, config, DownloadOptions::default())
//!         .run()
//!         .await
//!         .unwrap();
//!     report.print_summary();
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod downloader;
pub mod error;
pub mod lister;
pub mod models;
pub mod progress;
pub mod token;

// Re-export commonly used items
pub use api::VimeoClient;
pub use auth::AuthFlow;
pub use config::Config;
pub use downloader::{DownloadOptions, Downloader, Target};
pub use error::AppError;
pub use models::{Rendition, SelectionPolicy, Video};
pub use progress::BatchReport;
pub use token::{Token, TokenStore};
