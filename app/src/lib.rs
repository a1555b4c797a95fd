//! # Box Office Client
//!
//! Wires the category cache and the realtime hub registry to their
//! production collaborators (REST client, SignalR transport) from
//! environment configuration.

pub mod app;
pub mod config;

pub use app::{AppError, BoxOffice};
pub use config::Config;
