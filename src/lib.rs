pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod formats;
pub mod getter;
pub mod handlers;
pub mod index;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
