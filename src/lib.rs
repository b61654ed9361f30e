//! A client for a personal expense-tracking service.
//!
//! The [`Client`] ties together the stored credentials, the authenticated transport and the
//! session. On top of it, [`sync::drain`] loads the whole expense collection and
//! [`listing::ExpenseListing`] filters and pages it locally.

pub mod api;
pub mod args;
mod client;
pub mod commands;
mod config;
pub mod credentials;
pub mod dashboard;
mod error;
pub mod filter;
pub mod listing;
pub mod model;
pub mod nav;
pub mod session;
pub mod sync;
mod utils;


pub use api::Mode;
pub use client::Client;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
