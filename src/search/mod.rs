//! Image search module
//!
//! Turns a phrase and offset into one page of image results.

mod client;
mod models;

pub use client::{CustomSearch, ImageSearch};
pub use models::*;
