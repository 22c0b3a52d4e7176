//! Data models for the freight site backend.
//!
//! JSON uses camelCase field names to match the site frontend.

mod article;
mod lead;
mod session;

pub use article::*;
pub use lead::*;
pub use session::*;
