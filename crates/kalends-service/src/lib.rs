//! Feed pipeline: recurrence expansion, conditional fetching, caching, and
//! the public query surface.

pub mod cache;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod recurrence;
