//! HTTP surface: the upload page, the process endpoint, and static assets.

pub mod handlers;
