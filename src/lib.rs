//! Username/password registration and a small relay for subject/body
//! messages between registered users, served over HTTP on top of SQLite.

pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
