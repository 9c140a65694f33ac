pub mod password;

pub use password::{generate_salt, hash_password};
