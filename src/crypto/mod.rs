pub mod jwt;
pub mod password;

pub use jwt::Claims;
pub use password::{generate_salt, generate_token, hash_password, validate_password, verify_password};
