// Identity: local user accounts, password hashing, and HS256 tokens.

pub mod extract;
pub mod identity;

pub use extract::AuthUser;
pub use identity::{Claims, Identity};
