//! Authentication: argon2 password hashing, JWT session tokens, and the
//! request extractor producing the current user.

pub mod current_user;
pub mod password;
pub mod session;
