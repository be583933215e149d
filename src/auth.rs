mod admin_guard;
mod credentials;
mod password;
mod session;

pub use admin_guard::Administrator;
pub use credentials::{bearer_token, Credentials};
pub use password::{hash_password, seed_admin, validate_credentials, AuthError};
pub use session::{AdminClaims, SessionTokens};
