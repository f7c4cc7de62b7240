//! Authentication
//!
//! Password hashing, JWT tokens, request middleware and role guards.

pub mod guards;
pub mod middleware;
pub mod password;
pub mod tokens;

pub use guards::{require_branch_access, require_role, require_staff, scoped_branch};
pub use middleware::{auth_middleware, optional_auth_middleware};
pub use password::{hash_password, validate_password, verify_password};
pub use tokens::{Claims, TokenIssuer, TokenKind, TokenPair};
