//! `walletd-auth`: bearer-token identity and authorization boundary.
//!
//! Decoupled from HTTP and storage. Tokens are issued elsewhere; this crate
//! only verifies them and answers permission checks.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod roles;
pub mod validator;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use permissions::Permission;
pub use roles::Role;
pub use validator::{Hs256JwtValidator, JwtValidator};
