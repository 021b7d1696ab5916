//! Authentication infrastructure module
//!
//! JWT issuance and validation for management users.

mod jwt;

pub use jwt::{IssuedToken, JwtClaims, JwtConfig, JwtService};
