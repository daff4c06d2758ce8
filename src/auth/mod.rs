//! Authentication module: password login, JWT, role guards, OIDC federation
//!
//! Provides:
//! - Session and reset token signing/verification (`jwt` submodule)
//! - bcrypt password helpers (`password` submodule)
//! - Bearer-token middleware and role guard (`middleware` submodule)
//! - `AuthUser` handler extractor (`extractor` submodule)
//! - OIDC authorization code exchange (`oidc` submodule) and its
//!   code replay guard (`replay` submodule)

pub mod extractor;
pub mod jwt;
pub mod middleware;
pub mod oidc;
pub mod password;
pub mod replay;
