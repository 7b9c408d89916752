//! Bearer-token verification and role-based access control.
//!
//! A request flows through [`TokenVerifier`] (signature, expiry, one fresh
//! role lookup) and then through one [`RoleGate`] per route, optionally
//! followed by [`ensure_owner`] for technician-owned rows.

pub mod claims;
pub mod error;
pub mod gate;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;
pub mod verifier;

pub use claims::{Claims, SubjectId, ROLE_HINT_CLAIM, SUBJECT_CLAIM};
pub use error::{AuthError, AuthFailure};
pub use gate::{ensure_owner, RoleGate, ADMIN_ONLY, SUPERVISOR_OR_ABOVE, TECHNICIAN_ONLY, TECHNICIAN_OR_ABOVE};
pub use password::PasswordError;
pub use principal::Principal;
pub use roles::{Role, UnknownRole};
pub use token::TokenCodec;
pub use verifier::{parse_bearer, TokenVerifier};
