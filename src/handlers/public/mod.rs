// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and registration. Inputs arrive without any trusted
// caller context, so every field is validated by the account service.
pub mod auth;

pub use auth::*;
