// handlers/mod.rs - two security tiers
//
// Public (no auth) → Protected (bearer token, /api/*)
pub mod public;    // /auth/*: registration and token acquisition
pub mod protected; // /api/*: documents, accounts, links

pub use public::*;
pub use protected::*;
