//! JWT construction, verification and re-signing.

pub mod assertion;
pub mod claims;
pub mod jwk_cache;
pub mod resigner;
pub mod signer;
pub mod token;

pub use assertion::{CLIENT_ASSERTION_TYPE, ClientAssertionBuilder};
pub use claims::{ClientAssertionClaims, NONCE_CLAIM, TOKEN_TTL_SECONDS};
pub use jwk_cache::JwkCache;
pub use resigner::IdTokenResigner;
pub use signer::TokenSigner;
pub use token::{IdToken, TokenState, Unverified, VerificationExpectations, Verified};
