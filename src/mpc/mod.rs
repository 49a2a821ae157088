//! Secure multi-party computation core.
//!
//! [`prep`] supplies correlated randomness through the
//! [`Preprocessing`](prep::Preprocessing) interface and [`semi2k`]
//! implements the semi-honest additive-sharing protocol that consumes
//! it.

pub mod prep;
pub mod semi2k;

pub use prep::{Preprocessing, SeededPrep, TrivialPrep};
pub use semi2k::Semi2k;
