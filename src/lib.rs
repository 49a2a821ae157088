//! # Semi2k: multi-party computation on fixed-point arrays
//!
//! Several parties jointly evaluate arithmetic over their private
//! inputs without revealing intermediate values. Secrets live as
//! additive shares modulo 2^K; the [`mpc`] module implements the
//! semi-honest online protocol, [`network`] carries the openings and
//! exchanges, and [`context`] stacks a visibility-dispatched numeric
//! tower with fixed-point semantics on top.
//!
//! [`context::basic`] is the user-facing entry point.
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod mpc;
pub mod ndarray;
pub mod network;
pub mod ring;
pub mod serialization;

pub use error::{Error, Result};
