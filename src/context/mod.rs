//! Calculation context: protocol, preprocessing, transport and the
//! fixed-point configuration, plus the visibility-dispatched operation
//! tower built on top.

use std::sync::{Mutex, MutexGuard};

use crate::mpc::{Preprocessing, Semi2k};
use crate::network::{PartyId, Statistics};

pub mod basic;
pub mod compare;
pub mod factory;
pub mod fxp;
pub mod math;
pub mod primitive;
pub mod raw;
pub mod shape;
pub mod value;
pub mod visibility;
mod wrapper;

pub use value::{Value, ValueData};
pub use visibility::Visibility;

/// Division algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DivMode {
    /// Newton-Raphson iteration.
    #[default]
    Newton,
}

/// Sigmoid algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SigmoidMode {
    /// Euler integration of the logistic ODE.
    #[default]
    Euler,
}

/// Exponential algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ExpMode {
    /// Fast repeated-squaring Euler form.
    #[default]
    Euler,
    /// Higher-precision Taylor expansion.
    Taylor,
}

/// Logarithm algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LogMode {
    /// Taylor expansion around a normalized mantissa.
    #[default]
    Taylor,
}

/// Square-root algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SqrtMode {
    /// Goldschmidt iteration.
    #[default]
    Goldschmidt,
}

/// Sine algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SinMode {
    /// Taylor expansion.
    #[default]
    Taylor,
}

/// Tangent algorithm selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TanMode {
    /// sin/cos division, fast.
    #[default]
    Div,
    /// Taylor expansion, higher precision.
    Taylor,
}

/// Operational parameters of the fixed-point math layer.
#[derive(Clone, Debug)]
pub struct Config {
    /// Log-inverse bound on the probability of a truncation error.
    pub fxp_security_parameter: i64,
    /// Target number of fractional bits for fixed-point results.
    pub fxp_fracbits: u32,

    /// Division mode.
    pub fxp_div_mode: DivMode,
    /// Division iteration count.
    pub fxp_div_iters: u32,

    /// Sigmoid mode.
    pub fxp_sigmoid_mode: SigmoidMode,
    /// Sigmoid iteration count.
    pub fxp_sigmoid_iters: u32,

    /// Exponential mode.
    pub fxp_exp_mode: ExpMode,
    /// Exponential iteration count.
    pub fxp_exp_iters: u32,
    /// Integer bits of the exponential domain.
    pub fxp_exp_intbits: u32,

    /// Logarithm mode.
    pub fxp_log_mode: LogMode,
    /// Logarithm iteration count.
    pub fxp_log_iters: u32,

    /// Square-root mode.
    pub fxp_sqrt_mode: SqrtMode,
    /// Square-root iteration count.
    pub fxp_sqrt_iters: u32,

    /// Sine mode.
    pub fxp_sin_mode: SinMode,
    /// Sine iteration count.
    pub fxp_sin_iters: u32,

    /// Tangent mode.
    pub fxp_tan_mode: TanMode,
    /// Tangent iteration count.
    pub fxp_tan_iters: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fxp_security_parameter: 40,
            fxp_fracbits: 40,
            fxp_div_mode: DivMode::Newton,
            fxp_div_iters: 10,
            fxp_sigmoid_mode: SigmoidMode::Euler,
            fxp_sigmoid_iters: 8,
            fxp_exp_mode: ExpMode::Euler,
            fxp_exp_iters: 8,
            fxp_exp_intbits: 8,
            fxp_log_mode: LogMode::Taylor,
            fxp_log_iters: 16,
            fxp_sqrt_mode: SqrtMode::Goldschmidt,
            fxp_sqrt_iters: 8,
            fxp_sin_mode: SinMode::Taylor,
            fxp_sin_iters: 8,
            fxp_tan_mode: TanMode::Div,
            fxp_tan_iters: 8,
        }
    }
}

impl Config {
    /// Default parameters with a specific fracbits target.
    pub fn with_fracbits(fracbits: u32) -> Self {
        Self { fxp_fracbits: fracbits, ..Self::default() }
    }
}

/// Owns the protocol (and through it the transport and preprocessing)
/// together with the user-facing configuration.
///
/// Protocol access is internally synchronized; operations on a single
/// context still run one at a time, so parallel computations should own
/// one context each.
pub struct Context<Pr: Preprocessing> {
    prot: Mutex<Semi2k<Pr>>,
    config: Config,
    pid: PartyId,
    n_parties: usize,
}

impl<Pr: Preprocessing> Context<Pr> {
    /// Wraps a connected protocol endpoint.
    pub fn new(config: Config, prot: Semi2k<Pr>) -> Self {
        let pid = prot.pid();
        let n_parties = prot.num_parties();
        Self { prot: Mutex::new(prot), config, pid, n_parties }
    }

    /// This party's id.
    pub fn pid(&self) -> PartyId {
        self.pid
    }

    /// Number of parties in the session.
    pub fn num_parties(&self) -> usize {
        self.n_parties
    }

    /// The fixed-point configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Target fractional bits for fixed-point arithmetic.
    pub fn fxp_fracbits(&self) -> u32 {
        self.config.fxp_fracbits
    }

    /// Transport statistics accumulated so far.
    pub fn statistics(&self) -> Statistics {
        self.protocol().statistics()
    }

    pub(crate) fn protocol(&self) -> MutexGuard<'_, Semi2k<Pr>> {
        self.prot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::TrivialPrep;
    use crate::network::local_players;

    #[test]
    fn test_context_accessors() {
        let mut players = local_players(2);
        let p1 = players.pop().unwrap();
        let p0 = players.pop().unwrap();
        let ctx = Context::new(
            Config::with_fracbits(20),
            Semi2k::new(Box::new(p0), TrivialPrep::new()),
        );
        assert_eq!(ctx.pid(), 0);
        assert_eq!(ctx.num_parties(), 2);
        assert_eq!(ctx.fxp_fracbits(), 20);
        assert_eq!(ctx.config().fxp_div_mode, DivMode::Newton);
        drop(p1);
    }

    #[test]
    fn test_default_config_modes() {
        let config = Config::default();
        assert_eq!(config.fxp_fracbits, 40);
        assert_eq!(config.fxp_exp_mode, ExpMode::Euler);
        assert_eq!(config.fxp_sqrt_mode, SqrtMode::Goldschmidt);
        assert_eq!(config.fxp_tan_mode, TanMode::Div);
        assert!(config.fxp_div_iters > 0);
    }
}
