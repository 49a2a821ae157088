//! Correlated randomness for the online protocol.
//!
//! A [`Preprocessing`] source hands out additive shares of Beaver
//! triples, random bits, matrix triples and truncation pairs. A real
//! deployment would run an offline phase; this crate ships two stand-ins:
//! [`TrivialPrep`], whose shares are all zero, and [`SeededPrep`], which
//! derives genuine uniform correlations deterministically from a seed
//! every party knows. The latter is insecure by construction and exists
//! so the online protocol can be exercised against non-trivial
//! correlations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::ndarray::NdArray;
use crate::network::PartyId;
use crate::ring::Z2;

/// Source of correlated randomness, consumed monotonically.
///
/// Every party must issue the same request sequence; shares returned by
/// one call sum across parties to the advertised correlation.
pub trait Preprocessing: Send {
    /// `n` multiplication triples `(a, b, c)` with `c = a * b`.
    fn triples<const K: u32, const S: bool>(
        &mut self,
        n: usize,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)>;

    /// One matrix triple `(A, B, C)` with `C = A * B` under matmul
    /// shapes `(m, n) x (n, k)`, each matrix flattened row-major.
    fn matrix_triple<const K: u32, const S: bool>(
        &mut self,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)>;

    /// `n` random bits, each a share of a value in `{0, 1}`.
    fn randbits<const K: u32, const S: bool>(&mut self, n: usize) -> Result<NdArray<Z2<K, S>>>;

    /// `n` truncation pairs `(r, r >> shift)`.
    ///
    /// The shift is part of the request so the offline phase can build
    /// the matching pair.
    fn trunc_pair<const K: u32, const S: bool>(
        &mut self,
        n: usize,
        shift: u32,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)>;
}

/// The all-zero stub: every share of every correlation is zero.
///
/// `0 * 0 = 0` holds, so the online protocol runs unchanged, just
/// without any masking.
#[derive(Default)]
pub struct TrivialPrep;

impl TrivialPrep {
    /// A fresh stub.
    pub fn new() -> Self {
        Self
    }
}

fn zeros<const K: u32, const S: bool>(n: usize) -> NdArray<Z2<K, S>> {
    NdArray::filled(Z2::zero(), &[n as i64])
}

impl Preprocessing for TrivialPrep {
    fn triples<const K: u32, const S: bool>(
        &mut self,
        n: usize,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)> {
        Ok((zeros(n), zeros(n), zeros(n)))
    }

    fn matrix_triple<const K: u32, const S: bool>(
        &mut self,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)> {
        Ok((
            zeros((m * n) as usize),
            zeros((n * k) as usize),
            zeros((m * k) as usize),
        ))
    }

    fn randbits<const K: u32, const S: bool>(&mut self, n: usize) -> Result<NdArray<Z2<K, S>>> {
        Ok(zeros(n))
    }

    fn trunc_pair<const K: u32, const S: bool>(
        &mut self,
        n: usize,
        _shift: u32,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)> {
        Ok((zeros(n), zeros(n)))
    }
}

/// Deterministic mock preprocessing derived from a shared seed.
///
/// Every party replays the same random stream; for each correlated
/// value, parties `1..P` take fresh uniform shares and party 0 takes the
/// difference, so the shares reconstruct exactly. An optional element
/// budget turns over-consumption into an [`Error::Exhausted`].
pub struct SeededPrep {
    rng: StdRng,
    pid: PartyId,
    n_parties: usize,
    budget: Option<u64>,
}

impl SeededPrep {
    /// Mock source for `pid` out of `n_parties`, all parties passing the
    /// same `seed`.
    pub fn new(seed: u64, pid: PartyId, n_parties: usize) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), pid, n_parties, budget: None }
    }

    /// Caps the total number of correlated elements handed out.
    pub fn with_budget(mut self, elements: u64) -> Self {
        self.budget = Some(elements);
        self
    }

    fn charge(&mut self, n: usize, what: &str) -> Result<()> {
        if let Some(budget) = &mut self.budget {
            let n = n as u64;
            if *budget < n {
                return Err(Error::Exhausted(format!(
                    "no {what} left: requested {n}, {budget} remaining"
                )));
            }
            *budget -= n;
        }
        Ok(())
    }

    fn draw<const K: u32, const S: bool>(&mut self) -> Z2<K, S> {
        Z2::from_raw(self.rng.gen::<u128>())
    }

    /// Additive share of `value` for this party; every party advances
    /// the stream identically.
    fn split<const K: u32, const S: bool>(&mut self, value: Z2<K, S>) -> Z2<K, S> {
        let mut sum = Z2::zero();
        let mut mine = Z2::zero();
        for pid in 1..self.n_parties {
            let share = self.draw::<K, S>();
            sum = sum + share;
            if pid == self.pid {
                mine = share;
            }
        }
        if self.pid == 0 {
            value - sum
        } else {
            mine
        }
    }
}

impl Preprocessing for SeededPrep {
    fn triples<const K: u32, const S: bool>(
        &mut self,
        n: usize,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)> {
        self.charge(n, "triples")?;
        let mut va = Vec::with_capacity(n);
        let mut vb = Vec::with_capacity(n);
        let mut vc = Vec::with_capacity(n);
        for _ in 0..n {
            let a = self.draw::<K, S>();
            let b = self.draw::<K, S>();
            let c = a * b;
            va.push(self.split(a));
            vb.push(self.split(b));
            vc.push(self.split(c));
        }
        let shape = [n as i64];
        Ok((
            NdArray::from_vec(va, &shape),
            NdArray::from_vec(vb, &shape),
            NdArray::from_vec(vc, &shape),
        ))
    }

    fn matrix_triple<const K: u32, const S: bool>(
        &mut self,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)> {
        self.charge((m * n + n * k) as usize, "matrix triples")?;
        let a: Vec<Z2<K, S>> = (0..m * n).map(|_| self.draw()).collect();
        let b: Vec<Z2<K, S>> = (0..n * k).map(|_| self.draw()).collect();
        let mut c = vec![Z2::<K, S>::zero(); (m * k) as usize];
        for row in 0..m {
            for col in 0..k {
                let mut acc = Z2::zero();
                for inner in 0..n {
                    acc = acc + a[(row * n + inner) as usize] * b[(inner * k + col) as usize];
                }
                c[(row * k + col) as usize] = acc;
            }
        }
        let sa: Vec<_> = a.into_iter().map(|v| self.split(v)).collect();
        let sb: Vec<_> = b.into_iter().map(|v| self.split(v)).collect();
        let sc: Vec<_> = c.into_iter().map(|v| self.split(v)).collect();
        Ok((
            NdArray::from_vec(sa, &[m * n]),
            NdArray::from_vec(sb, &[n * k]),
            NdArray::from_vec(sc, &[m * k]),
        ))
    }

    fn randbits<const K: u32, const S: bool>(&mut self, n: usize) -> Result<NdArray<Z2<K, S>>> {
        self.charge(n, "random bits")?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let bit = Z2::<K, S>::from(self.rng.gen::<bool>());
            out.push(self.split(bit));
        }
        Ok(NdArray::from_vec(out, &[n as i64]))
    }

    fn trunc_pair<const K: u32, const S: bool>(
        &mut self,
        n: usize,
        shift: u32,
    ) -> Result<(NdArray<Z2<K, S>>, NdArray<Z2<K, S>>)> {
        self.charge(n, "truncation pairs")?;
        // r stays two bits below the modulus so the masked opening
        // cannot wrap and the truncation error stays within one ulp
        let bits = K.saturating_sub(2).max(1);
        let mask = if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
        let mut vr = Vec::with_capacity(n);
        let mut vrr = Vec::with_capacity(n);
        for _ in 0..n {
            let raw = self.rng.gen::<u128>() & mask;
            let r = Z2::<K, S>::from_raw(raw);
            let rr = Z2::<K, S>::from_raw(raw >> shift);
            vr.push(self.split(r));
            vrr.push(self.split(rr));
        }
        Ok((NdArray::from_vec(vr, &[n as i64]), NdArray::from_vec(vrr, &[n as i64])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::SignedZ2;

    type Z = SignedZ2<64>;

    fn all_parties(n_parties: usize) -> Vec<SeededPrep> {
        (0..n_parties).map(|pid| SeededPrep::new(42, pid, n_parties)).collect()
    }

    fn reconstruct(shares: Vec<NdArray<Z>>) -> Vec<Z> {
        let numel = shares[0].numel();
        (0..numel)
            .map(|i| {
                shares
                    .iter()
                    .fold(Z::zero(), |acc, arr| acc + arr.get(i))
            })
            .collect()
    }

    #[test]
    fn test_triples_reconstruct() {
        let mut preps = all_parties(3);
        let triples: Vec<_> =
            preps.iter_mut().map(|p| p.triples::<64, true>(10).unwrap()).collect();
        let a = reconstruct(triples.iter().map(|t| t.0.clone()).collect());
        let b = reconstruct(triples.iter().map(|t| t.1.clone()).collect());
        let c = reconstruct(triples.iter().map(|t| t.2.clone()).collect());
        for i in 0..10 {
            assert_eq!(a[i] * b[i], c[i]);
        }
        // the correlation itself is not trivially zero
        assert!(a.iter().any(|x| *x != Z::zero()));
    }

    #[test]
    fn test_randbits_reconstruct_to_bits() {
        let mut preps = all_parties(4);
        let shares: Vec<_> =
            preps.iter_mut().map(|p| p.randbits::<64, true>(64).unwrap()).collect();
        let bits = reconstruct(shares);
        assert!(bits.iter().all(|b| *b == Z::zero() || *b == Z::one()));
        assert!(bits.iter().any(|b| *b == Z::one()));
        assert!(bits.iter().any(|b| *b == Z::zero()));
    }

    #[test]
    fn test_matrix_triple_reconstructs() {
        let mut preps = all_parties(2);
        let triples: Vec<_> =
            preps.iter_mut().map(|p| p.matrix_triple::<64, true>(2, 3, 2).unwrap()).collect();
        let a = reconstruct(triples.iter().map(|t| t.0.clone()).collect());
        let b = reconstruct(triples.iter().map(|t| t.1.clone()).collect());
        let c = reconstruct(triples.iter().map(|t| t.2.clone()).collect());
        for row in 0..2 {
            for col in 0..2 {
                let mut acc = Z::zero();
                for inner in 0..3 {
                    acc = acc + a[row * 3 + inner] * b[inner * 2 + col];
                }
                assert_eq!(acc, c[row * 2 + col]);
            }
        }
    }

    #[test]
    fn test_trunc_pair_matches_shift() {
        let mut preps = all_parties(3);
        let pairs: Vec<_> =
            preps.iter_mut().map(|p| p.trunc_pair::<64, true>(20, 5).unwrap()).collect();
        let r = reconstruct(pairs.iter().map(|t| t.0.clone()).collect());
        let rr = reconstruct(pairs.iter().map(|t| t.1.clone()).collect());
        for i in 0..20 {
            assert_eq!(r[i] >> 5, rr[i]);
            assert!(r[i].to_u128() < 1u128 << 62);
        }
    }

    #[test]
    fn test_budget_exhaustion_is_fatal() {
        let mut prep = SeededPrep::new(1, 0, 2).with_budget(5);
        prep.randbits::<8, true>(5).unwrap();
        assert!(matches!(
            prep.triples::<8, true>(1),
            Err(Error::Exhausted(_))
        ));
    }

    #[test]
    fn test_trivial_prep_is_all_zero() {
        let mut prep = TrivialPrep::new();
        let (a, b, c) = prep.triples::<32, true>(4).unwrap();
        for arr in [a, b, c] {
            assert!(arr.iter().all(|x| x == Z2::<32, true>::zero()));
        }
    }
}
