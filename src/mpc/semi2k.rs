//! The Semi2k protocol: semi-honest additive secret sharing over Z/2^K.
//!
//! Every party holds one additive share of each secret; the shares sum
//! to the secret modulo 2^K. Linear operations are local, products
//! consume Beaver triples and two openings, comparisons and bit
//! decompositions run a boolean carry circuit over 1-bit shares.
//!
//! The protocol is stateless between calls. All elementwise operations
//! take flattened 1-D arrays of matching length; `matmul_*` take the
//! `(m, n, k)` shapes explicitly. Shape mismatches are caller bugs and
//! assert.

use tracing::debug;

use crate::error::Result;
use crate::ndarray::NdArray;
use crate::network::{MultiPartyPlayer, PartyId, PartySet, Statistics};
use crate::ring::Z2;
use crate::serialization::{Deserializer, Serializer};

use super::prep::Preprocessing;

/// Flattened-row-major matrix product of an `(m, n)` by an `(n, k)`
/// array.
pub(crate) fn matmul_flat<const K: u32, const S: bool>(
    lhs: &NdArray<Z2<K, S>>,
    rhs: &NdArray<Z2<K, S>>,
    m: i64,
    n: i64,
    k: i64,
) -> NdArray<Z2<K, S>> {
    assert_eq!(lhs.numel(), m * n, "lhs holds {} elements, not {m}x{n}", lhs.numel());
    assert_eq!(rhs.numel(), n * k, "rhs holds {} elements, not {n}x{k}", rhs.numel());
    let a = lhs.to_vec();
    let b = rhs.to_vec();
    let mut out = vec![Z2::<K, S>::zero(); (m * k) as usize];
    for row in 0..m {
        for col in 0..k {
            let mut acc = Z2::zero();
            for inner in 0..n {
                acc = acc + a[(row * n + inner) as usize] * b[(inner * k + col) as usize];
            }
            out[(row * k + col) as usize] = acc;
        }
    }
    NdArray::from_vec(out, &[m * k])
}

fn add_arr<const K: u32, const S: bool>(
    lhs: &NdArray<Z2<K, S>>,
    rhs: &NdArray<Z2<K, S>>,
) -> NdArray<Z2<K, S>> {
    lhs.zip_map(rhs, |a, b| a + b)
}

fn sub_arr<const K: u32, const S: bool>(
    lhs: &NdArray<Z2<K, S>>,
    rhs: &NdArray<Z2<K, S>>,
) -> NdArray<Z2<K, S>> {
    lhs.zip_map(rhs, |a, b| a - b)
}

fn mul_arr<const K: u32, const S: bool>(
    lhs: &NdArray<Z2<K, S>>,
    rhs: &NdArray<Z2<K, S>>,
) -> NdArray<Z2<K, S>> {
    lhs.zip_map(rhs, |a, b| a * b)
}

fn neg_arr<const K: u32, const S: bool>(input: &NdArray<Z2<K, S>>) -> NdArray<Z2<K, S>> {
    input.map(|x| -x)
}

fn shl_arr<const K: u32, const S: bool>(
    input: &NdArray<Z2<K, S>>,
    nbits: u32,
) -> NdArray<Z2<K, S>> {
    input.map(|x| x << nbits)
}

fn shr_arr<const K: u32, const S: bool>(
    input: &NdArray<Z2<K, S>>,
    nbits: u32,
) -> NdArray<Z2<K, S>> {
    input.map(|x| x >> nbits)
}

/// One party's endpoint of the Semi2k protocol.
///
/// Owns the transport and a preprocessing source; each operation
/// consumes bandwidth and, where noted, correlated randomness.
pub struct Semi2k<Pr: Preprocessing> {
    pid: PartyId,
    n_parties: usize,
    parties: PartySet,
    player: Box<dyn MultiPartyPlayer>,
    prep: Pr,
}

impl<Pr: Preprocessing> Semi2k<Pr> {
    /// Binds the protocol to a connected transport and a preprocessing
    /// source.
    pub fn new(player: Box<dyn MultiPartyPlayer>, prep: Pr) -> Self {
        let pid = player.id();
        let n_parties = player.num_parties();
        let parties = player.all_but_me();
        Self { pid, n_parties, parties, player, prep }
    }

    /// This party's id.
    pub fn pid(&self) -> PartyId {
        self.pid
    }

    /// Number of parties in the session.
    pub fn num_parties(&self) -> usize {
        self.n_parties
    }

    /// Transport statistics accumulated so far.
    pub fn statistics(&self) -> Statistics {
        self.player.statistics()
    }

    /// The transport, for delay/rate injection in tests and demos.
    pub fn player_mut(&mut self) -> &mut dyn MultiPartyPlayer {
        self.player.as_mut()
    }

    /// Plaintext folded into party 0's share only, the additive
    /// convention shared by `add_sp`, openings and Beaver recombination.
    fn plain_at_p0<const K: u32, const S: bool>(
        &self,
        share: &NdArray<Z2<K, S>>,
        plain: &NdArray<Z2<K, S>>,
    ) -> NdArray<Z2<K, S>> {
        if self.pid == 0 {
            add_arr(share, plain)
        } else {
            share.clone()
        }
    }

    /* ------------------------- share I/O ------------------------- */

    /// Shares locally owned data: the owner's share is the data itself.
    pub fn input_p<const K: u32, const S: bool>(
        &mut self,
        data: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(data.clone())
    }

    /// Counterpart of [`Self::input_p`] on non-owning parties: a zero
    /// share of the owner's `numel` elements.
    pub fn input_p_remote<const K: u32, const S: bool>(
        &mut self,
        _owner: PartyId,
        numel: i64,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(NdArray::filled(Z2::zero(), &[numel]))
    }

    /// Opens a shared value: every party broadcasts its share and sums
    /// the shares it receives with its own.
    pub fn open_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        let mut s = Serializer::new();
        s.write(input);
        let mut msgs = self.player.mbroadcast_recv(self.parties, s.finalize())?;
        let mut ret = input.clone();
        for pid in self.parties.iter() {
            let mut d = Deserializer::new(std::mem::take(&mut msgs[pid]));
            let share: NdArray<Z2<K, S>> = d.read()?;
            ret = add_arr(&ret, &share);
        }
        Ok(ret)
    }

    /* ------------------------- linear ops ------------------------- */

    /// Elementwise negation of a plain array.
    pub fn neg_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(neg_arr(input))
    }

    /// Elementwise negation of a shared array.
    pub fn neg_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(neg_arr(input))
    }

    /// Plain + plain.
    pub fn add_pp<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(add_arr(lhs, rhs))
    }

    /// Share + plain: the plaintext enters at party 0's share only.
    pub fn add_sp<const K: u32, const S: bool>(
        &mut self,
        share: &NdArray<Z2<K, S>>,
        plain: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(self.plain_at_p0(share, plain))
    }

    /// Share + share.
    pub fn add_ss<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(add_arr(lhs, rhs))
    }

    /// Plain * plain.
    pub fn mul_pp<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(mul_arr(lhs, rhs))
    }

    /// Share * plain: every share is scaled by the public factor.
    pub fn mul_sp<const K: u32, const S: bool>(
        &mut self,
        share: &NdArray<Z2<K, S>>,
        plain: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(mul_arr(share, plain))
    }

    /// Share * share via one Beaver triple and two openings.
    ///
    /// With the triple `(a, b, c)` and the openings `alpha = x - a`,
    /// `beta = y - b`, the product reconstructs as
    /// `a * beta + alpha * b + alpha * beta + c`.
    pub fn mul_ss<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        assert_eq!(lhs.numel(), rhs.numel(), "mul_ss length mismatch");
        let (a, b, c) = self.prep.triples::<K, S>(lhs.numel() as usize)?;
        let alpha = self.open_s(&sub_arr(lhs, &a))?;
        let beta = self.open_s(&sub_arr(rhs, &b))?;
        let local = add_arr(&mul_arr(&a, &beta), &mul_arr(&b, &alpha));
        let with_plain = self.plain_at_p0(&local, &mul_arr(&alpha, &beta));
        Ok(add_arr(&with_plain, &c))
    }

    /* ------------------------- shifts ------------------------- */

    /// `x << nbits` on a plain array.
    pub fn lshift_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(shl_arr(input, nbits))
    }

    /// `x << nbits` on a shared array; shifting distributes over the
    /// share sum.
    pub fn lshift_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(shl_arr(input, nbits))
    }

    /// `x >> nbits` on a plain array.
    pub fn trunc_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(shr_arr(input, nbits))
    }

    /// Truncation of a shared value, with at most one unit of error in
    /// the last place.
    ///
    /// Two parties shift their shares locally; more parties consume a
    /// `(r, r >> nbits)` pair, open `r - x` and recombine.
    pub fn trunc_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<NdArray<Z2<K, S>>> {
        if self.n_parties == 2 {
            return Ok(shr_arr(input, nbits));
        }
        let (r, rr) = self.prep.trunc_pair::<K, S>(input.numel() as usize, nbits)?;
        let c = self.open_s(&sub_arr(&r, input))?;
        Ok(self.plain_at_p0(&rr, &neg_arr(&shr_arr(&c, nbits))))
    }

    /* ------------------------- comparisons ------------------------- */

    /// Sign bit of a plain array, `1` for negative values.
    pub fn msb_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(input.map(|x| Z2::from(x.msb())))
    }

    /// Sign bit of a shared array as a share of `{0, 1}`; zero counts
    /// as non-negative.
    ///
    /// Masks the input with a full-width bitwise-known random value,
    /// opens the sum, recovers `x mod 2^(K-1)` through a bitwise
    /// comparison of the opening against the mask, and extracts the top
    /// bit behind one more random blind.
    pub fn msb_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        if S {
            // run on unsigned semantics, reinterpret at the end
            let unsigned: NdArray<Z2<K, false>> = input.map(|x| x.cast());
            let ans = self.msb_s::<K, false>(&unsigned)?;
            return Ok(ans.map(|x| x.cast()));
        }
        let numel = input.numel();
        debug!(numel, bits = K, "msb_s");

        let blind = self.prep.randbits::<K, S>(numel as usize)?;
        let mut bits = Vec::with_capacity(K as usize);
        for _ in 0..K {
            bits.push(self.prep.randbits::<K, S>(numel as usize)?);
        }
        let mut r = NdArray::filled(Z2::<K, S>::zero(), &[numel]);
        for (i, bit) in bits.iter().enumerate() {
            r = add_arr(&r, &shl_arr(bit, i as u32));
        }

        let c = self.open_s(&add_arr(input, &r))?;

        // clear the top bit of both the opened value and the mask
        let cc = shr_arr(&shl_arr(&c, 1), 1);
        let mut rr = NdArray::filled(Z2::<K, S>::zero(), &[numel]);
        for (i, bit) in bits.iter().enumerate().take(K as usize - 1) {
            rr = add_arr(&rr, &shl_arr(bit, i as u32));
        }

        let low_bits = a2b(&bits[..K as usize - 1]);
        let below = self.bitlt_ps(&cc, &low_bits)?;
        let mut wrap = self.b2a::<K, S>(&[below])?;
        let wrap = wrap.pop().expect("one bit in, one out");

        // x mod 2^(K-1) as shares, then the top-bit part of x
        let low_part =
            self.plain_at_p0(&add_arr(&neg_arr(&rr), &shl_arr(&wrap, K - 1)), &cc);
        let top_part = sub_arr(input, &low_part);

        // blind the top bit before opening it
        let e = self.open_s(&add_arr(&shl_arr(&blind, K - 1), &top_part))?;
        let e_msb = e.map(|x| Z2::<K, S>::from(x.msb()));

        // msb = blind xor e_msb = blind + e_msb - 2 * blind * e_msb
        let be = mul_arr(&blind, &e_msb);
        let unblinded = sub_arr(&sub_arr(&blind, &be), &be);
        Ok(self.plain_at_p0(&unblinded, &e_msb))
    }

    /// Equality-to-zero of a plain array.
    pub fn eqz_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(input.map(|x| Z2::from(x == Z2::zero())))
    }

    /// Equality-to-zero of a shared array as a share of `{0, 1}`.
    ///
    /// Opens `x + r` for a bitwise-known random `r`; `x` is zero exactly
    /// when every bit of the opening matches `r`, which an OR-fold over
    /// bitwise XORs decides in the boolean domain.
    pub fn eqz_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
    ) -> Result<NdArray<Z2<K, S>>> {
        if S {
            let unsigned: NdArray<Z2<K, false>> = input.map(|x| x.cast());
            let ans = self.eqz_s::<K, false>(&unsigned)?;
            return Ok(ans.map(|x| x.cast()));
        }
        let numel = input.numel();
        debug!(numel, bits = K, "eqz_s");

        let mut bits = Vec::with_capacity(K as usize);
        for _ in 0..K {
            bits.push(self.prep.randbits::<K, S>(numel as usize)?);
        }
        let mut r = NdArray::filled(Z2::<K, S>::zero(), &[numel]);
        for (i, bit) in bits.iter().enumerate() {
            r = add_arr(&r, &shl_arr(bit, i as u32));
        }

        let c = self.open_s(&add_arr(input, &r))?;
        let c_bits = self.bitdec_p(&c, K)?;

        let r2 = a2b(&bits);
        let c2 = a2b(&c_bits);

        let ones = NdArray::filled(Z2::<1, S>::one(), &[numel]);
        let mut any_diff: Option<NdArray<Z2<1, S>>> = None;
        for (rb, cb) in r2.iter().zip(c2.iter()) {
            let diff = self.plain_at_p0(rb, cb);
            any_diff = Some(match any_diff {
                None => diff,
                Some(acc) => self.or_ss(&acc, &diff)?,
            });
        }
        let any_diff = any_diff.expect("K >= 1");
        let equal = self.plain_at_p0(&any_diff, &ones);
        let mut lifted = self.b2a::<K, S>(&[equal])?;
        Ok(lifted.pop().expect("one bit in, one out"))
    }

    /* ------------------------- bit (de)composition ------------------------- */

    /// Plain bit decomposition: bit `i` of every element, as ring
    /// elements. Positions at or above K yield the sign bit, or zero
    /// when K is 1.
    pub fn bitdec_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<Vec<NdArray<Z2<K, S>>>> {
        let mut out = Vec::with_capacity(nbits as usize);
        for i in 0..nbits {
            if i < K {
                out.push(input.map(|x| Z2::from(x.bit(i))));
            } else if K == 1 {
                out.push(NdArray::filled(Z2::zero(), &[input.numel()]));
            } else {
                out.push(input.map(|x| Z2::from(x.msb())));
            }
        }
        Ok(out)
    }

    /// Shared bit decomposition of the low `nbits` bits.
    ///
    /// Masks with a bitwise-known random value, opens the difference and
    /// adds it back bit by bit in the boolean domain.
    pub fn bitdec_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<Vec<NdArray<Z2<K, S>>>> {
        let numel = input.numel();
        debug!(numel, nbits, "bitdec_s");
        let mut bits = Vec::with_capacity(nbits as usize);
        for _ in 0..nbits {
            bits.push(self.prep.randbits::<K, S>(numel as usize)?);
        }
        let mut r = NdArray::filled(Z2::<K, S>::zero(), &[numel]);
        for (i, bit) in bits.iter().enumerate() {
            r = add_arr(&r, &shl_arr(bit, i as u32));
        }

        let c = self.open_s(&sub_arr(input, &r))?;

        let r2 = a2b(&bits);
        let c2 = a2b(&self.bitdec_p(&c, nbits)?);
        let sum_bits = self.add_pb(&c2, &r2, false)?;
        self.b2a::<K, S>(&sum_bits)
    }

    /// Plain variant of [`Self::h1bitdec_s`]: keeps only the highest set
    /// bit below `nbits`, then decomposes the mask.
    pub fn h1bitdec_p<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<Vec<NdArray<Z2<K, S>>>> {
        let mask = input.map(|x| {
            let mut ans = Z2::<K, S>::zero();
            for i in (0..nbits.min(K)).rev() {
                if x.bit(i) {
                    ans.set_bit(i, true);
                    break;
                }
            }
            ans
        });
        self.bitdec_p(&mask, nbits)
    }

    /// Highest-set-bit decomposition of a shared value.
    ///
    /// Bit-decomposes, folds a high-to-low prefix-OR, and subtracts its
    /// right-shifted copy so only the highest one survives.
    pub fn h1bitdec_s<const K: u32, const S: bool>(
        &mut self,
        input: &NdArray<Z2<K, S>>,
        nbits: u32,
    ) -> Result<Vec<NdArray<Z2<K, S>>>> {
        let bits = self.bitdec_s(input, nbits)?;
        let mut prefix = a2b(&bits);
        for i in (0..prefix.len().saturating_sub(1)).rev() {
            prefix[i] = self.or_ss(&prefix[i], &prefix[i + 1])?;
        }
        let prefix = self.b2a::<K, S>(&prefix)?;
        let mut out = Vec::with_capacity(prefix.len());
        for i in 0..prefix.len() {
            if i + 1 < prefix.len() {
                out.push(sub_arr(&prefix[i], &prefix[i + 1]));
            } else {
                out.push(prefix[i].clone());
            }
        }
        Ok(out)
    }

    /* ------------------------- matmul ------------------------- */

    /// Plain x plain matrix product.
    pub fn matmul_pp<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(matmul_flat(lhs, rhs, m, n, k))
    }

    /// Share x plain matrix product; local per share.
    pub fn matmul_sp<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(matmul_flat(lhs, rhs, m, n, k))
    }

    /// Plain x share matrix product; local per share.
    pub fn matmul_ps<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<NdArray<Z2<K, S>>> {
        Ok(matmul_flat(lhs, rhs, m, n, k))
    }

    /// Share x share matrix product via one matrix triple.
    pub fn matmul_ss<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs: &NdArray<Z2<K, S>>,
        m: i64,
        n: i64,
        k: i64,
    ) -> Result<NdArray<Z2<K, S>>> {
        debug!(m, n, k, "matmul_ss");
        let (a, b, c) = self.prep.matrix_triple::<K, S>(m, n, k)?;
        let alpha = self.open_s(&sub_arr(lhs, &a))?;
        let beta = self.open_s(&sub_arr(rhs, &b))?;
        let a_beta = matmul_flat(&a, &beta, m, n, k);
        let alpha_b = matmul_flat(&alpha, &b, m, n, k);
        let alpha_beta = matmul_flat(&alpha, &beta, m, n, k);
        let with_plain = self.plain_at_p0(&add_arr(&a_beta, &alpha_b), &alpha_beta);
        Ok(add_arr(&with_plain, &c))
    }

    /* ------------------- boolean-domain internals ------------------- */

    /// Lifts 1-bit shares into the K-bit ring.
    ///
    /// For each bit `b`, draws a random ring bit `r`, opens `b xor r`
    /// in the boolean domain, and reconstructs `r + c - 2 r c`.
    fn b2a<const K: u32, const S: bool>(
        &mut self,
        inputs: &[NdArray<Z2<1, S>>],
    ) -> Result<Vec<NdArray<Z2<K, S>>>> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            let numel = input.numel();
            let r = self.prep.randbits::<K, S>(numel as usize)?;
            let r2 = r.map(|x| Z2::<1, S>::from(x.bit(0)));
            let c2 = self.open_s(&add_arr(input, &r2))?;
            let c: NdArray<Z2<K, S>> = c2.map(|x| x.cast());
            let two_c = add_arr(&c, &c);
            let r_2c = mul_arr(&r, &two_c);
            out.push(self.plain_at_p0(&sub_arr(&r, &r_2c), &c));
        }
        Ok(out)
    }

    /// Shared OR of two bit shares: `x | y = !(!x & !y)`. Costs one
    /// 1-bit triple.
    fn or_ss<const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<1, S>>,
        rhs: &NdArray<Z2<1, S>>,
    ) -> Result<NdArray<Z2<1, S>>> {
        let ones = NdArray::filled(Z2::<1, S>::one(), &[lhs.numel()]);
        let not_l = self.plain_at_p0(lhs, &ones);
        let not_r = self.plain_at_p0(rhs, &ones);
        let both = self.mul_ss(&not_l, &not_r)?;
        Ok(self.plain_at_p0(&both, &ones))
    }

    /// Ripple adder over boolean shares of plain bits `lhs` and shared
    /// bits `rhs`, least significant first. Appends the final carry when
    /// `carry_out` is set.
    fn add_pb<const S: bool>(
        &mut self,
        lhs: &[NdArray<Z2<1, S>>],
        rhs: &[NdArray<Z2<1, S>>],
        carry_out: bool,
    ) -> Result<Vec<NdArray<Z2<1, S>>>> {
        assert_eq!(lhs.len(), rhs.len(), "add_pb bit-width mismatch");
        let numel = lhs[0].numel();
        let mut carry = NdArray::filled(Z2::<1, S>::zero(), &[numel]);
        let mut out = Vec::with_capacity(lhs.len() + carry_out as usize);
        for (p, b) in lhs.iter().zip(rhs.iter()) {
            out.push(self.plain_at_p0(&add_arr(b, &carry), p));
            let axor = self.plain_at_p0(b, p);
            let propagate = self.mul_ss(&axor, &carry)?;
            let generate = mul_arr(b, p);
            carry = add_arr(&propagate, &generate);
        }
        if carry_out {
            out.push(carry);
        }
        Ok(out)
    }

    /// Bitwise less-than of a plain value against shared bits:
    /// `[x < y]` as a boolean share.
    ///
    /// Runs the carry chain of `x + !y + 1`; the carry out is
    /// `[x >= y]`, so the complement of the final carry is returned.
    fn bitlt_ps<const K: u32, const S: bool>(
        &mut self,
        lhs: &NdArray<Z2<K, S>>,
        rhs_bits: &[NdArray<Z2<1, S>>],
    ) -> Result<NdArray<Z2<1, S>>> {
        let numel = lhs.numel();
        let nbits = rhs_bits.len() as u32;
        let ones = NdArray::filled(Z2::<1, S>::one(), &[numel]);

        let mut lhs_bits = Vec::with_capacity(nbits as usize);
        for i in 0..nbits {
            lhs_bits.push(lhs.map(|x| Z2::<1, S>::from(x.bit(i))));
        }

        // carry-in of one: the +1 of the two's complement
        let zero_share = NdArray::filled(Z2::<1, S>::zero(), &[numel]);
        let mut carry = self.plain_at_p0(&zero_share, &ones);
        for (a, b) in lhs_bits.iter().zip(rhs_bits.iter()) {
            let not_b = self.plain_at_p0(b, &ones);
            let axor = self.plain_at_p0(&not_b, a);
            let propagate = self.mul_ss(&axor, &carry)?;
            let generate = mul_arr(&not_b, a);
            carry = add_arr(&propagate, &generate);
        }
        Ok(self.plain_at_p0(&carry, &ones))
    }
}

/// Bit 0 of every share: converts shares of bit values from the K-bit
/// ring into the 1-bit ring.
fn a2b<const K: u32, const S: bool>(inputs: &[NdArray<Z2<K, S>>]) -> Vec<NdArray<Z2<1, S>>> {
    inputs.iter().map(|arr| arr.map(|x| Z2::from(x.bit(0)))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::prep::SeededPrep;
    use crate::network::{run_parties, LocalPlayer};
    use crate::ring::SignedZ2;

    type Z64 = SignedZ2<64>;

    fn protocol(pid: usize, n: usize, player: LocalPlayer) -> Semi2k<SeededPrep> {
        Semi2k::new(Box::new(player), SeededPrep::new(0xfeed, pid, n))
    }

    fn shared_input<const K: u32>(
        prot: &mut Semi2k<SeededPrep>,
        owner: usize,
        data: &[i64],
    ) -> NdArray<SignedZ2<K>> {
        if prot.pid() == owner {
            let arr = NdArray::from_vec(
                data.iter().map(|&v| SignedZ2::from(v)).collect(),
                &[data.len() as i64],
            );
            prot.input_p(&arr).unwrap()
        } else {
            prot.input_p_remote(owner, data.len() as i64).unwrap()
        }
    }

    fn opened<const K: u32>(
        prot: &mut Semi2k<SeededPrep>,
        share: &NdArray<SignedZ2<K>>,
    ) -> Vec<i128> {
        prot.open_s(share).unwrap().iter().map(|x| x.to_i128()).collect()
    }

    #[test]
    fn test_open_of_input_is_identity() {
        for n in [2usize, 3] {
            let results = run_parties(n, |pid, player| {
                let mut prot = protocol(pid, n, player);
                let x = shared_input::<64>(&mut prot, 0, &[5, -3, 0]);
                opened(&mut prot, &x)
            });
            for r in results {
                assert_eq!(r, vec![5, -3, 0]);
            }
        }
    }

    #[test]
    fn test_linear_ops() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<64>(&mut prot, 0, &[10, -4]);
            let y = shared_input::<64>(&mut prot, 1, &[1, 7]);
            let sum = prot.add_ss(&x, &y).unwrap();
            let neg = prot.neg_s(&sum).unwrap();
            let plain = NdArray::from_vec(vec![Z64::from(100i64); 2], &[2]);
            let shifted = prot.add_sp(&neg, &plain).unwrap();
            opened(&mut prot, &shifted)
        });
        for r in results {
            assert_eq!(r, vec![89, 97]);
        }
    }

    #[test]
    fn test_beaver_multiplication() {
        for n in [2usize, 3] {
            let results = run_parties(n, |pid, player| {
                let mut prot = protocol(pid, n, player);
                let x = shared_input::<64>(&mut prot, 0, &[3, -5]);
                let y = shared_input::<64>(&mut prot, 1 % n, &[7, 4]);
                let prod = prot.mul_ss(&x, &y).unwrap();
                opened(&mut prot, &prod)
            });
            for r in results {
                assert_eq!(r, vec![21, -20], "with {n} parties");
            }
        }
    }

    #[test]
    fn test_mul_wraps_mod_2k() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<8>(&mut prot, 0, &[100]);
            let y = shared_input::<8>(&mut prot, 1, &[3]);
            let prod = prot.mul_ss(&x, &y).unwrap();
            opened(&mut prot, &prod)
        });
        for r in results {
            assert_eq!(r, vec![44]); // 300 mod 256
        }
    }

    #[test]
    fn test_msb() {
        for n in [2usize, 3] {
            let results = run_parties(n, |pid, player| {
                let mut prot = protocol(pid, n, player);
                let x = shared_input::<16>(&mut prot, 0, &[-1, 0, 2, -32768, 32767]);
                let sign = prot.msb_s(&x).unwrap();
                opened(&mut prot, &sign)
            });
            for r in results {
                assert_eq!(r, vec![1, 0, 0, 1, 0], "with {n} parties");
            }
        }
    }

    #[test]
    fn test_eqz() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<16>(&mut prot, 0, &[0, 1, -1, 256]);
            let z = prot.eqz_s(&x).unwrap();
            opened(&mut prot, &z)
        });
        for r in results {
            assert_eq!(r, vec![1, 0, 0, 0]);
        }
    }

    #[test]
    fn test_bitdec() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<8>(&mut prot, 0, &[5]);
            let bits = prot.bitdec_s(&x, 8).unwrap();
            bits.iter().map(|b| opened(&mut prot, b)[0]).collect::<Vec<_>>()
        });
        for r in results {
            assert_eq!(r, vec![1, 0, 1, 0, 0, 0, 0, 0]);
        }
    }

    #[test]
    fn test_bitdec_three_parties() {
        let results = run_parties(3, |pid, player| {
            let mut prot = protocol(pid, 3, player);
            let x = shared_input::<16>(&mut prot, 2, &[0b1011_0001]);
            let bits = prot.bitdec_s(&x, 9).unwrap();
            bits.iter().map(|b| opened(&mut prot, b)[0]).collect::<Vec<_>>()
        });
        for r in results {
            assert_eq!(r, vec![1, 0, 0, 0, 1, 1, 0, 1, 0]);
        }
    }

    #[test]
    fn test_h1bitdec() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<8>(&mut prot, 0, &[0b0110, 0, 1]);
            let bits = prot.h1bitdec_s(&x, 4).unwrap();
            bits.iter().map(|b| opened(&mut prot, b)).collect::<Vec<_>>()
        });
        for r in results {
            // highest set bit of 6 is bit 2; 0 has none; 1 is bit 0
            assert_eq!(r[0], vec![0, 0, 1]);
            assert_eq!(r[1], vec![0, 0, 0]);
            assert_eq!(r[2], vec![1, 0, 0]);
            assert_eq!(r[3], vec![0, 0, 0]);
        }
    }

    #[test]
    fn test_h1bitdec_p_matches_share_variant() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let plain = NdArray::from_vec(vec![Z64::from(44i64)], &[1]);
            let bits = prot.h1bitdec_p(&plain, 8).unwrap();
            bits.iter().map(|b| b.get(0).to_i128()).collect::<Vec<_>>()
        });
        for r in results {
            // 44 = 0b101100, highest bit is 5
            assert_eq!(r, vec![0, 0, 0, 0, 0, 1, 0, 0]);
        }
    }

    #[test]
    fn test_trunc_two_parties() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<64>(&mut prot, 0, &[1024, -4096]);
            let t = prot.trunc_s(&x, 4).unwrap();
            opened(&mut prot, &t)
        });
        for r in results {
            assert!((r[0] - 64).abs() <= 1, "got {}", r[0]);
            assert!((r[1] + 256).abs() <= 1, "got {}", r[1]);
        }
    }

    #[test]
    fn test_trunc_three_parties() {
        let results = run_parties(3, |pid, player| {
            let mut prot = protocol(pid, 3, player);
            let x = shared_input::<64>(&mut prot, 0, &[1 << 20, 12345 << 8]);
            let t = prot.trunc_s(&x, 8).unwrap();
            opened(&mut prot, &t)
        });
        for r in results {
            assert!((r[0] - (1 << 12)).abs() <= 1, "got {}", r[0]);
            assert!((r[1] - 12345).abs() <= 1, "got {}", r[1]);
        }
    }

    #[test]
    fn test_matmul() {
        for n in [2usize, 3] {
            let results = run_parties(n, |pid, player| {
                let mut prot = protocol(pid, n, player);
                let a = shared_input::<64>(&mut prot, 0, &[1, 2, 3, 4]);
                let b = shared_input::<64>(&mut prot, n - 1, &[5, 6, 7, 8]);
                let c = prot.matmul_ss(&a, &b, 2, 2, 2).unwrap();
                opened(&mut prot, &c)
            });
            for r in results {
                assert_eq!(r, vec![19, 22, 43, 50], "with {n} parties");
            }
        }
    }

    #[test]
    fn test_matmul_rectangular() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let a = shared_input::<64>(&mut prot, 0, &[1, 0, 2, -1, 3, 1]); // 2x3
            let b = shared_input::<64>(&mut prot, 1, &[2, 1, 0, 5, -1, 4]); // 3x2
            let c = prot.matmul_ss(&a, &b, 2, 3, 2).unwrap();
            opened(&mut prot, &c)
        });
        for r in results {
            assert_eq!(r, vec![0, 9, -3, 18]);
        }
    }

    #[test]
    fn test_wide_ring_k128() {
        let results = run_parties(2, |pid, player| {
            let mut prot = protocol(pid, 2, player);
            let x = shared_input::<128>(&mut prot, 0, &[1 << 50]);
            let y = shared_input::<128>(&mut prot, 1, &[1 << 20]);
            let prod = prot.mul_ss(&x, &y).unwrap();
            opened(&mut prot, &prod)
        });
        for r in results {
            assert_eq!(r, vec![1i128 << 70]);
        }
    }
}
