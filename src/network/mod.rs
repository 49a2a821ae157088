//! Multi-party transport.
//!
//! A [`MultiPartyPlayer`] connects one party to all the others and
//! exposes point-to-point sends plus the collective patterns the
//! protocol layer needs. Two implementations exist: [`SocketPlayer`]
//! over plain TCP or TLS sockets and [`LocalPlayer`] over in-process
//! channels for tests and demos.

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};

pub mod bucket;
pub mod local;
pub mod socket;
pub mod tls;

pub use bucket::TokenBucket;
pub use local::{local_players, run_parties, LocalPlayer};
pub use socket::SocketPlayer;

/// Index of one party, `0..num_parties`.
pub type PartyId = usize;

/// Maximum number of parties a [`PartySet`] can hold.
pub const MAX_NUM_PARTIES: usize = 128;

/// A set of party ids, backed by a bitset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct PartySet {
    bits: u128,
}

impl PartySet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Every party in `0..n_parties`.
    pub fn all(n_parties: usize) -> Self {
        assert!(n_parties <= MAX_NUM_PARTIES);
        if n_parties == MAX_NUM_PARTIES {
            Self { bits: u128::MAX }
        } else {
            Self { bits: (1u128 << n_parties) - 1 }
        }
    }

    /// Every party in `0..n_parties` except `but`.
    pub fn all_but(n_parties: usize, but: PartyId) -> Self {
        let mut set = Self::all(n_parties);
        set.remove(but);
        set
    }

    /// Adds a party.
    pub fn insert(&mut self, id: PartyId) {
        assert!(id < MAX_NUM_PARTIES);
        self.bits |= 1u128 << id;
    }

    /// Removes a party.
    pub fn remove(&mut self, id: PartyId) {
        assert!(id < MAX_NUM_PARTIES);
        self.bits &= !(1u128 << id);
    }

    /// Membership test.
    pub fn contains(&self, id: PartyId) -> bool {
        id < MAX_NUM_PARTIES && (self.bits >> id) & 1 == 1
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PartyId> + '_ {
        (0..MAX_NUM_PARTIES).filter(|&i| self.contains(i))
    }
}

/// Per-peer traffic counters plus the total time spent blocked on the
/// transport.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    /// Bytes sent to each peer, indexed by party id.
    pub bytes_sent: Vec<u64>,
    /// Bytes received from each peer, indexed by party id.
    pub bytes_recv: Vec<u64>,
    /// Time spent sending to each peer.
    pub elapsed_send: Vec<Duration>,
    /// Time spent receiving from each peer.
    pub elapsed_recv: Vec<Duration>,
    /// Total wall-clock time this party spent inside transport calls.
    pub elapsed_total: Duration,
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sent: u64 = self.bytes_sent.iter().sum();
        let recv: u64 = self.bytes_recv.iter().sum();
        write!(
            f,
            "sent {sent} B, received {recv} B, blocked {:?}",
            self.elapsed_total
        )
    }
}

const SYNC_VERIFY_CODE: [u8; 4] = [0x73, 0x32, 0x6b, 0x21];

/// Blocking transport interface shared by all channel kinds.
///
/// Messages between any ordered pair of parties are delivered in FIFO
/// order in each direction independently. A collective call returns only
/// after every component send and receive completed.
pub trait MultiPartyPlayer: Send {
    /// This party's id.
    fn id(&self) -> PartyId;

    /// Number of parties in the session.
    fn num_parties(&self) -> usize;

    /// Every party including this one.
    fn all(&self) -> PartySet {
        PartySet::all(self.num_parties())
    }

    /// Every party except this one.
    fn all_but_me(&self) -> PartySet {
        PartySet::all_but(self.num_parties(), self.id())
    }

    /// Sends one framed message to `to`.
    fn send(&mut self, to: PartyId, message: Bytes) -> Result<()>;

    /// Receives one framed message from `from`. The length is determined
    /// by the sender; `size_hint` only pre-sizes the buffer.
    fn recv(&mut self, from: PartyId, size_hint: usize) -> Result<Vec<u8>>;

    /// Sends to `peer` and receives from `peer`, concurrently.
    fn exchange(&mut self, peer: PartyId, message: Bytes) -> Result<Vec<u8>>;

    /// Sends to `(me + offset) mod P` and receives from
    /// `(me - offset) mod P`, concurrently.
    fn pass_around(&mut self, offset: i64, message: Bytes) -> Result<Vec<u8>>;

    /// Sends the same message to every other party.
    fn broadcast(&mut self, message: Bytes) -> Result<()>;

    /// Broadcasts, then receives one message from every other party.
    ///
    /// The result is indexed by party id with an empty slot at `id()`.
    fn broadcast_recv(&mut self, message: Bytes) -> Result<Vec<Vec<u8>>> {
        self.mbroadcast_recv(self.all_but_me(), message)
    }

    /// Broadcasts to and receives from every member of `group`.
    ///
    /// The result is indexed by party id; slots outside the group are
    /// empty.
    fn mbroadcast_recv(&mut self, group: PartySet, message: Bytes) -> Result<Vec<Vec<u8>>>;

    /// Round-trips a fixed verify code with every other party, failing
    /// if any peer is out of step.
    fn sync(&mut self) -> Result<()> {
        let msgs = self.broadcast_recv(Bytes::from_static(&SYNC_VERIFY_CODE))?;
        for peer in self.all_but_me().iter() {
            if msgs[peer] != SYNC_VERIFY_CODE {
                return Err(Error::Transport(format!(
                    "synchronization with party {peer} failed"
                )));
            }
        }
        Ok(())
    }

    /// Traffic statistics accumulated so far.
    fn statistics(&self) -> Statistics;
}

pub(crate) fn ring_neighbor(me: PartyId, n: usize, offset: i64) -> PartyId {
    (me as i64 + offset).rem_euclid(n as i64) as PartyId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_set() {
        let set = PartySet::all_but(5, 2);
        assert_eq!(set.len(), 4);
        assert!(!set.contains(2));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 1, 3, 4]);
        let mut set = PartySet::empty();
        set.insert(127);
        assert!(set.contains(127));
        set.remove(127);
        assert!(set.is_empty());
        assert_eq!(PartySet::all(MAX_NUM_PARTIES).len(), MAX_NUM_PARTIES);
    }

    #[test]
    fn test_ring_neighbor() {
        assert_eq!(ring_neighbor(0, 3, 1), 1);
        assert_eq!(ring_neighbor(0, 3, -1), 2);
        assert_eq!(ring_neighbor(2, 3, 2), 1);
        assert_eq!(ring_neighbor(1, 3, -2), 2);
    }
}
