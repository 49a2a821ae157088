//! In-process transport over crossbeam channels.
//!
//! [`LocalPlayer`] wires every ordered pair of parties with an unbounded
//! channel, so sends never block and the collective patterns cannot
//! deadlock. It backs the thread-per-party protocol tests and the local
//! demo mode; [`run_parties`] is the accompanying harness.

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, Sender};
use itertools::Itertools;

use super::{ring_neighbor, MultiPartyPlayer, PartyId, PartySet, Statistics};
use crate::error::{ensure_contract, Error, Result};

/// Transport endpoint backed by in-process channels.
pub struct LocalPlayer {
    my_pid: PartyId,
    n_parties: usize,
    txs: Vec<Option<Sender<Vec<u8>>>>,
    rxs: Vec<Option<Receiver<Vec<u8>>>>,
    bytes_sent: Vec<u64>,
    bytes_recv: Vec<u64>,
}

/// Creates a fully connected set of `n_parties` local endpoints.
pub fn local_players(n_parties: usize) -> Vec<LocalPlayer> {
    let mut txs: Vec<Vec<Option<Sender<Vec<u8>>>>> =
        (0..n_parties).map(|_| (0..n_parties).map(|_| None).collect_vec()).collect_vec();
    let mut rxs: Vec<Vec<Option<Receiver<Vec<u8>>>>> =
        (0..n_parties).map(|_| (0..n_parties).map(|_| None).collect_vec()).collect_vec();

    for i in 0..n_parties {
        for j in 0..n_parties {
            if i != j {
                let (tx, rx) = unbounded();
                txs[i][j] = Some(tx); // i sends to j
                rxs[j][i] = Some(rx); // j receives from i
            }
        }
    }

    txs.into_iter()
        .zip(rxs)
        .enumerate()
        .map(|(pid, (txs, rxs))| LocalPlayer {
            my_pid: pid,
            n_parties,
            txs,
            rxs,
            bytes_sent: vec![0; n_parties],
            bytes_recv: vec![0; n_parties],
        })
        .collect()
}

impl LocalPlayer {
    fn push(&mut self, to: PartyId, message: &[u8]) -> Result<()> {
        ensure_contract!(to != self.my_pid && to < self.n_parties, "bad send target {to}");
        let tx = self.txs[to].as_ref().expect("channel matrix is fully connected");
        tx.send(message.to_vec())
            .map_err(|_| Error::Transport(format!("party {to} disconnected")))?;
        self.bytes_sent[to] += message.len() as u64;
        Ok(())
    }

    fn pull(&mut self, from: PartyId) -> Result<Vec<u8>> {
        ensure_contract!(from != self.my_pid && from < self.n_parties, "bad recv source {from}");
        let rx = self.rxs[from].as_ref().expect("channel matrix is fully connected");
        let message = rx
            .recv()
            .map_err(|_| Error::Transport(format!("party {from} disconnected")))?;
        self.bytes_recv[from] += message.len() as u64;
        Ok(message)
    }
}

impl MultiPartyPlayer for LocalPlayer {
    fn id(&self) -> PartyId {
        self.my_pid
    }

    fn num_parties(&self) -> usize {
        self.n_parties
    }

    fn send(&mut self, to: PartyId, message: Bytes) -> Result<()> {
        self.push(to, &message)
    }

    fn recv(&mut self, from: PartyId, _size_hint: usize) -> Result<Vec<u8>> {
        self.pull(from)
    }

    fn exchange(&mut self, peer: PartyId, message: Bytes) -> Result<Vec<u8>> {
        self.push(peer, &message)?;
        self.pull(peer)
    }

    fn pass_around(&mut self, offset: i64, message: Bytes) -> Result<Vec<u8>> {
        let to = ring_neighbor(self.my_pid, self.n_parties, offset);
        let from = ring_neighbor(self.my_pid, self.n_parties, -offset);
        ensure_contract!(to != self.my_pid, "pass_around offset is a multiple of {}", self.n_parties);
        self.push(to, &message)?;
        self.pull(from)
    }

    fn broadcast(&mut self, message: Bytes) -> Result<()> {
        for to in self.all_but_me().iter() {
            self.push(to, &message)?;
        }
        Ok(())
    }

    fn mbroadcast_recv(&mut self, group: PartySet, message: Bytes) -> Result<Vec<Vec<u8>>> {
        let mut out = vec![Vec::new(); self.n_parties];
        for peer in group.iter() {
            if peer != self.my_pid {
                self.push(peer, &message)?;
            }
        }
        for peer in group.iter() {
            if peer != self.my_pid {
                out[peer] = self.pull(peer)?;
            }
        }
        Ok(out)
    }

    fn statistics(&self) -> Statistics {
        Statistics {
            bytes_sent: self.bytes_sent.clone(),
            bytes_recv: self.bytes_recv.clone(),
            elapsed_send: vec![Default::default(); self.n_parties],
            elapsed_recv: vec![Default::default(); self.n_parties],
            elapsed_total: Default::default(),
        }
    }
}

/// Runs `f` once per party on its own OS thread and collects the
/// results in party order.
///
/// This is the harness used by the protocol tests and the local demo:
/// every closure gets its party id and a connected [`LocalPlayer`].
pub fn run_parties<R, F>(n_parties: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(PartyId, LocalPlayer) -> R + Send + Sync,
{
    let players = local_players(n_parties);
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = players
            .into_iter()
            .enumerate()
            .map(|(pid, player)| scope.spawn(move || f(pid, player)))
            .collect();
        handles.into_iter().map(|h| h.join().expect("party thread panicked")).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_recv() {
        let results = run_parties(2, |pid, mut player| {
            if pid == 0 {
                player.send(1, Bytes::from_static(b"hello")).unwrap();
                player.recv(1, 0).unwrap()
            } else {
                let got = player.recv(0, 0).unwrap();
                player.send(0, Bytes::from(got.clone())).unwrap();
                got
            }
        });
        assert_eq!(results[0], b"hello");
        assert_eq!(results[1], b"hello");
    }

    #[test]
    fn test_broadcast_recv_delivers_identical_payloads() {
        let results = run_parties(4, |pid, mut player| {
            let msg = Bytes::from(vec![pid as u8; 3]);
            player.broadcast_recv(msg).unwrap()
        });
        for (me, msgs) in results.iter().enumerate() {
            for (peer, msg) in msgs.iter().enumerate() {
                if peer == me {
                    assert!(msg.is_empty());
                } else {
                    assert_eq!(msg, &vec![peer as u8; 3]);
                }
            }
        }
    }

    #[test]
    fn test_pass_around() {
        let n = 5;
        let results = run_parties(n, |pid, mut player| {
            player.pass_around(2, Bytes::from(vec![pid as u8])).unwrap()
        });
        for (me, msg) in results.iter().enumerate() {
            let expected = ring_neighbor(me, n, -2);
            assert_eq!(msg, &vec![expected as u8]);
        }
    }

    #[test]
    fn test_exchange_and_fifo_order() {
        let results = run_parties(2, |pid, mut player| {
            let peer = 1 - pid;
            // two queued messages must come back in order
            player.send(peer, Bytes::from_static(b"first")).unwrap();
            player.send(peer, Bytes::from_static(b"second")).unwrap();
            let a = player.recv(peer, 0).unwrap();
            let b = player.recv(peer, 0).unwrap();
            let x = player.exchange(peer, Bytes::from_static(b"x")).unwrap();
            (a, b, x)
        });
        for (a, b, x) in &results {
            assert_eq!(a, b"first");
            assert_eq!(b, b"second");
            assert_eq!(x, b"x");
        }
    }

    #[test]
    fn test_sync_and_statistics() {
        let results = run_parties(3, |_pid, mut player| {
            player.sync().unwrap();
            player.statistics()
        });
        for stat in &results {
            assert_eq!(stat.bytes_sent.iter().sum::<u64>(), 8);
            assert_eq!(stat.bytes_recv.iter().sum::<u64>(), 8);
        }
    }

    #[test]
    fn test_disconnected_peer_is_transport_error() {
        let mut players = local_players(2);
        let p1 = players.pop().unwrap();
        drop(p1);
        let mut p0 = players.pop().unwrap();
        assert!(matches!(
            p0.recv(1, 0),
            Err(crate::error::Error::Transport(_))
        ));
    }
}
