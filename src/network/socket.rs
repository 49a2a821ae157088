//! Socket transport over plain TCP or TLS.
//!
//! Every ordered pair of parties owns two sockets, one per direction, so
//! a concurrent send and receive with the same peer never contend. The
//! higher id dials the lower id twice (once per direction); both ends
//! run an id-and-direction handshake and fail on mismatch, acceptor
//! reading first on the lower id and the dialer writing first on the
//! higher. TLS sessions, when enabled, handshake right after, the dialer
//! verifying the acceptor's hostname `"Party<id>"`.
//!
//! Frames are an 8-byte little-endian length followed by that many
//! payload bytes. Sends pass through a per-peer token bucket; when a
//! rate is set, the payload is chunked into dynamically halving packets
//! bounded above by the bucket capacity and below by roughly 2 ms worth
//! of bytes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::try_join_all;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tracing::debug;

use super::bucket::TokenBucket;
use super::tls::TlsContext;
use super::{ring_neighbor, MultiPartyPlayer, PartyId, PartySet, Statistics};
use crate::error::{ensure_contract, Error, Result};

trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

type BoxStream = Box<dyn AsyncStream>;

fn net_err(what: &str, err: impl std::fmt::Display) -> Error {
    Error::Transport(format!("{what}: {err}"))
}

fn stopped() -> Error {
    Error::Transport("transport stopped".into())
}

/// Minimum chunk the rate limiter will put on the wire, as a duration
/// worth of bytes at the configured rate.
const MIN_PACKET_DURATION: Duration = Duration::from_millis(2);

struct Sender {
    stream: BoxStream,
    bucket: TokenBucket,
    delay: Duration,
    bytes_sent: u64,
    elapsed: Duration,
}

impl Sender {
    fn new(stream: BoxStream) -> Self {
        Self {
            stream,
            bucket: TokenBucket::unlimited(),
            delay: Duration::ZERO,
            bytes_sent: 0,
            elapsed: Duration::ZERO,
        }
    }

    async fn send_frame(&mut self, message: &Bytes) -> Result<()> {
        let start = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let size = (message.len() as u64).to_le_bytes();
        self.stream.write_all(&size).await.map_err(|e| net_err("send size", e))?;
        if self.bucket.is_unlimited() {
            self.stream.write_all(message).await.map_err(|e| net_err("send", e))?;
        } else {
            self.send_chunked(message).await?;
        }
        self.stream.flush().await.map_err(|e| net_err("flush", e))?;
        self.bytes_sent += message.len() as u64;
        self.elapsed += start.elapsed();
        Ok(())
    }

    /// Splits the buffer into packets that start large and halve as the
    /// transfer proceeds, each packet waiting for its tokens.
    async fn send_chunked(&mut self, message: &Bytes) -> Result<()> {
        let rate = self.bucket.rate().expect("chunked send requires a rate");
        let min_packet = ((MIN_PACKET_DURATION.as_secs_f64() * rate) as u64).max(1);
        let max_packet = self.bucket.capacity();
        ensure_contract!(min_packet < max_packet, "bucket capacity too small for its rate");

        let len = message.len() as u64;
        if len < min_packet {
            self.bucket.require(len).await?;
            self.stream.write_all(message).await.map_err(|e| net_err("send", e))?;
            return Ok(());
        }

        let mut initial_d = 1u32;
        while (len >> initial_d) >= max_packet {
            initial_d += 1;
        }

        let mut sent = 0u64;
        let mut d = initial_d;
        let mut i = 0u64;
        while sent < len {
            // hold the initial split for its first 2^initial_d - 1 packets
            if i < (1u64 << initial_d) - 1 {
                d = initial_d;
            }
            let mut packet = len >> d;
            if packet <= min_packet {
                packet = len - sent;
            }
            let packet = packet.min(len - sent);
            self.bucket.require(packet).await?;
            self.stream
                .write_all(&message[sent as usize..(sent + packet) as usize])
                .await
                .map_err(|e| net_err("send", e))?;
            sent += packet;
            i += 1;
            d += 1;
        }
        Ok(())
    }
}

struct Recver {
    stream: BoxStream,
    bytes_recv: u64,
    elapsed: Duration,
}

impl Recver {
    fn new(stream: BoxStream) -> Self {
        Self { stream, bytes_recv: 0, elapsed: Duration::ZERO }
    }

    async fn recv_frame(&mut self, size_hint: usize) -> Result<Vec<u8>> {
        let start = Instant::now();
        let mut size = [0u8; 8];
        self.stream.read_exact(&mut size).await.map_err(|e| net_err("recv size", e))?;
        let size = u64::from_le_bytes(size) as usize;
        let mut message = Vec::with_capacity(size.max(size_hint));
        message.resize(size, 0);
        self.stream.read_exact(&mut message).await.map_err(|e| net_err("recv", e))?;
        self.bytes_recv += size as u64;
        self.elapsed += start.elapsed();
        Ok(message)
    }
}

/// Transport endpoint over TCP or TLS sockets.
///
/// The async runtime backing the sockets is owned by the player; every
/// trait method blocks the calling thread until its collective
/// completes. [`SocketPlayer::stop`] aborts whatever is in flight and
/// makes later calls fail.
pub struct SocketPlayer {
    my_pid: PartyId,
    n_parties: usize,
    runtime: Option<Runtime>,
    senders: Vec<Option<Sender>>,
    recvers: Vec<Option<Recver>>,
    blocked: Duration,
}

impl SocketPlayer {
    /// Connects all parties over plain TCP.
    ///
    /// `endpoints` is indexed by party id; entry `my_pid` is the local
    /// listen address. `n_threads` sizes the runtime's worker pool and
    /// `timeout` bounds the whole session setup.
    pub fn connect_plain(
        my_pid: PartyId,
        endpoints: &[SocketAddr],
        n_threads: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Self::connect(my_pid, endpoints, None, n_threads, timeout)
    }

    /// Connects all parties over TLS, loading keys from `ssl_dir`.
    pub fn connect_tls(
        my_pid: PartyId,
        endpoints: &[SocketAddr],
        ssl_dir: &std::path::Path,
        n_threads: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let tls = TlsContext::load(ssl_dir, my_pid, endpoints.len())?;
        Self::connect(my_pid, endpoints, Some(tls), n_threads, timeout)
    }

    fn connect(
        my_pid: PartyId,
        endpoints: &[SocketAddr],
        tls: Option<TlsContext>,
        n_threads: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let n_parties = endpoints.len();
        ensure_contract!(my_pid < n_parties, "party id {my_pid} out of range");
        ensure_contract!(n_parties >= 2, "a session needs at least two parties");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(n_threads.max(1))
            .enable_all()
            .build()
            .map_err(|e| net_err("runtime", e))?;

        let streams = runtime
            .block_on(async {
                tokio::time::timeout(timeout, establish(my_pid, endpoints, tls)).await
            })
            .map_err(|_| Error::Timeout(timeout))??;

        let mut senders: Vec<Option<Sender>> = (0..n_parties).map(|_| None).collect();
        let mut recvers: Vec<Option<Recver>> = (0..n_parties).map(|_| None).collect();
        for (peer, dir, stream) in streams {
            let slot_free = match dir {
                Direction::Outbound => {
                    let free = senders[peer].is_none();
                    if free {
                        senders[peer] = Some(Sender::new(stream));
                    }
                    free
                }
                Direction::Inbound => {
                    let free = recvers[peer].is_none();
                    if free {
                        recvers[peer] = Some(Recver::new(stream));
                    }
                    free
                }
            };
            ensure_contract!(slot_free, "duplicate connection from party {peer}");
        }
        for peer in 0..n_parties {
            if peer != my_pid {
                ensure_contract!(
                    senders[peer].is_some() && recvers[peer].is_some(),
                    "missing connection with party {peer}"
                );
            }
        }

        debug!(my_pid, n_parties, "session established");
        Ok(Self { my_pid, n_parties, runtime: Some(runtime), senders, recvers, blocked: Duration::ZERO })
    }

    /// Whether the transport is still usable.
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Aborts outstanding operations and releases every socket. Calls
    /// made afterwards fail with a "transport stopped" error.
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        for slot in &mut self.senders {
            *slot = None;
        }
        for slot in &mut self.recvers {
            *slot = None;
        }
    }

    /// Emulated extra latency applied before every send to `tos`.
    pub fn set_delay(&mut self, tos: PartySet, delay: Duration) {
        for peer in tos.iter() {
            if let Some(sender) = self.senders.get_mut(peer).and_then(Option::as_mut) {
                sender.delay = delay;
            }
        }
    }

    /// Token-bucket rate limit applied to sends to `tos`; `None`
    /// removes the limit.
    pub fn set_bucket(&mut self, tos: PartySet, rate_bytes_per_sec: Option<f64>, capacity: u64) {
        for peer in tos.iter() {
            if let Some(sender) = self.senders.get_mut(peer).and_then(Option::as_mut) {
                sender.bucket.set(rate_bytes_per_sec, capacity);
            }
        }
    }

    fn block_on<R>(&mut self, group_op: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let start = Instant::now();
        let out = group_op(self);
        self.blocked += start.elapsed();
        out
    }
}

impl Drop for SocketPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Direction {
    /// This end sends on the socket.
    Outbound,
    /// This end receives on the socket.
    Inbound,
}

const DIR_OUTBOUND: u8 = 0;
const DIR_INBOUND: u8 = 1;

async fn establish(
    my_pid: PartyId,
    endpoints: &[SocketAddr],
    tls: Option<TlsContext>,
) -> Result<Vec<(PartyId, Direction, BoxStream)>> {
    let n_parties = endpoints.len();
    let listener = TcpListener::bind(endpoints[my_pid])
        .await
        .map_err(|e| net_err(&format!("bind {}", endpoints[my_pid]), e))?;

    // let lower-id parties bind before we dial them
    tokio::time::sleep(Duration::from_millis(100) * my_pid as u32).await;

    let accept_count = (n_parties - 1 - my_pid) * 2;
    let (mut dialed, accepted) = tokio::try_join!(
        dial_lower(my_pid, endpoints, tls.clone()),
        accept_higher(my_pid, n_parties, &listener, tls.clone(), accept_count),
    )?;
    dialed.extend(accepted);
    Ok(dialed)
}

/// Dials each lower-id party twice, once per direction. The dialer
/// writes its id and the direction tag first, then reads the peer's id
/// back and verifies it.
async fn dial_lower(
    my_pid: PartyId,
    endpoints: &[SocketAddr],
    tls: Option<TlsContext>,
) -> Result<Vec<(PartyId, Direction, BoxStream)>> {
    let mut out = Vec::new();
    for peer in 0..my_pid {
        for dir_tag in [DIR_OUTBOUND, DIR_INBOUND] {
            let mut stream = dial_with_retry(endpoints[peer]).await?;
            stream
                .write_all(&(my_pid as u64).to_le_bytes())
                .await
                .map_err(|e| net_err("handshake send", e))?;
            stream.write_all(&[dir_tag]).await.map_err(|e| net_err("handshake send", e))?;
            let mut peer_id = [0u8; 8];
            stream.read_exact(&mut peer_id).await.map_err(|e| net_err("handshake recv", e))?;
            let peer_id = u64::from_le_bytes(peer_id) as usize;
            if peer_id != peer {
                return Err(Error::Transport(format!(
                    "handshake mismatch: dialed party {peer}, got {peer_id}"
                )));
            }
            let stream: BoxStream = match &tls {
                None => Box::new(stream),
                Some(tls) => {
                    let name = TlsContext::server_name(peer)?;
                    Box::new(
                        tls.connector()
                            .connect(name, stream)
                            .await
                            .map_err(|e| net_err("tls connect", e))?,
                    )
                }
            };
            debug!(my_pid, peer, dir_tag, "dialed");
            // tag 0 carries dialer-to-acceptor traffic: we send on it
            let dir = if dir_tag == DIR_OUTBOUND { Direction::Outbound } else { Direction::Inbound };
            out.push((peer, dir, stream));
        }
    }
    Ok(out)
}

async fn dial_with_retry(addr: SocketAddr) -> Result<TcpStream> {
    let mut last_err = None;
    for _ in 0..50 {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
    Err(net_err(
        &format!("connect {addr}"),
        last_err.expect("retry loop ran at least once"),
    ))
}

/// Accepts the expected number of sockets from higher-id parties. The
/// acceptor reads the dialer's id and direction tag first, writes its
/// own id back, then places the socket by the announced direction.
async fn accept_higher(
    my_pid: PartyId,
    n_parties: usize,
    listener: &TcpListener,
    tls: Option<TlsContext>,
    accept_count: usize,
) -> Result<Vec<(PartyId, Direction, BoxStream)>> {
    let mut out = Vec::new();
    for _ in 0..accept_count {
        let (mut stream, _addr) = listener.accept().await.map_err(|e| net_err("accept", e))?;
        let mut peer_id = [0u8; 8];
        stream.read_exact(&mut peer_id).await.map_err(|e| net_err("handshake recv", e))?;
        let peer_id = u64::from_le_bytes(peer_id) as usize;
        let mut dir_tag = [0u8; 1];
        stream.read_exact(&mut dir_tag).await.map_err(|e| net_err("handshake recv", e))?;
        if peer_id <= my_pid || peer_id >= n_parties {
            return Err(Error::Transport(format!(
                "handshake mismatch: unexpected party {peer_id}"
            )));
        }
        stream
            .write_all(&(my_pid as u64).to_le_bytes())
            .await
            .map_err(|e| net_err("handshake send", e))?;
        let stream: BoxStream = match &tls {
            None => Box::new(stream),
            Some(tls) => Box::new(
                tls.acceptor().accept(stream).await.map_err(|e| net_err("tls accept", e))?,
            ),
        };
        debug!(my_pid, peer_id, dir_tag = dir_tag[0], "accepted");
        // the dialer's tag 0 socket carries its sends: we receive on it
        let dir = if dir_tag[0] == DIR_OUTBOUND { Direction::Inbound } else { Direction::Outbound };
        out.push((peer_id, dir, stream));
    }
    Ok(out)
}

impl MultiPartyPlayer for SocketPlayer {
    fn id(&self) -> PartyId {
        self.my_pid
    }

    fn num_parties(&self) -> usize {
        self.n_parties
    }

    fn send(&mut self, to: PartyId, message: Bytes) -> Result<()> {
        self.block_on(|this| {
            ensure_contract!(to != this.my_pid && to < this.n_parties, "bad send target {to}");
            let runtime = this.runtime.as_ref().ok_or_else(stopped)?;
            let sender = this.senders[to].as_mut().ok_or_else(stopped)?;
            runtime.block_on(sender.send_frame(&message))
        })
    }

    fn recv(&mut self, from: PartyId, size_hint: usize) -> Result<Vec<u8>> {
        self.block_on(|this| {
            ensure_contract!(from != this.my_pid && from < this.n_parties, "bad recv source {from}");
            let runtime = this.runtime.as_ref().ok_or_else(stopped)?;
            let recver = this.recvers[from].as_mut().ok_or_else(stopped)?;
            runtime.block_on(recver.recv_frame(size_hint))
        })
    }

    fn exchange(&mut self, peer: PartyId, message: Bytes) -> Result<Vec<u8>> {
        self.block_on(|this| {
            ensure_contract!(peer != this.my_pid && peer < this.n_parties, "bad peer {peer}");
            let runtime = this.runtime.as_ref().ok_or_else(stopped)?;
            let size_hint = message.len();
            let sender = this.senders[peer].as_mut().ok_or_else(stopped)?;
            let recver = this.recvers[peer].as_mut().ok_or_else(stopped)?;
            runtime.block_on(async {
                let (_, got) =
                    tokio::try_join!(sender.send_frame(&message), recver.recv_frame(size_hint))?;
                Ok(got)
            })
        })
    }

    fn pass_around(&mut self, offset: i64, message: Bytes) -> Result<Vec<u8>> {
        self.block_on(|this| {
            let to = ring_neighbor(this.my_pid, this.n_parties, offset);
            let from = ring_neighbor(this.my_pid, this.n_parties, -offset);
            ensure_contract!(
                to != this.my_pid,
                "pass_around offset is a multiple of {}",
                this.n_parties
            );
            let runtime = this.runtime.as_ref().ok_or_else(stopped)?;
            let size_hint = message.len();
            let sender = this.senders[to].as_mut().ok_or_else(stopped)?;
            let recver = this.recvers[from].as_mut().ok_or_else(stopped)?;
            runtime.block_on(async {
                let (_, got) =
                    tokio::try_join!(sender.send_frame(&message), recver.recv_frame(size_hint))?;
                Ok(got)
            })
        })
    }

    fn broadcast(&mut self, message: Bytes) -> Result<()> {
        self.block_on(|this| {
            let runtime = this.runtime.as_ref().ok_or_else(stopped)?;
            let me = this.my_pid;
            let sends = this
                .senders
                .iter_mut()
                .enumerate()
                .filter(|(peer, slot)| *peer != me && slot.is_some())
                .map(|(_, slot)| {
                    let sender = slot.as_mut().expect("filtered on is_some");
                    sender.send_frame(&message)
                });
            runtime.block_on(try_join_all(sends))?;
            Ok(())
        })
    }

    fn mbroadcast_recv(&mut self, group: PartySet, message: Bytes) -> Result<Vec<Vec<u8>>> {
        self.block_on(|this| {
            let runtime = this.runtime.as_ref().ok_or_else(stopped)?;
            let me = this.my_pid;
            let n = this.n_parties;
            let size_hint = message.len();
            let senders = &mut this.senders;
            let recvers = &mut this.recvers;
            let got = runtime.block_on(async {
                let sends = senders
                    .iter_mut()
                    .enumerate()
                    .filter(|(peer, slot)| *peer != me && group.contains(*peer) && slot.is_some())
                    .map(|(_, slot)| {
                        let sender = slot.as_mut().expect("filtered on is_some");
                        sender.send_frame(&message)
                    });
                let recvs = recvers
                    .iter_mut()
                    .enumerate()
                    .filter(|(peer, slot)| *peer != me && group.contains(*peer) && slot.is_some())
                    .map(|(peer, slot)| {
                        let recver = slot.as_mut().expect("filtered on is_some");
                        async move { recver.recv_frame(size_hint).await.map(|m| (peer, m)) }
                    });
                let (_, got) = tokio::try_join!(try_join_all(sends), try_join_all(recvs))?;
                Ok::<_, Error>(got)
            })?;
            let mut out = vec![Vec::new(); n];
            for (peer, msg) in got {
                out[peer] = msg;
            }
            Ok(out)
        })
    }

    fn statistics(&self) -> Statistics {
        let mut stat = Statistics {
            bytes_sent: vec![0; self.n_parties],
            bytes_recv: vec![0; self.n_parties],
            elapsed_send: vec![Duration::ZERO; self.n_parties],
            elapsed_recv: vec![Duration::ZERO; self.n_parties],
            elapsed_total: self.blocked,
        };
        for (peer, slot) in self.senders.iter().enumerate() {
            if let Some(sender) = slot {
                stat.bytes_sent[peer] = sender.bytes_sent;
                stat.elapsed_send[peer] = sender.elapsed;
            }
        }
        for (peer, slot) in self.recvers.iter().enumerate() {
            if let Some(recver) = slot {
                stat.bytes_recv[peer] = recver.bytes_recv;
                stat.elapsed_recv[peer] = recver.elapsed;
            }
        }
        stat
    }
}
