use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::protocol::{CodecError, MAX_PACKET_SIZE, Packet};

pub type PeerId = u64;

pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(1);
const RESEND_INTERVAL: Duration = Duration::from_millis(200);
const MAX_RESENDS: u32 = 10;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

const FRAME_CONNECT: u8 = 0;
const FRAME_APPROVE: u8 = 1;
const FRAME_DENY: u8 = 2;
const FRAME_DATA: u8 = 3;
const FRAME_ACK: u8 = 4;
const FRAME_DISCONNECT: u8 = 5;
const FRAME_PING: u8 = 6;
const FRAME_PONG: u8 = 7;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Retransmitted until acked, delivered in send order.
    ReliableOrdered,
    /// Never retransmitted; frames older than the last delivered one on the
    /// same channel are discarded by the receiver.
    UnreliableSequenced,
}

impl Delivery {
    fn to_wire(self) -> u8 {
        match self {
            Delivery::ReliableOrdered => 0,
            Delivery::UnreliableSequenced => 1,
        }
    }

    fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Delivery::ReliableOrdered),
            1 => Some(Delivery::UnreliableSequenced),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum TransportEvent {
    /// A new peer asked to connect; `payload` is its hail message. Answer
    /// with `approve` or `deny`.
    ConnectionRequest {
        peer: PeerId,
        addr: SocketAddr,
        payload: Vec<u8>,
    },
    /// Client side: the server accepted the connection.
    Approved { peer: PeerId, payload: Vec<u8> },
    /// Client side: the server refused the connection.
    Denied { reason: String },
    Data { peer: PeerId, payload: Vec<u8> },
    Disconnected { peer: PeerId, reason: String },
    /// Smoothed round-trip estimate for a connected peer changed.
    LatencyUpdated { peer: PeerId, seconds: f32 },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("datagram exceeds {MAX_PACKET_SIZE} bytes")]
    DatagramTooLarge,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug)]
struct RttEstimator {
    srtt_ms: f32,
    rtt_var_ms: f32,
}

impl RttEstimator {
    fn new() -> Self {
        Self {
            srtt_ms: 100.0,
            rtt_var_ms: 50.0,
        }
    }

    fn update(&mut self, rtt_ms: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt_ms - self.srtt_ms).abs();
        self.rtt_var_ms = (1.0 - BETA) * self.rtt_var_ms + BETA * diff;
        self.srtt_ms = (1.0 - ALPHA) * self.srtt_ms + ALPHA * rtt_ms;
    }

    fn seconds(&self) -> f32 {
        self.srtt_ms / 1000.0
    }
}

#[derive(Debug)]
struct PendingFrame {
    sequence: u32,
    bytes: Vec<u8>,
    last_sent: Instant,
    sends: u32,
}

/// Send/receive bookkeeping for one reliable-ordered channel.
#[derive(Debug, Default)]
struct ReliableChannel {
    next_send: u32,
    pending: VecDeque<PendingFrame>,
    next_deliver: u32,
    held: BTreeMap<u32, Vec<u8>>,
}

impl ReliableChannel {
    fn ack(&mut self, sequence: u32) {
        self.pending.retain(|frame| frame.sequence != sequence);
    }

    /// Returns the messages now deliverable in order, possibly none (early
    /// frames are held, stale ones dropped). Duplicates still get re-acked
    /// by the caller.
    fn receive(&mut self, sequence: u32, message: Vec<u8>) -> Vec<Vec<u8>> {
        let mut ready = Vec::new();

        if sequence == self.next_deliver {
            ready.push(message);
            self.next_deliver = self.next_deliver.wrapping_add(1);
            while let Some(held) = self.held.remove(&self.next_deliver) {
                ready.push(held);
                self.next_deliver = self.next_deliver.wrapping_add(1);
            }
        } else if sequence_greater_than(sequence, self.next_deliver) {
            self.held.insert(sequence, message);
        }

        ready
    }
}

#[derive(Debug, Default)]
struct SequencedChannel {
    next_send: u32,
    last_delivered: Option<u32>,
}

impl SequencedChannel {
    fn accept(&mut self, sequence: u32) -> bool {
        let newer = match self.last_delivered {
            None => true,
            Some(last) => sequence_greater_than(sequence, last),
        };
        if newer {
            self.last_delivered = Some(sequence);
        }
        newer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Pending,
    Connected,
}

#[derive(Debug)]
pub struct PeerConnection {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub state: PeerState,
    last_receive: Instant,
    last_ping: Instant,
    rtt: RttEstimator,
    reliable: HashMap<u8, ReliableChannel>,
    sequenced: HashMap<u8, SequencedChannel>,
}

impl PeerConnection {
    fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            state: PeerState::Pending,
            last_receive: Instant::now(),
            last_ping: Instant::now(),
            rtt: RttEstimator::new(),
            reliable: HashMap::new(),
            sequenced: HashMap::new(),
        }
    }

    fn touch(&mut self) {
        self.last_receive = Instant::now();
    }

    fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive.elapsed() > timeout
    }

    pub fn rtt_seconds(&self) -> f32 {
        self.rtt.seconds()
    }
}

#[derive(Debug, Default)]
struct PeerTable {
    by_addr: HashMap<SocketAddr, PeerId>,
    peers: HashMap<PeerId, PeerConnection>,
    next_peer_id: PeerId,
}

impl PeerTable {
    fn insert_pending(&mut self, addr: SocketAddr) -> &mut PeerConnection {
        self.next_peer_id += 1;
        let id = self.next_peer_id;

        self.by_addr.insert(addr, id);
        self.peers.insert(id, PeerConnection::new(id, addr));
        self.peers.get_mut(&id).expect("peer just inserted")
    }

    fn get(&self, id: PeerId) -> Option<&PeerConnection> {
        self.peers.get(&id)
    }

    fn get_mut(&mut self, id: PeerId) -> Option<&mut PeerConnection> {
        self.peers.get_mut(&id)
    }

    fn id_by_addr(&self, addr: &SocketAddr) -> Option<PeerId> {
        self.by_addr.get(addr).copied()
    }

    fn by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut PeerConnection> {
        let id = self.by_addr.get(addr)?;
        self.peers.get_mut(id)
    }

    fn remove(&mut self, id: PeerId) -> Option<PeerConnection> {
        let conn = self.peers.remove(&id)?;
        self.by_addr.remove(&conn.addr);
        Some(conn)
    }

    fn len(&self) -> usize {
        self.peers.len()
    }

    fn connected_count(&self) -> usize {
        self.peers
            .values()
            .filter(|p| p.state == PeerState::Connected)
            .count()
    }

    fn timed_out(&self, timeout: Duration) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|p| p.is_timed_out(timeout))
            .map(|p| p.id)
            .collect()
    }
}

/// Non-blocking UDP endpoint with connection handshaking, per-peer delivery
/// channels, and ping-based latency measurement. The server and the test
/// clients both speak through this type.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peers: PeerTable,
    max_peers: usize,
    events: VecDeque<TransportEvent>,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    stats: NetworkStats,
    epoch: Instant,
    timeout: Duration,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A, max_peers: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            peers: PeerTable::default(),
            max_peers,
            events: VecDeque::new(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            stats: NetworkStats::default(),
            epoch: Instant::now(),
            timeout: CONNECTION_TIMEOUT,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn connected_count(&self) -> usize {
        self.peers.connected_count()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.peers.keys().copied().collect()
    }

    pub fn peer_rtt_seconds(&self, peer: PeerId) -> Option<f32> {
        self.peers.get(peer).map(|p| p.rtt_seconds())
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Next pending event, pumping the socket when the queue runs dry.
    /// `None` means nothing further is available this tick.
    pub fn poll_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        self.pump();
        self.service();
        self.events.pop_front()
    }

    /// Client side: ask `server` to admit us, with `hail` as the
    /// connection-approval payload.
    pub fn connect(&mut self, server: SocketAddr, hail: &Packet) -> Result<PeerId, TransportError> {
        let message = hail.encode()?;
        let peer = match self.peers.id_by_addr(&server) {
            Some(id) => id,
            None => self.peers.insert_pending(server).id,
        };

        let mut frame = Vec::with_capacity(1 + message.len());
        frame.push(FRAME_CONNECT);
        frame.extend_from_slice(&message);
        self.send_raw(server, &frame)?;
        Ok(peer)
    }

    /// Admit a pending peer, shipping `reply` as the acceptance payload.
    pub fn approve(&mut self, peer: PeerId, reply: &Packet) -> Result<(), TransportError> {
        let message = reply.encode()?;
        let conn = self
            .peers
            .get_mut(peer)
            .ok_or(TransportError::UnknownPeer(peer))?;
        conn.state = PeerState::Connected;
        conn.last_ping = Instant::now();
        let addr = conn.addr;

        let mut frame = Vec::with_capacity(1 + message.len());
        frame.push(FRAME_APPROVE);
        frame.extend_from_slice(&message);
        self.send_raw(addr, &frame)?;
        Ok(())
    }

    /// Refuse a pending peer with a reason the client can display verbatim.
    pub fn deny(&mut self, peer: PeerId, reason: &str) {
        if let Some(conn) = self.peers.remove(peer) {
            let frame = string_frame(FRAME_DENY, reason);
            let _ = self.send_raw(conn.addr, &frame);
        }
    }

    /// Drop a peer, notifying it of `reason`. Also queues the matching
    /// `Disconnected` event locally so the caller's normal disconnect path
    /// runs for server-initiated drops too.
    pub fn disconnect(&mut self, peer: PeerId, reason: &str) {
        if let Some(conn) = self.peers.remove(peer) {
            let frame = string_frame(FRAME_DISCONNECT, reason);
            let _ = self.send_raw(conn.addr, &frame);
            self.events.push_back(TransportEvent::Disconnected {
                peer,
                reason: reason.to_string(),
            });
        }
    }

    pub fn send(
        &mut self,
        peer: PeerId,
        packet: &Packet,
        delivery: Delivery,
        channel: u8,
    ) -> Result<(), TransportError> {
        let message = packet.encode()?;
        let conn = self
            .peers
            .get_mut(peer)
            .ok_or(TransportError::UnknownPeer(peer))?;
        let addr = conn.addr;

        let mut frame = Vec::with_capacity(7 + message.len());
        frame.push(FRAME_DATA);
        frame.push(delivery.to_wire());
        frame.push(channel);

        match delivery {
            Delivery::UnreliableSequenced => {
                let ch = conn.sequenced.entry(channel).or_default();
                let sequence = ch.next_send;
                ch.next_send = ch.next_send.wrapping_add(1);
                frame.extend_from_slice(&sequence.to_le_bytes());
                frame.extend_from_slice(&message);
                if frame.len() > MAX_PACKET_SIZE {
                    return Err(TransportError::DatagramTooLarge);
                }
                send_datagram(&self.socket, &mut self.stats, addr, &frame)?;
            }
            Delivery::ReliableOrdered => {
                let ch = conn.reliable.entry(channel).or_default();
                let sequence = ch.next_send;
                ch.next_send = ch.next_send.wrapping_add(1);
                frame.extend_from_slice(&sequence.to_le_bytes());
                frame.extend_from_slice(&message);
                if frame.len() > MAX_PACKET_SIZE {
                    return Err(TransportError::DatagramTooLarge);
                }
                send_datagram(&self.socket, &mut self.stats, addr, &frame)?;
                ch.pending.push_back(PendingFrame {
                    sequence,
                    bytes: frame,
                    last_sent: Instant::now(),
                    sends: 1,
                });
            }
        }

        Ok(())
    }

    fn send_raw(&mut self, addr: SocketAddr, frame: &[u8]) -> Result<(), TransportError> {
        if frame.len() > MAX_PACKET_SIZE {
            return Err(TransportError::DatagramTooLarge);
        }
        send_datagram(&self.socket, &mut self.stats, addr, frame)?;
        Ok(())
    }

    /// Drain the socket until it would block; malformed datagrams are
    /// logged and dropped, never fatal.
    fn pump(&mut self) {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    let datagram = self.recv_buffer[..size].to_vec();
                    self.handle_datagram(&datagram, addr);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!("socket receive error: {e}");
                    break;
                }
            }
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8], addr: SocketAddr) {
        let Some((&kind, rest)) = datagram.split_first() else {
            return;
        };

        match kind {
            FRAME_CONNECT => self.handle_connect(rest, addr),
            FRAME_APPROVE => {
                if let Some(conn) = self.peers.by_addr_mut(&addr) {
                    conn.state = PeerState::Connected;
                    conn.touch();
                    let peer = conn.id;
                    self.events.push_back(TransportEvent::Approved {
                        peer,
                        payload: rest.to_vec(),
                    });
                }
            }
            FRAME_DENY => {
                if let Some(reason) = read_string(rest) {
                    if let Some(id) = self.peers.id_by_addr(&addr) {
                        self.peers.remove(id);
                    }
                    self.events.push_back(TransportEvent::Denied { reason });
                }
            }
            FRAME_DATA => self.handle_data(rest, addr),
            FRAME_ACK => {
                if rest.len() == 5 {
                    let channel = rest[0];
                    let sequence = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]);
                    if let Some(conn) = self.peers.by_addr_mut(&addr) {
                        conn.touch();
                        if let Some(ch) = conn.reliable.get_mut(&channel) {
                            ch.ack(sequence);
                        }
                    }
                }
            }
            FRAME_DISCONNECT => {
                if let Some(reason) = read_string(rest) {
                    if let Some(id) = self.peers.id_by_addr(&addr) {
                        self.peers.remove(id);
                        self.events
                            .push_back(TransportEvent::Disconnected { peer: id, reason });
                    }
                }
            }
            FRAME_PING => {
                if rest.len() == 8 {
                    if let Some(conn) = self.peers.by_addr_mut(&addr) {
                        conn.touch();
                        let mut frame = [0u8; 9];
                        frame[0] = FRAME_PONG;
                        frame[1..9].copy_from_slice(rest);
                        let _ = send_datagram(&self.socket, &mut self.stats, addr, &frame);
                    }
                }
            }
            FRAME_PONG => {
                if rest.len() == 8 {
                    let sent_ms = u64::from_le_bytes([
                        rest[0], rest[1], rest[2], rest[3], rest[4], rest[5], rest[6], rest[7],
                    ]);
                    let now_ms = self.epoch.elapsed().as_millis() as u64;
                    if let Some(conn) = self.peers.by_addr_mut(&addr) {
                        conn.touch();
                        conn.rtt.update(now_ms.saturating_sub(sent_ms) as f32);
                        let peer = conn.id;
                        let seconds = conn.rtt.seconds();
                        self.events
                            .push_back(TransportEvent::LatencyUpdated { peer, seconds });
                    }
                }
            }
            other => log::debug!("malformed datagram from {addr}: unknown frame kind {other}"),
        }
    }

    fn handle_connect(&mut self, payload: &[u8], addr: SocketAddr) {
        if self.peers.id_by_addr(&addr).is_some() {
            // Retry of a connect we already surfaced.
            return;
        }
        if self.peers.len() >= self.max_peers {
            let frame = string_frame(FRAME_DENY, "Server is full!");
            let _ = send_datagram(&self.socket, &mut self.stats, addr, &frame);
            return;
        }

        let peer = self.peers.insert_pending(addr).id;
        self.events.push_back(TransportEvent::ConnectionRequest {
            peer,
            addr,
            payload: payload.to_vec(),
        });
    }

    fn handle_data(&mut self, rest: &[u8], addr: SocketAddr) {
        if rest.len() < 6 {
            return;
        }
        let Some(delivery) = Delivery::from_wire(rest[0]) else {
            return;
        };
        let channel = rest[1];
        let sequence = u32::from_le_bytes([rest[2], rest[3], rest[4], rest[5]]);
        let message = &rest[6..];

        let Some(conn) = self.peers.by_addr_mut(&addr) else {
            log::debug!("data from unknown peer {addr} dropped");
            return;
        };
        conn.touch();
        let peer = conn.id;

        match delivery {
            Delivery::UnreliableSequenced => {
                if conn.sequenced.entry(channel).or_default().accept(sequence) {
                    self.events.push_back(TransportEvent::Data {
                        peer,
                        payload: message.to_vec(),
                    });
                }
            }
            Delivery::ReliableOrdered => {
                let ready = conn
                    .reliable
                    .entry(channel)
                    .or_default()
                    .receive(sequence, message.to_vec());

                let mut ack = [0u8; 6];
                ack[0] = FRAME_ACK;
                ack[1] = channel;
                ack[2..6].copy_from_slice(&sequence.to_le_bytes());
                let _ = send_datagram(&self.socket, &mut self.stats, addr, &ack);

                for payload in ready {
                    self.events.push_back(TransportEvent::Data { peer, payload });
                }
            }
        }
    }

    /// Timeouts, pings, and reliable retransmits.
    fn service(&mut self) {
        let now = Instant::now();

        let mut dead = self.peers.timed_out(self.timeout);

        let now_ms = self.epoch.elapsed().as_millis() as u64;
        for conn in self.peers.peers.values_mut() {
            if conn.state != PeerState::Connected {
                continue;
            }

            if now.duration_since(conn.last_ping) >= PING_INTERVAL {
                conn.last_ping = now;
                let mut frame = [0u8; 9];
                frame[0] = FRAME_PING;
                frame[1..9].copy_from_slice(&now_ms.to_le_bytes());
                let _ = send_datagram(&self.socket, &mut self.stats, conn.addr, &frame);
            }

            let mut exhausted = false;
            for ch in conn.reliable.values_mut() {
                for frame in ch.pending.iter_mut() {
                    if now.duration_since(frame.last_sent) < RESEND_INTERVAL {
                        continue;
                    }
                    if frame.sends >= MAX_RESENDS {
                        exhausted = true;
                        break;
                    }
                    frame.last_sent = now;
                    frame.sends += 1;
                    let _ = send_datagram(&self.socket, &mut self.stats, conn.addr, &frame.bytes);
                }
            }
            if exhausted && !dead.contains(&conn.id) {
                dead.push(conn.id);
            }
        }

        for id in dead {
            if self.peers.remove(id).is_some() {
                self.events.push_back(TransportEvent::Disconnected {
                    peer: id,
                    reason: "Connection timed out".to_string(),
                });
            }
        }
    }
}

fn send_datagram(
    socket: &UdpSocket,
    stats: &mut NetworkStats,
    addr: SocketAddr,
    frame: &[u8],
) -> io::Result<usize> {
    let bytes = socket.send_to(frame, addr)?;
    stats.packets_sent += 1;
    stats.bytes_sent += bytes as u64;
    Ok(bytes)
}

fn string_frame(kind: u8, text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut frame = Vec::with_capacity(5 + bytes.len());
    frame.push(kind);
    frame.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    frame.extend_from_slice(bytes);
    frame
}

fn read_string(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < 4 + len {
        return None;
    }
    String::from_utf8(data[4..4 + len].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn sequenced_channel_drops_stale() {
        let mut channel = SequencedChannel::default();

        assert!(channel.accept(0));
        assert!(channel.accept(5));
        assert!(!channel.accept(3));
        assert!(!channel.accept(5));
        assert!(channel.accept(6));
    }

    #[test]
    fn reliable_channel_orders_delivery() {
        let mut channel = ReliableChannel::default();

        assert_eq!(channel.receive(1, b"b".to_vec()), Vec::<Vec<u8>>::new());
        let ready = channel.receive(0, b"a".to_vec());
        assert_eq!(ready, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn reliable_channel_ignores_duplicates() {
        let mut channel = ReliableChannel::default();

        assert_eq!(channel.receive(0, b"a".to_vec()).len(), 1);
        assert!(channel.receive(0, b"a".to_vec()).is_empty());
    }

    #[test]
    fn reliable_ack_clears_pending() {
        let mut channel = ReliableChannel::default();
        channel.pending.push_back(PendingFrame {
            sequence: 3,
            bytes: vec![1, 2, 3],
            last_sent: Instant::now(),
            sends: 1,
        });

        channel.ack(2);
        assert_eq!(channel.pending.len(), 1);
        channel.ack(3);
        assert!(channel.pending.is_empty());
    }

    #[test]
    fn string_frame_round_trip() {
        let frame = string_frame(FRAME_DENY, "Wrong packet!");
        assert_eq!(frame[0], FRAME_DENY);
        assert_eq!(read_string(&frame[1..]).as_deref(), Some("Wrong packet!"));
    }

    #[test]
    fn read_string_rejects_short_buffers() {
        assert_eq!(read_string(&[10, 0, 0, 0, b'a']), None);
    }

    #[test]
    fn rtt_estimator_converges() {
        let mut rtt = RttEstimator::new();
        for _ in 0..100 {
            rtt.update(40.0);
        }
        assert!((rtt.seconds() - 0.04).abs() < 0.005);
    }
}
