use std::net::SocketAddr;

use freeroam::PeerId;

/// Things the dispatch loop wants the console to know about.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connecting {
        addr: SocketAddr,
    },
    HandshakeRejected {
        addr: SocketAddr,
        reason: String,
    },
    PlayerJoined {
        id: PeerId,
        username: String,
    },
    PlayerLeft {
        id: PeerId,
        username: String,
        reason: String,
    },
    Chat {
        username: String,
        message: String,
    },
    Error {
        message: String,
    },
}
