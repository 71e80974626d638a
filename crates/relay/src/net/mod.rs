mod protocol;
mod transport;

pub use protocol::{
    COMPATIBLE_VERSION, ChatMessage, CodecError, DEFAULT_PORT, DEFAULT_TICK_RATE, FullPlayerSync,
    Handshake, LightPlayerSync, MAX_PACKET_SIZE, MOD_TARGET_ALL, MOD_TARGET_NONE, ModData,
    NPC_SHARE_RADIUS, NPC_STALE_TIMEOUT_MS, NpcSync, PLAYER_RELEVANCE_RADIUS, Packet, PedFlags,
    PlayerConnect, PlayerDisconnect, PlayerState, SuperLightPlayerSync, compatible_version_display,
};
pub use transport::{
    CONNECTION_TIMEOUT, Delivery, NetworkEndpoint, NetworkStats, PeerConnection, PeerId, PeerState,
    TransportError, TransportEvent, sequence_greater_than,
};
