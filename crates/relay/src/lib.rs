pub mod command;
pub mod net;
pub mod script;
pub mod session;
pub mod sync;

pub use command::{
    COMMAND_PREFIX, CommandContext, CommandError, CommandHandler, CommandOutcome, CommandRegistry,
};
pub use net::{
    COMPATIBLE_VERSION, CONNECTION_TIMEOUT, ChatMessage, CodecError, DEFAULT_PORT,
    DEFAULT_TICK_RATE, Delivery, FullPlayerSync, Handshake, LightPlayerSync, MAX_PACKET_SIZE,
    MOD_TARGET_ALL, MOD_TARGET_NONE, ModData, NPC_SHARE_RADIUS, NPC_STALE_TIMEOUT_MS,
    NetworkEndpoint, NetworkStats, NpcSync, PLAYER_RELEVANCE_RADIUS, Packet, PedFlags, PeerId,
    PlayerConnect, PlayerDisconnect, PlayerState, SuperLightPlayerSync, TransportError,
    TransportEvent, compatible_version_display,
};
pub use script::{CommandDef, ScriptCatalog, ScriptConstructor, ScriptHost, ServerScript};
pub use session::{
    Allowlist, Blocklist, Client, HandshakeError, HandshakeValidator, Player, SessionRegistry,
};
pub use sync::{PlayerSync, SyncError, relay_npc_sync, relay_player_sync};
