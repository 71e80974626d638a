use rkyv::{Archive, Deserialize, Serialize, rancor};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const DEFAULT_PORT: u16 = 4499;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Clients whose mod version string starts with this prefix may join.
pub const COMPATIBLE_VERSION: &str = "V0_8_0_1";

/// Recipients inside this radius of a player get full-fidelity sync.
pub const PLAYER_RELEVANCE_RADIUS: f32 = 550.0;
/// Radius within which a sharing client gathers NPCs around its own player.
pub const NPC_SHARE_RADIUS: f32 = 150.0;
/// Receivers discard proxied NPCs not refreshed within this window.
pub const NPC_STALE_TIMEOUT_MS: u64 = 2500;

/// Version prefix with dots instead of underscores, for user-facing text.
pub fn compatible_version_display() -> String {
    COMPATIBLE_VERSION.replace('_', ".")
}

bitflags::bitflags! {
    /// Per-update ped state bits carried in the sync payloads.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PedFlags: u8 {
        const LAST_SYNC_WAS_FULL = 1 << 0;
        const IS_AIMING = 1 << 1;
        const IS_SHOOTING = 1 << 2;
        const IS_RELOADING = 1 << 3;
        const IS_JUMPING = 1 << 4;
        const IS_RAGDOLL = 1 << 5;
        const IS_ON_FIRE = 1 << 6;
    }
}

/// Sent as the connection-approval payload, and echoed back (with the
/// assigned id and server policy flags) on acceptance.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Handshake {
    pub id: u64,
    pub social_club_name: String,
    pub username: String,
    pub mod_version: String,
    pub npcs_allowed: bool,
}

impl Handshake {
    /// The acceptance reply: identity fields are left empty, only the
    /// assigned id and policy flags matter to the client.
    pub fn acceptance(id: u64, npcs_allowed: bool) -> Self {
        Self {
            id,
            social_club_name: String::new(),
            username: String::new(),
            mod_version: String::new(),
            npcs_allowed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerConnect {
    pub id: u64,
    pub social_club_name: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerDisconnect {
    pub id: u64,
}

/// Shared body of the full and light player sync packets.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerState {
    pub id: u64,
    pub health: i32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub velocity: [f32; 3],
    pub speed: u8,
    pub aim_position: [f32; 3],
    pub current_weapon: i32,
    pub flags: u8,
    /// Stamped by the server from the measured connection latency before
    /// forwarding; whatever the client sent here is overwritten.
    pub latency: f32,
}

impl PlayerState {
    pub fn ped_flags(&self) -> PedFlags {
        PedFlags::from_bits_truncate(self.flags)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct FullPlayerSync {
    pub state: PlayerState,
    pub model_hash: i32,
    pub props: Vec<(i32, i32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct LightPlayerSync {
    pub state: PlayerState,
}

/// Reduced-field update sent to recipients outside the relevance radius.
/// Never carries the prop/appearance payload.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SuperLightPlayerSync {
    pub id: u64,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub health: i32,
    pub aim_position: [f32; 3],
    pub current_weapon: i32,
}

impl SuperLightPlayerSync {
    pub fn from_state(state: &PlayerState) -> Self {
        Self {
            id: state.id,
            position: state.position,
            rotation: state.rotation,
            health: state.health,
            aim_position: state.aim_position,
            current_weapon: state.current_weapon,
        }
    }
}

/// Client-proxied NPC state; the server relays these between clients in
/// range and keeps no NPC state of its own.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct NpcSync {
    pub npc_id: u64,
    pub model_hash: i32,
    pub props: Vec<(i32, i32)>,
    pub health: i32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub velocity: [f32; 3],
    pub speed: u8,
    pub aim_position: [f32; 3],
    pub current_weapon: i32,
    pub flags: u8,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
}

/// Drop the packet after the extension hook has seen it.
pub const MOD_TARGET_NONE: i64 = -1;
/// Relay the packet to every connected client.
pub const MOD_TARGET_ALL: i64 = 0;

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ModData {
    pub id: u64,
    /// `MOD_TARGET_NONE`, `MOD_TARGET_ALL`, or a connection id.
    pub target: i64,
    pub name: String,
    pub custom_packet_id: i32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Handshake(Handshake),
    PlayerConnect(PlayerConnect),
    PlayerDisconnect(PlayerDisconnect),
    FullSyncPlayer(FullPlayerSync),
    LightSyncPlayer(LightPlayerSync),
    SuperLightSyncPlayer(SuperLightPlayerSync),
    FullSyncNpc(NpcSync),
    ChatMessage(ChatMessage),
    Mod(ModData),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("packet truncated: {0} bytes")]
    Truncated(usize),
    #[error("declared payload length {declared} exceeds available {available} bytes")]
    LengthMismatch { declared: usize, available: usize },
    #[error("unknown packet tag {0}")]
    UnknownTag(u8),
    #[error("payload serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("payload deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

macro_rules! encode_payload {
    ($value:expr) => {
        rkyv::to_bytes::<rancor::Error>($value)
            .map_err(CodecError::Serialize)?
            .into_vec()
    };
}

macro_rules! decode_payload {
    ($ty:ty, $bytes:expr) => {
        rkyv::from_bytes::<$ty, rancor::Error>($bytes).map_err(CodecError::Deserialize)?
    };
}

impl Packet {
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Handshake(_) => 0,
            Packet::PlayerConnect(_) => 1,
            Packet::PlayerDisconnect(_) => 2,
            Packet::FullSyncPlayer(_) => 3,
            Packet::LightSyncPlayer(_) => 4,
            Packet::SuperLightSyncPlayer(_) => 5,
            Packet::FullSyncNpc(_) => 6,
            Packet::ChatMessage(_) => 7,
            Packet::Mod(_) => 8,
        }
    }

    /// Encode as `[tag][payload length, u32 LE][payload]`.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let payload = match self {
            Packet::Handshake(p) => encode_payload!(p),
            Packet::PlayerConnect(p) => encode_payload!(p),
            Packet::PlayerDisconnect(p) => encode_payload!(p),
            Packet::FullSyncPlayer(p) => encode_payload!(p),
            Packet::LightSyncPlayer(p) => encode_payload!(p),
            Packet::SuperLightSyncPlayer(p) => encode_payload!(p),
            Packet::FullSyncNpc(p) => encode_payload!(p),
            Packet::ChatMessage(p) => encode_payload!(p),
            Packet::Mod(p) => encode_payload!(p),
        };

        let mut out = Vec::with_capacity(5 + payload.len());
        out.push(self.tag());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode a single message. The declared payload length is validated
    /// against the bytes actually present before any payload parsing.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < 5 {
            return Err(CodecError::Truncated(data.len()));
        }

        let tag = data[0];
        let declared = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
        let available = data.len() - 5;
        if declared > available {
            return Err(CodecError::LengthMismatch {
                declared,
                available,
            });
        }
        let payload = &data[5..5 + declared];

        Ok(match tag {
            0 => Packet::Handshake(decode_payload!(Handshake, payload)),
            1 => Packet::PlayerConnect(decode_payload!(PlayerConnect, payload)),
            2 => Packet::PlayerDisconnect(decode_payload!(PlayerDisconnect, payload)),
            3 => Packet::FullSyncPlayer(decode_payload!(FullPlayerSync, payload)),
            4 => Packet::LightSyncPlayer(decode_payload!(LightPlayerSync, payload)),
            5 => Packet::SuperLightSyncPlayer(decode_payload!(SuperLightPlayerSync, payload)),
            6 => Packet::FullSyncNpc(decode_payload!(NpcSync, payload)),
            7 => Packet::ChatMessage(decode_payload!(ChatMessage, payload)),
            8 => Packet::Mod(decode_payload!(ModData, payload)),
            other => return Err(CodecError::UnknownTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(id: u64) -> PlayerState {
        PlayerState {
            id,
            health: 200,
            position: [10.0, -4.5, 30.25],
            rotation: [0.0, 0.0, 90.0],
            velocity: [1.0, 0.0, 0.0],
            speed: 2,
            aim_position: [0.0, 0.0, 0.0],
            current_weapon: -1569615261,
            flags: PedFlags::IS_AIMING.bits(),
            latency: 0.0,
        }
    }

    #[test]
    fn frame_layout_is_tag_length_payload() {
        let packet = Packet::PlayerDisconnect(PlayerDisconnect { id: 7 });
        let encoded = packet.encode().unwrap();

        assert_eq!(encoded[0], 2);
        let declared = u32::from_le_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]);
        assert_eq!(declared as usize, encoded.len() - 5);
    }

    #[test]
    fn handshake_round_trip() {
        let packet = Packet::Handshake(Handshake {
            id: 0,
            social_club_name: "scarface".to_string(),
            username: "Tony1".to_string(),
            mod_version: "V0_8_0_1_build3".to_string(),
            npcs_allowed: false,
        });

        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn full_sync_round_trip() {
        let packet = Packet::FullSyncPlayer(FullPlayerSync {
            state: sample_state(42),
            model_hash: 225514697,
            props: vec![(0, 1), (4, 12)],
        });

        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn declared_length_must_fit() {
        let mut encoded = Packet::PlayerDisconnect(PlayerDisconnect { id: 1 })
            .encode()
            .unwrap();
        encoded[1..5].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            Packet::decode(&encoded),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn truncated_frame_is_an_error() {
        assert!(matches!(
            Packet::decode(&[3, 0, 0]),
            Err(CodecError::Truncated(3))
        ));
    }

    #[test]
    fn unknown_tag_is_reported() {
        let encoded = [200u8, 0, 0, 0, 0];
        assert!(matches!(
            Packet::decode(&encoded),
            Err(CodecError::UnknownTag(200))
        ));
    }

    #[test]
    fn super_light_keeps_only_reduced_fields() {
        let state = sample_state(9);
        let reduced = SuperLightPlayerSync::from_state(&state);

        assert_eq!(reduced.id, 9);
        assert_eq!(reduced.position, state.position);
        assert_eq!(reduced.rotation, state.rotation);
        assert_eq!(reduced.health, state.health);
        assert_eq!(reduced.aim_position, state.aim_position);
        assert_eq!(reduced.current_weapon, state.current_weapon);
    }

    #[test]
    fn ped_flags_accessor_ignores_unknown_bits() {
        let mut state = sample_state(1);
        state.flags = 0b1000_0010;
        assert_eq!(state.ped_flags(), PedFlags::IS_AIMING);
    }
}
