//! Relevance-based fan-out planning for player and NPC state updates.
//!
//! Planning is a function of the incoming update and the current registry:
//! it mutates the sender's authoritative state, then decides per recipient
//! whether to forward the original packet or a reduced variant. The caller
//! ships the resulting pairs over the sequenced-unreliable channel.

use glam::Vec3;

use crate::net::{
    FullPlayerSync, LightPlayerSync, NpcSync, PLAYER_RELEVANCE_RADIUS, Packet, PeerId, PlayerState,
    SuperLightPlayerSync,
};
use crate::session::{Client, SessionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The update references an id the registry does not know. The sender
    /// gets disconnected with this text as the reason.
    #[error("No data found!")]
    UnknownPlayer(PeerId),
}

/// A full or light player update; both carry the same shared state and are
/// relayed identically, full updates additionally carrying appearance data.
#[derive(Debug, Clone)]
pub enum PlayerSync {
    Full(FullPlayerSync),
    Light(LightPlayerSync),
}

impl PlayerSync {
    pub fn state(&self) -> &PlayerState {
        match self {
            PlayerSync::Full(p) => &p.state,
            PlayerSync::Light(p) => &p.state,
        }
    }

    fn state_mut(&mut self) -> &mut PlayerState {
        match self {
            PlayerSync::Full(p) => &mut p.state,
            PlayerSync::Light(p) => &mut p.state,
        }
    }

    fn into_packet(self) -> Packet {
        match self {
            PlayerSync::Full(p) => Packet::FullSyncPlayer(p),
            PlayerSync::Light(p) => Packet::LightSyncPlayer(p),
        }
    }
}

/// Apply a player update and plan its fan-out.
///
/// The sender's registry state is updated and the packet stamped with the
/// sender's measured latency before anything is forwarded. Each other
/// client then independently gets either the original packet (its own
/// tracked position lies within the relevance radius of the sender's new
/// position) or a synthesized super-light variant. The test deliberately
/// uses the recipient's position only; two players outside each other's
/// radius both fall back to reduced data.
pub fn relay_player_sync(
    registry: &SessionRegistry,
    mut sync: PlayerSync,
) -> Result<(Client, Vec<(PeerId, Packet)>), SyncError> {
    let id = sync.state().id;
    let state = *sync.state();

    let updated = registry
        .update(id, |client| {
            client.player.apply_state(&state);
            client.clone()
        })
        .ok_or(SyncError::UnknownPlayer(id))?;

    sync.state_mut().latency = updated.latency;

    let position = Vec3::from_array(sync.state().position);
    let reduced = Packet::SuperLightSyncPlayer(SuperLightPlayerSync::from_state(sync.state()));
    let full = sync.into_packet();

    let plan = registry.with(|clients| {
        clients
            .values()
            .filter(|recipient| recipient.id != id)
            .map(|recipient| {
                if recipient
                    .player
                    .is_in_range_of(position, PLAYER_RELEVANCE_RADIUS)
                {
                    (recipient.id, full.clone())
                } else {
                    (recipient.id, reduced.clone())
                }
            })
            .collect()
    });

    Ok((updated, plan))
}

/// Recipients for a proxied NPC update: every client other than the sender
/// whose tracked position is within the relevance radius of the NPC's
/// reported position. An empty result means the packet is dropped.
pub fn relay_npc_sync(registry: &SessionRegistry, sender: PeerId, npc: &NpcSync) -> Vec<PeerId> {
    let position = Vec3::from_array(npc.position);

    registry.with(|clients| {
        clients
            .values()
            .filter(|recipient| {
                recipient.id != sender
                    && recipient
                        .player
                        .is_in_range_of(position, PLAYER_RELEVANCE_RADIUS)
            })
            .map(|recipient| recipient.id)
            .collect()
    })
}
