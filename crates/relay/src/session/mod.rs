mod handshake;

use std::collections::HashMap;

use glam::Vec3;
use parking_lot::Mutex;

use crate::net::{PeerId, PlayerState};

pub use handshake::{Allowlist, Blocklist, HandshakeError, HandshakeValidator};

/// Authoritative view of one player, fed exclusively by that client's own
/// sync packets.
#[derive(Debug, Clone, Default)]
pub struct Player {
    pub social_club_name: String,
    pub username: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity: Vec3,
    pub health: i32,
    pub current_weapon: i32,
    pub aim_position: Vec3,
    pub speed: u8,
    pub flags: u8,
}

impl Player {
    /// Boundary-inclusive distance test used for all relevance decisions.
    pub fn is_in_range_of(&self, position: Vec3, radius: f32) -> bool {
        self.position.distance(position) <= radius
    }

    pub fn apply_state(&mut self, state: &PlayerState) {
        self.position = Vec3::from_array(state.position);
        self.rotation = Vec3::from_array(state.rotation);
        self.velocity = Vec3::from_array(state.velocity);
        self.health = state.health;
        self.current_weapon = state.current_weapon;
        self.aim_position = Vec3::from_array(state.aim_position);
        self.speed = state.speed;
        self.flags = state.flags;
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub id: PeerId,
    pub player: Player,
    /// Measured connection latency in seconds, updated by the transport's
    /// latency events.
    pub latency: f32,
}

impl Client {
    pub fn new(id: PeerId, social_club_name: String, username: String) -> Self {
        Self {
            id,
            player: Player {
                social_club_name,
                username,
                ..Player::default()
            },
            latency: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmitError {
    #[error("The name of the Social Club is already taken!")]
    SocialClubTaken,
    #[error("Username is already taken!")]
    UsernameTaken,
}

/// The connected-client set. All mutation goes through one mutex; the
/// dispatch thread is the only writer, while the heartbeat thread takes
/// stale-tolerant aggregate reads.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    clients: Mutex<HashMap<PeerId, Client>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn get(&self, id: PeerId) -> Option<Client> {
        self.clients.lock().get(&id).cloned()
    }

    pub fn find_by_username(&self, username: &str) -> Option<Client> {
        self.clients
            .lock()
            .values()
            .find(|c| c.player.username == username)
            .cloned()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.clients.lock().keys().copied().collect()
    }

    pub fn update<R>(&self, id: PeerId, f: impl FnOnce(&mut Client) -> R) -> Option<R> {
        self.clients.lock().get_mut(&id).map(f)
    }

    /// Run `f` against the full client map under the lock. Keep the closure
    /// short; the handshake path contends on the same mutex.
    pub fn with<R>(&self, f: impl FnOnce(&HashMap<PeerId, Client>) -> R) -> R {
        f(&self.clients.lock())
    }

    /// Uniqueness probe and insert as one atomic step, so two racing
    /// handshakes with the same identity cannot both succeed.
    pub fn try_admit(&self, client: Client) -> Result<(), AdmitError> {
        let mut clients = self.clients.lock();

        if clients
            .values()
            .any(|c| c.player.social_club_name == client.player.social_club_name)
        {
            return Err(AdmitError::SocialClubTaken);
        }
        if clients
            .values()
            .any(|c| c.player.username == client.player.username)
        {
            return Err(AdmitError::UsernameTaken);
        }

        clients.insert(client.id, client);
        Ok(())
    }

    pub fn remove(&self, id: PeerId) -> Option<Client> {
        self.clients.lock().remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_rejects_duplicate_social_club_name() {
        let registry = SessionRegistry::new();
        registry
            .try_admit(Client::new(1, "club".into(), "alpha".into()))
            .unwrap();

        let err = registry
            .try_admit(Client::new(2, "club".into(), "bravo".into()))
            .unwrap_err();
        assert_eq!(err, AdmitError::SocialClubTaken);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn admit_rejects_duplicate_username() {
        let registry = SessionRegistry::new();
        registry
            .try_admit(Client::new(1, "one".into(), "alpha".into()))
            .unwrap();

        let err = registry
            .try_admit(Client::new(2, "two".into(), "alpha".into()))
            .unwrap_err();
        assert_eq!(err, AdmitError::UsernameTaken);
    }

    #[test]
    fn remove_yields_the_client_exactly_once() {
        let registry = SessionRegistry::new();
        registry
            .try_admit(Client::new(7, "club".into(), "alpha".into()))
            .unwrap();

        assert!(registry.remove(7).is_some());
        assert!(registry.remove(7).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn range_test_is_boundary_inclusive() {
        let mut player = Player::default();
        player.position = Vec3::ZERO;

        assert!(player.is_in_range_of(Vec3::new(550.0, 0.0, 0.0), 550.0));
        assert!(!player.is_in_range_of(Vec3::new(550.01, 0.0, 0.0), 550.0));
    }

    #[test]
    fn apply_state_updates_tracked_fields() {
        let mut player = Player::default();
        let state = PlayerState {
            id: 1,
            health: 150,
            position: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 45.0],
            velocity: [0.5, 0.0, 0.0],
            speed: 3,
            aim_position: [9.0, 9.0, 9.0],
            current_weapon: 42,
            flags: 2,
            latency: 0.0,
        };

        player.apply_state(&state);
        assert_eq!(player.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(player.health, 150);
        assert_eq!(player.current_weapon, 42);
        assert_eq!(player.speed, 3);
    }
}
