use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use freeroam::{
    ChatMessage, CodecError, CommandOutcome, CommandRegistry, Delivery, Handshake,
    HandshakeValidator, MOD_TARGET_ALL, MOD_TARGET_NONE, ModData, NetworkEndpoint, NetworkStats,
    NpcSync, Packet, PeerId, PlayerConnect, PlayerDisconnect, PlayerSync, ScriptHost,
    SessionRegistry, SyncError, TransportEvent, relay_npc_sync, relay_player_sync,
};

use crate::config::Settings;
use crate::events::ServerEvent;

const DATA_CHANNEL: u8 = 0;

/// Why a data packet could not be handled; the display text becomes the
/// sender's disconnect reason.
#[derive(Debug, thiserror::Error)]
enum HandleError {
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error("{0}")]
    Sync(#[from] SyncError),
    #[error("No data found!")]
    UnknownSender,
    #[error("Npcs are not allowed!")]
    NpcsNotAllowed,
    #[error("Mods are not allowed!")]
    ModsNotAllowed,
}

pub struct RelayServer {
    transport: NetworkEndpoint,
    registry: Arc<SessionRegistry>,
    validator: HandshakeValidator,
    commands: CommandRegistry,
    script: ScriptHost,
    settings: Settings,
    tick_duration: Duration,
    pending_events: VecDeque<ServerEvent>,
    running: Arc<AtomicBool>,
    start_time: Instant,
}

impl RelayServer {
    pub fn new(
        bind_addr: &str,
        settings: Settings,
        validator: HandshakeValidator,
        script: ScriptHost,
        tick_rate: u32,
    ) -> anyhow::Result<Self> {
        let transport = NetworkEndpoint::bind(bind_addr, settings.max_players)?;

        let mut commands = CommandRegistry::new();
        script.install_commands(&mut commands)?;

        Ok(Self {
            transport,
            registry: Arc::new(SessionRegistry::new()),
            validator,
            commands,
            script,
            settings,
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate as f64),
            pending_events: VecDeque::new(),
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();
            self.tick_once();

            let elapsed = tick_start.elapsed();
            if elapsed < self.tick_duration {
                std::thread::sleep(self.tick_duration - elapsed);
            }
        }
        self.shutdown_connections();
    }

    /// Drain every pending transport event, then return so the caller can
    /// sleep out the rest of the tick.
    pub fn tick_once(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            self.handle_transport_event(event);
        }
    }

    pub fn shutdown_connections(&mut self) {
        for peer in self.transport.peer_ids() {
            self.transport.disconnect(peer, "Server is shutting down!");
        }
        // Let the disconnect events run their broadcast path.
        self.tick_once();
    }

    pub fn kick(&mut self, peer: PeerId) {
        self.transport.disconnect(peer, "You have been kicked!");
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionRequest {
                peer,
                addr,
                payload,
            } => self.handle_connection_request(peer, addr, &payload),
            TransportEvent::Disconnected { peer, reason } => {
                self.handle_peer_disconnected(peer, &reason);
            }
            TransportEvent::Data { peer, payload } => {
                if let Err(error) = self.handle_data(peer, &payload) {
                    let reason = error.to_string();
                    log::warn!("peer {peer} disconnected: {reason}");
                    self.transport.disconnect(peer, &reason);
                }
            }
            TransportEvent::LatencyUpdated { peer, seconds } => {
                let _ = self.registry.update(peer, |client| client.latency = seconds);
            }
            // Client-side events; a server endpoint never sees them.
            TransportEvent::Approved { .. } | TransportEvent::Denied { .. } => {}
        }
    }

    fn handle_connection_request(&mut self, peer: PeerId, addr: SocketAddr, payload: &[u8]) {
        log::info!("new incoming connection from {addr}");
        self.pending_events.push_back(ServerEvent::Connecting { addr });

        let request = match Packet::decode(payload) {
            Ok(Packet::Handshake(request)) => request,
            _ => {
                self.reject(peer, addr, "Wrong packet!");
                return;
            }
        };

        match self
            .validator
            .admit(&self.registry, peer, &request, addr.ip())
        {
            Ok(client) => {
                let reply =
                    Packet::Handshake(Handshake::acceptance(peer, self.settings.npcs_allowed));
                if let Err(e) = self.transport.approve(peer, &reply) {
                    let _ = self.registry.remove(peer);
                    self.pending_events.push_back(ServerEvent::Error {
                        message: format!("failed to approve {addr}: {e}"),
                    });
                    return;
                }
                self.script.player_handshake(&client);
            }
            Err(reason) => self.reject(peer, addr, &reason.to_string()),
        }
    }

    fn reject(&mut self, peer: PeerId, addr: SocketAddr, reason: &str) {
        log::info!("connection from {addr} blocked: {reason}");
        self.transport.deny(peer, reason);
        self.pending_events.push_back(ServerEvent::HandshakeRejected {
            addr,
            reason: reason.to_string(),
        });
    }

    /// Remove exactly once and broadcast exactly once, no matter how many
    /// disconnect signals race in for the same peer.
    fn handle_peer_disconnected(&mut self, peer: PeerId, reason: &str) {
        let Some(client) = self.registry.remove(peer) else {
            return;
        };

        let packet = Packet::PlayerDisconnect(PlayerDisconnect { id: peer });
        for other in self.registry.ids() {
            if let Err(e) = self
                .transport
                .send(other, &packet, Delivery::ReliableOrdered, DATA_CHANNEL)
            {
                log::debug!("disconnect broadcast to {other} failed: {e}");
            }
        }

        self.script.player_disconnected(&client);
        self.pending_events.push_back(ServerEvent::PlayerLeft {
            id: peer,
            username: client.player.username,
            reason: reason.to_string(),
        });
    }

    fn handle_data(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), HandleError> {
        let packet = match Packet::decode(payload) {
            Ok(packet) => packet,
            Err(CodecError::UnknownTag(tag)) => {
                log::error!("unhandled packet type {tag} from peer {peer}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match packet {
            Packet::Handshake(_) | Packet::SuperLightSyncPlayer(_) => {
                log::warn!("unexpected {} packet from peer {peer}", packet_name(&packet));
                Ok(())
            }
            Packet::PlayerConnect(p) => self.handle_player_connect(peer, p),
            Packet::PlayerDisconnect(p) => {
                self.handle_peer_disconnected(p.id, "disconnected");
                Ok(())
            }
            Packet::FullSyncPlayer(p) => self.handle_player_sync(PlayerSync::Full(p)),
            Packet::LightSyncPlayer(p) => self.handle_player_sync(PlayerSync::Light(p)),
            Packet::FullSyncNpc(p) => {
                if !self.settings.npcs_allowed {
                    return Err(HandleError::NpcsNotAllowed);
                }
                self.handle_npc_sync(peer, p)
            }
            Packet::ChatMessage(p) => self.handle_chat(peer, p),
            Packet::Mod(p) => {
                if !self.settings.mods_allowed {
                    return Err(HandleError::ModsNotAllowed);
                }
                self.handle_mod_packet(p);
                Ok(())
            }
        }
    }

    /// The freshly approved client announces itself: greet it, tell it
    /// about everyone else, and tell everyone else about it.
    fn handle_player_connect(
        &mut self,
        peer: PeerId,
        packet: PlayerConnect,
    ) -> Result<(), HandleError> {
        let client = self
            .registry
            .get(packet.id)
            .ok_or(HandleError::UnknownSender)?;

        if !self.settings.welcome_message.is_empty() {
            let welcome = self.settings.welcome_message.clone();
            self.send_server_chat(peer, &welcome);
        }

        let others: Vec<PlayerConnect> = self.registry.with(|clients| {
            clients
                .values()
                .filter(|c| c.id != packet.id)
                .map(|c| PlayerConnect {
                    id: c.id,
                    social_club_name: c.player.social_club_name.clone(),
                    username: c.player.username.clone(),
                })
                .collect()
        });

        let announcement = Packet::PlayerConnect(PlayerConnect {
            id: client.id,
            social_club_name: client.player.social_club_name.clone(),
            username: client.player.username.clone(),
        });

        for other in others {
            let recipient = other.id;
            let existing = Packet::PlayerConnect(other);
            if let Err(e) =
                self.transport
                    .send(peer, &existing, Delivery::ReliableOrdered, DATA_CHANNEL)
            {
                log::debug!("player list send to {peer} failed: {e}");
            }
            if let Err(e) = self.transport.send(
                recipient,
                &announcement,
                Delivery::ReliableOrdered,
                DATA_CHANNEL,
            ) {
                log::debug!("connect broadcast to {recipient} failed: {e}");
            }
        }

        self.script.player_connected(&client);
        self.pending_events.push_back(ServerEvent::PlayerJoined {
            id: client.id,
            username: client.player.username.clone(),
        });
        Ok(())
    }

    fn handle_player_sync(&mut self, sync: PlayerSync) -> Result<(), HandleError> {
        let (client, plan) = relay_player_sync(&self.registry, sync)?;

        for (recipient, packet) in plan {
            if let Err(e) = self.transport.send(
                recipient,
                &packet,
                Delivery::UnreliableSequenced,
                DATA_CHANNEL,
            ) {
                log::debug!("state sync to {recipient} failed: {e}");
            }
        }

        self.script.player_update(&client);
        Ok(())
    }

    fn handle_npc_sync(&mut self, peer: PeerId, npc: NpcSync) -> Result<(), HandleError> {
        let recipients = relay_npc_sync(&self.registry, peer, &npc);
        if recipients.is_empty() {
            return Ok(());
        }

        let packet = Packet::FullSyncNpc(npc);
        for recipient in recipients {
            if let Err(e) = self.transport.send(
                recipient,
                &packet,
                Delivery::UnreliableSequenced,
                DATA_CHANNEL,
            ) {
                log::debug!("npc sync to {recipient} failed: {e}");
            }
        }
        Ok(())
    }

    fn handle_chat(&mut self, peer: PeerId, chat: ChatMessage) -> Result<(), HandleError> {
        if chat.message.starts_with(freeroam::COMMAND_PREFIX) {
            let client = self.registry.get(peer).ok_or(HandleError::UnknownSender)?;

            match self.commands.dispatch(&chat.message, client) {
                Some(CommandOutcome::NotFound) => {
                    self.send_server_chat(peer, "Command not found!");
                }
                Some(CommandOutcome::Usage(usage)) => {
                    self.send_server_chat(peer, &usage);
                }
                Some(CommandOutcome::Replies(replies)) => {
                    for reply in replies {
                        self.send_server_chat(peer, &reply);
                    }
                }
                None => {}
            }
            return Ok(());
        }

        if self.script.chat_message(&chat.username, &chat.message) {
            return Ok(());
        }

        let message = chat.message.replace('~', "");
        self.broadcast_chat(&chat.username, &message, None);
        log::info!("{}: {}", chat.username, message);
        self.pending_events.push_back(ServerEvent::Chat {
            username: chat.username,
            message,
        });
        Ok(())
    }

    /// Chat to an explicit recipient list, or everyone when `recipients`
    /// is `None`.
    fn broadcast_chat(&mut self, username: &str, message: &str, recipients: Option<&[PeerId]>) {
        let packet = Packet::ChatMessage(ChatMessage {
            username: username.to_string(),
            message: message.to_string(),
        });

        let targets = match recipients {
            Some(list) => list.to_vec(),
            None => self.registry.ids(),
        };
        for recipient in targets {
            if let Err(e) =
                self.transport
                    .send(recipient, &packet, Delivery::ReliableOrdered, DATA_CHANNEL)
            {
                log::debug!("chat send to {recipient} failed: {e}");
            }
        }
    }

    fn send_server_chat(&mut self, peer: PeerId, message: &str) {
        self.broadcast_chat("Server", message, Some(&[peer]));
    }

    fn handle_mod_packet(&mut self, packet: ModData) {
        if self.script.mod_packet(&packet) {
            return;
        }

        let target = packet.target;
        match target {
            MOD_TARGET_NONE => {}
            MOD_TARGET_ALL => {
                let packet = Packet::Mod(packet);
                for recipient in self.registry.ids() {
                    if let Err(e) = self.transport.send(
                        recipient,
                        &packet,
                        Delivery::ReliableOrdered,
                        DATA_CHANNEL,
                    ) {
                        log::debug!("mod broadcast to {recipient} failed: {e}");
                    }
                }
            }
            target => {
                let packet = Packet::Mod(packet);
                if self
                    .transport
                    .send(
                        target as PeerId,
                        &packet,
                        Delivery::ReliableOrdered,
                        DATA_CHANNEL,
                    )
                    .is_err()
                {
                    log::error!("mod packet target \"{target}\" not found");
                }
            }
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            uptime_secs: self.start_time.elapsed().as_secs(),
            player_count: self.registry.len(),
            max_players: self.settings.max_players,
            network: self.transport.stats().clone(),
        }
    }

    pub fn player_infos(&self) -> Vec<PlayerInfo> {
        let mut infos: Vec<PlayerInfo> = self.registry.with(|clients| {
            clients
                .values()
                .map(|c| PlayerInfo {
                    id: c.id,
                    username: c.player.username.clone(),
                    social_club_name: c.player.social_club_name.clone(),
                    position: c.player.position,
                    health: c.player.health,
                    latency_ms: c.latency * 1000.0,
                })
                .collect()
        });
        infos.sort_by_key(|info| info.id);
        infos
    }
}

fn packet_name(packet: &Packet) -> &'static str {
    match packet {
        Packet::Handshake(_) => "handshake",
        Packet::PlayerConnect(_) => "player connect",
        Packet::PlayerDisconnect(_) => "player disconnect",
        Packet::FullSyncPlayer(_) => "full player sync",
        Packet::LightSyncPlayer(_) => "light player sync",
        Packet::SuperLightSyncPlayer(_) => "super light player sync",
        Packet::FullSyncNpc(_) => "npc sync",
        Packet::ChatMessage(_) => "chat",
        Packet::Mod(_) => "mod data",
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub uptime_secs: u64,
    pub player_count: usize,
    pub max_players: usize,
    pub network: NetworkStats,
}

#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub id: PeerId,
    pub username: String,
    pub social_club_name: String,
    pub position: glam::Vec3,
    pub health: i32,
    pub latency_ms: f32,
}
