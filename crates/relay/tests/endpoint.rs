use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use freeroam::{
    ChatMessage, Delivery, Handshake, NetworkEndpoint, Packet, PlayerConnect, TransportEvent,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(42000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn wait_for_event(endpoint: &mut NetworkEndpoint, timeout_ms: u64) -> Option<TransportEvent> {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if let Some(event) = endpoint.poll_event() {
            return Some(event);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

fn hail(social_club: &str, username: &str) -> Packet {
    Packet::Handshake(Handshake {
        id: 0,
        social_club_name: social_club.to_string(),
        username: username.to_string(),
        mod_version: "V0_8_0_1".to_string(),
        npcs_allowed: false,
    })
}

fn endpoint_pair() -> (NetworkEndpoint, NetworkEndpoint, SocketAddr) {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let server = NetworkEndpoint::bind(server_addr, 32).unwrap();
    let client = NetworkEndpoint::bind(client_addr, 1).unwrap();
    (server, client, server_addr)
}

#[test]
fn connect_approve_full_flow() {
    let (mut server, mut client, server_addr) = endpoint_pair();

    client.connect(server_addr, &hail("club", "Alpha")).unwrap();

    let event = wait_for_event(&mut server, 200).expect("no connection request");
    let peer = match event {
        TransportEvent::ConnectionRequest { peer, payload, .. } => {
            match Packet::decode(&payload).unwrap() {
                Packet::Handshake(request) => {
                    assert_eq!(request.username, "Alpha");
                    assert_eq!(request.social_club_name, "club");
                }
                other => panic!("expected handshake payload, got {other:?}"),
            }
            peer
        }
        other => panic!("expected ConnectionRequest, got {other:?}"),
    };

    let reply = Packet::Handshake(Handshake::acceptance(peer, true));
    server.approve(peer, &reply).unwrap();

    let event = wait_for_event(&mut client, 200).expect("no approval");
    match event {
        TransportEvent::Approved { payload, .. } => match Packet::decode(&payload).unwrap() {
            Packet::Handshake(accepted) => {
                assert_eq!(accepted.id, peer);
                assert!(accepted.npcs_allowed);
            }
            other => panic!("expected handshake payload, got {other:?}"),
        },
        other => panic!("expected Approved, got {other:?}"),
    }

    assert_eq!(server.connected_count(), 1);
}

#[test]
fn deny_carries_the_reason_verbatim() {
    let (mut server, mut client, server_addr) = endpoint_pair();

    client.connect(server_addr, &hail("club", "bad name")).unwrap();

    let event = wait_for_event(&mut server, 200).expect("no connection request");
    let TransportEvent::ConnectionRequest { peer, .. } = event else {
        panic!("expected ConnectionRequest");
    };
    server.deny(peer, "Username contains special chars!");

    let event = wait_for_event(&mut client, 200).expect("no denial");
    match event {
        TransportEvent::Denied { reason } => {
            assert_eq!(reason, "Username contains special chars!");
        }
        other => panic!("expected Denied, got {other:?}"),
    }

    assert_eq!(server.peer_count(), 0);
}

#[test]
fn server_full_denies_before_any_event() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server = NetworkEndpoint::bind(server_addr, 0).unwrap();
    let mut client = NetworkEndpoint::bind(client_addr, 1).unwrap();

    client.connect(server_addr, &hail("club", "Alpha")).unwrap();

    // The full server denies inline while pumping and surfaces no event.
    let start = std::time::Instant::now();
    loop {
        assert!(server.poll_event().is_none());
        if let Some(event) = client.poll_event() {
            match event {
                TransportEvent::Denied { reason } => assert!(reason.contains("full")),
                other => panic!("expected Denied, got {other:?}"),
            }
            break;
        }
        assert!(start.elapsed() < Duration::from_millis(500), "no denial");
        thread::sleep(Duration::from_millis(1));
    }
}

fn connect_pair() -> (NetworkEndpoint, NetworkEndpoint, u64, u64) {
    let (mut server, mut client, server_addr) = endpoint_pair();

    let server_peer = client.connect(server_addr, &hail("club", "Alpha")).unwrap();
    let event = wait_for_event(&mut server, 200).expect("no connection request");
    let TransportEvent::ConnectionRequest { peer, .. } = event else {
        panic!("expected ConnectionRequest");
    };
    server
        .approve(peer, &Packet::Handshake(Handshake::acceptance(peer, false)))
        .unwrap();
    let event = wait_for_event(&mut client, 200).expect("no approval");
    assert!(matches!(event, TransportEvent::Approved { .. }));

    (server, client, peer, server_peer)
}

#[test]
fn reliable_data_reaches_the_other_side() {
    let (mut server, mut client, client_peer, server_peer) = connect_pair();

    let packet = Packet::PlayerConnect(PlayerConnect {
        id: client_peer,
        social_club_name: "club".to_string(),
        username: "Alpha".to_string(),
    });
    client
        .send(server_peer, &packet, Delivery::ReliableOrdered, 0)
        .unwrap();

    let event = wait_for_event(&mut server, 200).expect("no data");
    match event {
        TransportEvent::Data { payload, .. } => {
            assert_eq!(Packet::decode(&payload).unwrap(), packet);
        }
        other => panic!("expected Data, got {other:?}"),
    }
}

#[test]
fn chat_round_trip_server_to_client() {
    let (mut server, mut client, peer, _) = connect_pair();

    let packet = Packet::ChatMessage(ChatMessage {
        username: "Server".to_string(),
        message: "Welcome!".to_string(),
    });
    server
        .send(peer, &packet, Delivery::ReliableOrdered, 0)
        .unwrap();

    let event = wait_for_event(&mut client, 200).expect("no data");
    match event {
        TransportEvent::Data { payload, .. } => {
            assert_eq!(Packet::decode(&payload).unwrap(), packet);
        }
        other => panic!("expected Data, got {other:?}"),
    }
}

#[test]
fn disconnect_reason_reaches_the_peer() {
    let (mut server, mut client, peer, _) = connect_pair();

    server.disconnect(peer, "Npcs are not allowed!");

    // The server queues its own Disconnected event for the dispatch loop.
    let event = wait_for_event(&mut server, 200).expect("no local event");
    match event {
        TransportEvent::Disconnected { peer: id, reason } => {
            assert_eq!(id, peer);
            assert_eq!(reason, "Npcs are not allowed!");
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }

    let event = wait_for_event(&mut client, 200).expect("no remote event");
    match event {
        TransportEvent::Disconnected { reason, .. } => {
            assert_eq!(reason, "Npcs are not allowed!");
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
}

#[test]
fn sequenced_sends_arrive_in_order_on_loopback() {
    let (mut server, mut client, _, server_peer) = connect_pair();

    for health in [100, 99, 98] {
        let packet = Packet::PlayerDisconnect(freeroam::PlayerDisconnect { id: health });
        client
            .send(server_peer, &packet, Delivery::UnreliableSequenced, 0)
            .unwrap();
    }

    let mut seen = Vec::new();
    while let Some(event) = wait_for_event(&mut server, 100) {
        if let TransportEvent::Data { payload, .. } = event {
            if let Packet::PlayerDisconnect(p) = Packet::decode(&payload).unwrap() {
                seen.push(p.id);
            }
        }
        if seen.len() == 3 {
            break;
        }
    }
    assert_eq!(seen, vec![100, 99, 98]);
}
