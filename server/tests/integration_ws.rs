//! Ende-zu-Ende-Test: echter WebSocket-Server, zwei Clients

use plauder_client::{ChatClient, ClientConfig, WsTransport, ZustellStatus};
use plauder_core::types::UserId;
use plauder_db::SqliteDb;
use plauder_protocol::ServerEvent;
use plauder_signaling::{SignalingConfig, SignalingState, WsServer, WsServerKonfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::test]
async fn private_nachricht_ueber_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let adresse = listener.local_addr().unwrap();
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let state = SignalingState::neu(SignalingConfig::default(), db);
    let server = WsServer::neu(
        state,
        WsServerKonfig {
            bind_addr: adresse,
            ws_pfad: "/ws".into(),
            cors_origins: vec![],
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ablauf = async move {
        let url = format!("ws://{adresse}/ws");
        let a = UserId::new();
        let b = UserId::new();
        let mut alice = ChatClient::neu(
            WsTransport::verbinden(&url, a).await.unwrap(),
            a,
            ClientConfig::default(),
        );
        let mut bob = ChatClient::neu(
            WsTransport::verbinden(&url, b).await.unwrap(),
            b,
            ClientConfig::default(),
        );

        // Anmeldung beim Router laeuft asynchron zum Handshake
        let mut erwartet = vec![a, b];
        erwartet.sort();
        while bob.online_benutzer().await.unwrap() != erwartet {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let gesendet = alice.nachricht_senden(b, "Hallo Bob").await.unwrap();
        assert_eq!(alice.nachrichten().len(), 1);
        assert_eq!(
            alice.nachrichten().eintraege()[0].status,
            ZustellStatus::Zugestellt
        );

        loop {
            match bob.naechstes_ereignis().await.unwrap() {
                Some(ServerEvent::PrivateMessage(m)) => {
                    assert_eq!(m.message.id, gesendet.id);
                    break;
                }
                Some(_) => continue,
                None => panic!("Verbindung unerwartet geschlossen"),
            }
        }
        assert!(bob.nachrichten().per_id(&gesendet.id).is_some());

        shutdown_tx.send(true).unwrap();
    };

    let (ergebnis, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(server.starten_mit_listener(listener, shutdown_rx), ablauf)
    })
    .await
    .expect("Test hat zu lange gedauert");
    ergebnis.unwrap();
}
