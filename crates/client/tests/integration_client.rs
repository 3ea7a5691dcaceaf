//! Integration-Tests fuer ChatClient mit einem geskripteten Transport

use chrono::Utc;
use plauder_client::{
    ChatClient, ClientConfig, ClientError, ClientResult, NachrichtenZiel, Transport, ZustellStatus,
};
use plauder_core::types::{CallId, MessageId, RoomId, UserId};
use plauder_protocol::events::{
    IceCandidateMessage, MessageEvent, MessageInfo, PresenceChange, Quittung,
};
use plauder_protocol::{ClientEvent, ClientFrame, ErrorCode, ServerEvent, ServerFrame};
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Antworter = Box<dyn FnMut(&ClientFrame) -> Vec<ServerFrame>>;

/// Antwortet auf jeden gesendeten Frame mit den Frames des Skripts
struct SkriptTransport {
    antworter: Antworter,
    eingang: VecDeque<ServerFrame>,
    gesendet: Vec<ClientFrame>,
    geschlossen: bool,
}

impl SkriptTransport {
    fn neu(antworter: impl FnMut(&ClientFrame) -> Vec<ServerFrame> + 'static) -> Self {
        Self {
            antworter: Box::new(antworter),
            eingang: VecDeque::new(),
            gesendet: Vec::new(),
            geschlossen: false,
        }
    }

    /// Server der nie antwortet
    fn stumm() -> Self {
        Self::neu(|_| Vec::new())
    }
}

impl Transport for SkriptTransport {
    async fn senden(&mut self, frame: &ClientFrame) -> ClientResult<()> {
        self.gesendet.push(frame.clone());
        let antworten = (self.antworter)(frame);
        self.eingang.extend(antworten);
        Ok(())
    }

    async fn empfangen(&mut self) -> ClientResult<Option<ServerFrame>> {
        if let Some(frame) = self.eingang.pop_front() {
            return Ok(Some(frame));
        }
        if self.geschlossen {
            return Ok(None);
        }
        std::future::pending().await
    }
}

/// Baut die Server-Antwort auf `sendMessage` wie der Router
fn gespeichert(frame: &ClientFrame) -> Option<MessageEvent> {
    let ClientEvent::SendMessage(req) = &frame.event else {
        return None;
    };
    Some(MessageEvent {
        success: true,
        message: MessageInfo {
            id: MessageId::new(),
            sender_id: req.sender_id,
            receiver_id: Some(req.receiver_id),
            chat_room_id: req.chat_room_id.unwrap_or_default(),
            text: req.text.clone(),
            attachment: req.attachment.clone(),
            created_at: Utc::now(),
        },
        client_message_id: req.client_message_id.clone(),
    })
}

/// Broadcast an die eigenen Verbindungen, danach die Quittung
fn server_mit_broadcast(frame: &ClientFrame) -> Vec<ServerFrame> {
    let Some(event) = gespeichert(frame) else {
        return Vec::new();
    };
    let Some(request_id) = frame.request_id else {
        return Vec::new();
    };
    vec![
        ServerFrame::push(ServerEvent::PrivateMessage(event.clone())),
        ServerFrame::antwort(request_id, ServerEvent::Ack(Quittung::ok(&event))),
    ]
}

fn client(transport: SkriptTransport) -> ChatClient<SkriptTransport> {
    ChatClient::neu(transport, UserId::new(), ClientConfig::default())
}

#[tokio::test]
async fn ausstehend_sofort_dann_ersetzt() {
    let mut client = client(SkriptTransport::neu(server_mit_broadcast));
    let empfaenger = UserId::new();

    let temp = client.nachricht_vorbereiten(NachrichtenZiel::Privat(empfaenger), "hi", None);
    assert_eq!(client.nachrichten().len(), 1);
    assert_eq!(
        client.nachrichten().eintraege()[0].status,
        ZustellStatus::Ausstehend
    );

    let bestaetigt = client.nachricht_abschicken(&temp).await.unwrap();
    assert_eq!(client.nachrichten().len(), 1, "Ersetzen, nicht anhaengen");
    let eintrag = &client.nachrichten().eintraege()[0];
    assert_eq!(eintrag.status, ZustellStatus::Zugestellt);
    assert_eq!(eintrag.id, Some(bestaetigt.id));
}

#[tokio::test]
async fn quittung_ohne_broadcast() {
    let mut client = client(SkriptTransport::neu(|frame| {
        match (gespeichert(frame), frame.request_id) {
            (Some(event), Some(id)) => vec![ServerFrame::antwort(
                id,
                ServerEvent::Ack(Quittung::ok(&event)),
            )],
            _ => Vec::new(),
        }
    }));

    client.nachricht_senden(UserId::new(), "hallo").await.unwrap();
    assert_eq!(client.nachrichten().len(), 1);
    assert_eq!(
        client.nachrichten().eintraege()[0].status,
        ZustellStatus::Zugestellt
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_markiert_fehlgeschlagen() {
    let mut client = client(SkriptTransport::stumm());

    let temp = client.nachricht_vorbereiten(NachrichtenZiel::Privat(UserId::new()), "hi", None);
    let fehler = client.nachricht_abschicken(&temp).await.unwrap_err();
    assert!(matches!(fehler, ClientError::Zeitueberschreitung(1)));

    let eintrag = client.nachrichten().per_temp_id(&temp).unwrap();
    assert_eq!(eintrag.status, ZustellStatus::Fehlgeschlagen);
    assert_eq!(client.nachrichten().len(), 1);
}

#[tokio::test]
async fn fehler_quittung_und_manueller_neuversuch() {
    let mut versuche = 0;
    let mut client = client(SkriptTransport::neu(move |frame| {
        versuche += 1;
        let Some(id) = frame.request_id else {
            return Vec::new();
        };
        if versuche == 1 {
            return vec![ServerFrame::antwort(
                id,
                ServerEvent::Ack(Quittung::fehler(ErrorCode::PersistenceFailure, "DB weg")),
            )];
        }
        server_mit_broadcast(frame)
    }));

    let temp = client.nachricht_vorbereiten(NachrichtenZiel::Privat(UserId::new()), "hi", None);
    let fehler = client.nachricht_abschicken(&temp).await.unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::PersistenceFailure));
    assert_eq!(
        client.nachrichten().per_temp_id(&temp).map(|n| n.status),
        Some(ZustellStatus::Fehlgeschlagen)
    );

    client.erneut_senden(&temp).await.unwrap();
    assert_eq!(client.nachrichten().len(), 1);
    assert_eq!(
        client.nachrichten().per_temp_id(&temp).map(|n| n.status),
        Some(ZustellStatus::Zugestellt)
    );
}

#[tokio::test]
async fn pushes_waehrend_des_wartens_bleiben_erhalten() {
    let anderer = UserId::new();
    let mut client = client(SkriptTransport::neu(move |frame| {
        let mut antworten = vec![ServerFrame::push(ServerEvent::UserOnline(PresenceChange {
            user_id: anderer,
        }))];
        antworten.extend(server_mit_broadcast(frame));
        antworten
    }));

    client.nachricht_senden(UserId::new(), "hi").await.unwrap();

    let erstes = client.naechstes_ereignis().await.unwrap();
    assert!(matches!(erstes, Some(ServerEvent::UserOnline(p)) if p.user_id == anderer));
    let zweites = client.naechstes_ereignis().await.unwrap();
    assert!(matches!(zweites, Some(ServerEvent::PrivateMessage(_))));
}

#[tokio::test]
async fn verlauf_wird_ohne_duplikate_eingefuegt() {
    let ich = UserId::new();
    let raum = RoomId::new();
    let vorhanden = MessageInfo {
        id: MessageId::new(),
        sender_id: ich,
        receiver_id: None,
        chat_room_id: raum,
        text: "schon da".into(),
        attachment: None,
        created_at: Utc::now(),
    };
    let verlauf = vec![
        MessageInfo {
            id: MessageId::new(),
            text: "aelter".into(),
            created_at: Utc::now() - chrono::Duration::hours(1),
            ..vorhanden.clone()
        },
        vorhanden.clone(),
    ];

    let antwort = verlauf.clone();
    let transport = SkriptTransport::neu(move |frame| match (&frame.event, frame.request_id) {
        (ClientEvent::GetChatHistory(_), Some(id)) => vec![ServerFrame::antwort(
            id,
            ServerEvent::Ack(Quittung::ok(&antwort)),
        )],
        _ => Vec::new(),
    });
    let mut client = ChatClient::neu(transport, ich, ClientConfig::default());
    client
        .nachrichten_mut()
        .uebernehmen(&vorhanden, None);

    assert_eq!(client.verlauf_laden(raum, None, None).await.unwrap(), 1);
    let texte: Vec<&str> = client
        .nachrichten()
        .eintraege()
        .iter()
        .map(|n| n.text.as_str())
        .collect();
    assert_eq!(texte, ["aelter", "schon da"]);
}

#[tokio::test]
async fn geschlossene_verbindung_ist_transportfehler() {
    let mut transport = SkriptTransport::stumm();
    transport.geschlossen = true;
    let mut client = client(transport);

    let fehler = client.online_benutzer().await.unwrap_err();
    assert!(matches!(fehler, ClientError::Transport(_)));
}

#[tokio::test]
async fn ereignis_ohne_quittung_wird_als_push_gesendet() {
    let gesendet: Rc<RefCell<Vec<(Option<u32>, &'static str)>>> = Rc::default();
    let protokoll = Rc::clone(&gesendet);
    let bob = UserId::new();
    let transport = SkriptTransport::neu(move |frame| {
        protokoll
            .borrow_mut()
            .push((frame.request_id, frame.event.name()));
        match frame.request_id {
            Some(id) => vec![ServerFrame::antwort(
                id,
                ServerEvent::Ack(Quittung::ok(vec![bob])),
            )],
            None => Vec::new(),
        }
    });
    let mut client = client(transport);

    client
        .ereignis_senden(ClientEvent::IceCandidate(IceCandidateMessage {
            call_id: CallId::new(),
            candidate: json!({"candidate": "candidate:1 1 UDP 1 10.0.0.1 5000 typ host"}),
            user_id: bob,
        }))
        .await
        .unwrap();

    // Die naechste Anfrage bekommt ihre eigene Quittung
    assert_eq!(client.online_benutzer().await.unwrap(), vec![bob]);
    assert_eq!(
        *gesendet.borrow(),
        [(None, "iceCandidate"), (Some(1), "getOnlineUsers")]
    );
}
