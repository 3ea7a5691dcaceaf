//! Integration-Tests fuer den ChatService (In-Memory SQLite)

use std::sync::Arc;

use plauder_chat::{ChatError, ChatService, HistoryAnfrage};
use plauder_core::types::{RoomId, UserId};
use plauder_db::{RoomRepository, SqliteDb};

async fn test_db() -> Arc<SqliteDb> {
    Arc::new(SqliteDb::in_memory().await.expect("In-Memory-DB konnte nicht geoeffnet werden"))
}

#[tokio::test]
async fn private_nachricht_legt_raum_an() {
    let db = test_db().await;
    let service = ChatService::neu(db.clone());
    let a = UserId::new();
    let b = UserId::new();

    let nachricht = service
        .private_nachricht_senden(a, b, "Hallo Welt!", None, None)
        .await
        .expect("Nachricht senden fehlgeschlagen");

    assert_eq!(nachricht.text, "Hallo Welt!");
    assert_eq!(nachricht.sender_id, a);
    assert_eq!(nachricht.receiver_id, Some(b));

    let raum = db.find_or_create_private_room(b, a).await.unwrap();
    assert_eq!(nachricht.room_id, raum.id);
}

#[tokio::test]
async fn beide_richtungen_teilen_einen_raum() {
    let db = test_db().await;
    let service = ChatService::neu(db);
    let a = UserId::new();
    let b = UserId::new();

    let hin = service.private_nachricht_senden(a, b, "hin", None, None).await.unwrap();
    let zurueck = service
        .private_nachricht_senden(b, a, "zurueck", Some(hin.room_id), None)
        .await
        .unwrap();
    assert_eq!(hin.room_id, zurueck.room_id);

    let verlauf = service
        .verlauf_laden(HistoryAnfrage {
            room_id: hin.room_id,
            before: None,
            limit: None,
        })
        .await
        .unwrap();
    let texte: Vec<&str> = verlauf.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texte, vec!["hin", "zurueck"]);
}

#[tokio::test]
async fn fremder_raum_bei_privater_nachricht_abgelehnt() {
    let db = test_db().await;
    let service = ChatService::neu(db);

    let fehler = service
        .private_nachricht_senden(UserId::new(), UserId::new(), "hi", Some(RoomId::new()), None)
        .await
        .unwrap_err();
    assert!(matches!(fehler, ChatError::UngueltigeEingabe(_)));
}

#[tokio::test]
async fn leere_nachricht_abgelehnt() {
    let db = test_db().await;
    let service = ChatService::neu(db);

    let fehler = service
        .private_nachricht_senden(UserId::new(), UserId::new(), "   ", None, None)
        .await
        .unwrap_err();
    assert!(matches!(fehler, ChatError::UngueltigeEingabe(_)));
}

#[tokio::test]
async fn raum_nachricht_in_gruppe() {
    let db = test_db().await;
    let gruppe = db.create_group_room("Team").await.unwrap();
    let service = ChatService::neu(db);

    let nachricht = service
        .raum_nachricht_senden(UserId::new(), gruppe.id, "Moin", Some("https://cdn.example/x.pdf"))
        .await
        .unwrap();
    assert_eq!(nachricht.room_id, gruppe.id);
    assert!(nachricht.receiver_id.is_none());
    assert_eq!(nachricht.attachment.as_deref(), Some("https://cdn.example/x.pdf"));
}

#[tokio::test]
async fn raum_nachricht_unbekannter_raum() {
    let db = test_db().await;
    let service = ChatService::neu(db);
    let raum = RoomId::new();

    let fehler = service
        .raum_nachricht_senden(UserId::new(), raum, "hallo?", None)
        .await
        .unwrap_err();
    assert!(matches!(fehler, ChatError::RaumNichtGefunden(r) if r == raum));
}

#[tokio::test]
async fn raum_nachricht_in_privaten_raum_abgelehnt() {
    let db = test_db().await;
    let a = UserId::new();
    let b = UserId::new();
    let privat = db.find_or_create_private_room(a, b).await.unwrap();
    let service = ChatService::neu(db);

    let fehler = service
        .raum_nachricht_senden(UserId::new(), privat.id, "eingeschleust", None)
        .await
        .unwrap_err();
    assert!(matches!(fehler, ChatError::UngueltigeEingabe(_)));

    let verlauf = service
        .verlauf_laden(HistoryAnfrage {
            room_id: privat.id,
            before: None,
            limit: None,
        })
        .await
        .unwrap();
    assert!(verlauf.is_empty());
}

#[tokio::test]
async fn verlauf_leerer_raum() {
    let db = test_db().await;
    let service = ChatService::neu(db);

    let verlauf = service
        .verlauf_laden(HistoryAnfrage {
            room_id: RoomId::new(),
            before: None,
            limit: Some(10),
        })
        .await
        .unwrap();
    assert!(verlauf.is_empty());
}
