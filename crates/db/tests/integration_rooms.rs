//! Integration-Tests fuer RoomRepository (In-Memory SQLite)

use plauder_core::types::{RoomId, UserId};
use plauder_db::{models::RaumTyp, RoomRepository, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory().await.expect("In-Memory DB konnte nicht erstellt werden")
}

#[tokio::test]
async fn privater_raum_wird_einmal_angelegt() {
    let db = db().await;
    let a = UserId::new();
    let b = UserId::new();

    let erster = db.find_or_create_private_room(a, b).await.unwrap();
    let zweiter = db.find_or_create_private_room(a, b).await.unwrap();
    assert_eq!(erster.id, zweiter.id);
    assert_eq!(erster.typ, RaumTyp::Privat);
}

#[tokio::test]
async fn privater_raum_unabhaengig_von_reihenfolge() {
    let db = db().await;
    let a = UserId::new();
    let b = UserId::new();

    let ab = db.find_or_create_private_room(a, b).await.unwrap();
    let ba = db.find_or_create_private_room(b, a).await.unwrap();
    assert_eq!(ab.id, ba.id);

    let ac = db.find_or_create_private_room(a, UserId::new()).await.unwrap();
    assert_ne!(ab.id, ac.id);
}

#[tokio::test]
async fn gruppe_anlegen_und_laden() {
    let db = db().await;
    let gruppe = db.create_group_room("Lerngruppe").await.unwrap();
    assert_eq!(gruppe.typ, RaumTyp::Gruppe);

    let geladen = db.get_room(gruppe.id).await.unwrap().unwrap();
    assert_eq!(geladen, gruppe);
}

#[tokio::test]
async fn unbekannter_raum_ist_none() {
    let db = db().await;
    assert!(db.get_room(RoomId::new()).await.unwrap().is_none());
}
