//! WebSocket-Server – axum-Endpunkt, Socket-Tasks und Router-LocalSet
//!
//! ## Concurrency-Modell
//! Die Repository-Traits verwenden async fn ohne Send-Garantie. Deshalb
//! laeuft das gesamte Routing in einer `LocalSet` auf einem Thread:
//!
//! ```text
//! axum (Multi-Thread)                     LocalSet (ein Thread)
//! ───────────────────                     ─────────────────────
//! Socket-Task pro Verbindung  ──Text──>   ClientConnection pro Verbindung
//!   liest/schreibt Frames     <─Frames──    Dispatcher -> Handler -> Speicher
//!   Keepalive, Timeout                    Klingel-Ueberwachung
//! ```
//!
//! Socket-Tasks pumpen nur Frames. Sie melden neue Verbindungen ueber
//! einen Kanal an die Router-Schleife, die Presence und Broadcaster
//! bedient und den lokalen Verbindungs-Task startet.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use plauder_core::types::UserId;
use plauder_protocol::ServerFrame;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::LocalSet;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::connection::ClientConnection;
use crate::handlers::{call_handler, presence_handler};
use crate::server_state::{SignalingState, Speicher};

/// Pruefintervall fuer abgelaufene Klingelzeiten
const KLINGEL_PRUEFINTERVALL: Duration = Duration::from_secs(1);

/// Netzwerk-Konfiguration des WebSocket-Servers
#[derive(Debug, Clone)]
pub struct WsServerKonfig {
    pub bind_addr: SocketAddr,
    /// Pfad des WebSocket-Endpunkts
    pub ws_pfad: String,
    /// Erlaubte CORS-Origins. Leer = alle Origins erlaubt.
    pub cors_origins: Vec<String>,
}

/// Anmeldung eines neuen Sockets bei der Router-Schleife
struct NeueVerbindung {
    user_id: UserId,
    /// Text-Frames vom Socket
    eingang: mpsc::Receiver<String>,
    /// Rueckkanal fuer die ausgehende Queue der Verbindung
    ausgang: oneshot::Sender<mpsc::Receiver<ServerFrame>>,
}

/// Axum-State (Send + Sync)
struct AppState<R: Speicher> {
    signaling: Arc<SignalingState<R>>,
    neue_verbindungen: mpsc::Sender<NeueVerbindung>,
    shutdown: watch::Receiver<bool>,
}

impl<R: Speicher> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            signaling: Arc::clone(&self.signaling),
            neue_verbindungen: self.neue_verbindungen.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerbindungsParameter {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Antwort von `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub online_users: usize,
    pub connections: usize,
    pub active_calls: usize,
}

/// WebSocket-Signaling-Server
pub struct WsServer<R: Speicher> {
    state: Arc<SignalingState<R>>,
    konfig: WsServerKonfig,
}

impl<R: Speicher> WsServer<R> {
    pub fn neu(state: Arc<SignalingState<R>>, konfig: WsServerKonfig) -> Self {
        Self { state, konfig }
    }

    /// Startet HTTP-Listener und Router
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.konfig.bind_addr).await?;
        self.starten_mit_listener(listener, shutdown_rx).await
    }

    /// Wie [`WsServer::starten`], aber auf einem bereits gebundenen Listener
    pub async fn starten_mit_listener(
        self,
        listener: TcpListener,
        shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let local = LocalSet::new();
        local.run_until(self.serve(listener, shutdown_rx)).await
    }

    async fn serve(
        self,
        listener: TcpListener,
        shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let (neu_tx, neu_rx) = mpsc::channel(self.state.config.send_queue_groesse.max(1));

        let app = http_router(
            AppState {
                signaling: Arc::clone(&self.state),
                neue_verbindungen: neu_tx,
                shutdown: shutdown_rx.clone(),
            },
            &self.konfig,
        );

        tracing::info!(
            adresse = %listener.local_addr()?,
            pfad = %self.konfig.ws_pfad,
            "WebSocket-Server gestartet"
        );

        let mut http_shutdown = shutdown_rx.clone();
        let http = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.wait_for(|stop| *stop).await;
                })
                .await
        });

        tokio::task::spawn_local(klingel_ueberwachung(
            Arc::clone(&self.state),
            shutdown_rx.clone(),
        ));

        router_schleife(self.state, neu_rx, shutdown_rx).await;

        let ergebnis = http
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        tracing::info!("WebSocket-Server gestoppt");
        ergebnis
    }
}

fn http_router<R: Speicher>(app: AppState<R>, konfig: &WsServerKonfig) -> Router {
    let cors = if konfig.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = konfig
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
    };

    Router::new()
        .route(&konfig.ws_pfad, get(ws_upgrade::<R>))
        .route("/health", get(health::<R>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app)
}

/// Nimmt neue Verbindungen an und startet ihre lokalen Tasks
async fn router_schleife<R: Speicher>(
    state: Arc<SignalingState<R>>,
    mut neue: mpsc::Receiver<NeueVerbindung>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            Some(neu) = neue.recv() => {
                let (ctx, ausgang) = presence_handler::verbinden(neu.user_id, &state);
                if neu.ausgang.send(ausgang).is_err() {
                    // Socket schon wieder weg
                    presence_handler::trennen(ctx, &state).await;
                    continue;
                }
                let verbindung = ClientConnection::neu(Arc::clone(&state), ctx);
                tokio::task::spawn_local(verbindung.verarbeiten(neu.eingang));
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Router: Shutdown-Signal empfangen");
                    break;
                }
            }

            else => break,
        }
    }
}

/// Beendet periodisch unbeantwortete Anrufe nach Ablauf der Klingelzeit
async fn klingel_ueberwachung<R: Speicher>(
    state: Arc<SignalingState<R>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut intervall = tokio::time::interval(KLINGEL_PRUEFINTERVALL);
    loop {
        tokio::select! {
            _ = intervall.tick() => {
                let beendet = call_handler::klingel_timeouts_pruefen(&state).await;
                if beendet > 0 {
                    tracing::info!(anrufe = beendet, "Unbeantwortete Anrufe als verpasst beendet");
                }
            }
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// `GET <ws_pfad>?userId=<uuid>` – Upgrade auf WebSocket
async fn ws_upgrade<R: Speicher>(
    ws: WebSocketUpgrade,
    Query(params): Query<VerbindungsParameter>,
    State(app): State<AppState<R>>,
) -> Response {
    let user_id = match params.user_id.as_deref().map(str::parse::<UserId>) {
        Some(Ok(id)) => id,
        Some(Err(_)) => {
            return (StatusCode::BAD_REQUEST, "userId ist keine gueltige UUID").into_response();
        }
        None => return (StatusCode::BAD_REQUEST, "userId fehlt").into_response(),
    };

    let max_frame = app.signaling.config.max_frame_groesse;
    ws.max_message_size(max_frame)
        .on_upgrade(move |socket| socket_verarbeiten(socket, user_id, app))
}

/// Pumpt Frames zwischen Socket und lokalem Verbindungs-Task
async fn socket_verarbeiten<R: Speicher>(socket: WebSocket, user_id: UserId, app: AppState<R>) {
    let config = Arc::clone(&app.signaling.config);
    let (eingang_tx, eingang_rx) = mpsc::channel::<String>(config.send_queue_groesse.max(1));
    let (ausgang_tx, ausgang_rx) = oneshot::channel();

    let anmeldung = NeueVerbindung {
        user_id,
        eingang: eingang_rx,
        ausgang: ausgang_tx,
    };
    if app.neue_verbindungen.send(anmeldung).await.is_err() {
        tracing::warn!(user_id = %user_id, "Router nicht verfuegbar, Socket wird geschlossen");
        return;
    }
    let Ok(mut ausgang) = ausgang_rx.await else {
        return;
    };

    let (mut sender, mut empfaenger) = socket.split();
    let keepalive = Duration::from_secs(config.keepalive_sek.max(1));
    let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);
    let mut ping_intervall = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
    let mut letzter_empfang = Instant::now();
    let mut shutdown_rx = app.shutdown.clone();

    loop {
        tokio::select! {
            nachricht = empfaenger.next() => {
                match nachricht {
                    Some(Ok(Message::Text(text))) => {
                        letzter_empfang = Instant::now();
                        if eingang_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        letzter_empfang = Instant::now();
                        tracing::debug!(user_id = %user_id, "Binaer-Frame ignoriert");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        letzter_empfang = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(user_id = %user_id, "Socket vom Client geschlossen");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(user_id = %user_id, fehler = %e, "Socket-Lesefehler");
                        break;
                    }
                }
            }

            frame = ausgang.recv() => {
                let Some(frame) = frame else { break };
                match frame.to_json() {
                    Ok(json) => {
                        if let Err(e) = sender.send(Message::Text(json)).await {
                            tracing::warn!(user_id = %user_id, fehler = %e, "Senden fehlgeschlagen");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(event = frame.event.name(), fehler = %e, "Frame nicht serialisierbar");
                    }
                }
            }

            _ = ping_intervall.tick() => {
                if letzter_empfang.elapsed() > timeout_dauer {
                    tracing::warn!(user_id = %user_id, "Verbindungs-Timeout");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    // Schliesst den Eingang; der lokale Task meldet die Verbindung ab
    drop(eingang_tx);
}

/// `GET /health` – Status und Zaehler
async fn health<R: Speicher>(State(app): State<AppState<R>>) -> impl IntoResponse {
    let state = &app.signaling;
    let antwort = HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_sek(),
        online_users: state.presence.online_anzahl(),
        connections: state.presence.verbindung_anzahl(),
        active_calls: state.anrufe.anzahl(),
    };
    (StatusCode::OK, Json(antwort))
}
