use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use helpline_api::auth::{self, AppState, AppStateInner};
use helpline_api::dashboard;
use helpline_api::middleware::require_auth;
use helpline_api::rooms;
use helpline_chat::ChatService;
use helpline_crypto::{Codec, keys};
use helpline_gateway::connection;
use helpline_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    chat: Arc<ChatService>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpline=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HELPLINE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("HELPLINE_DB_PATH").unwrap_or_else(|_| "helpline.db".into());
    let host = std::env::var("HELPLINE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HELPLINE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Message key: stable across restarts when configured, otherwise a fresh
    // key is generated — old ciphertext becomes unreadable on restart then.
    let key = match std::env::var("HELPLINE_MESSAGE_KEY") {
        Ok(encoded) => keys::key_from_base64(&encoded)?,
        Err(_) => {
            let key = keys::generate_message_key();
            warn!(
                "HELPLINE_MESSAGE_KEY not set; generated ephemeral key {}",
                keys::key_to_base64(&key)
            );
            key
        }
    };

    // Init database and chat engine
    let db = Arc::new(helpline_db::Database::open(&PathBuf::from(&db_path))?);
    let chat = Arc::new(ChatService::new(db.clone(), Codec::new(key)));

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        chat: chat.clone(),
        dispatcher: dispatcher.clone(),
        jwt_secret: jwt_secret.clone(),
    });

    let state = ServerState {
        dispatcher,
        chat,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/user/register", post(auth::register_user))
        .route("/auth/user/login", post(auth::login_user))
        .route("/auth/admin/register", post(auth::register_admin))
        .route("/auth/admin/login", post(auth::login_admin))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/user/rooms/{admin_type}", get(rooms::resolve_user_room))
        .route("/user/rooms/{admin_type}/open", post(rooms::open_user_room))
        .route("/admin/rooms/{user}/open", post(rooms::open_admin_room))
        .route("/rooms/{room_id}/messages", get(rooms::get_messages))
        .route("/rooms/{room_id}/messages", post(rooms::send_message))
        .route("/rooms/{room_id}/read", post(rooms::mark_read))
        .route("/user/updates", get(dashboard::user_updates))
        .route("/admin/updates", get(dashboard::admin_updates))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Helpline server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.chat, state.jwt_secret)
    })
}
