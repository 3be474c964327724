#[allow(unused_imports)]
use crate::api::handlers::{
    auth::login::{__path_login, login},
    auth::me::{__path_me, me},
    auth::signup::{__path_signup, signup},
    auth::types::{
        ContactAddRequest, LoginRequest, MessageCreateRequest, MessageResponse,
        RecoveryCodeResponse, SignupRequest, SignupResponse, Token, UserDetailsResponse,
        UserResponse,
    },
    contacts::{__path_add_contact, __path_list_contacts, add_contact, list_contacts},
    health::{__path_health, health, Health},
    messages::{
        __path_conversation, __path_send_message, __path_user_public_key, conversation,
        send_message, user_public_key,
    },
    settings::{__path_regenerate_code, regenerate_code},
};
use crate::directory::{postgres::PgStore, store::MessageStore, IdentityDirectory};
use crate::token::TokenService;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        signup,
        login,
        me,
        list_contacts,
        add_contact,
        regenerate_code,
        send_message,
        conversation,
        user_public_key
    ),
    components(schemas(
        Health,
        SignupRequest,
        SignupResponse,
        LoginRequest,
        Token,
        UserResponse,
        UserDetailsResponse,
        ContactAddRequest,
        RecoveryCodeResponse,
        MessageCreateRequest,
        MessageResponse
    )),
    tags(
        (name = "kuriero", description = "End-to-end encrypted messaging API"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Start the server
/// # Errors
/// Returns an error if the database is unreachable or the listener fails.
pub async fn new(port: u16, dsn: String, tokens: Arc<TokenService>) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    let directory = Arc::new(IdentityDirectory::new(store.clone()));
    let messages: Arc<dyn MessageStore> = store;

    let app = router(directory, messages, tokens);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn router(
    directory: Arc<IdentityDirectory>,
    messages: Arc<dyn MessageStore>,
    tokens: Arc<TokenService>,
) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/token", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/contacts", get(list_contacts))
        .route("/api/contacts/add", post(add_contact))
        .route("/api/settings/regenerate-code", post(regenerate_code))
        .route("/api/messages", post(send_message))
        .route(
            "/api/messages/conversation/:peer_username",
            get(conversation),
        )
        .route("/api/messages/users/:username/key", get(user_public_key))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(directory))
                .layer(Extension(messages))
                .layer(Extension(tokens)),
        )
        .route("/health", get(health).options(health))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
