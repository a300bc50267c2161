//! Credence Backend Server
//!
//! Wires the credit intelligence services together: Aadhaar OTP
//! authentication, consent lifecycle, the Account Aggregator pipeline, the
//! per-source analysers, and the NovaScore aggregation surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use credence_backend::aa::{AaClient, AaSettings, DetachedJwsSigner, FiSessionStore};
use credence_backend::aadhaar::{IdentityStore, OtpService, OtpSettings};
use credence_backend::analysis::gst::GstService;
use credence_backend::analysis::utility::UtilityService;
use credence_backend::app_state::AppState;
use credence_backend::config::Config;
use credence_backend::consent::ConsentService;
use credence_backend::middleware::{request_tracing, security_headers};
use credence_backend::models::HealthResponse;
use credence_backend::routes;
use credence_backend::services::social::{SamplePlatformFetcher, SocialService};
use credence_backend::transport::{LogSmsSender, ReqwestTransport};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(
        stage = config.stage.as_str(),
        database = %config.database_url_masked(),
        degraded_allowed = config.allow_degraded,
        "Starting Credence backend"
    );

    let db_pool = connect_database(&config).await;
    let store_mode = if db_pool.is_some() { "postgres" } else { "memory" };

    // Key material is loaded once at startup; absence degrades (dev only).
    let uidai_public_pem = read_pem(config.uidai_public_key_pem_path.as_deref(), "UIDAI public key");
    let aa_signing_pem = read_pem(config.aa_signing_key_pem_path.as_deref(), "AA signing key");

    let http = Arc::new(ReqwestTransport::new());
    let sms = Arc::new(LogSmsSender);

    let identity_store = Arc::new(IdentityStore::new(
        config.max_otp_attempts,
        std::time::Duration::from_secs(config.otp_lockout_seconds),
    ));
    let otp_service = Arc::new(OtpService::new(
        identity_store,
        http.clone(),
        sms,
        OtpSettings {
            auth_url: config.uidai_auth_url.clone(),
            aua_code: config.aua_code.clone(),
            sub_aua_code: config.sub_aua_code.clone(),
            license_key: config.aua_license_key.clone(),
            uidai_public_pem,
            test_otp: config.test_otp.clone(),
            allow_degraded: config.allow_degraded,
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl_minutes: config.jwt_ttl_minutes,
        },
    ));

    let consent_service = Arc::new(ConsentService::new(db_pool.clone()));
    consent_service.ensure_schema().await;

    let signer = match DetachedJwsSigner::from_pem(
        aa_signing_pem.as_deref(),
        &config.aa_client_id,
        &config.jwt_secret,
        config.allow_degraded,
    ) {
        Ok(signer) => Arc::new(signer),
        Err(e) => {
            tracing::error!(error = %e, "cannot construct AA signer");
            std::process::exit(1);
        }
    };

    let aa_client = Arc::new(AaClient::new(
        http.clone(),
        signer,
        consent_service.clone(),
        Arc::new(FiSessionStore::new()),
        AaSettings {
            base_url: config.aa_base_url.clone(),
            client_api_key: config.aa_client_api_key.clone(),
            fiu_entity_id: config.fiu_entity_id.clone(),
            allow_degraded: config.allow_degraded,
        },
    ));

    let gst_service = Arc::new(GstService::new(
        http.clone(),
        config.gsp_base_url.clone(),
        config.allow_degraded,
    ));
    let utility_service = Arc::new(UtilityService::new(
        http.clone(),
        config.bbps_base_url.clone(),
        config.allow_degraded,
    ));

    let social_service = Arc::new(SocialService::new(
        Arc::new(SamplePlatformFetcher),
        db_pool.clone(),
    ));
    social_service.ensure_schema().await;

    let app_state = AppState {
        otp_service,
        consent_service,
        aa_client,
        gst_service,
        utility_service,
        social_service,
        environment: config.stage.as_str().to_string(),
    };

    let environment = config.stage.as_str().to_string();
    let app = Router::new()
        .route(
            "/health",
            get(move || health_check(store_mode, environment.clone())),
        )
        .merge(routes::aadhaar_routes())
        .merge(routes::consent_routes())
        .merge(routes::fi_routes())
        .merge(routes::analysis_routes())
        .merge(routes::behaviour_routes())
        .merge(routes::social_routes())
        .merge(routes::score_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(security_headers))
        .layer(axum::middleware::from_fn(request_tracing))
        .layer(configure_cors(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "cannot bind {}", addr);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server exited with error");
    }

    tracing::info!("Server shutdown complete");
}

/// Connect to Postgres when configured. Failure is not fatal: the consent
/// and social stores fall back to memory.
async fn connect_database(config: &Config) -> Option<PgPool> {
    let url = config.database_url.as_ref()?;
    match PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Database connected");
            Some(pool)
        }
        Err(e) => {
            tracing::warn!(error = %e, "database unavailable, stores run in memory");
            None
        }
    }
}

fn read_pem(path: Option<&str>, label: &str) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(pem) => Some(pem),
        Err(e) => {
            tracing::warn!(%path, error = %e, "{} unreadable", label);
            None
        }
    }
}

async fn health_check(store_mode: &'static str, environment: String) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        store_mode: store_mode.to_string(),
        environment,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(config: &Config) -> CorsLayer {
    let Some(origins_raw) = config.cors_allowed_origins.as_deref() else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins_raw
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
