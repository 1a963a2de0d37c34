use std::{future::IntoFuture, net::SocketAddr};

use axum::{extract::State, routing::get, Router};
use serde::Serialize;
use sqlx::PgPool;
use tokio::{signal, sync::oneshot};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{accounts, config::AppConfig, error::AppError, response::ApiResponse, state::AppState};

/// Requests that run past `state.request_timeout` are answered with 408.
pub fn build_app(state: AppState) -> Router {
    let request_timeout = state.request_timeout;
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(accounts::router())
                .route("/health", get(health)),
        )
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

#[derive(Serialize)]
struct Health {
    database: &'static str,
}

async fn health(State(db): State<PgPool>) -> Result<ApiResponse<Health>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&db)
        .await
        .map_err(AppError::StoreUnavailable)?;
    Ok(ApiResponse::ok(Health { database: "ok" }))
}

/// Serves until Ctrl-C or SIGTERM, then drains in-flight requests for at
/// most `config.shutdown_grace`.
pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_addr().parse()?;

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received; draining connections");
            let _ = stopping_tx.send(());
        })
        .into_future();

    let grace = config.shutdown_grace;
    let deadline = async move {
        match stopping_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = server => {
            res?;
            info!("server stopped");
        }
        _ = deadline => {
            warn!(grace_secs = grace.as_secs(), "grace period elapsed; forcing shutdown");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
