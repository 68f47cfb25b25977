//! Demo reminder daemon.
//!
//! Wires a seeded in-memory store, a notifier picked from the environment
//! and the sweep scheduler together, and exposes sweep metrics on /metrics.
//!
//! Environment:
//! - `REMIND_CADENCE_SECS`  sweep period (default 3600)
//! - `REMIND_LOG_FORMAT`    text | json | journald
//! - `REMIND_LOG_LEVEL`     EnvFilter directives (default "info")
//! - `REMIND_MAIL_ENDPOINT` mail gateway base URL; log sink when unset
//! - `REMIND_MAIL_TOKEN`    bearer token for the gateway
//! - `REMIND_MAIL_FROM`     sender address
//! - `REMIND_METRICS_ADDR`  metrics listen address (default 127.0.0.1:9464)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use remind_core::{Cadence, MemoryStore, Notify, ReminderScheduler, Sweeper};
use remind_model::{Contact, TaskDraft, UserId};
use remind_notify::{HttpMailer, MailerConfig, TraceNotifier};
use remind_observe::LogConfig;
use remind_prometheus::{Encoder, PrometheusSweepMetrics, TextEncoder};

struct DaemonConfig {
    cadence_secs: u64,
    log: LogConfig,
    mail: Option<MailerConfig>,
    metrics_addr: SocketAddr,
}

impl DaemonConfig {
    fn from_env() -> anyhow::Result<Self> {
        let cadence_secs = match std::env::var("REMIND_CADENCE_SECS") {
            Ok(v) => v.parse().context("invalid REMIND_CADENCE_SECS")?,
            Err(_) => 3600,
        };

        let mut log = LogConfig::default();
        if let Ok(format) = std::env::var("REMIND_LOG_FORMAT") {
            log.format = format.parse()?;
        }
        if let Ok(level) = std::env::var("REMIND_LOG_LEVEL") {
            log.level = level;
        }

        let mail = match std::env::var("REMIND_MAIL_ENDPOINT") {
            Ok(endpoint) => {
                let from = std::env::var("REMIND_MAIL_FROM")
                    .unwrap_or_else(|_| "reminders@example.com".to_string());
                let mut cfg = MailerConfig::new(endpoint, from);
                if let Ok(token) = std::env::var("REMIND_MAIL_TOKEN") {
                    cfg = cfg.with_token(token);
                }
                Some(cfg)
            }
            Err(_) => None,
        };

        let metrics_addr = std::env::var("REMIND_METRICS_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:9464".to_string())
            .parse()
            .context("invalid REMIND_METRICS_ADDR")?;

        Ok(Self {
            cadence_secs,
            log,
            mail,
            metrics_addr,
        })
    }
}

fn seed_demo_data(store: &MemoryStore) -> anyhow::Result<()> {
    let owner = UserId::from("demo-user");
    store.add_user(owner.clone(), Contact::new("demo@example.com", "Demo User"));

    store.create(
        owner.clone(),
        TaskDraft::new("submit expense report")
            .with_due_date(SystemTime::now() + Duration::from_secs(30 * 60))
            .with_lead_hours(1),
    )?;
    store.create(
        owner.clone(),
        TaskDraft::new("plan next sprint")
            .with_due_date(SystemTime::now() + Duration::from_secs(7 * 24 * 3600)),
    )?;
    // No due date: never reminder-eligible, listed for completeness.
    store.create(owner, TaskDraft::new("clean the garage"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = DaemonConfig::from_env()?;
    remind_observe::init(&cfg.log)?;

    let store = MemoryStore::new();
    seed_demo_data(&store)?;

    let notifier: Arc<dyn Notify> = match &cfg.mail {
        Some(mail) => {
            info!(endpoint = %mail.endpoint, "delivering reminders through the mail gateway");
            Arc::new(HttpMailer::new(mail.clone())?)
        }
        None => {
            info!("no mail gateway configured; reminders go to the log");
            Arc::new(TraceNotifier)
        }
    };

    let metrics = PrometheusSweepMetrics::new()?;
    let sweeper = Sweeper::new(Arc::new(store.clone()), Arc::new(store), notifier);
    let scheduler = ReminderScheduler::new(sweeper, Cadence::from_secs(cfg.cadence_secs)?)
        .with_metrics(Arc::new(metrics.clone()));

    let cancel = CancellationToken::new();

    let metrics_task = tokio::spawn(serve_metrics(
        cfg.metrics_addr,
        metrics,
        cancel.clone(),
    ));
    let scheduler_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    cancel.cancel();

    scheduler_task.await?;
    metrics_task.await??;
    Ok(())
}

async fn serve_metrics(
    addr: SocketAddr,
    metrics: PrometheusSweepMetrics,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(metrics));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
    info!(%addr, "metrics endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<PrometheusSweepMetrics>>) -> Response {
    let families = metrics.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
