// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `storebot serve` command implementation.
//!
//! Opens SQLite storage, wires the OpenAI provider and embedder, the Meta
//! Graph sender, media re-hosting, the order mailer and the tool
//! dispatcher into the orchestrator, then serves the HTTP gateway until
//! SIGINT/SIGTERM. Accepted webhook work is drained before exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use storebot_agent::{
    install_signal_handler, AttachmentNormalizer, BackgroundTasks, DedupCache,
    MessengerPipeline, Orchestrator, WebAssistant,
};
use storebot_config::model::StorebotConfig;
use storebot_core::StorebotError;
use storebot_gateway::{AuthConfig, GatewayState, HealthState, MetaSettings};
use storebot_meta::{
    graph_client, ChannelOnboarding, CredentialManager, HttpBlobStore, MediaRehoster,
    MessengerChannel,
};
use storebot_openai::{OpenAiEmbedder, OpenAiProvider};
use storebot_storage::Database;
use storebot_tools::{SmtpMailer, ToolDispatcher};
use tracing::{error, info, warn};

/// How long accepted webhook deliveries may keep running after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything `serve` runs, built from config.
struct Components {
    state: GatewayState,
    dedup: Arc<DedupCache>,
    tasks: BackgroundTasks,
}

/// Runs the `storebot serve` command.
pub async fn run_serve(config: StorebotConfig) -> Result<(), StorebotError> {
    init_tracing(&config.server.log_level);
    info!("starting storebot serve");

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let components = build_components(&config, db.clone()).inspect_err(|e| {
        error!(error = %e, "failed to initialize components");
    })?;

    let shutdown = install_signal_handler();
    let sweeper = components.dedup.spawn_sweeper(
        Duration::from_secs(config.dedup.sweep_interval_secs),
        shutdown.child_token(),
    );

    let served =
        storebot_gateway::start_server(&config.server, components.state, shutdown.clone()).await;
    // A server error must still stop the sweeper and drain accepted work.
    shutdown.cancel();

    if !components.tasks.drain(DRAIN_TIMEOUT).await {
        warn!("exiting with unfinished webhook work");
    }
    if let Err(e) = sweeper.await {
        warn!(error = %e, "dedup sweeper ended abnormally");
    }
    if let Err(e) = db.close().await {
        warn!(error = %e, "database close failed");
    }

    info!("storebot stopped");
    served
}

fn build_components(config: &StorebotConfig, db: Database) -> Result<Components, StorebotError> {
    let provider = Arc::new(OpenAiProvider::new(&config.openai).inspect_err(|_| {
        eprintln!(
            "error: OpenAI API key required. Set openai.api_key, STOREBOT_OPENAI_API_KEY or OPENAI_API_KEY"
        );
    })?);
    let embedder = Arc::new(OpenAiEmbedder::new(&config.openai)?);

    let graph = graph_client(&config.meta)?;
    let credentials = CredentialManager::new(
        db.clone(),
        graph.clone(),
        Duration::from_secs(config.meta.token_refresh_buffer_secs),
        config.meta.token_lifetime_days,
    );
    let channel = Arc::new(MessengerChannel::new(
        db.clone(),
        graph.clone(),
        credentials.clone(),
    ));

    let mut tools = ToolDispatcher::new(db.clone())
        .with_channel(channel.clone())
        .with_embedder(embedder);
    match SmtpMailer::from_config(&config.email)? {
        Some(mailer) => tools = tools.with_mailer(Arc::new(mailer)),
        None => info!("email not configured, order mails disabled"),
    }

    let normalizer = match HttpBlobStore::from_config(&config.blob)? {
        Some(blob) => AttachmentNormalizer::new(Some(Arc::new(MediaRehoster::new(
            graph.clone(),
            Arc::new(blob),
            config.meta.cdn_markers.clone(),
            config.blob.key_prefix.clone(),
        )))),
        None => {
            info!("blob storage not configured, images keep their CDN urls");
            AttachmentNormalizer::default()
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        db.clone(),
        provider,
        Arc::new(tools),
        config.assistant.clone(),
    ));

    let dedup = Arc::new(DedupCache::from_config(&config.dedup));
    let tasks = BackgroundTasks::new();
    let pipeline = Arc::new(
        MessengerPipeline::new(db.clone(), Arc::clone(&dedup), Arc::clone(&orchestrator), channel)
            .with_normalizer(normalizer)
            .with_credentials(credentials)
            .with_tasks(tasks.clone()),
    );

    let onboarding = if config.meta.app_id.is_some() && config.meta.app_secret.is_some() {
        Some(Arc::new(ChannelOnboarding::new(db.clone(), graph, &config.meta)))
    } else {
        info!("meta app credentials not configured, onboarding routes disabled");
        None
    };
    if config.meta.verify_token.is_none() {
        warn!("meta.verify_token not set, webhook verification will always fail");
    }
    if config.server.bearer_token.is_none() {
        warn!("server.bearer_token not set, authenticated routes reject every request");
    }

    let state = GatewayState {
        web: WebAssistant::new(db, orchestrator),
        pipeline,
        onboarding,
        meta: MetaSettings::from(&config.meta),
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
        health: HealthState {
            start_time: Instant::now(),
        },
    };

    Ok(Components {
        state,
        dedup,
        tasks,
    })
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("storebot={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
