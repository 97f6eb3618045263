use axum::{
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod handlers;
mod jobs;
mod pagination;
mod services;
mod validation;
mod workflows;

pub use error::ApiResult;

use workflows::collaborators::{Collaborators, MessageGateway};
use workflows::postgres::PgWorkflowStore;
use workflows::WorkflowEngine;


pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Gestor Workflow Engine API v1.0.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/workflows", handlers::workflow_routes())
        .nest("/api/v1/message-templates", handlers::message_template_routes())
        .nest("/api/v1/workflow-events", handlers::workflow_event_routes())
        .nest("/api/v1/workflow-jobs", handlers::scheduled_job_routes())
        .nest("/api/v1/workflow-logs", handlers::execution_log_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn collaborators(config: &config::Config) -> anyhow::Result<Collaborators> {
    let entities = Arc::new(services::EntityServiceClient::new(config.entity_service.clone()));

    let email: Arc<dyn MessageGateway> = if config.smtp.is_configured() {
        Arc::new(services::EmailService::new(&config.smtp)?)
    } else {
        tracing::warn!("SMTP is not configured, email actions will fail");
        Arc::new(services::EmailDisabled)
    };

    Ok(Collaborators {
        entities: entities.clone(),
        callbacks: entities,
        chat: Arc::new(services::ChatGatewayClient::new(config.chat_gateway.clone())),
        email,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url, database::PoolConfig::from_env()).await?;

    database::migrate(&db_pool).await?;

    let store = Arc::new(PgWorkflowStore::new(db_pool));
    let engine = Arc::new(WorkflowEngine::new(
        store,
        collaborators(&config)?,
        config.dispatcher.clone(),
    ));

    let mut scheduler = jobs::JobScheduler::new(engine.dispatcher.clone()).await?;
    scheduler.start().await?;

    let app = app(Arc::new(AppState { engine }));

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    scheduler.shutdown().await?;
    Ok(())
}
