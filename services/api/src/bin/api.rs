//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, question_llm::OpenAiQuestionAdapter, scoring_llm::OpenAiScoringAdapter},
    config::Config,
    error::ApiError,
    web::{
        average_rating_handler, generate_interview_handler, get_feedback_handler,
        get_interview_handler, list_latest_interviews_handler, list_user_interviews_handler,
        rate_feedback_handler, rate_interview_handler, rest::ApiDoc, state::AppState,
        submit_transcript_handler, update_interview_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use interview_prep_core::feedback::FeedbackEngine;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let scoring_adapter = Arc::new(OpenAiScoringAdapter::new(
        openai_client.clone(),
        config.scoring_model.clone(),
        config.scoring_timeout_secs,
    ));
    let question_adapter = Arc::new(OpenAiQuestionAdapter::new(
        openai_client.clone(),
        config.question_model.clone(),
    ));

    // --- 4. Build the Engine and Shared AppState ---
    let engine = Arc::new(FeedbackEngine::new(
        db_adapter.clone(),
        scoring_adapter.clone(),
    ));
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        engine,
        question_adapter,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route(
            "/interviews",
            post(generate_interview_handler).get(list_latest_interviews_handler),
        )
        .route(
            "/interviews/{id}",
            get(get_interview_handler).patch(update_interview_handler),
        )
        .route("/users/{id}/interviews", get(list_user_interviews_handler))
        .route(
            "/interviews/{id}/feedback",
            post(submit_transcript_handler).get(get_feedback_handler),
        )
        .route(
            "/interviews/{id}/rating",
            post(rate_interview_handler).get(average_rating_handler),
        )
        .route("/feedback/{id}/rating", post(rate_feedback_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
