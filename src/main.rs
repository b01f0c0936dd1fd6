use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use language_teacher::{
  audio::GoogleTranslateTts,
  config, db, handlers,
  llm::GeminiClient,
  planning::{JsonFileStore, PlanningSession},
  state::AppState,
};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "language_teacher=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let settings = config::load_settings().expect("Failed to load configuration");
  if settings.llm.api_key.is_none() {
    tracing::warn!("GEMINI_KEY is not set, model calls will fail");
  }

  let pool = db::init_db(&settings.database_path).expect("Failed to initialize database");

  let store = Arc::new(JsonFileStore::new(settings.planning.study_plan_path.clone()));
  let planning = PlanningSession::restore(store.as_ref()).unwrap_or_else(|e| {
    tracing::warn!("Could not restore study plan, starting fresh: {}", e);
    PlanningSession::new()
  });
  if let Some(plan) = planning.plan() {
    tracing::info!("Restored study plan '{}'", plan.title);
  }

  let llm = Arc::new(GeminiClient::new(&settings.llm).with_usage_log(pool.clone()));
  let addr = settings.bind_addr();
  let state = AppState::new(
    pool,
    llm,
    Arc::new(GoogleTranslateTts::new()),
    settings,
    store,
    planning,
  );

  let app = handlers::router(state).layer(TraceLayer::new_for_http());

  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", addr));

  tracing::info!("Server running on http://{}", addr);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
