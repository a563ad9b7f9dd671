use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use phytoscan::analysis::pipeline::Pipeline;
use phytoscan::capability::gemini::GeminiClient;
use phytoscan::capability::retry::RetryingCapability;
use phytoscan::capability::ModelCapability;
use phytoscan::config::AppConfig;
use phytoscan::routes::{configure_routes, AppState};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let gemini = GeminiClient::new(&config.model).map_err(|e| {
        log::error!("Failed to create model client: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    if gemini.is_configured() {
        log::info!("Model endpoint: {}", gemini.endpoint());
    } else {
        log::warn!(
            "GEMINI_API_KEY is not set. Analysis requests will fail until it is configured."
        );
    }

    let capability: Arc<dyn ModelCapability> =
        Arc::new(RetryingCapability::new(gemini, config.model.max_retries));

    log::info!(
        "Capability: {} ({}), plant name source: {}, advice mode: {}, retries: {}, stage timeout: {}s",
        capability.name(),
        config.model.model,
        config.analysis.plant_name_source,
        config.analysis.advice_mode,
        config.model.max_retries,
        config.model.stage_timeout_secs
    );

    let pipeline = Pipeline::new(capability.clone(), capability, &config.pipeline_options());

    let body_limit = AppState::body_limit_for(config.analysis.max_image_bytes);
    let state = web::Data::new(AppState {
        pipeline,
        model_name: config.model.model.clone(),
        plant_name_source: config.analysis.plant_name_source,
        advice_mode: config.analysis.advice_mode,
        body_limit,
    });

    let frontend_dir = config.server.frontend_dir.clone();
    if let Some(dir) = &frontend_dir {
        log::info!("Serving UI from {}", dir);
    }

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .expose_headers(vec![phytoscan::routes::REQUEST_ID_HEADER])
                    .max_age(3600),
            )
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, body_limit, frontend_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
