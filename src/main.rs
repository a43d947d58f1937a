use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get, web};
use anyhow::Context;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use classroom::config::Config;
use classroom::db::init_store;
use classroom::docs::ApiDoc;
use classroom::routes::{self, RateLimiters};
use classroom::utils::batch_owner_cache::BatchOwnerCache;

#[get("/")]
async fn index() -> impl Responder {
    "Classroom API"
}

#[get("/api-doc/openapi.json")]
async fn openapi_json() -> impl Responder {
    web::Json(ApiDoc::openapi())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "classroom.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let store = init_store(config.database_url.as_deref()).await?;
    let limiters = RateLimiters::new(&config)?;
    let owners = BatchOwnerCache::default();

    let store_data = Data::from(store);
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(store_data.clone())
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(owners.clone()))
            .service(index)
            .service(openapi_json);

        #[cfg(feature = "swagger-ui")]
        let app = app.service(
            // wildcard {_:.*} so the JS/CSS assets match too
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-doc/swagger.json", ApiDoc::openapi()),
        );

        app.configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await
    .context("Server error")
}
