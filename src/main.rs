use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use tutor_booking::{
    config::Config,
    db::SqliteStore,
    memory::MemoryStore,
    routes,
    seed,
    state::AppState,
    store::Store,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(db_url) => {
            log::info!("Using SQLite store at {db_url}");
            Arc::new(SqliteStore::connect(db_url, config.max_connections).await?)
        }
        None => {
            log::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    seed::seed_defaults(store.as_ref(), &config.seed).await?;

    let state = AppState::new(store, config.default_week);

    let address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting tutor booking on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
