use guitar_share_api::app::create_app;
use guitar_share_api::config::{load_config, save_default_config};
use guitar_share_api::constants::{BLOBS_DIR, CONFIG_PATH, DATABASE_PATH, DATA_DIR};
use guitar_share_api::database::{create_pool, init_database};
use guitar_share_api::logging::{init_logging, install_panic_hook};
use guitar_share_api::storage::LocalBlobStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

fn init_directories() {
    for dir in [&*DATA_DIR, &*BLOBS_DIR] {
        std::fs::create_dir_all(dir).ok();
    }
}

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--init-config") {
        match save_default_config(&CONFIG_PATH) {
            Ok(_) => {
                println!("Default configuration saved to {:?}", *CONFIG_PATH);
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("Failed to save default configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    init_logging();
    install_panic_hook();

    let config = Arc::new(load_config(&CONFIG_PATH));

    init_directories();

    let pool = create_pool(&DATABASE_PATH).expect("Failed to create database pool");

    {
        let conn = pool.get().expect("Failed to get connection");
        init_database(&conn).expect("Failed to initialize database");
    }

    let blobs = Arc::new(LocalBlobStore::new(
        BLOBS_DIR.as_path(),
        &config.storage.public_base_url,
    ));

    let app = create_app(Arc::clone(&config), pool, blobs);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.server.port)));
    info!("Starting guitar share API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server failed");
}
