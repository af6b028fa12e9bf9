#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, App, HttpServer};
use billboard_gate::{server::AppServices, settings::BillboardSettings};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = BillboardSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    start_server(settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if binding or running the server fails
async fn start_server(settings: BillboardSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let cors_origins = settings.get_cors_origins();
    let services = AppServices::from_settings(settings);

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        let services = services.clone();
        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .configure(move |cfg| services.configure(cfg))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &BillboardSettings) {
    println!("Starting billboard-gate on http://{bind_address}");
    println!("Document store: {:?}", settings.store.backend);
    if !settings.payments.verify_payments {
        println!("WARNING: payment verification is disabled");
    }
    println!();
    println!("API endpoints:");
    println!("  POST /api/feature-listing - Mark a job or listing as featured");
    println!("  POST /api/chats           - Start a chat (session required)");
    println!();
    println!("Session endpoints:");
    println!("  POST /auth/session         - Exchange an ID token for a session cookie");
    println!("  GET|POST /auth/sign_out    - Clear the session");
    println!("  GET  /auth/userinfo        - Current session");
    println!();
    println!("Pages:");
    println!("  ALL {{any other path}}      - Guarded, then proxied to {}", settings.proxy.upstream_url);
    println!("  Protected prefixes: {}", settings.routes.protected_prefixes.join(", "));
    println!();
    println!("System endpoints:");
    println!("  GET  /ping                 - Health check");
}
