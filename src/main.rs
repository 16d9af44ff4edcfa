use actix_web::{web, App, HttpServer};
use clap::Parser;

mod api;
mod cli;
mod gateway;
mod metrics;
mod models;
mod services;
mod state;
mod utils;

use cli::CommandArgs;
use models::SupervisorConfig;
use state::new_state;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CommandArgs::parse();
    let bind_address = format!("{}:{}", args.address, args.port);
    let config = SupervisorConfig::from(&args);

    log::info!(
        "🔄 Polling processes every {:?}, watchlist every {:?}",
        config.poll_interval,
        config.watch_interval
    );

    let state = new_state(config);

    if !state.preferences.advisory_respawn_pids().is_empty() {
        log::warn!(
            "   Auto-respawn list from the last session is advisory only: {:?}",
            state.preferences.advisory_respawn_pids()
        );
    }

    print_banner(&args);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
        .bind(&bind_address)?
        .run()
        .await
}

fn print_banner(args: &CommandArgs) {
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║      Process Supervisor v{:<33}║", env!("CARGO_PKG_VERSION"));
    println!("║      Watchlist enforcement and auto-respawn               ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("🚀 Server starting on http://{}:{}", args.address, args.port);
    println!();
    println!("📋 Available endpoints:");
    println!("  GET    /api/processes                 - Current snapshot");
    println!("  GET    /api/processes/{{pid}}           - Process details");
    println!("  GET    /api/processes/{{pid}}/history   - CPU/memory history");
    println!("  POST   /api/processes/{{pid}}/kill      - Kill a process");
    println!("  POST   /api/processes/{{pid}}/restart   - Kill and restart");
    println!("  POST   /api/processes/{{pid}}/priority  - Set nice level");
    println!("  POST   /api/processes/{{pid}}/limits    - Set resource limits");
    println!("  GET    /api/watchlist                 - List watched names");
    println!("  POST   /api/watchlist                 - Watch a process name");
    println!("  DELETE /api/watchlist/{{name}}          - Stop watching a name");
    println!("  GET    /api/respawn                   - Auto-respawn members");
    println!("  POST   /api/respawn/{{pid}}             - Start auto-respawn");
    println!("  DELETE /api/respawn/{{pid}}             - Stop auto-respawn");
    println!("  POST   /api/batch                     - Batch kill/nice/respawn");
    println!("  GET    /api/logs                      - Event log");
    println!("  GET    /api/notifications             - Active notifications");
    println!("  GET    /api/preferences               - Read preferences");
    println!("  PUT    /api/preferences               - Save preferences");
    println!("  GET    /metrics                       - Prometheus metrics");
    println!("  GET    /health                        - Health check");
    println!();
    println!("💡 Preferences: {}", args.preferences_path.display());
    println!("═══════════════════════════════════════════════════════════");
}
