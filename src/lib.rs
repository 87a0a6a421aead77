#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

use services::gateway::HttpGateway;
use services::orchestrator::Orchestrator;

/// The orchestrator the desktop shell manages.
pub type AppState = Orchestrator<HttpGateway>;

/// Initialise `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use config::GatewayConfig;
    use tauri::Manager;

    init_logging();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(|app| {
            let config = GatewayConfig::default();
            log::info!("Using analysis gateway at {}", config.base_url);

            let gateway = HttpGateway::new(config)?;
            app.manage(Orchestrator::new(gateway));

            // First connectivity probe; the UI can retry it later.
            let app_handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let orchestrator = app_handle.state::<AppState>();
                let snapshot = orchestrator.initialize().await;
                log::info!("Gateway connectivity: {:?}", snapshot.connectivity);
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::session::get_session,
            commands::session::method_catalog,
            commands::session::select_file,
            commands::session::set_method,
            commands::session::select_model,
            commands::session::refresh_models,
            commands::session::set_crop_face_first,
            commands::session::request_crop,
            commands::session::clear_crop,
            commands::session::start_analysis,
            commands::session::retry_analysis,
            commands::session::dismiss_error,
            commands::session::reset_session,
            commands::session::check_connectivity,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
