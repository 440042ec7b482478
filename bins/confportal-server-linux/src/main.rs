use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use confportal_core::storage::FileStorage;
use confportal_core::ConfigState;
use confportal_web::{portal_router, SessionController};

/// Demo schema: the parameters a small sensor node would expose.
const SCHEMA: &str = r#"[
    {"name":"ssid","label":"WiFi SSID","type":"text","default":""},
    {"name":"pwd","label":"WiFi Password","type":"password","default":""},
    {"name":"interval","label":"Report interval (s)","type":"number","min":1,"max":3600,"default":60},
    {"name":"threshold","label":"Alert threshold","type":"range","min":0,"max":100,"default":50},
    {"name":"calibration","label":"Calibration factor","type":"float","default":"1.0"},
    {"name":"led","label":"Status LED","type":"check","default":"1"},
    {"name":"mode","label":"Operating mode","type":"select",
     "options":[{"v":"auto","l":"Automatic"},{"v":"manual","l":"Manual"},{"v":"off","l":"Off"}]},
    {"name":"days","label":"Active days","type":"multicheck",
     "options":[{"v":"mo","l":"Monday"},{"v":"tu","l":"Tuesday"},{"v":"we","l":"Wednesday"},
                {"v":"th","l":"Thursday"},{"v":"fr","l":"Friday"},
                {"v":"sa","l":"Saturday"},{"v":"su","l":"Sunday"}]},
    {"name":"notes","label":"Notes","type":"textarea","min":40,"max":5,"default":""}
]"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,confportal_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Config portal starting...");

    let mut state = ConfigState::new();
    let report = state.load_schema(SCHEMA)?;
    if !report.is_clean() {
        tracing::warn!("schema truncated: {:?}", report);
    }
    state.set_device_name("demo-node");

    let mut controller = SessionController::new(state, FileStorage::new("portal.conf"));
    if let Err(e) = controller.load() {
        tracing::warn!("could not load stored configuration: {}", e);
    }

    controller.on_save_text(|json| {
        tracing::info!("configuration saved: {}", json);
    });
    controller.on_restart(|| {
        tracing::info!("restart requested (this demo keeps running)");
    });

    let app = portal_router(Arc::new(Mutex::new(controller)));

    let addr: SocketAddr = "0.0.0.0:8080".parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🚀 Config portal ready!");
    tracing::info!("   Form: http://localhost:8080/");
    tracing::info!("   Try:  curl http://localhost:8080/");

    axum::serve(listener, app).await?;
    Ok(())
}
