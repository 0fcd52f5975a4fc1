mod app;
mod cli;
pub mod desk;
pub mod navigation;
pub mod notifications;
mod redact;
pub mod session;
pub mod settings;
pub mod state;
mod telemetry;
pub mod types;

pub async fn run() -> anyhow::Result<()> {
    app::run().await
}
