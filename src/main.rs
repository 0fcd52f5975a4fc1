#[tokio::main]
async fn main() -> anyhow::Result<()> {
    desk_session_lib::run().await
}
