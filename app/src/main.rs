#[tokio::main]
async fn main() -> anyhow::Result<()> {
    epo_app::run().await
}
