#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medigo::start_server().await
}
