mod api;
mod history_source;
mod host;
mod poller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
