use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    router_cli::main_entry().await
}
