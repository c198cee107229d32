use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    coderag_cli::main_entry().await
}
