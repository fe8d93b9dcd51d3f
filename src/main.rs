#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examena_rust::run().await {
        eprintln!("examena-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
