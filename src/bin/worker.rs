#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examena_rust::run_worker().await {
        eprintln!("examena-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
