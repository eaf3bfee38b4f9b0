#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examgate_rust::run_worker().await {
        eprintln!("examgate-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
