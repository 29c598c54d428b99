#[tokio::main]
async fn main() {
  if let Err(e) = gym_reset_lib::run().await {
    tracing::error!(error = %e, "gym-reset failed to start");
    std::process::exit(1);
  }
}
