#[tokio::main]
async fn main() {
    let code = commitscan::app::startup::startup().await;
    std::process::exit(code);
}
