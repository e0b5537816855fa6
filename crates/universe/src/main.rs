use std::time::Instant;

#[tokio::main]
async fn main() {
    let started_at = Instant::now();
    let code = lib_universe::init(started_at).await;
    std::process::exit(code);
}
