#[tokio::main]
async fn main() {
    if let Err(e) = bugtrack_lib::run().await {
        eprintln!("bugtrack: {e}");
        std::process::exit(1);
    }
}
