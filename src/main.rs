#[tokio::main]
async fn main() {
    if let Err(e) = recordgate::run().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
