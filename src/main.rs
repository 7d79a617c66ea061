#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    teamchurch_site::run().await
}
