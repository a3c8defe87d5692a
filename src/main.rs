use muleb2b_provider::{init_logging, serve, MuleB2bProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(MuleB2bProvider::new()).await
}
