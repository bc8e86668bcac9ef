use hemmer_provider_azurerm::{init_logging, serve, AzureRmProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting hemmer-provider-azurerm");
    serve(AzureRmProvider::new()).await
}
