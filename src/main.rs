use fitlog::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let config = AppConfig::from_env()?;
  fitlog::init_tracing(&config.log_filter);

  fitlog::run(config).await
}
