use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sesv2::Client as SesClient;

pub mod config;
pub mod contact;
pub mod email;
pub mod gallery;
pub mod notifications;

pub use config::AppConfig;

/// Clients and configuration shared by every request of a Lambda instance
pub struct AppState {
    pub dynamo_client: DynamoClient,
    pub s3_client: S3Client,
    pub ses_client: SesClient,
    pub config: AppConfig,
}

impl AppState {
    pub async fn from_env() -> Self {
        let aws_config = aws_config::load_from_env().await;
        let config = AppConfig::from_env();
        tracing::info!(
            "Loaded config: table={} bucket={} origins={}",
            config.table_name,
            config.bucket_name,
            config.allowed_origins.len()
        );

        Self {
            dynamo_client: DynamoClient::new(&aws_config),
            s3_client: S3Client::new(&aws_config),
            ses_client: SesClient::new(&aws_config),
            config,
        }
    }
}
