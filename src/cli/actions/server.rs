use crate::{api, push::service::PushConfig};
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub frontend_base_url: String,
    pub attempt_ttl_seconds: i64,
    pub retention_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub token_ttl_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the database connection or the listener fails.
pub async fn execute(args: Args) -> Result<()> {
    let push_config = PushConfig::new()
        .with_attempt_ttl_seconds(args.attempt_ttl_seconds)
        .with_retention_seconds(args.retention_seconds)
        .with_sweep_interval_seconds(args.sweep_interval_seconds)
        .with_token_ttl_seconds(args.token_ttl_seconds);

    api::new(args.port, args.dsn, &args.frontend_base_url, push_config).await
}
