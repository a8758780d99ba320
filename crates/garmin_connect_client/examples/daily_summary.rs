use garmin_connect_client::{
    Authenticator, DailyMetric, GarminClient, config::ClientConfig, sso::GarminConnect,
};
use std::path::PathBuf;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a token bundle written by a previous `garmin-sync` run.
    let Some(token_dir) = std::env::var("GARMINTOKENS").ok().map(PathBuf::from) else {
        eprintln!("set GARMINTOKENS to the directory holding oauth2_token.json");
        return Ok(());
    };

    let auth = GarminConnect::new(ClientConfig::from_env());
    let client = auth.restore(&token_dir).await?;

    let today = chrono::Local::now().date_naive();
    let summary = client.get_daily_metric(DailyMetric::Summary, today).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
