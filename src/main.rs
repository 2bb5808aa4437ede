use anyhow::{Context, Result};
use clap::Parser;
use tracing::info_span;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use volimport::cli::{Cli, Command};
use volimport::ui::{self, ImportProgress};
use volimport::{
    ComputeClient, HttpComputeClient, HttpManifestFetcher, ImporterSettings, VolimportConfig,
    VolumeImporter,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "volimport=debug"
    } else {
        "volimport=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config =
        VolimportConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(region) = cli.region {
        config.region = region;
    }
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::Create { manifest_url, json } => create(&config, &manifest_url, json).await,
        Command::Zones => {
            let client = compute_client(&config)?;
            let zones = client
                .describe_availability_zones("available")
                .await
                .context("Failed to list availability zones")?;
            println!("{}", ui::format_zones(&zones));
            Ok(())
        }
        Command::Config => {
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
            Ok(())
        }
    }
}

fn compute_client(config: &VolimportConfig) -> Result<HttpComputeClient> {
    let client = HttpComputeClient::with_endpoint(
        config.endpoint.clone(),
        config.region.clone(),
        config.request_timeout(),
    )
    .context("Failed to build compute client")?;
    Ok(client.with_access_token(config.access_token.clone()))
}

async fn create(config: &VolimportConfig, manifest_url: &str, json: bool) -> Result<()> {
    let manifests = HttpManifestFetcher::new(config.request_timeout())
        .context("Failed to build manifest fetcher")?;
    let importer = VolumeImporter::new(
        compute_client(config)?,
        manifests,
        ImporterSettings::from(config),
    )
    .with_span(info_span!("volimport", endpoint = %config.endpoint, region = %config.region));

    let progress = ImportProgress::start(manifest_url);
    let result = importer.create_with_record(manifest_url).await;
    progress.complete(result.as_ref());

    let record = result.context("Volume import did not complete")?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to render record")?
        );
    } else {
        println!("{}", record.volume_id);
    }
    Ok(())
}
