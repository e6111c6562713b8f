use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scaffold::{telemetry, Args, Config, Scalar};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_tracing("scaffold=info")?;

    let config = Config::load(&args).context("Failed to load configuration")?;
    let http = Arc::new(config.http.client()?);
    let provider = config.provider(http);

    let scaffold = provider.resolve(&args.scaffold)?;
    scaffold.ready().await?;

    if !args.query.is_empty() {
        let overrides = args
            .query
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .with_context(|| format!("Expected KEY=VALUE, got '{pair}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        scaffold.update_query(|query| {
            for (key, value) in overrides {
                query.set(key, Scalar::from(value));
            }
        });
        if args.page.is_none() {
            scaffold.refresh().await?;
        }
    }

    if let Some(page) = args.page {
        scaffold.page(page).await?;
    }

    println!("{}", serde_json::to_string_pretty(&scaffold.items())?);

    if let Some(pagination) = scaffold.pagination() {
        tracing::info!(
            current = pagination.current(),
            pages = ?pagination.pages(),
            "Pagination"
        );
    }

    Ok(())
}
