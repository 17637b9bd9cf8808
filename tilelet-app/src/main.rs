//! Command-line front end for tilelet sources.
//!
//! ```text
//! tilelet-app info "parking://?url=https%3A%2F%2Fexample.com%2Flots&format=lots"
//! tilelet-app tile "geojson://" 14 8710 5670 -o tile.pbf.gz
//! ```
//!
//! Options missing from the URI fall back to the `TILELET_*` environment
//! variables.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;
use tilelet::{Source, SourceConfig};

fn cli() -> Command {
    let uri = Arg::new("uri")
        .value_name("URI")
        .help("Source URI, e.g. parking://?url=...&format=lots")
        .required(true);

    Command::new("tilelet-app")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Serves vector tiles from a remote GeoJSON or lots feed")
        .subcommand_required(true)
        .subcommand(
            Command::new("info")
                .about("Print the source descriptor as JSON")
                .arg(uri.clone()),
        )
        .subcommand(
            Command::new("tile")
                .about("Fetch the dataset and write one gzipped vector tile")
                .arg(uri)
                .arg(Arg::new("z").required(true).value_parser(value_parser!(u8)))
                .arg(Arg::new("x").required(true).value_parser(value_parser!(u32)))
                .arg(Arg::new("y").required(true).value_parser(value_parser!(u32)))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output file (defaults to z-x-y.pbf.gz)")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

async fn open(matches: &ArgMatches) -> Result<Source> {
    let uri = matches
        .get_one::<String>("uri")
        .context("missing source URI")?;
    let fallback = SourceConfig::from_env().context("invalid TILELET_* environment")?;
    Source::create(uri, fallback)
        .await
        .with_context(|| format!("failed to create source {}", uri))
}

async fn info(matches: &ArgMatches) -> Result<()> {
    let source = open(matches).await?;
    println!("{}", serde_json::to_string_pretty(&source.get_info())?);
    Ok(())
}

async fn tile(matches: &ArgMatches) -> Result<()> {
    let source = open(matches).await?;
    let z = *matches.get_one::<u8>("z").context("missing z")?;
    let x = *matches.get_one::<u32>("x").context("missing x")?;
    let y = *matches.get_one::<u32>("y").context("missing y")?;

    let tile = source
        .get_tile(z, x, y)
        .await
        .with_context(|| format!("failed to render tile {}/{}/{}", z, x, y))?;

    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(format!("{}-{}-{}.pbf.gz", z, x, y)));
    std::fs::write(&output, &tile.data)
        .with_context(|| format!("failed to write {}", output.display()))?;

    log::info!(
        "wrote {} ({} features, {} bytes)",
        output.display(),
        tile.feature_count,
        tile.data.len()
    );
    for (name, value) in tile.headers() {
        println!("{}: {}", name, value);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tilelet::logging::init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("info", sub)) => info(sub).await,
        Some(("tile", sub)) => tile(sub).await,
        other => anyhow::bail!("unknown command {:?}", other.map(|(name, _)| name)),
    }
}
