use anyhow::{anyhow, bail, Context, Result};
use carsales_map::chart;
use carsales_map::client::{GeoJsonSource, GeometryLocation, HttpSalesApi, SalesApi};
use carsales_map::config::AppConfig;
use carsales_map::map::{LayerStyle, MapOrchestrator, UpdateOutcome};
use carsales_map::render;
use carsales_map::resolve::CountryResolver;
use carsales_map::server;
use carsales_map::store::SalesStore;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the sales API and the static map assets
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render the choropleth map and the yearly sales chart
    Render(ClientArgs),
    /// Print the hover label of the country at a position
    Probe {
        #[command(flatten)]
        client: ClientArgs,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
}

#[derive(Args)]
struct ClientArgs {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
    /// Year to show; defaults to the latest year in the store
    #[arg(short, long)]
    year: Option<i32>,
    /// Read the database directly instead of going through the HTTP API
    #[arg(long)]
    direct: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!("Serving with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            let store = SalesStore::open_path(&app_config.database.path)
                .context("Failed to open sales database")?;
            server::start_server(app_config, store).await?;
        }
        Commands::Render(args) => {
            let app_config = AppConfig::load_from_file(&args.config)?;
            if args.direct {
                let store = SalesStore::open_path(&app_config.database.path)
                    .context("Failed to open sales database")?;
                render_all(&app_config, store, args.year).await?;
            } else {
                let api = HttpSalesApi::new(&app_config.client.api_url);
                render_all(&app_config, api, args.year).await?;
            }
        }
        Commands::Probe { client, lon, lat } => {
            let app_config = AppConfig::load_from_file(&client.config)?;
            let label = if client.direct {
                let store = SalesStore::open_path(&app_config.database.path)
                    .context("Failed to open sales database")?;
                probe(&app_config, store, client.year, lon, lat).await?
            } else {
                let api = HttpSalesApi::new(&app_config.client.api_url);
                probe(&app_config, api, client.year, lon, lat).await?
            };
            match label {
                Some(label) => println!("{}", label),
                None => println!("No country at ({}, {})", lon, lat),
            }
        }
    }

    Ok(())
}

fn orchestrator<A: SalesApi>(config: &AppConfig, api: A) -> MapOrchestrator<A, GeoJsonSource> {
    let geometry = GeoJsonSource::new(GeometryLocation::parse(&config.client.geometry));
    let map = MapOrchestrator::new(
        api,
        geometry,
        CountryResolver::from_config(&config.map),
        LayerStyle::from_config(&config.map),
    );
    match &config.client.overlay {
        Some(path) => map.with_overlay(GeoJsonSource::new(GeometryLocation::File(path.clone()))),
        None => map,
    }
}

async fn show_year<A: SalesApi>(
    map: &MapOrchestrator<A, GeoJsonSource>,
    year: Option<i32>,
) -> Result<()> {
    let outcome = match year {
        Some(year) => map.select_year(year).await,
        None => map.initialize().await,
    };
    match outcome {
        UpdateOutcome::Applied { .. } => Ok(()),
        UpdateOutcome::NoYears => bail!("The sales store holds no years"),
        other => Err(anyhow!("Map was not drawn: {:?}", other)),
    }
}

async fn render_all<A: SalesApi>(config: &AppConfig, api: A, year: Option<i32>) -> Result<()> {
    let size = (config.output.width, config.output.height);
    let map = orchestrator(config, api);

    // The map and the chart fail independently.
    let map_result = match show_year(&map, year).await {
        Ok(()) => {
            let view = map.view();
            match view.layer() {
                Some(layer) => render::render_choropleth(layer, &config.output.map_png, size)
                    .and_then(|_| render::write_layer_geojson(layer, &config.output.layer_geojson)),
                None => Err(anyhow!("No layer to draw")),
            }
        }
        Err(err) => Err(err),
    };

    let chart_result = match chart::load_chart(map.api()).await {
        Some(series) => render::render_chart(&series, &config.output.chart_png, size),
        None => Err(anyhow!("Chart data could not be loaded")),
    };

    map_result.context("Map rendering failed")?;
    chart_result.context("Chart rendering failed")?;
    Ok(())
}

async fn probe<A: SalesApi>(
    config: &AppConfig,
    api: A,
    year: Option<i32>,
    lon: f64,
    lat: f64,
) -> Result<Option<carsales_map::map::Label>> {
    let map = orchestrator(config, api);
    show_year(&map, year).await?;
    let view = map.view();
    Ok(view.hover_at(lon, lat))
}
