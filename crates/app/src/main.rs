use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use moodmap_core::{
    backend::{
        mock::{MockEngine, MockHost, MockPlatform},
        DocumentContent, SandboxDocument,
    },
    AppConfig, Coordinate, MapInputs, MapSessionController, MoodEvent, VisualizationMode,
};
use tracing_subscriber::EnvFilter;

fn main() -> moodmap_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Document { state, output } => run_document(&config, &state, &output),
        Commands::Simulate {
            state,
            backend,
            toggle_heatmap,
            center_on,
        } => run_simulate(&config, &state, backend, toggle_heatmap, center_on),
    }
}

fn run_document(
    config: &AppConfig,
    state: &StateArgs,
    output: &Path,
) -> moodmap_core::Result<()> {
    let inputs = state.to_inputs(config)?;
    tracing::info!(events = inputs.events.len(), ?output, "synthesizing sandbox document");

    let html = SandboxDocument {
        inputs: &inputs,
        config: &config.map,
        content: DocumentContent::Full,
    }
    .render()?;
    std::fs::write(output, html)?;
    Ok(())
}

fn run_simulate(
    config: &AppConfig,
    state: &StateArgs,
    backend: BackendChoice,
    toggle_heatmap: bool,
    center_on: Option<Coordinate>,
) -> moodmap_core::Result<()> {
    let mut inputs = state.to_inputs(config)?;
    tracing::info!(?backend, events = inputs.events.len(), "starting simulated session");

    let platform = backend.platform();
    let mut controller = MapSessionController::new(Box::new(platform.clone()), config.map.clone());
    let handle = controller.handle();

    controller.update(inputs.clone());
    controller.notify_ready();

    if toggle_heatmap {
        inputs.mode = match inputs.mode {
            VisualizationMode::Markers => VisualizationMode::Heatmap,
            VisualizationMode::Heatmap => VisualizationMode::Markers,
        };
        controller.update(inputs);
        controller.notify_ready();
    }

    if let Some(target) = center_on {
        handle.center_on(target.lng, target.lat);
    }

    report(&platform.engine, &platform.host)?;
    println!("{}", serde_json::to_string(&controller.status())?);
    Ok(())
}

fn report(engine: &MockEngine, host: &MockHost) -> moodmap_core::Result<()> {
    for call in engine.calls() {
        println!("{}", serde_json::to_string(&call)?);
    }
    for (generation, document) in host.documents().iter().enumerate() {
        println!(
            "{}",
            serde_json::json!({"op": "load_document", "generation": generation + 1, "bytes": document.len()})
        );
    }
    for script in host.injected() {
        println!("{}", serde_json::json!({"op": "inject", "script": script}));
    }
    Ok(())
}

fn load_events(path: &Path) -> moodmap_core::Result<Vec<MoodEvent>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn parse_lng_lat(raw: &str) -> Result<Coordinate, String> {
    let (lng, lat) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LNG,LAT but got `{raw}`"))?;
    let lng: f64 = lng.trim().parse().map_err(|err| format!("bad longitude: {err}"))?;
    let lat: f64 = lat.trim().parse().map_err(|err| format!("bad latitude: {err}"))?;
    let coordinate = Coordinate::new(lng, lat);
    if coordinate.is_finite() {
        Ok(coordinate)
    } else {
        Err("coordinates must be finite".to_string())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Mood map rendering bridge", long_about = None)]
struct Cli {
    /// JSON configuration file; missing fields keep their defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the self-contained sandbox document for the given state.
    Document {
        #[command(flatten)]
        state: StateArgs,
        /// Where to write the generated HTML.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Drive a session against a recording backend and print every call.
    Simulate {
        #[command(flatten)]
        state: StateArgs,
        #[arg(short, long, value_enum, default_value_t = BackendChoice::Direct)]
        backend: BackendChoice,
        /// Flip the visualization mode after the first pass.
        #[arg(long)]
        toggle_heatmap: bool,
        /// Issue a camera command at the end, as LNG,LAT.
        #[arg(long, value_parser = parse_lng_lat, allow_hyphen_values = true)]
        center_on: Option<Coordinate>,
    },
}

#[derive(clap::Args, Debug)]
struct StateArgs {
    /// JSON array of mood events in the API wire form.
    #[arg(short, long)]
    events: PathBuf,
    /// Mapping access token.
    #[arg(short, long, env = "MOODMAP_ACCESS_TOKEN", default_value = "")]
    token: String,
    /// Render the heat layer instead of markers.
    #[arg(long)]
    heatmap: bool,
    /// Camera center as LNG,LAT.
    #[arg(long, value_parser = parse_lng_lat, allow_hyphen_values = true)]
    center: Option<Coordinate>,
    /// Viewer position as LNG,LAT.
    #[arg(long, value_parser = parse_lng_lat, allow_hyphen_values = true)]
    user: Option<Coordinate>,
}

impl StateArgs {
    fn to_inputs(&self, config: &AppConfig) -> moodmap_core::Result<MapInputs> {
        Ok(MapInputs {
            events: load_events(&self.events)?,
            user_location: self.user,
            camera_center: self.center.unwrap_or(config.map.default_center),
            access_token: self.token.clone(),
            mode: VisualizationMode::from_heatmap_flag(self.heatmap),
        })
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Direct,
    Bridged,
    /// Sandboxed document whose engine is still reachable.
    Hybrid,
    None,
}

impl BackendChoice {
    fn platform(self) -> MockPlatform {
        match self {
            BackendChoice::Direct => MockPlatform::direct(),
            BackendChoice::Bridged => MockPlatform::bridged(),
            BackendChoice::Hybrid => MockPlatform::hybrid(),
            BackendChoice::None => MockPlatform::new(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lng_lat_pairs() {
        assert_eq!(
            parse_lng_lat("76.9, 43.2").unwrap(),
            Coordinate::new(76.9, 43.2)
        );
        assert!(parse_lng_lat("-122.4,37.8").is_ok());
        assert!(parse_lng_lat("76.9").is_err());
        assert!(parse_lng_lat("NaN,1").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
