pub mod config;
pub mod crs;
pub mod data;
pub mod error;
pub mod map;
pub mod render;
pub mod server;
pub mod style;
pub mod types;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use types::{Basemap, DisplayOptions};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the map once and write it to an HTML file
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Output file (defaults to the configured output path)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Overrides for the configured display defaults. Each layer has an on and
/// an off flag; the later one wins, and with neither the configured value stays.
#[derive(clap::Args)]
struct DisplayArgs {
    #[arg(long, overrides_with = "hide_deaths")]
    deaths: bool,
    #[arg(long)]
    hide_deaths: bool,
    #[arg(long, overrides_with = "hide_pumps")]
    pumps: bool,
    #[arg(long)]
    hide_pumps: bool,
    #[arg(long, overrides_with = "no_cluster")]
    cluster: bool,
    #[arg(long)]
    no_cluster: bool,
    #[arg(long, overrides_with = "no_heatmap")]
    heatmap: bool,
    #[arg(long)]
    no_heatmap: bool,
    /// Heatmap radius (5-50)
    #[arg(long)]
    radius: Option<u32>,
    /// openstreetmap | cartodb-positron
    #[arg(long)]
    basemap: Option<Basemap>,
}

fn toggle(on: bool, off: bool, default: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

impl DisplayArgs {
    fn apply(&self, defaults: DisplayOptions) -> DisplayOptions {
        DisplayOptions {
            show_deaths: toggle(self.deaths, self.hide_deaths, defaults.show_deaths),
            show_pumps: toggle(self.pumps, self.hide_pumps, defaults.show_pumps),
            cluster: toggle(self.cluster, self.no_cluster, defaults.cluster),
            show_heatmap: toggle(self.heatmap, self.no_heatmap, defaults.show_heatmap),
            heatmap_radius: self.radius.unwrap_or(defaults.heatmap_radius),
            basemap: self.basemap.unwrap_or(defaults.basemap),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            config,
            output,
            display,
        } => {
            tracing::info!(?config, "rendering map");
            let app_config = config::AppConfig::load_or_default(&config)?;
            let options = display.apply(app_config.display);

            let page = render::render_cycle(&app_config, &options, false)?;
            let output = output.unwrap_or_else(|| app_config.output.html.clone());
            std::fs::write(&output, page)
                .with_context(|| format!("Failed to write {:?}", output))?;

            tracing::info!(?output, "map written");
        }
        Commands::Serve { config, port } => {
            tracing::info!(?config, "serving map");
            let mut app_config = config::AppConfig::load_or_default(&config)?;
            if let Some(port) = port {
                app_config.server.port = port;
            }

            server::start_server(app_config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_render_overrides() {
        let cli = Cli::parse_from([
            "cholera-map",
            "render",
            "--no-cluster",
            "--heatmap",
            "--radius",
            "40",
            "--basemap",
            "cartodb-positron",
        ]);
        let Commands::Render { display, output, .. } = cli.command else {
            panic!("expected render command");
        };
        assert!(output.is_none());

        let options = display.apply(DisplayOptions::default());
        assert!(options.show_deaths && options.show_pumps);
        assert!(!options.cluster);
        assert!(options.show_heatmap);
        assert_eq!(options.heatmap_radius, 40);
        assert_eq!(options.basemap, Basemap::CartoDbPositron);
    }

    #[test]
    fn cli_flags_can_turn_configured_layers_back_on() {
        let defaults = DisplayOptions {
            show_deaths: false,
            show_pumps: false,
            cluster: false,
            show_heatmap: true,
            ..Default::default()
        };

        let cli = Cli::parse_from([
            "cholera-map",
            "render",
            "--deaths",
            "--pumps",
            "--cluster",
            "--no-heatmap",
        ]);
        let Commands::Render { display, .. } = cli.command else {
            panic!("expected render command");
        };
        let options = display.apply(defaults);
        assert!(options.show_deaths && options.show_pumps && options.cluster);
        assert!(!options.show_heatmap);

        let cli = Cli::parse_from(["cholera-map", "render"]);
        let Commands::Render { display, .. } = cli.command else {
            panic!("expected render command");
        };
        assert_eq!(display.apply(defaults), defaults);
    }

    #[test]
    fn later_layer_flag_wins() {
        let cli = Cli::parse_from([
            "cholera-map",
            "render",
            "--deaths",
            "--hide-deaths",
            "--no-cluster",
            "--cluster",
        ]);
        let Commands::Render { display, .. } = cli.command else {
            panic!("expected render command");
        };
        let options = display.apply(DisplayOptions::default());
        assert!(!options.show_deaths);
        assert!(options.cluster);
    }

    #[test]
    fn cli_parses_serve() {
        let cli = Cli::parse_from(["cholera-map", "serve", "-c", "other.toml", "--port", "9100"]);
        match cli.command {
            Commands::Serve { config, port } => {
                assert_eq!(config, PathBuf::from("other.toml"));
                assert_eq!(port, Some(9100));
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn render_cycle_writes_a_full_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_support::broad_street_config(dir.path());
        let page = render::render_cycle(&config, &DisplayOptions::default(), false).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("\"type\":\"cluster\""));
        assert!(page.contains("Cholera Deaths"));
    }
}
