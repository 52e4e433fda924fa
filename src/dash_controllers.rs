// Controllers for the TBM network dashboard
use crate::dash_config::DashConfig;
use crate::dash_models::{DashData, DashModels, VehicleType};
use crate::dash_routes::{DashRoutes, LinePalette, RoutePolyline, VehicleFilter};
use crate::dash_stations::{DashStations, StationMarker, TimestampIndex};
use crate::dash_views::{DashViews, TileStyle};
use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "tbm_dashboard", version, about = "TBM V3 and TRAM/BUS/BAT3 map layers")]
pub struct Cli {
    /// V3 station log extract
    #[arg(long, env = "TBM_STATIONS_CSV", default_value = "./station_vCube_10.csv")]
    pub stations: PathBuf,

    /// TRAM/BUS/BAT3 network extract
    #[arg(long, env = "TBM_NETWORK_CSV", default_value = "./gdfbustrambat.csv")]
    pub network: PathBuf,

    /// Dashboard config (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive menu
    Menu,
    /// List the dates and times present in the station log
    Dates,
    /// Station markers for one date and time
    Stations {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        time: Option<String>,
        /// Tile name; defaults to the day/night choice
        #[arg(long)]
        tile: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Line polylines for one vehicle type
    Routes {
        /// ALL, TRAM, BUS or BATEAU
        #[arg(long, default_value = "ALL")]
        vehicle: String,
        /// Highlight lines above the delay threshold
        #[arg(long)]
        delay: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Geojson,
    Leaflet,
}

/// What the user has picked so far.
#[derive(Debug, Clone)]
pub struct Selection {
    pub date: Option<NaiveDate>,
    pub time_of_day: Option<String>,
    pub tile: Option<TileStyle>,
    pub vehicle_filter: VehicleFilter,
    pub delay_highlight: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            date: None,
            time_of_day: None,
            tile: None,
            vehicle_filter: VehicleFilter::All,
            delay_highlight: false,
        }
    }
}

impl Selection {
    /// Explicit tile, else day/night from the selected time, else dark.
    pub fn effective_tile(&self, config: &DashConfig) -> TileStyle {
        match (&self.tile, &self.time_of_day) {
            (Some(tile), _) => *tile,
            (None, Some(time)) => TileStyle::for_time_of_day(time, config),
            (None, None) => TileStyle::CartoDarkMatter,
        }
    }
}

pub struct DashControllers;

impl DashControllers {
    /// Load config and extracts once, then dispatch.
    pub fn run(cli: Cli) -> anyhow::Result<()> {
        let config = Self::load_config(cli.config.as_deref());

        let data = DashModels::initialize_data(&cli.stations, &cli.network)
            .context("Failed to load dashboard extracts")?;
        let palette = DashRoutes::palette_for(&config.known_lines, &config.unknown_line_color);

        match cli.command.unwrap_or(Command::Menu) {
            Command::Menu => Self::run_menu(&data, &palette, &config),
            Command::Dates => {
                let index = DashStations::index(&data.stations);
                DashViews::show_dates(&index);
                DashViews::show_times(&index);
                Ok(())
            }
            Command::Stations {
                date,
                time,
                tile,
                format,
                output,
            } => {
                let tile = match tile {
                    Some(name) => match TileStyle::from_name(&name) {
                        Some(tile) => Some(tile),
                        None => bail!("Unknown tile '{}'", name),
                    },
                    None => None,
                };
                let selection = Selection {
                    date,
                    time_of_day: time,
                    tile,
                    ..Selection::default()
                };
                let markers = Self::station_markers(&data, &selection, &config);
                Self::emit_stations(&markers, selection.effective_tile(&config), &config, format, output.as_deref())
            }
            Command::Routes {
                vehicle,
                delay,
                format,
                output,
            } => {
                let selection = Selection {
                    vehicle_filter: VehicleFilter::from_label(&vehicle),
                    delay_highlight: delay,
                    ..Selection::default()
                };
                let polylines = Self::route_polylines(&data, &selection, &palette, &config);
                Self::emit_routes(&polylines, &selection, &config, format, output.as_deref())
            }
        }
    }

    /// Fall back to defaults on a broken config file.
    pub fn load_config(explicit: Option<&Path>) -> DashConfig {
        let path = DashConfig::resolve_path(explicit);
        DashConfig::load(&path).unwrap_or_else(|e| {
            warn!("{}; using default dashboard settings", e);
            DashConfig::default()
        })
    }

    pub fn station_markers(data: &DashData, selection: &Selection, config: &DashConfig) -> Vec<StationMarker> {
        let snapshots = DashStations::filter(
            data.stations.iter(),
            selection.date,
            selection.time_of_day.as_deref(),
        );
        let tile = selection.effective_tile(config);
        DashStations::markers(snapshots, tile.fill_mode(), config)
    }

    pub fn route_polylines(
        data: &DashData,
        selection: &Selection,
        palette: &LinePalette,
        config: &DashConfig,
    ) -> Vec<RoutePolyline> {
        let lines = DashRoutes::filter(data.lines.iter(), &selection.vehicle_filter);
        DashRoutes::polylines(lines, palette, selection.delay_highlight, config)
    }

    fn emit_stations(
        markers: &[StationMarker],
        tile: TileStyle,
        config: &DashConfig,
        format: OutputFormat,
        output: Option<&Path>,
    ) -> anyhow::Result<()> {
        let rendered = match format {
            OutputFormat::Text => {
                DashViews::show_stations(markers, tile, config);
                return Ok(());
            }
            OutputFormat::Geojson => DashViews::stations_geojson(markers).to_string(),
            OutputFormat::Leaflet => serde_json::to_string_pretty(&DashViews::station_plan(markers, tile, config))?,
        };
        Self::write_output(&rendered, output, markers.len())
    }

    fn emit_routes(
        polylines: &[RoutePolyline],
        selection: &Selection,
        config: &DashConfig,
        format: OutputFormat,
        output: Option<&Path>,
    ) -> anyhow::Result<()> {
        let rendered = match format {
            OutputFormat::Text => {
                DashViews::show_routes(polylines, selection.vehicle_filter.label(), selection.delay_highlight);
                return Ok(());
            }
            OutputFormat::Geojson => DashViews::routes_geojson(polylines).to_string(),
            OutputFormat::Leaflet => {
                // The network page always uses the light tile
                let plan = DashViews::route_plan(polylines, TileStyle::OpenStreetMap, config);
                serde_json::to_string_pretty(&plan)?
            }
        };
        Self::write_output(&rendered, output, polylines.len())
    }

    fn write_output(rendered: &str, output: Option<&Path>, count: usize) -> anyhow::Result<()> {
        match output {
            Some(path) => {
                fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote {} features to {}", count, path.display());
                DashViews::show_exported(&path.display().to_string(), count);
            }
            None => println!("{}", rendered),
        }
        Ok(())
    }

    // ========================================================================
    // Interactive menu
    // ========================================================================

    fn run_menu(data: &DashData, palette: &LinePalette, config: &DashConfig) -> anyhow::Result<()> {
        let index = DashStations::index(&data.stations);
        let mut selection = Selection::default();

        loop {
            DashViews::show_menu();
            let Some(choice) = DashViews::read_line() else {
                DashViews::goodbye_message();
                return Ok(());
            };

            match choice.as_str() {
                "1" => selection.date = Self::handle_date_selection(&index).or(selection.date),
                "2" => selection.time_of_day = Self::handle_time_selection(&index).or(selection.time_of_day),
                "3" => selection.tile = Self::handle_tile_selection(),
                "4" => {
                    let markers = Self::station_markers(data, &selection, config);
                    DashViews::show_stations(&markers, selection.effective_tile(config), config);
                }
                "5" => selection.vehicle_filter = Self::handle_vehicle_selection(&selection.vehicle_filter),
                "6" => {
                    selection.delay_highlight = !selection.delay_highlight;
                    println!(
                        "\n✓ Delay highlight {}",
                        if selection.delay_highlight { "on" } else { "off" }
                    );
                }
                "7" => {
                    let polylines = Self::route_polylines(data, &selection, palette, config);
                    DashViews::show_routes(
                        &polylines,
                        selection.vehicle_filter.label(),
                        selection.delay_highlight,
                    );
                }
                "8" => {
                    if let Err(e) = Self::handle_export(data, &selection, palette, config) {
                        println!("\n✗ Export failed: {:#}", e);
                    }
                }
                "9" => println!("\n{}", DashModels::get_data_stats(data)),
                "0" => {
                    DashViews::goodbye_message();
                    return Ok(());
                }
                "" => {}
                other => DashViews::invalid_choice(other),
            }
        }
    }

    fn handle_date_selection(index: &TimestampIndex) -> Option<NaiveDate> {
        if index.dates.is_empty() {
            println!("\n⚠️  The station log has no dates");
            return None;
        }
        DashViews::show_dates(index);
        let input = DashViews::prompt(&format!("Date (1-{})", index.dates.len()));
        match Self::pick(&input, index.dates.len()) {
            Some(i) => {
                println!("\n✓ Date: {}", index.dates[i].label);
                Some(index.dates[i].date)
            }
            None => {
                DashViews::invalid_choice(&input);
                None
            }
        }
    }

    fn handle_time_selection(index: &TimestampIndex) -> Option<String> {
        DashViews::show_times(index);
        let input = DashViews::prompt("Time (HH:MM)");
        if index.times.iter().any(|t| t == &input) {
            println!("\n✓ Time: {}", input);
            Some(input)
        } else {
            DashViews::invalid_choice(&input);
            None
        }
    }

    fn handle_tile_selection() -> Option<TileStyle> {
        DashViews::show_tiles();
        let input = DashViews::prompt("Tile");
        if input == "0" {
            return None;
        }
        let tile = Self::pick(&input, TileStyle::ALL.len()).map(|i| TileStyle::ALL[i]);
        if tile.is_none() {
            DashViews::invalid_choice(&input);
        }
        tile
    }

    fn handle_vehicle_selection(current: &VehicleFilter) -> VehicleFilter {
        DashViews::show_vehicle_choices();
        let input = DashViews::prompt("Vehicle");
        match input.as_str() {
            "1" => VehicleFilter::All,
            "2" => VehicleFilter::Only(VehicleType::Tram),
            "3" => VehicleFilter::Only(VehicleType::Bus),
            "4" => VehicleFilter::Only(VehicleType::Boat),
            _ => {
                DashViews::invalid_choice(&input);
                current.clone()
            }
        }
    }

    fn handle_export(
        data: &DashData,
        selection: &Selection,
        palette: &LinePalette,
        config: &DashConfig,
    ) -> anyhow::Result<()> {
        let layer = DashViews::prompt("Layer (stations/routes)");
        let format = match DashViews::prompt("Format (geojson/leaflet)").as_str() {
            "geojson" => OutputFormat::Geojson,
            "leaflet" => OutputFormat::Leaflet,
            other => bail!("Unknown format '{}'", other),
        };
        let path = PathBuf::from(DashViews::prompt("Output file"));
        if path.as_os_str().is_empty() {
            bail!("No output file given");
        }

        match layer.as_str() {
            "stations" => {
                let markers = Self::station_markers(data, selection, config);
                Self::emit_stations(&markers, selection.effective_tile(config), config, format, Some(&path))
            }
            "routes" => {
                let polylines = Self::route_polylines(data, selection, palette, config);
                Self::emit_routes(&polylines, selection, config, format, Some(&path))
            }
            other => bail!("Unknown layer '{}'", other),
        }
    }

    /// 1-based menu pick to 0-based index.
    fn pick(input: &str, len: usize) -> Option<usize> {
        match input.trim().parse::<usize>() {
            Ok(num) if num > 0 && num <= len => Some(num - 1),
            _ => None,
        }
    }
}
