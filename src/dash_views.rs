// Views for the TBM network dashboard: terminal output and map exports
use crate::dash_config::{DashConfig, MapView};
use crate::dash_routes::RoutePolyline;
use crate::dash_stations::{DashStations, StationMarker, TimestampIndex};
use geo::BoundingRect;
use geo_types::{Coord, LineString, MultiLineString, MultiPoint, Point, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};

// ============================================================================
// Tiles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TileStyle {
    CartoDarkMatter,
    StamenToner,
    OpenStreetMap,
}

impl TileStyle {
    pub const ALL: [TileStyle; 3] = [
        TileStyle::CartoDarkMatter,
        TileStyle::StamenToner,
        TileStyle::OpenStreetMap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TileStyle::CartoDarkMatter => "CartoDB dark_matter",
            TileStyle::StamenToner => "Stamen Toner",
            TileStyle::OpenStreetMap => "OpenStreetMap",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            TileStyle::CartoDarkMatter => "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png",
            TileStyle::StamenToner => "https://tiles.stadiamaps.com/tiles/stamen_toner/{z}/{x}/{y}.png",
            TileStyle::OpenStreetMap => "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        }
    }

    pub fn attribution(&self) -> &'static str {
        "Map data © OpenStreetMap contributors"
    }

    /// Station circles are filled on light backgrounds only.
    pub fn fill_mode(&self) -> bool {
        !matches!(self, TileStyle::CartoDarkMatter)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tile| tile.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Light tiles during the configured day window, dark otherwise.
    pub fn for_time_of_day(time_of_day: &str, config: &DashConfig) -> Self {
        if config.day_tile_start.as_str() <= time_of_day && time_of_day < config.day_tile_end.as_str() {
            TileStyle::OpenStreetMap
        } else {
            TileStyle::CartoDarkMatter
        }
    }
}

// ============================================================================
// Render plan (Leaflet order: [lat, lon])
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TileInfo {
    pub name: &'static str,
    pub url: &'static str,
    pub attribution: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafletCircle {
    pub location: [f64; 2],
    pub color: String,
    pub fill: bool,
    pub fill_color: Option<String>,
    pub radius: f64,
    pub weight: f64,
    pub popup: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafletPolyline {
    pub locations: Vec<Vec<[f64; 2]>>,
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub popup: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafletIcon {
    pub location: [f64; 2],
    pub glyph: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderPlan {
    pub view: MapView,
    pub tile: TileInfo,
    /// `[[south, west], [north, east]]`
    pub bounds: Option<[[f64; 2]; 2]>,
    pub circles: Vec<LeafletCircle>,
    pub polylines: Vec<LeafletPolyline>,
    pub icons: Vec<LeafletIcon>,
}

// ============================================================================
// Main Implementation
// ============================================================================

pub struct DashViews;

impl DashViews {
    /// Show main menu
    pub fn show_menu() {
        println!("\n{}", "═".repeat(60));
        println!("     🚲🚌🚃⛴️  TBM : un diaporama du réseau");
        println!("{}", "═".repeat(60));
        println!("\n📋 V3");
        println!("  1️⃣  Select a date");
        println!("  2️⃣  Select a time");
        println!("  3️⃣  Select a tile");
        println!("  4️⃣  Show stations");
        println!("\n📋 TRAM • BUS • BAT3");
        println!("  5️⃣  Select vehicle type");
        println!("  6️⃣  Toggle delay highlight (RETARD)");
        println!("  7️⃣  Show lines");
        println!("\n  8️⃣  Export current map");
        println!("  9️⃣  Data statistics 📊");
        println!("  0️⃣  Quit");
        println!("\n{}", "─".repeat(60));
        print!("➜ Your choice: ");
        let _ = io::stdout().flush();
    }

    pub fn prompt(label: &str) -> String {
        print!("\n➜ {}: ", label);
        let _ = io::stdout().flush();
        Self::read_input()
    }

    /// Read one trimmed line from stdin
    pub fn read_input() -> String {
        Self::read_line().unwrap_or_default()
    }

    /// `None` once stdin is closed.
    pub fn read_line() -> Option<String> {
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => None,
            Ok(_) => Some(input.trim().to_string()),
            Err(e) => {
                log::warn!("Failed to read input: {}", e);
                None
            }
        }
    }

    pub fn show_dates(index: &TimestampIndex) {
        println!("\n📅 Available dates ({})", index.dates.len());
        println!("{}", "─".repeat(60));
        for (i, option) in index.dates.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, option.label);
        }
    }

    pub fn show_times(index: &TimestampIndex) {
        println!("\n🕐 Available times ({})", index.times.len());
        println!("{}", "─".repeat(60));
        for chunk in index.times.chunks(12) {
            println!("  {}", chunk.join(" "));
        }
    }

    pub fn show_tiles() {
        println!("\n🗺️  Tiles");
        for (i, tile) in TileStyle::ALL.iter().enumerate() {
            println!("  {}. {}", i + 1, tile.name());
        }
        println!("  0. Automatic (day/night)");
    }

    pub fn show_vehicle_choices() {
        println!("\n🚦 Vehicle type");
        println!("  1. ALL");
        println!("  2. 🚃TRAM");
        println!("  3. 🚌BUS");
        println!("  4. ⛴️BATEAU");
    }

    pub fn show_legend(config: &DashConfig) {
        println!("\n  Légende:");
        for (label, color) in DashStations::legend(config) {
            println!("   {} {}", Self::swatch(&color), label);
        }
    }

    pub fn show_stations(markers: &[StationMarker], tile: TileStyle, config: &DashConfig) {
        println!("\n{}", "═".repeat(70));
        println!("🚲 RESPIRATION V3 | {} stations ({})", markers.len(), tile.name());
        println!("{}", "═".repeat(70));

        if markers.is_empty() {
            println!("\n⚠️  Nothing to show: select a date and a time first.");
            return;
        }

        for marker in markers {
            let popup = &marker.popup;
            println!(
                "  {} {:<32} {:>3} vélos ({} élec, {} classiques) | {:>3} places | r={:.1}",
                Self::swatch(&marker.style.color),
                popup.name,
                popup.bikes_available,
                popup.electric_bikes,
                popup.classic_bikes,
                popup.places_available,
                marker.style.radius
            );
        }

        Self::show_legend(config);
        println!("{}", "═".repeat(70));
    }

    pub fn show_routes(polylines: &[RoutePolyline], vehicle: &str, highlight: bool) {
        println!("\n{}", "═".repeat(70));
        println!(
            "🚃 RÉSEAU TRAM • BUS • BAT3 | {} ({} segments){}",
            vehicle,
            polylines.len(),
            if highlight { " | RETARD" } else { "" }
        );
        println!("{}", "═".repeat(70));

        if polylines.is_empty() {
            println!("\n⚠️  No line matches this vehicle type.");
            return;
        }

        for polyline in polylines {
            let popup = &polyline.popup;
            println!(
                "  {} {} {:<10} → {:<28} retard {:>6.2} min | {:>5.1} km/h | {} véhicules | {} glyphs",
                Self::swatch(&polyline.style.color),
                polyline.glyph,
                popup.line_code,
                popup.terminus,
                popup.delay_minutes,
                popup.speed_kmh,
                popup.vehicle_count,
                polyline.icon_points.len()
            );
        }
        println!("{}", "═".repeat(70));
    }

    pub fn invalid_choice(input: &str) {
        println!("\n✗ Invalid choice '{}'", input);
    }

    pub fn show_exported(path: &str, count: usize) {
        println!("\n✓ Exported {} features to {}", count, path);
    }

    pub fn goodbye_message() {
        println!("\n👋 À bientôt !");
    }

    // ========================================================================
    // Formatting helpers
    // ========================================================================

    pub fn station_popup_html(marker: &StationMarker) -> String {
        let p = &marker.popup;
        format!(
            "<div style=\"font-size:12px\">\
             <h4 style=\"color:{};margin-bottom:0\">{}</h4>\
             <p style=\"margin-bottom:0\"><b>État:</b> {}</p>\
             <p style=\"margin-bottom:0\"><b>Places disponible:</b> {}</p>\
             <p style=\"margin-bottom:0\"><b>Vélos disponible:</b> {}</p>\
             <p style=\"margin-bottom:0\"><b>Vélos électriques:</b> {}</p>\
             <p style=\"margin-bottom:0\"><b>Vélos classiques:</b> {}</p>\
             </div>",
            marker.style.color,
            p.name,
            p.status,
            p.places_available,
            p.bikes_available,
            p.electric_bikes,
            p.classic_bikes
        )
    }

    pub fn route_popup_html(polyline: &RoutePolyline) -> String {
        let p = &polyline.popup;
        format!(
            "<div style=\"font-size:12px\">\
             <h4 style=\"color:{};margin-bottom:10px\">{}</h4>\
             <p><b>Terminus:</b> {}</p>\
             <p><b>Vehicule:</b> {} {}</p>\
             <p><b>Retard Moyen:</b> {:.2} minutes</p>\
             <p><b>Vitesse Moyenne (km/h):</b> {}</p>\
             <p><b>Nombre de véhicule/ligne:</b> {}</p>\
             </div>",
            polyline.style.color,
            p.line_code,
            p.terminus,
            p.glyph,
            p.vehicle,
            p.delay_minutes,
            p.speed_kmh,
            p.vehicle_count
        )
    }

    /// ANSI swatch for CSS hex or the few named colours the dashboard uses.
    fn swatch(color: &str) -> String {
        let (r, g, b) = Self::parse_css_color(color);
        format!("\x1b[48;2;{};{};{}m  \x1b[0m", r, g, b)
    }

    pub fn parse_css_color(color: &str) -> (u8, u8, u8) {
        match color.to_ascii_lowercase().as_str() {
            "red" => (255, 0, 0),
            "gray" | "grey" => (128, 128, 128),
            "white" => (255, 255, 255),
            "black" => (0, 0, 0),
            other => {
                let hex = other.trim_start_matches('#');
                if hex.len() != 6 || !hex.is_ascii() {
                    return (128, 128, 128);
                }
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(128);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(128);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(128);
                (r, g, b)
            }
        }
    }

    // ========================================================================
    // Exports
    // ========================================================================

    /// (lon, lat) → [lat, lon]
    pub fn to_leaflet_point(coord: Coord<f64>) -> [f64; 2] {
        [coord.y, coord.x]
    }

    pub fn to_leaflet_path(path: &LineString<f64>) -> Vec<[f64; 2]> {
        path.coords().map(|c| Self::to_leaflet_point(*c)).collect()
    }

    fn to_leaflet_bounds(rect: Rect<f64>) -> [[f64; 2]; 2] {
        [Self::to_leaflet_point(rect.min()), Self::to_leaflet_point(rect.max())]
    }

    pub fn station_bounds(markers: &[StationMarker]) -> Option<[[f64; 2]; 2]> {
        let points: MultiPoint<f64> = markers
            .iter()
            .map(|m| Point::new(m.longitude, m.latitude))
            .collect::<Vec<_>>()
            .into();
        points.bounding_rect().map(Self::to_leaflet_bounds)
    }

    pub fn route_bounds(polylines: &[RoutePolyline]) -> Option<[[f64; 2]; 2]> {
        let paths: MultiLineString<f64> = MultiLineString::new(
            polylines
                .iter()
                .flat_map(|p| p.paths.0.iter().cloned())
                .collect(),
        );
        paths.bounding_rect().map(Self::to_leaflet_bounds)
    }

    pub fn station_plan(markers: &[StationMarker], tile: TileStyle, config: &DashConfig) -> RenderPlan {
        RenderPlan {
            view: config.station_view,
            tile: Self::tile_info(tile),
            bounds: Self::station_bounds(markers),
            circles: markers
                .iter()
                .map(|m| LeafletCircle {
                    location: [m.latitude, m.longitude],
                    color: m.style.color.clone(),
                    fill: m.style.filled,
                    fill_color: m.style.fill_color.clone(),
                    radius: m.style.radius,
                    weight: 1.0,
                    popup: Self::station_popup_html(m),
                })
                .collect(),
            polylines: Vec::new(),
            icons: Vec::new(),
        }
    }

    pub fn route_plan(polylines: &[RoutePolyline], tile: TileStyle, config: &DashConfig) -> RenderPlan {
        RenderPlan {
            view: config.route_view,
            tile: Self::tile_info(tile),
            bounds: Self::route_bounds(polylines),
            circles: Vec::new(),
            polylines: polylines
                .iter()
                .map(|p| LeafletPolyline {
                    locations: p.paths.0.iter().map(Self::to_leaflet_path).collect(),
                    color: p.style.color.clone(),
                    weight: p.style.weight,
                    opacity: 1.0,
                    popup: Self::route_popup_html(p),
                })
                .collect(),
            icons: polylines
                .iter()
                .filter(|p| !p.glyph.is_empty())
                .flat_map(|p| {
                    p.icon_points.iter().map(move |c| LeafletIcon {
                        location: Self::to_leaflet_point(*c),
                        glyph: p.glyph.to_string(),
                    })
                })
                .collect(),
        }
    }

    fn tile_info(tile: TileStyle) -> TileInfo {
        TileInfo {
            name: tile.name(),
            url: tile.url(),
            attribution: tile.attribution(),
        }
    }

    /// GeoJSON keeps (lon, lat); style and popup fields go into properties.
    pub fn stations_geojson(markers: &[StationMarker]) -> FeatureCollection {
        let features = markers
            .iter()
            .map(|m| {
                let properties = json!({
                    "station_id": m.station_id,
                    "style": m.style,
                    "popup": m.popup,
                });
                Self::feature(Value::Point(vec![m.longitude, m.latitude]), properties)
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    pub fn routes_geojson(polylines: &[RoutePolyline]) -> FeatureCollection {
        let features = polylines
            .iter()
            .map(|p| {
                let paths: Vec<Vec<Vec<f64>>> = p
                    .paths
                    .0
                    .iter()
                    .map(|path| path.coords().map(|c| vec![c.x, c.y]).collect::<Vec<_>>())
                    .collect();
                let properties = json!({
                    "line_code": p.line_code,
                    "style": p.style,
                    "glyph": p.glyph,
                    "icon_points": p.icon_points.iter().map(|c| [c.x, c.y]).collect::<Vec<_>>(),
                    "popup": p.popup,
                });
                Self::feature(Value::MultiLineString(paths), properties)
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    fn feature(value: Value, properties: serde_json::Value) -> Feature {
        let properties: Option<JsonObject> = match properties {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        };
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(value)),
            id: None,
            properties,
            foreign_members: None,
        }
    }
}
