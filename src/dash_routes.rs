// TRAM/BUS/BAT3 layer: vehicle filter, line palette, delay highlight and glyph placement
use crate::dash_config::DashConfig;
use crate::dash_models::{TransitLine, VehicleType};
use geo_types::{Coord, MultiLineString};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleFilter {
    All,
    Only(VehicleType),
}

impl VehicleFilter {
    pub fn from_label(label: &str) -> Self {
        match label {
            "ALL" => VehicleFilter::All,
            other => VehicleFilter::Only(VehicleType::from_label(other)),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            VehicleFilter::All => "ALL",
            VehicleFilter::Only(vehicle) => vehicle.label(),
        }
    }
}

/// Line code to colour, fixed for the lifetime of the palette.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePalette {
    colors: HashMap<String, String>,
    fallback: String,
}

impl LinePalette {
    pub fn color_for(&self, line_code: &str) -> &str {
        self.colors
            .get(line_code)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePopup {
    pub line_code: String,
    pub terminus: String,
    pub glyph: String,
    pub vehicle: String,
    pub delay_minutes: f64,
    pub speed_kmh: f64,
    pub vehicle_count: u32,
}

/// Everything needed to draw one line segment. Geometry stays in (lon, lat).
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePolyline {
    pub line_code: String,
    pub vehicle_type: VehicleType,
    pub style: LineStyle,
    pub paths: MultiLineString<f64>,
    pub glyph: &'static str,
    pub icon_points: Vec<Coord<f64>>,
    pub popup: RoutePopup,
}

// ============================================================================
// Main Implementation
// ============================================================================

pub struct DashRoutes;

impl DashRoutes {
    pub fn filter<'a, I>(lines: I, vehicle_filter: &VehicleFilter) -> Vec<&'a TransitLine>
    where
        I: IntoIterator<Item = &'a TransitLine>,
    {
        let selected: Vec<&TransitLine> = match vehicle_filter {
            VehicleFilter::All => lines.into_iter().collect(),
            VehicleFilter::Only(vehicle) => lines
                .into_iter()
                .filter(|line| &line.vehicle_type == vehicle)
                .collect(),
        };

        debug!("{} line segments for {}", selected.len(), vehicle_filter.label());
        selected
    }

    /// Evenly spaced hues around the sinebow, one per line, in list order.
    pub fn palette_for(line_codes: &[String], fallback: &str) -> LinePalette {
        let count = line_codes.len();
        let colors = line_codes
            .iter()
            .enumerate()
            .map(|(i, code)| {
                let c = colorous::SINEBOW.eval_continuous(i as f64 / count as f64);
                (code.clone(), format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b))
            })
            .collect();

        LinePalette {
            colors,
            fallback: fallback.to_string(),
        }
    }

    /// Red and heavy when highlighting and the mean delay exceeds the threshold.
    pub fn alert_style(
        line: &TransitLine,
        palette: &LinePalette,
        highlight: bool,
        config: &DashConfig,
    ) -> LineStyle {
        if highlight && line.average_delay_seconds > config.delay_threshold_seconds {
            LineStyle {
                color: config.alert_color.clone(),
                weight: config.alert_weight,
            }
        } else {
            LineStyle {
                color: palette.color_for(&line.line_code).to_string(),
                weight: config.default_weight,
            }
        }
    }

    pub fn icon_for(vehicle_type: &VehicleType) -> &'static str {
        match vehicle_type {
            VehicleType::Tram => "\u{1F68B}",
            VehicleType::Bus => "\u{1F68C}",
            VehicleType::Boat => "\u{1F6A2}",
            VehicleType::Other(_) => "",
        }
    }

    /// Points at indices 0, stride, 2*stride, ... A zero stride is read as 1.
    pub fn sample_points(path: &[Coord<f64>], stride: usize) -> Vec<Coord<f64>> {
        path.iter().step_by(stride.max(1)).copied().collect()
    }

    pub fn popup_of(line: &TransitLine) -> RoutePopup {
        RoutePopup {
            line_code: line.line_code.clone(),
            terminus: line.terminus.clone(),
            glyph: Self::icon_for(&line.vehicle_type).to_string(),
            vehicle: line.vehicle_type.label().to_string(),
            delay_minutes: line.average_delay_seconds / 60.0,
            speed_kmh: line.average_speed_kmh,
            vehicle_count: line.vehicle_count,
        }
    }

    pub fn polylines<'a, I>(
        lines: I,
        palette: &LinePalette,
        highlight: bool,
        config: &DashConfig,
    ) -> Vec<RoutePolyline>
    where
        I: IntoIterator<Item = &'a TransitLine>,
    {
        lines
            .into_iter()
            .map(|line| RoutePolyline {
                line_code: line.line_code.clone(),
                vehicle_type: line.vehicle_type.clone(),
                style: Self::alert_style(line, palette, highlight, config),
                paths: line.geometry.clone(),
                glyph: Self::icon_for(&line.vehicle_type),
                icon_points: line
                    .geometry
                    .0
                    .iter()
                    .flat_map(|path| Self::sample_points(&path.0, config.icon_stride))
                    .collect(),
                popup: Self::popup_of(line),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::LineString;

    fn line(code: &str, vehicle: VehicleType, delay: f64) -> TransitLine {
        TransitLine {
            line_code: code.to_string(),
            vehicle_type: vehicle,
            terminus: "Terminus".to_string(),
            geometry: MultiLineString::new(vec![LineString::from(vec![
                (-0.57, 44.84),
                (-0.58, 44.85),
                (-0.59, 44.86),
            ])]),
            average_delay_seconds: delay,
            average_speed_kmh: 18.0,
            vehicle_count: 6,
        }
    }

    fn network() -> Vec<TransitLine> {
        vec![
            line("Tram B", VehicleType::Tram, 150.0),
            line("Lianes 1", VehicleType::Bus, 30.0),
            line("BAT3", VehicleType::Boat, 0.0),
        ]
    }

    fn path(n: usize) -> Vec<Coord<f64>> {
        (0..n).map(|i| Coord { x: i as f64, y: -(i as f64) }).collect()
    }

    #[test]
    fn all_keeps_everything() {
        let lines = network();
        assert_eq!(DashRoutes::filter(&lines, &VehicleFilter::All).len(), 3);
    }

    #[test]
    fn filter_by_vehicle() {
        let lines = network();
        let buses = DashRoutes::filter(&lines, &VehicleFilter::Only(VehicleType::Bus));
        assert_eq!(buses.len(), 1);
        assert_eq!(buses[0].line_code, "Lianes 1");
    }

    #[test]
    fn filter_labels_are_exact() {
        let lines = network();
        assert_eq!(DashRoutes::filter(&lines, &VehicleFilter::from_label("BUS")).len(), 1);
        assert!(DashRoutes::filter(&lines, &VehicleFilter::from_label("bus")).is_empty());
        assert_eq!(VehicleFilter::from_label("ALL"), VehicleFilter::All);
    }

    #[test]
    fn palette_is_deterministic_and_distinct() {
        let codes = DashConfig::default().known_lines;
        let first = DashRoutes::palette_for(&codes, "white");
        let second = DashRoutes::palette_for(&codes, "white");
        assert_eq!(first, second);
        assert_eq!(first.len(), codes.len());

        let mut colors: Vec<&str> = codes.iter().map(|c| first.color_for(c)).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), codes.len());
        assert!(colors.iter().all(|c| c.starts_with('#') && c.len() == 7));
    }

    #[test]
    fn unknown_line_is_fallback() {
        let palette = DashRoutes::palette_for(&["Tram A".to_string()], "white");
        assert_eq!(palette.color_for("Lianes 99"), "white");
        assert!(DashRoutes::palette_for(&[], "white").is_empty());
    }

    #[test]
    fn delay_highlight() {
        let config = DashConfig::default();
        let palette = DashRoutes::palette_for(&config.known_lines, &config.unknown_line_color);
        let late = line("Tram B", VehicleType::Tram, 150.0);

        let alert = DashRoutes::alert_style(&late, &palette, true, &config);
        assert_eq!(alert, LineStyle { color: "red".to_string(), weight: 20.0 });

        let normal = DashRoutes::alert_style(&late, &palette, false, &config);
        assert_eq!(normal.color, palette.color_for("Tram B"));
        assert_eq!(normal.weight, 2.5);

        // Threshold itself is not late
        let borderline = line("Tram B", VehicleType::Tram, 100.0);
        assert_eq!(DashRoutes::alert_style(&borderline, &palette, true, &config).weight, 2.5);
    }

    #[test]
    fn glyphs() {
        assert_eq!(DashRoutes::icon_for(&VehicleType::Tram), "🚋");
        assert_eq!(DashRoutes::icon_for(&VehicleType::Bus), "🚌");
        assert_eq!(DashRoutes::icon_for(&VehicleType::Boat), "🚢");
        assert_eq!(DashRoutes::icon_for(&VehicleType::Other("VCUB".into())), "");
    }

    #[test]
    fn sampling_stride() {
        let points = DashRoutes::sample_points(&path(12), 5);
        let xs: Vec<f64> = points.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn sampling_short_path() {
        for stride in [3, 4, 5000, 20000] {
            let points = DashRoutes::sample_points(&path(3), stride);
            assert_eq!(points, vec![Coord { x: 0.0, y: 0.0 }]);
        }
        assert_eq!(DashRoutes::sample_points(&path(3), 0).len(), 3);
    }

    #[test]
    fn polylines_sample_each_path() {
        let mut config = DashConfig::default();
        config.icon_stride = 2;
        let mut lines = network();
        lines[0].geometry = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]),
            LineString::from(vec![(5.0, 5.0)]),
        ]);
        let palette = DashRoutes::palette_for(&config.known_lines, &config.unknown_line_color);

        let polylines = DashRoutes::polylines(&lines[..1], &palette, true, &config);
        assert_eq!(polylines[0].icon_points.len(), 3);
        assert_eq!(polylines[0].glyph, "🚋");
        assert_eq!(polylines[0].style.color, "red");
        assert_eq!(polylines[0].popup.delay_minutes, 2.5);
    }
}
