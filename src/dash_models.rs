// Data model and extract loading for the TBM network dashboard
// Transports Bordeaux Métropole: https://www.infotbm.com/
//
// Extracts:
// - V3 station log (station_vCube_10.csv): one row per bike-share station per snapshot
// - TRAM/BUS/BAT3 network (gdfbustrambat.csv): one row per line segment, WKT geometry

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Europe::Paris;
use geo_types::{Coord, LineString, MultiLineString};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Data Structures
// ============================================================================

/// Docking station state as published in the `etat` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationStatus {
    Connected,
    Maintenance,
    Disconnected,
    Unknown(String),
}

impl StationStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "CONNECTEE" => StationStatus::Connected,
            "MAINTENANCE" => StationStatus::Maintenance,
            "DECONNECTEE" => StationStatus::Disconnected,
            other => StationStatus::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            StationStatus::Connected => "CONNECTEE",
            StationStatus::Maintenance => "MAINTENANCE",
            StationStatus::Disconnected => "DECONNECTEE",
            StationStatus::Unknown(raw) => raw.as_str(),
        }
    }
}

/// Vehicle family of a transit line, matched on the exact `vehicule` label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Tram,
    Bus,
    Boat,
    Other(String),
}

impl VehicleType {
    /// No case folding: "bus" is not "BUS".
    pub fn from_label(label: &str) -> Self {
        match label {
            "TRAM" => VehicleType::Tram,
            "BUS" => VehicleType::Bus,
            "BATEAU" => VehicleType::Boat,
            other => VehicleType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            VehicleType::Tram => "TRAM",
            VehicleType::Bus => "BUS",
            VehicleType::Boat => "BATEAU",
            VehicleType::Other(raw) => raw.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSnapshot {
    pub station_id: String,
    pub name: String,
    /// Europe/Paris wall-clock time of the observation.
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub status: StationStatus,
    pub bikes_available: u32,
    pub electric_bikes: u32,
    pub classic_bikes: u32,
    pub places_available: u32,
}

impl StationSnapshot {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// HH:MM key used by the time selector.
    pub fn time_key(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitLine {
    pub line_code: String,
    pub vehicle_type: VehicleType,
    pub terminus: String,
    /// One or more paths in (longitude, latitude) order. Never empty.
    pub geometry: MultiLineString<f64>,
    pub average_delay_seconds: f64,
    pub average_speed_kmh: f64,
    pub vehicle_count: u32,
}

/// Both extracts, loaded once and shared read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct DashData {
    pub stations: Arc<Vec<StationSnapshot>>,
    pub lines: Arc<Vec<TransitLine>>,
    pub loaded_at: u64,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum DashError {
    ParseError(String),
    FileError(String),
    ConfigError(String),
}

impl std::fmt::Display for DashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DashError::ParseError(e) => write!(f, "Parse error: {}", e),
            DashError::FileError(e) => write!(f, "File error: {}", e),
            DashError::ConfigError(e) => write!(f, "Config error: {}", e),
        }
    }
}

impl std::error::Error for DashError {}

pub type Result<T> = std::result::Result<T, DashError>;

// ============================================================================
// Raw CSV rows
// ============================================================================

// Every column is read as text so that a single bad cell only drops its row.
#[derive(Debug, Deserialize)]
struct RawStationRecord {
    ident: Option<String>,
    nom: Option<String>,
    etat: Option<String>,
    nbplaces: Option<String>,
    nbvelos: Option<String>,
    nbelec: Option<String>,
    nbclassiq: Option<String>,
    mdate: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLineRecord {
    ligne_com: Option<String>,
    vehicule: Option<String>,
    libelle: Option<String>,
    geometry: Option<String>,
    retard: Option<String>,
    vitesse: Option<String>,
    nb_vehicule: Option<String>,
}

lazy_static! {
    static ref WKT_GEOMETRY: Regex =
        Regex::new(r"(?is)^\s*(MULTILINESTRING|LINESTRING)\s*(?:Z\s*)?\((.*)\)\s*$")
            .expect("WKT geometry pattern is valid");
    static ref WKT_PATH: Regex = Regex::new(r"\(([^()]*)\)").expect("WKT path pattern is valid");
}

// ============================================================================
// Main Implementation
// ============================================================================

pub struct DashModels;

impl DashModels {
    const TIMESTAMP_FORMATS: [&'static str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    /// Load both extracts. A missing file is fatal; bad rows are skipped.
    pub fn initialize_data(stations_path: &Path, network_path: &Path) -> Result<DashData> {
        info!("Loading V3 station log from {}", stations_path.display());
        let stations = Self::load_stations(stations_path)?;
        info!("Loaded {} station snapshots", stations.len());

        info!("Loading TRAM/BUS/BAT3 network from {}", network_path.display());
        let lines = Self::load_network(network_path)?;
        info!("Loaded {} line segments", lines.len());

        Ok(DashData {
            stations: Arc::new(stations),
            lines: Arc::new(lines),
            loaded_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        })
    }

    pub fn load_stations(path: &Path) -> Result<Vec<StationSnapshot>> {
        let file = File::open(path).map_err(|e| {
            DashError::FileError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::read_stations(file)
    }

    pub fn load_network(path: &Path) -> Result<Vec<TransitLine>> {
        let file = File::open(path).map_err(|e| {
            DashError::FileError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::read_network(file)
    }

    pub fn read_stations<R: Read>(reader: R) -> Result<Vec<StationSnapshot>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        rdr.headers()
            .map_err(|e| DashError::ParseError(format!("Failed to read station header: {}", e)))?;

        let mut snapshots = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in rdr.deserialize::<RawStationRecord>().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable station row {}: {}", row + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            match Self::station_from_record(record) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(reason) => {
                    warn!("Skipping station row {}: {}", row + 1, reason);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("{} station rows skipped", skipped);
        }
        debug!("Parsed {} station snapshots", snapshots.len());

        Ok(snapshots)
    }

    pub fn read_network<R: Read>(reader: R) -> Result<Vec<TransitLine>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        rdr.headers()
            .map_err(|e| DashError::ParseError(format!("Failed to read network header: {}", e)))?;

        let mut lines = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in rdr.deserialize::<RawLineRecord>().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable network row {}: {}", row + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            match Self::line_from_record(record) {
                Ok(line) => lines.push(line),
                Err(reason) => {
                    warn!("Skipping network row {}: {}", row + 1, reason);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("{} network rows skipped", skipped);
        }
        debug!("Parsed {} line segments", lines.len());

        Ok(lines)
    }

    fn station_from_record(record: RawStationRecord) -> std::result::Result<StationSnapshot, String> {
        let raw_timestamp = record.mdate.unwrap_or_default();
        let timestamp = Self::parse_timestamp(&raw_timestamp)
            .ok_or_else(|| format!("invalid timestamp '{}'", raw_timestamp))?;

        let latitude = Self::parse_float(record.latitude.as_deref())
            .ok_or("missing or invalid latitude")?;
        let longitude = Self::parse_float(record.longitude.as_deref())
            .ok_or("missing or invalid longitude")?;

        let station_id = record
            .ident
            .filter(|id| !id.is_empty())
            .ok_or("missing station identifier")?;

        Ok(StationSnapshot {
            name: record.nom.unwrap_or_else(|| station_id.clone()),
            station_id,
            timestamp,
            latitude,
            longitude,
            status: StationStatus::from_label(record.etat.as_deref().unwrap_or("")),
            bikes_available: Self::parse_count(record.nbvelos.as_deref()),
            electric_bikes: Self::parse_count(record.nbelec.as_deref()),
            classic_bikes: Self::parse_count(record.nbclassiq.as_deref()),
            places_available: Self::parse_count(record.nbplaces.as_deref()),
        })
    }

    fn line_from_record(record: RawLineRecord) -> std::result::Result<TransitLine, String> {
        let line_code = record
            .ligne_com
            .filter(|code| !code.is_empty())
            .ok_or("missing line code")?;

        let raw_geometry = record.geometry.unwrap_or_default();
        let geometry = Self::parse_wkt_geometry(&raw_geometry)
            .ok_or_else(|| format!("invalid geometry for {}", line_code))?;

        Ok(TransitLine {
            vehicle_type: VehicleType::from_label(record.vehicule.as_deref().unwrap_or("")),
            terminus: record.libelle.unwrap_or_default(),
            geometry,
            average_delay_seconds: Self::parse_float(record.retard.as_deref()).unwrap_or(0.0),
            average_speed_kmh: Self::parse_float(record.vitesse.as_deref()).unwrap_or(0.0),
            vehicle_count: Self::parse_count(record.nb_vehicule.as_deref()),
            line_code,
        })
    }

    /// Parse an `mdate` value into Europe/Paris wall-clock time.
    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Paris).naive_local());
        }

        Self::TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    }

    /// Parse a WKT LINESTRING or MULTILINESTRING, keeping (lon, lat) order.
    pub fn parse_wkt_geometry(wkt: &str) -> Option<MultiLineString<f64>> {
        let caps = WKT_GEOMETRY.captures(wkt)?;
        let body = caps.get(2)?.as_str();

        let paths: Vec<LineString<f64>> = if caps[1].eq_ignore_ascii_case("LINESTRING") {
            vec![Self::parse_wkt_path(body)?]
        } else {
            WKT_PATH
                .captures_iter(body)
                .map(|path| Self::parse_wkt_path(&path[1]))
                .collect::<Option<Vec<_>>>()?
        };

        if paths.is_empty() {
            return None;
        }

        Some(MultiLineString::new(paths))
    }

    fn parse_wkt_path(body: &str) -> Option<LineString<f64>> {
        body.split(',')
            .map(|pair| {
                let mut values = pair.split_whitespace();
                let x = values.next()?.parse::<f64>().ok()?;
                let y = values.next()?.parse::<f64>().ok()?;
                Some(Coord { x, y })
            })
            .collect::<Option<Vec<_>>>()
            .map(LineString::new)
    }

    fn parse_float(raw: Option<&str>) -> Option<f64> {
        raw.and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }

    // Counts may be exported as "4.0" when the source column held NaN elsewhere.
    fn parse_count(raw: Option<&str>) -> u32 {
        match raw {
            Some(value) if !value.is_empty() => value
                .parse::<u32>()
                .ok()
                .or_else(|| {
                    value
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .map(|v| v as u32)
                })
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn get_data_stats(data: &DashData) -> String {
        let stations: std::collections::HashSet<&str> = data
            .stations
            .iter()
            .map(|s| s.station_id.as_str())
            .collect();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        format!(
            "📊 Data Statistics:\n\
             • Station snapshots: {} | Distinct stations: {}\n\
             • Line segments: {}\n\
             • Loaded {}s ago",
            data.stations.len(),
            stations.len(),
            data.lines.len(),
            now.saturating_sub(data.loaded_at)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Timelike};

    const STATIONS: &str = "\
ident,nom,etat,nbplaces,nbvelos,nbelec,nbclassiq,mdate,latitude,longitude
S1,Meriadeck,CONNECTEE,10,4,1,3,2024-03-01 08:00:00,44.8378,-0.5792
S2,Quinconces,MAINTENANCE,2,12.0,5,7,2024-03-01T08:00:00+01:00,44.8450,-0.5730
S3,Broken,CONNECTEE,1,1,0,1,not a date,44.0,-0.5
S4,Nowhere,CONNECTEE,1,1,0,1,2024-03-01 08:00:00,,-0.5
";

    #[test]
    fn status_labels() {
        assert_eq!(StationStatus::from_label("CONNECTEE"), StationStatus::Connected);
        assert_eq!(StationStatus::from_label("MAINTENANCE"), StationStatus::Maintenance);
        assert_eq!(StationStatus::from_label("DECONNECTEE"), StationStatus::Disconnected);
        assert_eq!(
            StationStatus::from_label("connectee"),
            StationStatus::Unknown("connectee".to_string())
        );
        assert_eq!(StationStatus::Unknown("HS".to_string()).label(), "HS");
    }

    #[test]
    fn vehicle_labels_are_case_sensitive() {
        assert_eq!(VehicleType::from_label("BATEAU"), VehicleType::Boat);
        assert_eq!(VehicleType::from_label("Bus"), VehicleType::Other("Bus".to_string()));
    }

    #[test]
    fn timestamps() {
        let naive = DashModels::parse_timestamp("2024-03-01 08:00:00").unwrap();
        assert_eq!(naive.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());

        // UTC instant shown in Paris wall time (CET in March)
        let utc = DashModels::parse_timestamp("2024-03-01T07:00:00Z").unwrap();
        assert_eq!(utc.hour(), 8);

        assert!(DashModels::parse_timestamp("").is_none());
        assert!(DashModels::parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn read_stations_skips_bad_rows() {
        let stations = DashModels::read_stations(STATIONS.as_bytes()).unwrap();
        assert_eq!(stations.len(), 2);

        assert_eq!(stations[0].station_id, "S1");
        assert_eq!(stations[0].status, StationStatus::Connected);
        assert_eq!(stations[0].bikes_available, 4);
        assert_eq!(stations[0].time_key(), "08:00");

        assert_eq!(stations[1].bikes_available, 12);
        assert_eq!(stations[1].time_key(), "08:00");
    }

    #[test]
    fn wkt_linestring() {
        let geometry =
            DashModels::parse_wkt_geometry("LINESTRING (-0.57 44.84, -0.58 44.85)").unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert_eq!(geometry.0[0].0[0], Coord { x: -0.57, y: 44.84 });
    }

    #[test]
    fn wkt_multilinestring() {
        let geometry = DashModels::parse_wkt_geometry(
            "MULTILINESTRING ((-0.57 44.84, -0.58 44.85), (-0.60 44.80, -0.61 44.81, -0.62 44.82))",
        )
        .unwrap();
        assert_eq!(geometry.0.len(), 2);
        assert_eq!(geometry.0[1].0.len(), 3);
    }

    #[test]
    fn wkt_rejects_empty_and_garbage() {
        assert!(DashModels::parse_wkt_geometry("LINESTRING EMPTY").is_none());
        assert!(DashModels::parse_wkt_geometry("POINT (1 2)").is_none());
        assert!(DashModels::parse_wkt_geometry("LINESTRING (a b)").is_none());
        assert!(DashModels::parse_wkt_geometry("").is_none());
    }

    #[test]
    fn read_network_skips_missing_geometry() {
        let csv = "\
ligne_com,vehicule,libelle,geometry,retard,vitesse,nb_vehicule
Tram B,TRAM,Berges de la Garonne,\"LINESTRING (-0.57 44.84, -0.58 44.85)\",150.0,18.5,12
Lianes 1,BUS,Aéroport,,40,20,8
";
        let lines = DashModels::read_network(csv.as_bytes()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].vehicle_type, VehicleType::Tram);
        assert_eq!(lines[0].average_delay_seconds, 150.0);
        assert_eq!(lines[0].vehicle_count, 12);
    }
}
