// V3 bike-share layer: date/time index, snapshot filter and marker styling
use crate::dash_config::DashConfig;
use crate::dash_models::{StationSnapshot, StationStatus};
use chrono::{Locale, NaiveDate, NaiveTime, TimeZone, Utc};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateOption {
    pub date: NaiveDate,
    pub label: String,
}

/// Selector contents derived from the station log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimestampIndex {
    pub dates: Vec<DateOption>,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationStyle {
    pub color: String,
    pub filled: bool,
    pub fill_color: Option<String>,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationPopup {
    pub name: String,
    pub status: String,
    pub places_available: u32,
    pub bikes_available: u32,
    pub electric_bikes: u32,
    pub classic_bikes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMarker {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub style: StationStyle,
    pub popup: StationPopup,
}

// ============================================================================
// Main Implementation
// ============================================================================

pub struct DashStations;

impl DashStations {
    const DATE_LABEL_FORMAT: &'static str = "%A %d %B %Y";

    /// French display label, e.g. "vendredi 01 mars 2024".
    pub fn date_label(date: NaiveDate) -> String {
        Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
            .format_localized(Self::DATE_LABEL_FORMAT, Locale::fr_FR)
            .to_string()
    }

    pub fn index(snapshots: &[StationSnapshot]) -> TimestampIndex {
        let mut dates = BTreeMap::new();
        let mut times = BTreeSet::new();

        for snapshot in snapshots {
            let date = snapshot.date();
            dates.entry(date).or_insert_with(|| Self::date_label(date));
            times.insert(snapshot.time_key());
        }

        TimestampIndex {
            dates: dates
                .into_iter()
                .map(|(date, label)| DateOption { date, label })
                .collect(),
            times: times.into_iter().collect(),
        }
    }

    /// Exact (date, HH:MM) match. Nothing is returned until both are selected.
    pub fn filter<'a, I>(
        snapshots: I,
        date: Option<NaiveDate>,
        time_of_day: Option<&str>,
    ) -> Vec<&'a StationSnapshot>
    where
        I: IntoIterator<Item = &'a StationSnapshot>,
    {
        let (date, time_of_day) = match (date, time_of_day) {
            (Some(date), Some(time)) => (date, time),
            _ => return Vec::new(),
        };

        let selected: Vec<&StationSnapshot> = snapshots
            .into_iter()
            .filter(|s| s.date() == date && s.time_key() == time_of_day)
            .collect();

        debug!("{} snapshots at {} {}", selected.len(), date, time_of_day);
        selected
    }

    pub fn status_color<'c>(status: &StationStatus, config: &'c DashConfig) -> &'c str {
        let colors = &config.status_colors;
        match status {
            StationStatus::Connected => colors.connected.as_str(),
            StationStatus::Maintenance => colors.maintenance.as_str(),
            StationStatus::Disconnected => colors.disconnected.as_str(),
            StationStatus::Unknown(_) => colors.unknown.as_str(),
        }
    }

    /// `filled` comes from the tile choice and only changes contrast.
    pub fn style_of(snapshot: &StationSnapshot, filled: bool, config: &DashConfig) -> StationStyle {
        let color = Self::status_color(&snapshot.status, config).to_string();
        StationStyle {
            fill_color: filled.then(|| color.clone()),
            color,
            filled,
            radius: snapshot.bikes_available as f64 * config.radius_scale,
        }
    }

    pub fn popup_of(snapshot: &StationSnapshot) -> StationPopup {
        StationPopup {
            name: snapshot.name.clone(),
            status: snapshot.status.label().to_string(),
            places_available: snapshot.places_available,
            bikes_available: snapshot.bikes_available,
            electric_bikes: snapshot.electric_bikes,
            classic_bikes: snapshot.classic_bikes,
        }
    }

    pub fn markers<'a, I>(snapshots: I, filled: bool, config: &DashConfig) -> Vec<StationMarker>
    where
        I: IntoIterator<Item = &'a StationSnapshot>,
    {
        snapshots
            .into_iter()
            .map(|snapshot| StationMarker {
                station_id: snapshot.station_id.clone(),
                latitude: snapshot.latitude,
                longitude: snapshot.longitude,
                style: Self::style_of(snapshot, filled, config),
                popup: Self::popup_of(snapshot),
            })
            .collect()
    }

    /// Legend rows for the three published states.
    pub fn legend(config: &DashConfig) -> Vec<(&'static str, String)> {
        let colors = &config.status_colors;
        vec![
            ("CONNECTEE", colors.connected.clone()),
            ("MAINTENANCE", colors.maintenance.clone()),
            ("DECONNECTEE", colors.disconnected.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn snapshot(id: &str, at: &str, status: StationStatus, bikes: u32) -> StationSnapshot {
        StationSnapshot {
            station_id: id.to_string(),
            name: format!("Station {}", id),
            timestamp: NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").unwrap(),
            latitude: 44.84,
            longitude: -0.57,
            status,
            bikes_available: bikes,
            electric_bikes: bikes / 2,
            classic_bikes: bikes - bikes / 2,
            places_available: 20u32.saturating_sub(bikes),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_log() -> Vec<StationSnapshot> {
        vec![
            snapshot("S1", "2024-03-01 08:00", StationStatus::Connected, 4),
            snapshot("S2", "2024-03-01 08:00", StationStatus::Maintenance, 0),
            snapshot("S1", "2024-03-01 08:10", StationStatus::Connected, 5),
            snapshot("S1", "2024-03-02 08:00", StationStatus::Disconnected, 2),
            snapshot("S3", "2024-02-29 23:50", StationStatus::Unknown("HS".into()), 1),
        ]
    }

    #[test]
    fn status_colors() {
        let config = DashConfig::default();
        let cases = [
            (StationStatus::Connected, "#E37222"),
            (StationStatus::Maintenance, "#0A8A9F"),
            (StationStatus::Disconnected, "red"),
            (StationStatus::Unknown("".into()), "gray"),
            (StationStatus::Unknown("EN TRAVAUX".into()), "gray"),
        ];
        for (status, expected) in cases {
            let s = snapshot("S", "2024-03-01 08:00", status, 3);
            assert_eq!(DashStations::style_of(&s, false, &config).color, expected);
        }
    }

    #[test]
    fn radius_is_exact_product() {
        let mut config = DashConfig::default();
        for scale in [1.5, 2.0] {
            config.radius_scale = scale;
            for bikes in [0, 1, 7, 40] {
                let s = snapshot("S", "2024-03-01 08:00", StationStatus::Connected, bikes);
                assert_eq!(DashStations::style_of(&s, true, &config).radius, bikes as f64 * scale);
            }
        }
    }

    #[test]
    fn fill_follows_flag() {
        let config = DashConfig::default();
        let s = snapshot("S", "2024-03-01 08:00", StationStatus::Maintenance, 3);

        let filled = DashStations::style_of(&s, true, &config);
        assert!(filled.filled);
        assert_eq!(filled.fill_color.as_deref(), Some("#0A8A9F"));

        let outline = DashStations::style_of(&s, false, &config);
        assert!(!outline.filled);
        assert_eq!(outline.fill_color, None);
    }

    #[test]
    fn unset_selection_is_empty() {
        let log = sample_log();
        assert!(DashStations::filter(&log, None, Some("08:00")).is_empty());
        assert!(DashStations::filter(&log, Some(date("2024-03-01")), None).is_empty());
        assert!(DashStations::filter(&log, None, None).is_empty());
    }

    #[test]
    fn filter_is_exact() {
        let log = sample_log();
        let selected = DashStations::filter(&log, Some(date("2024-03-01")), Some("08:00"));
        let ids: Vec<&str> = selected.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);

        assert!(DashStations::filter(&log, Some(date("2024-03-01")), Some("08:05")).is_empty());
    }

    #[test]
    fn filter_is_idempotent() {
        let log = sample_log();
        let once = DashStations::filter(&log, Some(date("2024-03-01")), Some("08:00"));
        let twice = DashStations::filter(once.iter().copied(), Some(date("2024-03-01")), Some("08:00"));
        assert_eq!(once, twice);
    }

    #[test]
    fn index_dates_and_times() {
        let index = DashStations::index(&sample_log());
        let dates: Vec<NaiveDate> = index.dates.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date("2024-02-29"), date("2024-03-01"), date("2024-03-02")]);
        assert_eq!(index.times, vec!["08:00", "08:10", "23:50"]);
        assert_eq!(index.dates[1].label, "vendredi 01 mars 2024");
    }

    #[test]
    fn index_of_nothing() {
        assert_eq!(DashStations::index(&[]), TimestampIndex::default());
    }

    #[test]
    fn markers_carry_popup() {
        let config = DashConfig::default();
        let log = sample_log();
        let markers = DashStations::markers(&log[..1], false, &config);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].popup.status, "CONNECTEE");
        assert_eq!(markers[0].popup.bikes_available, 4);
        assert_eq!(markers[0].popup.places_available, 16);
    }

    #[test]
    fn legend_order() {
        let legend = DashStations::legend(&DashConfig::default());
        assert_eq!(legend[0], ("CONNECTEE", "#E37222".to_string()));
        assert_eq!(legend[2], ("DECONNECTEE", "red".to_string()));
    }
}
