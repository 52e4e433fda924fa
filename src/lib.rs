// TBM network dashboard: V3 bike-share stations and TRAM/BUS/BAT3 lines as map layers
pub mod dash_config;
pub mod dash_controllers;
pub mod dash_models;
pub mod dash_routes;
pub mod dash_stations;
pub mod dash_views;

pub use dash_config::DashConfig;
pub use dash_models::{DashData, DashError, DashModels, StationSnapshot, StationStatus, TransitLine, VehicleType};
pub use dash_routes::{DashRoutes, LinePalette, VehicleFilter};
pub use dash_stations::DashStations;
