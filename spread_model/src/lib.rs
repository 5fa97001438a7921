pub mod capacity;
pub mod composer;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod merger;
pub mod models;
pub mod pass_through;
pub mod power_law;
pub mod reference_model;
pub mod regression;
pub mod seasonal;
pub mod wind;

pub use capacity::ScenarioFan;
pub use composer::{annual_summary, compose_forecast, AnnualSummary, Forecast, ForecastInputs};
pub use config::CalibrationConfig;
pub use data_loader::DataLoader;
pub use error::{ForecastError, Result};
pub use merger::{merge_daily_panel, MergedPanel};
pub use models::{
    CapacityTrajectory, CompressionParams, ForecastRow, PassThroughParams, PassThroughStatus, Scenario,
    SpreadSource, YearMonth,
};
pub use pass_through::fit_pass_through;
pub use power_law::{aggregate_monthly, calibrate, Calibration, MonthlyObservation};
pub use reference_model::{fit_reference_model, ReferenceFit};
pub use seasonal::SeasonalProfile;
pub use wind::WindProjection;
