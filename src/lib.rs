#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod placement;
pub mod render;
pub mod scene;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::{Args, run};
pub use config::{Config, PlacementConfig, PlotConfig, Side};
pub use error::{DataError, PlacementError, SceneError};
pub use placement::{Label, PlacementOutcome, PlacementResult, SENTINEL_MAX, place_label};
pub use scene::{Curve, PlotContext, Scene};
pub use text_metrics::{ApproxMeasurer, FontMeasurer, TextMeasure};
