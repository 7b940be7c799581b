use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    /// Default label size in points.
    pub font_size: f64,
    pub tick_font_size: f64,
    pub text_color: String,
    pub axis_color: String,
    pub grid_color: String,
    pub excluded_region_color: String,
    pub excluded_region_alpha: f64,
    pub neutrino_fog_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self::paper()
    }
}

impl Theme {
    pub fn paper() -> Self {
        Self {
            font_family: "DejaVu Sans, Arial, Helvetica, sans-serif".to_string(),
            font_size: 10.0,
            tick_font_size: 12.0,
            text_color: "#000000".to_string(),
            axis_color: "#000000".to_string(),
            grid_color: "#DDDDDD".to_string(),
            excluded_region_color: "#AAFFC3".to_string(),
            excluded_region_alpha: 0.5,
            neutrino_fog_color: "#FFE119".to_string(),
        }
    }

    /// Larger type for presentations.
    pub fn slides() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, sans-serif".to_string(),
            font_size: 14.0,
            tick_font_size: 16.0,
            text_color: "#1C2430".to_string(),
            axis_color: "#1C2430".to_string(),
            grid_color: "#E4E9F2".to_string(),
            ..Self::paper()
        }
    }
}
