use serde::{Deserialize, Serialize};

/// Paint and progress timestamps observed in the original load, in ms from navigation start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationMarkers {
    pub first_contentful_paint: Option<f64>,
    pub first_meaningful_paint: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    /// Speed index measured from the recorded filmstrip.
    pub speed_index: Option<f64>,
}

impl NavigationMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first_contentful_paint(mut self, ms: f64) -> Self {
        self.first_contentful_paint = Some(ms);
        self
    }

    pub fn with_first_meaningful_paint(mut self, ms: f64) -> Self {
        self.first_meaningful_paint = Some(ms);
        self
    }

    pub fn with_largest_contentful_paint(mut self, ms: f64) -> Self {
        self.largest_contentful_paint = Some(ms);
        self
    }

    pub fn with_speed_index(mut self, ms: f64) -> Self {
        self.speed_index = Some(ms);
        self
    }
}
