//! Time series returned by a provider query.

use serde::{Deserialize, Serialize};

/// A single sample. The provider may report a timestamp without a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub value: Option<f64>,
}

/// One series matched by a query, points in ascending time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metric: String,
    pub points: Vec<Point>,
}

impl Series {
    /// The most recent point, if any.
    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }
}
