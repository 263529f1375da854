use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LabelSet;

/// Active scrape target from `GET /api/v1/targets`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub health: String,
}

impl Target {
    pub fn job(&self) -> Option<&str> {
        self.labels.get("job").map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn instance(&self) -> Option<&str> {
        self.labels
            .get("instance")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildInfo {
    pub version: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeInfo {
    pub start_time: DateTime<Utc>,
}
