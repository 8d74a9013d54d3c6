use crate::codec::FieldType;
use crate::file::FileType;
use crate::source::IntervalRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed genomic interval `[from, to]`, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub from: i32,
    pub to: i32,
}

impl Range {
    pub const fn new(from: i32, to: i32) -> Self {
        Self { from, to }
    }

    /// Build a range from user input, rejecting `from > to`.
    pub fn checked(from: i32, to: i32) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidRange(format!(
                "start {} is after end {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Number of positions covered, both ends inclusive.
    pub fn length(&self) -> i64 {
        i64::from(self.to) - i64::from(self.from) + 1
    }

    pub fn intersects(&self, other: &Range) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    pub fn contains(&self, other: &Range) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    pub fn contains_position(&self, position: i32) -> bool {
        self.from <= position && position <= self.to
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Zoom-dependent view of a data set. Each resolution is cached on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

/// Query parameters for GET /records/{id}
#[derive(Debug, Deserialize, Default)]
pub struct RecordsQuery {
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<i32>,
    pub end: Option<i32>,
    /// `chr1:100-200` style region, alternative to referenceName/start/end
    pub region: Option<String>,
    pub resolution: Option<Resolution>,
}

/// POST request body for multiple regions
#[derive(Debug, Deserialize)]
pub struct RecordsPostBody {
    pub regions: Option<Vec<Region>>,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    pub start: Option<i32>,
    pub end: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub resolution: Resolution,
    pub results: Vec<RegionRecords>,
}

#[derive(Debug, Serialize)]
pub struct RegionRecords {
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    pub range: Range,
    pub records: Vec<IntervalRecord>,
}

/// Description of an indexed file served from the data directory
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub id: String,
    #[serde(rename = "fileType")]
    pub file_type: FileType,
    pub fields: Vec<FieldType>,
    pub size: u64,
    pub references: Vec<ReferenceInfo>,
}

#[derive(Debug, Serialize)]
pub struct ReferenceInfo {
    pub name: String,
    pub range: Range,
    #[serde(rename = "recordCount")]
    pub record_count: u32,
    #[serde(rename = "binCount")]
    pub bin_count: usize,
}

/// Service info response (GA4GH service-info layout)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
    pub capabilities: Capabilities,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    #[serde(rename = "fileTypes")]
    pub file_types: Vec<FileType>,
    pub resolutions: Vec<Resolution>,
}
