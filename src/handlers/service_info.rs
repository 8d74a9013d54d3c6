use crate::file::FileType;
use crate::types::{Capabilities, Organization, Resolution, ServiceInfo, ServiceType};
use axum::Json;

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        id: "org.example.gbindex".to_string(),
        name: "gbindex".to_string(),
        r#type: ServiceType {
            group: "org.example".to_string(),
            artifact: "gbindex".to_string(),
            version: "1.0.0".to_string(),
        },
        description: Some("Range queries over bin-indexed genomic interval files".to_string()),
        organization: Organization {
            name: "Example Organization".to_string(),
            url: "https://example.org".to_string(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        capabilities: Capabilities {
            file_types: vec![FileType::IntervalGeneric, FileType::IntervalBed],
            resolutions: vec![
                Resolution::VeryHigh,
                Resolution::High,
                Resolution::Medium,
                Resolution::Low,
                Resolution::VeryLow,
            ],
        },
    })
}
