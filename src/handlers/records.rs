use super::{AppState, blocking};
use crate::{
    Error, Result,
    catalog::Catalog,
    source::DataSource,
    types::{Range, RecordsPostBody, RecordsQuery, RecordsResponse, Region, RegionRecords, Resolution},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use noodles::core::Position;

pub async fn get_records(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>> {
    let regions = match (&query.region, &query.reference_name) {
        (Some(region), _) => vec![parse_region(region)?],
        (None, Some(reference_name)) => vec![Region {
            reference_name: reference_name.clone(),
            start: query.start,
            end: query.end,
        }],
        (None, None) => vec![],
    };

    build_records_response(&state, id, regions, query.resolution.unwrap_or_default()).await
}

pub async fn post_records(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RecordsPostBody>,
) -> Result<Json<RecordsResponse>> {
    let regions = body.regions.unwrap_or_default();
    build_records_response(&state, id, regions, body.resolution.unwrap_or_default()).await
}

async fn build_records_response(
    state: &AppState,
    id: String,
    regions: Vec<Region>,
    resolution: Resolution,
) -> Result<Json<RecordsResponse>> {
    if !state.catalog.exists(&id) {
        return Err(Error::NotFound(id));
    }

    let catalog = state.catalog.clone();
    let results = blocking(move || collect_regions(&catalog, &id, regions, resolution)).await?;

    Ok(Json(RecordsResponse {
        resolution,
        results,
    }))
}

/// Query every region through the file's range cache. No regions means every
/// reference in full. Missing bounds default to the reference's root range.
fn collect_regions(
    catalog: &Catalog,
    id: &str,
    regions: Vec<Region>,
    resolution: Resolution,
) -> Result<Vec<RegionRecords>> {
    let cache = catalog.open(id)?;
    let mut cache = cache.lock();

    let regions = if regions.is_empty() {
        cache
            .source()
            .references()
            .into_iter()
            .map(|reference_name| Region {
                reference_name,
                start: None,
                end: None,
            })
            .collect()
    } else {
        regions
    };

    let mut results = Vec::with_capacity(regions.len());
    for region in regions {
        let root = cache
            .source()
            .file()
            .tree(&region.reference_name)
            .map(|tree| tree.root().range);
        let from = region.start.unwrap_or(root.map_or(1, |r| r.from));
        let to = region.end.unwrap_or(root.map_or(i32::MAX, |r| r.to));
        let range = Range::checked(from, to)?;

        let records = cache.get_records(&region.reference_name, range, resolution)?;
        tracing::debug!(
            "{}: {} records in {}:{}",
            id,
            records.len(),
            region.reference_name,
            range
        );
        results.push(RegionRecords {
            reference_name: region.reference_name,
            range,
            records,
        });
    }
    Ok(results)
}

/// Parse `chr1`, `chr1:100` or `chr1:100-200` (1-based, inclusive).
fn parse_region(s: &str) -> Result<Region> {
    let region: noodles::core::Region = s
        .parse()
        .map_err(|e| Error::InvalidInput(format!("invalid region {:?}: {}", s, e)))?;

    let name: &[u8] = region.name().as_ref();
    let interval = region.interval();

    Ok(Region {
        reference_name: String::from_utf8_lossy(name).into_owned(),
        start: interval.start().map(position_to_i32).transpose()?,
        end: interval.end().map(position_to_i32).transpose()?,
    })
}

fn position_to_i32(position: Position) -> Result<i32> {
    i32::try_from(usize::from(position))
        .map_err(|_| Error::InvalidRange(format!("position {} out of range", position)))
}
