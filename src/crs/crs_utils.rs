use anyhow::{anyhow, Context};
use geo::MapCoords;

use crate::geofile::feature::Feature;

pub type EpsgCode = u32;

pub const WGS84_EPSG: EpsgCode = 4326;

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

/// PROJ-compatible description of a spatial ref: the EPSG authority
/// string when the ref carries a code, otherwise its PROJ4 form.
fn spatial_ref_to_proj_string(
    spatial_ref: &gdal::spatial_ref::SpatialRef,
) -> anyhow::Result<String> {
    match spatial_ref.auth_code() {
        Ok(code) => Ok(epsg_code_to_authority_string(code as EpsgCode)),
        Err(_) => spatial_ref
            .to_proj4()
            .context("Describing spatial ref for projection"),
    }
}

/// Reproject features to WGS84 when their source CRS differs. An absent
/// spatial ref is treated as already being WGS84.
pub fn ensure_wgs84(
    features: Vec<Feature>,
    spatial_ref: Option<&gdal::spatial_ref::SpatialRef>,
) -> anyhow::Result<Vec<Feature>> {
    let spatial_ref = match spatial_ref {
        Some(spatial_ref) => spatial_ref,
        None => return Ok(features),
    };
    if let Ok(code) = spatial_ref.auth_code() {
        if code as EpsgCode == WGS84_EPSG {
            return Ok(features);
        }
    }

    let from = spatial_ref_to_proj_string(spatial_ref)?;
    let to = epsg_code_to_authority_string(WGS84_EPSG);
    log::info!("Reprojecting {} -> {}", from, to);
    let projection = proj::Proj::new_known_crs(&from, &to, None)
        .with_context(|| format!("Creating projection {} -> {}", from, to))?;

    features
        .into_iter()
        .map(|feature| project_feature(feature, &projection))
        .collect()
}

fn project_feature(feature: Feature, projection: &proj::Proj) -> anyhow::Result<Feature> {
    let geometry = match feature.geometry {
        Some(geometry) => Some(
            geometry
                .try_map_coords(|coord| projection.convert(coord))
                .map_err(|err| anyhow!("Could not project geometry, {}", err))?,
        ),
        None => None,
    };
    Ok(Feature {
        geometry,
        properties: feature.properties,
    })
}
