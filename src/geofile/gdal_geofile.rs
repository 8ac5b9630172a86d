use anyhow::{anyhow, Context};
use gdal::vector::{FieldValue, LayerAccess};
use serde_json::{json, Value};
use std::path::Path;

use super::feature::Feature;

/// Read all vector features from a geofile (KML, GeoJSON or anything else
/// GDAL can open). All layers of the dataset are read in order; the
/// spatial ref of the first layer that declares one is returned alongside
/// the features.
pub fn read_features_from_geofile(
    filepath: &Path,
) -> anyhow::Result<(Vec<Feature>, Option<gdal::spatial_ref::SpatialRef>)> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options)
        .with_context(|| format!("Opening vector dataset {:?}", filepath))?;

    let layer_count = dataset.layer_count();
    if 0 == layer_count {
        return Err(anyhow!("No vector layers found in {:?}", filepath));
    }

    let mut features = Vec::new();
    let mut spatial_ref = None;
    for layer_index in 0..layer_count {
        let mut layer = dataset.layer(layer_index)?;
        if spatial_ref.is_none() {
            spatial_ref = layer.spatial_ref().ok();
        }
        for gdal_feature in layer.features() {
            let properties: Vec<(String, Value)> = gdal_feature
                .fields()
                .map(|(name, value)| (name, field_value_to_json(value)))
                .collect();
            let geometry = read_feature_geometry(&gdal_feature);
            features.push(Feature {
                geometry,
                properties,
            });
        }
    }
    log::info!("Read {} features from {:?}", features.len(), filepath);
    Ok((features, spatial_ref))
}

/// Convert a feature's geometry into a geo::Geometry via WKB. Absent and
/// empty geometries come back as None; downstream treats them as
/// "nothing to place", not as errors.
fn read_feature_geometry(gdal_feature: &gdal::vector::Feature) -> Option<geo::Geometry> {
    let geometry = gdal_feature.geometry();
    if !geometry.has_gdal_ptr() || geometry.is_empty() {
        return None;
    }
    let wkb_bytes = match geometry.wkb() {
        Ok(wkb_bytes) => wkb_bytes,
        Err(err) => {
            log::warn!("Skipping unreadable geometry: {}", err);
            return None;
        }
    };
    match wkb::wkb_to_geom(&mut wkb_bytes.as_slice()) {
        Ok(geometry) => Some(geometry),
        Err(err) => {
            log::warn!("Skipping undecodable geometry: {:?}", err);
            None
        }
    }
}

fn field_value_to_json(value: Option<FieldValue>) -> Value {
    match value {
        None => Value::Null,
        Some(FieldValue::IntegerValue(v)) => json!(v),
        Some(FieldValue::Integer64Value(v)) => json!(v),
        Some(FieldValue::RealValue(v)) => json!(v),
        Some(FieldValue::StringValue(v)) => json!(v),
        Some(FieldValue::IntegerListValue(v)) => json!(v),
        Some(FieldValue::Integer64ListValue(v)) => json!(v),
        Some(FieldValue::RealListValue(v)) => json!(v),
        Some(FieldValue::StringListValue(v)) => json!(v),
        // Dates and anything else GDAL may grow go through their string form.
        Some(other) => match other.into_string() {
            Some(s) => json!(s),
            None => Value::Null,
        },
    }
}
