use std::{fmt, path::PathBuf};

use anyhow::anyhow;
use geo::{BoundingRect, Contains};
use serde::Deserialize;
use serde_json::Map;

use crate::crs::crs_utils::ensure_wgs84;
use crate::download::fetch::{build_client, sync_source_to_file};
use crate::geofile::feature::Feature;
use crate::geofile::gdal_geofile::read_features_from_geofile;
use crate::icons::rules::{default_icon_rules, IconRuleSet, IconRuleSetConfig};

use super::map::{output_filename, GeoJsonLayer, LayerStyle, MapBounds, MarkerGroup, WebMap};
use super::markers::{add_points_markers, MarkerOptions};

/// Site identifier as operators key it: either a number or free text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SiteId {
    Number(i64),
    Text(String),
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteId::Number(id) => write!(f, "{}", id),
            SiteId::Text(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebmapParams {
    pub boundary_url: String,
    pub points_url: String,
    pub site_name: String,
    pub site_id: SiteId,
    pub data_dir: PathBuf,
    #[serde(default = "default_embed_icons")]
    pub embed_icons: bool,
    #[serde(default)]
    pub icon_rules: Option<IconRuleSetConfig>,
}

fn default_embed_icons() -> bool {
    true
}

/// Build the satellite webmap for one site: download boundary and point
/// sources, keep the points inside the boundary, and write the Leaflet
/// document to the current directory. Returns the output path.
pub fn generate_webmap(params: &WebmapParams) -> anyhow::Result<PathBuf> {
    let client = build_client()?;
    let boundary_path =
        sync_source_to_file(&client, &params.boundary_url, &params.data_dir, "boundary.kml")?;
    let points_path =
        sync_source_to_file(&client, &params.points_url, &params.data_dir, "points.geojson")?;

    let (boundary_features, boundary_spatial_ref) = read_features_from_geofile(&boundary_path)?;
    let (point_features, points_spatial_ref) = read_features_from_geofile(&points_path)?;
    let boundary_features = ensure_wgs84(boundary_features, boundary_spatial_ref.as_ref())?;
    let point_features = ensure_wgs84(point_features, points_spatial_ref.as_ref())?;

    let boundary_polygons = collect_boundary_polygons(&boundary_features);
    if boundary_polygons.is_empty() {
        return Err(anyhow!(
            "Boundary file {:?} contains no polygons",
            boundary_path
        ));
    }

    let num_points = point_features.len();
    let selected: Vec<Feature> = point_features
        .into_iter()
        .filter(|feature| feature_within(feature, &boundary_polygons))
        .collect();
    log::info!(
        "{} of {} point features fall within the boundary",
        selected.len(),
        num_points
    );

    let bounds = boundary_bounds(&boundary_polygons)?;
    let mut map = WebMap::new(bounds);
    map.add_geojson_layer(boundary_layer(&boundary_features));
    map.add_geojson_layer(outline_layer(&boundary_polygons));

    let icon_rules = match &params.icon_rules {
        Some(config) => IconRuleSet::from_config(config.clone()),
        None => default_icon_rules(),
    };
    let mut competitor_group = MarkerGroup::new("Competitor Points");
    add_points_markers(
        &mut competitor_group,
        &client,
        &selected,
        &icon_rules,
        &MarkerOptions {
            embed_icons: params.embed_icons,
            ..Default::default()
        },
    );
    map.add_marker_group(competitor_group);

    let output_path = PathBuf::from(output_filename(
        &params.site_id.to_string(),
        &params.site_name,
    ));
    map.save(&output_path)?;
    log::info!("Saved webmap to {:?}", output_path);
    Ok(output_path)
}

/// All polygons of the boundary features, multipolygons flattened.
fn collect_boundary_polygons(features: &Vec<Feature>) -> Vec<geo::Polygon> {
    let mut polygons = Vec::new();
    for feature in features {
        match &feature.geometry {
            Some(geo::Geometry::Polygon(polygon)) => polygons.push(polygon.clone()),
            Some(geo::Geometry::MultiPolygon(multi)) => polygons.extend(multi.iter().cloned()),
            _ => {}
        }
    }
    polygons
}

fn feature_within(feature: &Feature, boundary_polygons: &Vec<geo::Polygon>) -> bool {
    match &feature.geometry {
        Some(geo::Geometry::Point(point)) => boundary_polygons
            .iter()
            .any(|polygon| polygon.contains(point)),
        _ => false,
    }
}

/// Envelope of all boundary polygons.
fn boundary_bounds(boundary_polygons: &Vec<geo::Polygon>) -> anyhow::Result<MapBounds> {
    let mut bounds: Option<MapBounds> = None;
    for polygon in boundary_polygons {
        let rect = polygon
            .bounding_rect()
            .ok_or_else(|| anyhow!("Boundary polygon has no bounding rectangle"))?;
        bounds = Some(match bounds {
            None => MapBounds {
                min_lon: rect.min().x,
                min_lat: rect.min().y,
                max_lon: rect.max().x,
                max_lat: rect.max().y,
            },
            Some(bounds) => MapBounds {
                min_lon: bounds.min_lon.min(rect.min().x),
                min_lat: bounds.min_lat.min(rect.min().y),
                max_lon: bounds.max_lon.max(rect.max().x),
                max_lat: bounds.max_lat.max(rect.max().y),
            },
        });
    }
    bounds.ok_or_else(|| anyhow!("No boundary polygons to compute bounds from"))
}

/// The boundary features as a red translucent overlay, with a tooltip on
/// the Name property when the source carries one.
fn boundary_layer(boundary_features: &Vec<Feature>) -> GeoJsonLayer {
    let features: Vec<geojson::Feature> = boundary_features
        .iter()
        .filter_map(|feature| {
            let geometry = feature.geometry.as_ref()?;
            let properties: Map<String, serde_json::Value> = feature
                .properties
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            Some(geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();
    let has_name = boundary_features
        .iter()
        .any(|feature| feature.property("Name").is_some());
    GeoJsonLayer {
        name: "KML Boundary".to_string(),
        data: geojson::GeoJson::FeatureCollection(features.into_iter().collect()),
        style: LayerStyle {
            fill_color: "#FF0000".to_string(),
            color: "#FF0000".to_string(),
            weight: 2.0,
            fill_opacity: 0.1,
        },
        tooltip_field: has_name.then(|| "Name".to_string()),
    }
}

/// A thin outline of the whole boundary, drawn above the fill layer.
fn outline_layer(boundary_polygons: &Vec<geo::Polygon>) -> GeoJsonLayer {
    let outline = geo::Geometry::MultiPolygon(geo::MultiPolygon::new(boundary_polygons.clone()));
    GeoJsonLayer {
        name: "Boundary Outline".to_string(),
        data: geojson::GeoJson::Geometry(geojson::Geometry::new(geojson::Value::from(&outline))),
        style: LayerStyle {
            fill_color: "#00000000".to_string(),
            color: "#FF4D4D".to_string(),
            weight: 1.5,
            fill_opacity: 0.0,
        },
        tooltip_field: None,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;
    use serde_json::json;

    use crate::geofile::feature::Feature;

    use super::{
        boundary_bounds, boundary_layer, collect_boundary_polygons, feature_within, SiteId,
        WebmapParams,
    };

    fn square(min: f64, max: f64) -> geo::Polygon {
        geo::Polygon::new(
            vec![(min, min), (max, min), (max, max), (min, max), (min, min)].into(),
            vec![],
        )
    }

    fn point_feature(lon: f64, lat: f64) -> Feature {
        Feature {
            geometry: Some(geo::Geometry::Point(geo::Point::new(lon, lat))),
            properties: vec![],
        }
    }

    #[rstest]
    fn test_collect_boundary_polygons_flattens_multipolygons() {
        let features = vec![
            Feature::from(geo::Geometry::Polygon(square(0.0, 1.0))),
            Feature::from(geo::Geometry::MultiPolygon(geo::MultiPolygon::new(vec![
                square(2.0, 3.0),
                square(4.0, 5.0),
            ]))),
            point_feature(0.5, 0.5),
        ];
        assert_eq!(collect_boundary_polygons(&features).len(), 3);
    }

    #[rstest]
    #[case(point_feature(0.5, 0.5), true)]
    #[case(point_feature(1.5, 1.5), false)]
    #[case(Feature { geometry: None, properties: vec![] }, false)]
    fn test_feature_within(#[case] feature: Feature, #[case] expected: bool) {
        let polygons = vec![square(0.0, 1.0)];
        assert_eq!(feature_within(&feature, &polygons), expected);
    }

    #[rstest]
    fn test_boundary_bounds_merges_polygons() {
        let bounds = boundary_bounds(&vec![square(0.0, 1.0), square(3.0, 5.0)]).unwrap();
        assert_relative_eq!(bounds.min_lon, 0.0);
        assert_relative_eq!(bounds.max_lat, 5.0);
        let (center_lat, center_lon) = bounds.center();
        assert_relative_eq!(center_lat, 2.5);
        assert_relative_eq!(center_lon, 2.5);
    }

    #[rstest]
    fn test_boundary_layer_tooltip_follows_name_property() {
        let mut feature = Feature::from(geo::Geometry::Polygon(square(0.0, 1.0)));
        feature.properties = vec![("Name".to_string(), json!("North zone"))];
        let layer = boundary_layer(&vec![feature]);
        assert_eq!(layer.tooltip_field.as_deref(), Some("Name"));

        let anonymous = Feature::from(geo::Geometry::Polygon(square(0.0, 1.0)));
        let layer = boundary_layer(&vec![anonymous]);
        assert_eq!(layer.tooltip_field, None);
    }

    #[rstest]
    fn test_params_yaml_defaults() {
        let yaml = r#"
boundary_url: https://example.com/boundary.kml
points_url: https://example.com/points.geojson
site_name: Site A
site_id: 12
data_dir: /tmp/webmap-data
"#;
        let params: WebmapParams = serde_yaml::from_str(yaml).unwrap();
        assert!(params.embed_icons);
        assert!(params.icon_rules.is_none());
        match params.site_id {
            SiteId::Number(id) => assert_eq!(id, 12),
            SiteId::Text(_) => panic!("numeric site id expected"),
        }
    }
}
