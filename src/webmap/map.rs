use std::fmt::Write as _;
use std::{fs, path::Path};

use anyhow::Context;

use crate::icons::rules::IconSize;

const LEAFLET_CSS: &str = "https://cdn.jsdelivr.net/npm/leaflet@1.9.3/dist/leaflet.css";
const LEAFLET_JS: &str = "https://cdn.jsdelivr.net/npm/leaflet@1.9.3/dist/leaflet.js";
const AWESOME_MARKERS_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.css";
const AWESOME_MARKERS_JS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.js";
const FONT_AWESOME_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.2.0/css/all.min.css";

const DEFAULT_ZOOM: u32 = 10;
const POPUP_MAX_WIDTH: u32 = 400;

/// Geographic envelope in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl MapBounds {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

pub struct TileLayer {
    pub name: String,
    pub url_template: String,
    pub attribution: String,
}

impl TileLayer {
    pub fn esri_world_imagery() -> Self {
        Self {
            name: "Satellite".to_string(),
            url_template:
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
                    .to_string(),
            attribution: "Esri World Imagery".to_string(),
        }
    }
}

pub struct LayerStyle {
    pub fill_color: String,
    pub color: String,
    pub weight: f64,
    pub fill_opacity: f64,
}

pub struct GeoJsonLayer {
    pub name: String,
    pub data: geojson::GeoJson,
    pub style: LayerStyle,
    /// Property whose value is shown as a sticky tooltip, when present on
    /// a feature.
    pub tooltip_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerIcon {
    Image { src: String, size: IconSize },
    Symbolic { icon: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub popup_html: String,
    pub icon: MarkerIcon,
}

pub struct MarkerGroup {
    pub name: String,
    pub show: bool,
    pub markers: Vec<Marker>,
}

impl MarkerGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            show: true,
            markers: Vec::new(),
        }
    }

    pub fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }
}

/// A satellite-backed Leaflet map assembled layer by layer and serialized
/// to one standalone HTML document.
pub struct WebMap {
    bounds: MapBounds,
    zoom_start: u32,
    tile_layer: TileLayer,
    geojson_layers: Vec<GeoJsonLayer>,
    marker_groups: Vec<MarkerGroup>,
}

impl WebMap {
    pub fn new(bounds: MapBounds) -> Self {
        Self {
            bounds,
            zoom_start: DEFAULT_ZOOM,
            tile_layer: TileLayer::esri_world_imagery(),
            geojson_layers: Vec::new(),
            marker_groups: Vec::new(),
        }
    }

    pub fn add_geojson_layer(&mut self, layer: GeoJsonLayer) {
        self.geojson_layers.push(layer);
    }

    pub fn add_marker_group(&mut self, group: MarkerGroup) {
        self.marker_groups.push(group);
    }

    pub fn render_html(&self) -> String {
        let (center_lat, center_lon) = self.bounds.center();
        let mut script = String::new();
        writeln!(
            script,
            "var map = L.map(\"map\", {{center: [{}, {}], zoom: {}}});",
            center_lat, center_lon, self.zoom_start
        )
        .unwrap();
        writeln!(script, "L.control.scale().addTo(map);").unwrap();
        writeln!(
            script,
            "var baseLayer = L.tileLayer({}, {{attribution: {}}}).addTo(map);",
            js_string(&self.tile_layer.url_template),
            js_string(&self.tile_layer.attribution)
        )
        .unwrap();

        let mut overlay_entries = Vec::new();
        for (index, layer) in self.geojson_layers.iter().enumerate() {
            let variable = format!("overlay_{}", index);
            writeln!(
                script,
                "var {} = L.geoJSON({}, {{\n  style: function (feature) {{ return {{fillColor: {}, color: {}, weight: {}, fillOpacity: {}}}; }}{}\n}}).addTo(map);",
                variable,
                escape_script_close(&layer.data.to_string()),
                js_string(&layer.style.fill_color),
                js_string(&layer.style.color),
                layer.style.weight,
                layer.style.fill_opacity,
                tooltip_callback(&layer.tooltip_field)
            )
            .unwrap();
            overlay_entries.push((layer.name.clone(), variable));
        }

        for (group_index, group) in self.marker_groups.iter().enumerate() {
            let variable = format!("markerGroup_{}", group_index);
            let attach = if group.show { ".addTo(map)" } else { "" };
            writeln!(script, "var {} = L.featureGroup(){};", variable, attach).unwrap();
            for marker in &group.markers {
                writeln!(
                    script,
                    "L.marker([{}, {}], {{icon: {}}}).bindPopup({}, {{maxWidth: {}}}).addTo({});",
                    marker.lat,
                    marker.lon,
                    marker_icon_js(&marker.icon),
                    js_string(&marker.popup_html),
                    POPUP_MAX_WIDTH,
                    variable
                )
                .unwrap();
            }
            overlay_entries.push((group.name.clone(), variable));
        }

        let overlays = overlay_entries
            .iter()
            .map(|(name, variable)| format!("{}: {}", js_string(name), variable))
            .collect::<Vec<String>>()
            .join(", ");
        writeln!(
            script,
            "L.control.layers({{{}: baseLayer}}, {{{}}}, {{collapsed: false, position: \"topright\"}}).addTo(map);",
            js_string(&self.tile_layer.name),
            overlays
        )
        .unwrap();
        writeln!(
            script,
            "map.fitBounds([[{}, {}], [{}, {}]]);",
            self.bounds.min_lat, self.bounds.min_lon, self.bounds.max_lat, self.bounds.max_lon
        )
        .unwrap();

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\"/>\n\
             <link rel=\"stylesheet\" href=\"{leaflet_css}\"/>\n\
             <link rel=\"stylesheet\" href=\"{awesome_css}\"/>\n\
             <link rel=\"stylesheet\" href=\"{fa_css}\"/>\n\
             <script src=\"{leaflet_js}\"></script>\n\
             <script src=\"{awesome_js}\"></script>\n\
             <style>html, body {{margin: 0; padding: 0;}} #map {{position: absolute; top: 0; bottom: 0; left: 0; right: 0;}}</style>\n\
             </head>\n<body>\n<div id=\"map\"></div>\n<script>\n{script}</script>\n</body>\n</html>\n",
            leaflet_css = LEAFLET_CSS,
            awesome_css = AWESOME_MARKERS_CSS,
            fa_css = FONT_AWESOME_CSS,
            leaflet_js = LEAFLET_JS,
            awesome_js = AWESOME_MARKERS_JS,
            script = script,
        )
    }

    pub fn save(&self, output_filepath: &Path) -> anyhow::Result<()> {
        fs::write(output_filepath, self.render_html())
            .with_context(|| format!("Writing webmap to {:?}", output_filepath))
    }
}

/// Output artifact name for a site: `{site_id}_{site_name}.html` with
/// spaces replaced by underscores.
pub fn output_filename(site_id: &str, site_name: &str) -> String {
    format!("{}_{}.html", site_id, site_name).replace(' ', "_")
}

fn marker_icon_js(icon: &MarkerIcon) -> String {
    match icon {
        MarkerIcon::Image { src, size } => format!(
            "L.icon({{iconUrl: {}, iconSize: [{}, {}]}})",
            js_string(src),
            size.width,
            size.height
        ),
        MarkerIcon::Symbolic { icon, prefix } => format!(
            "L.AwesomeMarkers.icon({{icon: {}, prefix: {}, markerColor: \"blue\"}})",
            js_string(icon),
            js_string(prefix)
        ),
    }
}

fn tooltip_callback(tooltip_field: &Option<String>) -> String {
    match tooltip_field {
        Some(field) => format!(
            ",\n  onEachFeature: function (feature, layer) {{ if (feature.properties && feature.properties[{field}] !== undefined) {{ layer.bindTooltip(String(feature.properties[{field}]), {{sticky: true}}); }} }}",
            field = js_string(field)
        ),
        None => String::new(),
    }
}

/// JSON string literal, valid as a JavaScript string expression.
fn js_string(text: &str) -> String {
    escape_script_close(&serde_json::to_string(text).unwrap())
}

/// Keep embedded payloads from terminating the surrounding script block.
fn escape_script_close(text: &str) -> String {
    text.replace("</", "<\\/")
}
