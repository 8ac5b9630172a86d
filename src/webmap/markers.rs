use indicatif::ProgressBar;

use crate::geofile::feature::Feature;
use crate::icons::image::resolve_icon_source;
use crate::icons::rules::{IconRule, IconRuleSet, IconSize};

use super::map::{Marker, MarkerGroup, MarkerIcon};
use super::popup::all_fields_popup_html;

/// Placement knobs, with the defaults the built-in rule sets assume.
pub struct MarkerOptions {
    pub default_icon_size: IconSize,
    pub embed_icons: bool,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            default_icon_size: IconSize::default(),
            embed_icons: true,
        }
    }
}

/// Place one marker per point feature into `group`: resolve the icon
/// rule, format the popup and (for image rules) resolve or embed the
/// image. Features without a point geometry are skipped. An icon fetch
/// failure downgrades that one marker to the direct address and is
/// logged; it never aborts the loop.
pub fn add_points_markers(
    group: &mut MarkerGroup,
    client: &reqwest::blocking::Client,
    features: &Vec<Feature>,
    icon_rules: &IconRuleSet,
    options: &MarkerOptions,
) {
    let bar = ProgressBar::new(features.len() as u64);
    for feature in features {
        bar.inc(1);
        let point = match &feature.geometry {
            Some(geo::Geometry::Point(point)) => point,
            _ => continue,
        };
        let rule = icon_rules.resolve(&feature.properties);
        let popup_html = all_fields_popup_html(&feature.properties);

        let icon = match rule {
            IconRule::Image {
                icon_url,
                icon_size,
            } => {
                let size = icon_size.unwrap_or(options.default_icon_size);
                let resolution =
                    resolve_icon_source(client, icon_url, &size, options.embed_icons);
                if let Some(reason) = &resolution.fallback_reason {
                    log::warn!(
                        "Could not embed icon {}, using the direct address: {:#}",
                        icon_url,
                        reason
                    );
                }
                MarkerIcon::Image {
                    src: resolution.source.address().to_string(),
                    size,
                }
            }
            IconRule::Symbolic { icon, prefix } => MarkerIcon::Symbolic {
                icon: icon.clone(),
                prefix: prefix.clone(),
            },
        };

        group.add_marker(Marker {
            lat: point.y(),
            lon: point.x(),
            popup_html,
            icon,
        });
    }
    bar.finish_and_clear();
}
