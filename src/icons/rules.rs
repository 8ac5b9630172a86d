use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Marker appended to a pattern to make it a prefix match instead of an
/// exact match.
pub const WILDCARD_MARKER: char = '*';

/// Canonicalize a property value for comparison: coerce to text, strip
/// surrounding whitespace and lowercase with the full Unicode mapping.
pub fn normalize_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.trim().to_lowercase()
}

/// Pixel dimensions of a raster marker icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IconSize {
    pub width: u32,
    pub height: u32,
}

impl Default for IconSize {
    fn default() -> Self {
        Self {
            width: 28,
            height: 28,
        }
    }
}

impl IconSize {
    /// The larger of the two dimensions, used when a service takes a
    /// single size parameter.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// How a marker is drawn: either a raster image fetched from somewhere,
/// or a named glyph from the map's symbolic icon set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IconRule {
    Image {
        icon_url: String,
        /// Absent means "use the orchestrator's default size".
        #[serde(default)]
        icon_size: Option<IconSize>,
    },
    Symbolic {
        icon: String,
        #[serde(default = "default_symbolic_prefix")]
        prefix: String,
    },
}

fn default_symbolic_prefix() -> String {
    "fa".to_string()
}

/// Serde-facing shape of a rule set: an ordered list of pattern/rule
/// pairs plus a default. Declaration order of `patterns` is significant
/// for wildcard entries.
#[derive(Debug, Clone, Deserialize)]
pub struct IconRuleSetConfig {
    pub field: Option<String>,
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
    pub default: IconRule,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub rule: IconRule,
}

/// Decides which icon applies to a feature, keyed on one discriminator
/// property.
///
/// Exact patterns are checked first via a table built once here, then
/// wildcard patterns (trailing `*`) are tried as prefix matches in
/// declaration order. The first matching wildcard wins even when a later
/// one is longer or more specific; that ordering is relied upon by
/// existing rule sets and must not change.
#[derive(Debug, Clone)]
pub struct IconRuleSet {
    field: Option<String>,
    exact: HashMap<String, IconRule>,
    wildcards: Vec<(String, IconRule)>,
    default: IconRule,
}

impl IconRuleSet {
    pub fn new(
        field: Option<String>,
        patterns: Vec<(String, IconRule)>,
        default: IconRule,
    ) -> Self {
        let mut exact = HashMap::new();
        let mut wildcards = Vec::new();
        for (pattern, rule) in patterns {
            match pattern.strip_suffix(WILDCARD_MARKER) {
                Some(prefix) => {
                    wildcards.push((normalize_text(&Value::from(prefix)), rule))
                }
                None => {
                    exact.insert(normalize_text(&Value::from(pattern.as_str())), rule);
                }
            }
        }
        Self {
            field,
            exact,
            wildcards,
            default,
        }
    }

    pub fn from_config(config: IconRuleSetConfig) -> Self {
        Self::new(
            config.field,
            config
                .patterns
                .into_iter()
                .map(|entry| (entry.pattern, entry.rule))
                .collect(),
            config.default,
        )
    }

    /// Resolve the icon for a feature's properties. Always terminates in
    /// a rule; the default covers a missing discriminator and unmatched
    /// values.
    pub fn resolve(&self, properties: &Vec<(String, Value)>) -> &IconRule {
        let field = match &self.field {
            Some(field) => field,
            None => return &self.default,
        };
        let value = match properties.iter().find(|(name, _)| name == field) {
            Some((_, value)) => normalize_text(value),
            None => return &self.default,
        };

        if let Some(rule) = self.exact.get(&value) {
            return rule;
        }
        for (prefix, rule) in &self.wildcards {
            if value.starts_with(prefix.as_str()) {
                return rule;
            }
        }
        &self.default
    }
}

/// Built-in rule set keyed on the "Brand" property. Image references are
/// Google Drive file ids resolved at placement time.
pub fn default_icon_rules() -> IconRuleSet {
    let image_rule = |file_id: &str| IconRule::Image {
        icon_url: file_id.to_string(),
        icon_size: Some(IconSize::default()),
    };
    IconRuleSet::new(
        Some("Brand".to_string()),
        vec![
            (
                "CJ SUPERMARKET + BAO*".to_string(),
                image_rule("1kaeronC0Q-h6uHbdKNzm8381m1SIFFZX"),
            ),
            ("CJ*".to_string(), image_rule("1kaeronC0Q-h6uHbdKNzm8381m1SIFFZX")),
            (
                "BigC Extra".to_string(),
                image_rule("1iyA4ukSIoz4TX6G6G8PJONV2WglQVSuY"),
            ),
            (
                "BigC Market".to_string(),
                image_rule("1Whmmo2cI95srD20kDZ2xJYoRO_kc_PbM"),
            ),
            (
                "Lotus Extra".to_string(),
                image_rule("1Mj12L7s8hYjCjjjHsewzgcKjZtszper7"),
            ),
            (
                "Lotus Gofresh".to_string(),
                image_rule("1tDZtAjFbYWr_D0FZpcp4ai8JcCNfxkHb"),
            ),
            (
                "Lotus Market".to_string(),
                image_rule("1Mj12L7s8hYjCjjjHsewzgcKjZtszper7"),
            ),
            (
                "7-Eleven".to_string(),
                image_rule("1dpBuOig0swLfqSyVSfUqzZYBptJA390-"),
            ),
            ("Tops".to_string(), image_rule("13Y68KyDdCwNoTo_dJwkQ3WcjlvM6RqoO")),
            ("MBC".to_string(), image_rule("1PQmuQ0hQm2a8KCzLaiQLDtHrh8AOz8sr")),
            ("ETC.".to_string(), image_rule("1yDbY2Tjq0kzA2gxrnMSDHvfwS_Ki7flh")),
        ],
        IconRule::Symbolic {
            icon: "map-marker".to_string(),
            prefix: "fa".to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::{json, Value};

    use super::{default_icon_rules, normalize_text, IconRule, IconRuleSet, IconSize};

    fn symbolic(icon: &str) -> IconRule {
        IconRule::Symbolic {
            icon: icon.to_string(),
            prefix: "fa".to_string(),
        }
    }

    fn brand_props(brand: Value) -> Vec<(String, Value)> {
        vec![
            ("Name".to_string(), json!("store 1")),
            ("Brand".to_string(), brand),
        ]
    }

    #[rstest]
    #[case(json!("  BigC Extra  "), "bigc extra")]
    #[case(json!("CAFÉ"), "café")]
    #[case(json!(7), "7")]
    #[case(json!(null), "null")]
    #[case(json!(["a", "b"]), "[\"a\",\"b\"]")]
    fn test_normalize_text(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(normalize_text(&value), expected);
    }

    #[rstest]
    #[case(json!("Tops"))]
    #[case(json!("tops"))]
    #[case(json!("  TOPS "))]
    fn test_exact_match_ignores_case_and_whitespace(#[case] brand: Value) {
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![("Tops".to_string(), symbolic("shopping-cart"))],
            symbolic("map-marker"),
        );
        assert_eq!(rules.resolve(&brand_props(brand)), &symbolic("shopping-cart"));
    }

    #[rstest]
    fn test_wildcard_declaration_order_wins_over_specificity() {
        // "cj supermarket + bao 123" also matches the longer pattern, but
        // the first declared wildcard must win.
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![
                ("CJ*".to_string(), symbolic("a")),
                ("CJ SUPERMARKET + BAO*".to_string(), symbolic("b")),
            ],
            symbolic("map-marker"),
        );
        let resolved = rules.resolve(&brand_props(json!("cj supermarket + bao 123")));
        assert_eq!(resolved, &symbolic("a"));

        // Flipping the declaration order flips the winner.
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![
                ("CJ SUPERMARKET + BAO*".to_string(), symbolic("b")),
                ("CJ*".to_string(), symbolic("a")),
            ],
            symbolic("map-marker"),
        );
        let resolved = rules.resolve(&brand_props(json!("cj supermarket + bao 123")));
        assert_eq!(resolved, &symbolic("b"));
    }

    #[rstest]
    fn test_exact_match_beats_wildcard() {
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![
                ("Lotus*".to_string(), symbolic("wild")),
                ("Lotus Market".to_string(), symbolic("exact")),
            ],
            symbolic("map-marker"),
        );
        let resolved = rules.resolve(&brand_props(json!("lotus market")));
        assert_eq!(resolved, &symbolic("exact"));
    }

    #[rstest]
    fn test_missing_field_returns_default() {
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![("Tops".to_string(), symbolic("shopping-cart"))],
            symbolic("map-marker"),
        );
        let props = vec![("Name".to_string(), json!("store 1"))];
        assert_eq!(rules.resolve(&props), &symbolic("map-marker"));
    }

    #[rstest]
    fn test_unset_field_returns_default() {
        let rules = IconRuleSet::new(None, vec![("Tops".to_string(), symbolic("x"))], symbolic("d"));
        assert_eq!(rules.resolve(&brand_props(json!("Tops"))), &symbolic("d"));
    }

    #[rstest]
    fn test_unmatched_value_returns_default() {
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![
                ("Tops".to_string(), symbolic("x")),
                ("CJ*".to_string(), symbolic("y")),
            ],
            symbolic("map-marker"),
        );
        let resolved = rules.resolve(&brand_props(json!("Family Mart")));
        assert_eq!(resolved, &symbolic("map-marker"));
    }

    #[rstest]
    fn test_numeric_discriminator_value_is_coerced() {
        let rules = IconRuleSet::new(
            Some("Brand".to_string()),
            vec![("7*".to_string(), symbolic("seven"))],
            symbolic("map-marker"),
        );
        assert_eq!(rules.resolve(&brand_props(json!(711))), &symbolic("seven"));
    }

    #[rstest]
    fn test_default_rules_resolve_brand() {
        let rules = default_icon_rules();
        let resolved = rules.resolve(&brand_props(json!("cj supermarket + bao 123")));
        match resolved {
            IconRule::Image { icon_size, .. } => {
                assert_eq!(*icon_size, Some(IconSize::default()))
            }
            IconRule::Symbolic { .. } => panic!("expected an image rule for a CJ brand"),
        }
        assert_eq!(
            rules.resolve(&brand_props(json!("no such brand"))),
            &symbolic("map-marker")
        );
    }

    #[rstest]
    fn test_rule_set_config_yaml_round_trip() {
        let yaml = r#"
field: Brand
patterns:
  - pattern: "CJ*"
    rule:
      icon_url: some-file-id
      icon_size: {width: 32, height: 32}
  - pattern: "Tops"
    rule:
      icon: shopping-cart
default:
  icon: map-marker
  prefix: fa
"#;
        let config: super::IconRuleSetConfig = serde_yaml::from_str(yaml).unwrap();
        let rules = IconRuleSet::from_config(config);
        let resolved = rules.resolve(&brand_props(json!("CJ Express")));
        assert_eq!(
            resolved,
            &IconRule::Image {
                icon_url: "some-file-id".to_string(),
                icon_size: Some(IconSize {
                    width: 32,
                    height: 32
                }),
            }
        );
        // Symbolic rule with the prefix defaulted by serde.
        assert_eq!(
            rules.resolve(&brand_props(json!("Tops"))),
            &symbolic("shopping-cart")
        );
    }
}
