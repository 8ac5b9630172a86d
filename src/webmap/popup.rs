use serde_json::Value;

/// Escape text for interpolation into HTML element content or
/// attributes.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn value_display_text(value: &Value) -> String {
    match value {
        // Plain text for strings, compact JSON for everything else
        // (nested structures included).
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render all of a feature's properties as a popup table, one row per
/// property in source order. The geometry pseudo-property is skipped.
pub fn all_fields_popup_html(properties: &Vec<(String, Value)>) -> String {
    let mut rows = String::new();
    for (name, value) in properties {
        if name == "geometry" {
            continue;
        }
        rows.push_str(&format!(
            "<tr><th style='text-align:left;padding:2px 6px;'>{}</th><td style='padding:2px 6px;'>{}</td></tr>",
            escape_html(name),
            escape_html(&value_display_text(value))
        ));
    }
    format!("<table>{}</table>", rows)
}
