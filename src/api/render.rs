//! Server-side HTML for the reading view.

use super::params::FilterParams;
use crate::{db::models::SensorReading, timestamp::format_iso};

const STYLE: &str = "\
body { font-family: system-ui, sans-serif; margin: 2rem; }
form { margin-bottom: 1rem; }
label { margin-right: 0.75rem; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 0.25rem 0.75rem; text-align: right; }
td.source { text-align: left; }
";

/// Render the readings table with a filter form pre-filled from `params`.
///
/// The form submits to the view; its second button sends the same fields to
/// the CSV export.
pub fn readings_page(readings: &[SensorReading], params: &FilterParams, limit: u32) -> String {
    let mut rows = String::new();
    for r in readings {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"source\">{}</td></tr>\n",
            r.id,
            measurement(r.temperature),
            measurement(r.humidity),
            format_iso(&r.timestamp),
            html_escape(r.source.as_deref().unwrap_or_default()),
        ));
    }
    if readings.is_empty() {
        rows.push_str("<tr><td colspan=\"5\">No readings match.</td></tr>\n");
    }

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Sensor readings</title>
<style>{STYLE}</style>
</head>
<body>
<h1>Sensor readings</h1>
<form method="get" action="/view">
{source}{date}{from}{to}{limit_field}
<button type="submit">Filter</button>
<button type="submit" formaction="/download">Download CSV</button>
</form>
<p>Showing {count} most recent (limit {limit}).</p>
<table>
<thead><tr><th>id</th><th>temperature</th><th>humidity</th><th>timestamp</th><th>source</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
</body>
</html>
"#,
        source = input("source", "text", params.source.as_deref()),
        date = input("date", "date", params.date.as_deref()),
        from = input("from_date", "text", params.from_date.as_deref()),
        to = input("to_date", "text", params.to_date.as_deref()),
        limit_field = input("limit", "number", Some(limit.to_string().as_str())),
        count = readings.len(),
    )
}

fn input(name: &str, kind: &str, value: Option<&str>) -> String {
    format!(
        "<label>{name} <input type=\"{kind}\" name=\"{name}\" value=\"{}\"></label>\n",
        html_escape(value.unwrap_or_default())
    )
}

fn measurement(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Escape HTML special characters so stored text cannot inject markup.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
