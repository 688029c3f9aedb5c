//! Map and ranking output.
//!
//! The map is a self-contained Leaflet page on CartoDB Positron tiles with
//! one circle marker per institution. Rankings are plain text.

use crate::aggregate::{Aggregate, NameCount};
use crate::config::MapOptions;
use crate::error::Result;
use html_escape::encode_text;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

const MAP_TEMPLATE: &str = include_str!("../templates/map.html");

/// Marker as embedded in the page
#[derive(Debug, Serialize, PartialEq)]
struct Marker {
    lat: f64,
    lon: f64,
    radius: f64,
    tooltip: String,
}

/// Marker radius in pixels for a citation count.
pub fn marker_radius(count: usize, options: &MapOptions) -> f64 {
    let count = count.max(1) as f64;
    let units = if options.radius_log_base > 1.0 {
        1.0 + count.log(options.radius_log_base)
    } else {
        count
    };
    units * options.radius_scale
}

/// Render the map page for an aggregate.
pub fn render_map(aggregate: &Aggregate, options: &MapOptions) -> Result<String> {
    let markers: Vec<Marker> = aggregate
        .institutions
        .iter()
        .map(|inst| Marker {
            lat: inst.latitude,
            lon: inst.longitude,
            radius: marker_radius(inst.count, options),
            tooltip: format!("<b>{}</b>: {}", encode_text(&inst.name), inst.count),
        })
        .collect();

    // "</" would close the script element early
    let markers_json = serde_json::to_string(&markers)?.replace("</", "<\\/");

    let subtitle = format!(
        "{} citations mapped to {} institutions, {} unresolved",
        aggregate.resolved,
        aggregate.institutions.len(),
        aggregate.unresolved
    );

    Ok(MAP_TEMPLATE
        .replace("{{ subtitle }}", &encode_text(&subtitle))
        .replace("{{ markers }}", &markers_json))
}

/// Write the map page to `path`.
pub fn write_map(aggregate: &Aggregate, options: &MapOptions, path: &Path) -> Result<()> {
    std::fs::write(path, render_map(aggregate, options)?)?;
    info!(path = %path.display(), markers = aggregate.institutions.len(), "Wrote map");
    Ok(())
}

/// Ranked listing of the top `top_n` institutions, countries and authors.
pub fn render_ranking(aggregate: &Aggregate, top_n: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Top citing institutions");
    if aggregate.institutions.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (rank, inst) in aggregate.institutions.iter().take(top_n).enumerate() {
        let country = if inst.country.is_empty() {
            String::new()
        } else {
            format!(" ({})", inst.country)
        };
        let _ = writeln!(out, "  {:>3}. {}{}: {}", rank + 1, inst.name, country, inst.count);
    }

    write_section(&mut out, "Top citing countries", &aggregate.countries, top_n);
    write_section(&mut out, "Top citing authors", &aggregate.authors, top_n);

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Resolved: {}  Unknown: {}  Total: {}",
        aggregate.resolved,
        aggregate.unresolved,
        aggregate.total()
    );
    out
}

fn write_section(out: &mut String, heading: &str, rows: &[NameCount], top_n: usize) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", heading);
    if rows.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (rank, row) in rows.iter().take(top_n).enumerate() {
        let _ = writeln!(out, "  {:>3}. {}: {}", rank + 1, row.name, row.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::InstitutionCount;

    fn sample() -> Aggregate {
        Aggregate {
            institutions: vec![
                InstitutionCount {
                    name: "MIT".into(),
                    country: "US".into(),
                    latitude: 42.36,
                    longitude: -71.09,
                    count: 4,
                },
                InstitutionCount {
                    name: "AT&T <Labs>".into(),
                    country: String::new(),
                    latitude: 40.7,
                    longitude: -74.0,
                    count: 1,
                },
            ],
            countries: vec![NameCount { name: "US".into(), count: 4 }],
            authors: vec![NameCount { name: "J Doe".into(), count: 2 }],
            resolved: 5,
            unresolved: 2,
        }
    }

    #[test]
    fn test_marker_radius() {
        let options = MapOptions::default();
        assert!((marker_radius(1, &options) - 6.0).abs() < 1e-9);
        assert!((marker_radius(4, &options) - 18.0).abs() < 1e-9);
        let linear = MapOptions {
            radius_scale: 2.0,
            radius_log_base: 0.0,
        };
        assert_eq!(marker_radius(5, &linear), 10.0);
    }

    #[test]
    fn test_render_map_markers() {
        let html = render_map(&sample(), &MapOptions::default()).expect("render");
        assert!(html.contains("\"tooltip\":\"<b>MIT<\\/b>: 4\""));
        assert!(html.contains("AT&amp;T &lt;Labs&gt;"));
        assert!(html.contains("5 citations mapped to 2 institutions, 2 unresolved"));
        assert!(!html.contains("{{ markers }}"));
        assert!(html.contains("basemaps.cartocdn.com"));
    }

    #[test]
    fn test_render_empty_map() {
        let html = render_map(&Aggregate::default(), &MapOptions::default()).expect("render");
        assert!(html.contains("const markers = [];"));
    }

    #[test]
    fn test_script_close_tag_escaped() {
        let mut agg = sample();
        agg.institutions[0].name = "</script><b>".into();
        let html = render_map(&agg, &MapOptions::default()).expect("render");
        assert_eq!(html.matches("</script>").count(), MAP_TEMPLATE.matches("</script>").count());
    }

    #[test]
    fn test_render_ranking() {
        let text = render_ranking(&sample(), 1);
        assert!(text.contains("1. MIT (US): 4"));
        assert!(!text.contains("AT&T"));
        assert!(text.contains("Top citing countries"));
        assert!(text.contains("1. J Doe: 2"));
        assert!(text.contains("Resolved: 5  Unknown: 2  Total: 7"));
    }

    #[test]
    fn test_render_ranking_empty() {
        let text = render_ranking(&Aggregate::default(), 10);
        assert_eq!(text.matches("(none)").count(), 3);
        assert!(text.contains("Total: 0"));
    }
}
