use crate::config::AppConfig;
use crate::data::{self, Datasets};
use crate::map::{self, MapDocument};
use crate::types::{Basemap, DisplayOptions, FeatureCollection, HEATMAP_RADIUS_MAX, HEATMAP_RADIUS_MIN};
use anyhow::{Context, Result};
use std::fmt::Write;

const PAGE_TITLE: &str = "🦠 John Snow 1854 Cholera Dashboard";
const HEADING: &str = "🦠 John Snow — Cholera Map (Broad Street, London)";
const DEATH_PREVIEW_ROWS: usize = 5;

const HEAD_ASSETS: &str = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" crossorigin="" />
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css" />
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css" />
<link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.css" />
<link rel="stylesheet" href="https://maxcdn.bootstrapcdn.com/font-awesome/4.7.0/css/font-awesome.min.css" />
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js" crossorigin=""></script>
<script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
<script src="https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.js"></script>
<script src="https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js"></script>
<style>
  body { margin: 0; font-family: sans-serif; background-color: hotpink; display: flex; }
  #sidebar { width: 260px; padding: 16px; background: #f0f2f6; min-height: 100vh; box-sizing: border-box; }
  #sidebar label { display: block; margin: 6px 0; }
  #main { flex: 1; padding: 16px 32px; }
  #map { width: 1000px; height: 700px; max-width: 100%; }
  table { border-collapse: collapse; background: white; margin-bottom: 24px; }
  th, td { border: 1px solid #ccc; padding: 4px 8px; font-size: 13px; }
  .legend { position: fixed; bottom: 50px; left: 10px; width: 170px; border: 2px solid grey;
            z-index: 9999; font-size: 14px; background-color: white; opacity: 0.9; padding: 8px; }
  .legend i { width: 10px; height: 10px; display: inline-block; }
</style>"#;

// Materializes the embedded MapDocument (`doc`) with Leaflet.
const MAP_SCRIPT: &str = r#"
const map = L.map('map').setView([doc.center.lat, doc.center.lon], doc.zoom);
const tiles = L.tileLayer(doc.tiles.url, {
  attribution: doc.tiles.attribution,
  maxZoom: 19,
  subdomains: 'abcd'
}).addTo(map);

function buildMarker(m) {
  const icon = L.AwesomeMarkers.icon({ icon: m.icon, prefix: m.prefix, markerColor: m.color });
  return L.marker([m.location.lat, m.location.lon], { icon: icon })
    .bindPopup(m.popup, { maxWidth: m.popup_max_width });
}

const overlays = {};
doc.overlays.forEach(function (group) {
  const layer = L.featureGroup();
  group.children.forEach(function (child) {
    if (child.type === 'cluster') {
      const cluster = L.markerClusterGroup();
      child.markers.forEach(function (m) { cluster.addLayer(buildMarker(m)); });
      layer.addLayer(cluster);
    } else {
      layer.addLayer(buildMarker(child));
    }
  });
  if (group.show) {
    layer.addTo(map);
  }
  overlays[group.name] = layer;
});

if (doc.heatmap) {
  overlays[doc.heatmap.name] = L.heatLayer(doc.heatmap.points, {
    radius: doc.heatmap.radius,
    blur: doc.heatmap.blur
  }).addTo(map);
}

const baseLayers = {};
baseLayers[doc.tiles.name] = tiles;
L.control.layers(baseLayers, overlays, { collapsed: doc.layer_control.collapsed }).addTo(map);
"#;

/// A tabular view of a dataset's attribute table.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePreview {
    pub title: &'static str,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// First `limit` records (all of them when `None`), attribute columns in the
/// order they first appear and the point geometry last.
pub fn table_preview(
    title: &'static str,
    collection: &FeatureCollection,
    limit: Option<usize>,
) -> TablePreview {
    let limit = limit.unwrap_or(usize::MAX);
    let mut attribute_names: Vec<&str> = Vec::new();
    for (name, _) in collection.iter().flat_map(|f| &f.attributes) {
        if !attribute_names.contains(&name.as_str()) {
            attribute_names.push(name);
        }
    }

    let rows = collection
        .iter()
        .take(limit)
        .map(|feature| {
            let mut row: Vec<String> = attribute_names
                .iter()
                .map(|name| feature.attribute(name).unwrap_or_default().to_string())
                .collect();
            row.push(format!("POINT ({} {})", feature.lon(), feature.lat()));
            row
        })
        .collect();

    let mut columns: Vec<String> = attribute_names.into_iter().map(String::from).collect();
    columns.push("geometry".to_string());

    TablePreview {
        title,
        columns,
        rows,
    }
}

/// Runs one full load → compose → render cycle.
pub fn render_cycle(config: &AppConfig, options: &DisplayOptions, interactive: bool) -> Result<String> {
    let datasets = data::load_datasets(config)?;
    let document = map::compose(&datasets.deaths, &datasets.pumps, options);
    render_page(&document, &datasets, options, interactive)
}

pub fn render_page(
    document: &MapDocument,
    datasets: &Datasets,
    options: &DisplayOptions,
    interactive: bool,
) -> Result<String> {
    let doc_json = serde_json::to_string(document)
        .context("Failed to serialize map document")?
        .replace("</", "<\\/");

    let previews = [
        table_preview("Top 5 Cholera Deaths", &datasets.deaths, Some(DEATH_PREVIEW_ROWS)),
        table_preview("All Pumps", &datasets.pumps, None),
    ];

    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\" />\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n");
    writeln!(html, "<title>{}</title>", escape_html(PAGE_TITLE))?;
    html.push_str(HEAD_ASSETS);
    html.push_str("\n</head>\n<body>\n");

    write_sidebar(&mut html, datasets, options, interactive)?;

    html.push_str("<div id=\"main\">\n");
    writeln!(html, "<h1>{}</h1>", escape_html(HEADING))?;
    html.push_str("<h2>Interactive Map</h2>\n<div id=\"map\"></div>\n");
    write_legend(&mut html, document)?;
    for preview in &previews {
        write_table(&mut html, preview)?;
    }
    html.push_str("</div>\n");

    writeln!(html, "<script>\nconst doc = {};", doc_json)?;
    html.push_str(MAP_SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");

    Ok(html)
}

fn write_sidebar(
    html: &mut String,
    datasets: &Datasets,
    options: &DisplayOptions,
    interactive: bool,
) -> std::fmt::Result {
    // Controls only make sense when a server is there to re-render.
    let disabled = if interactive { "" } else { " disabled" };
    let submit = " onchange=\"this.form.submit()\"";

    html.push_str("<div id=\"sidebar\">\n<h3>Map Controls</h3>\n");
    writeln!(html, "<form method=\"get\" action=\"/\">")?;
    html.push_str("<input type=\"hidden\" name=\"applied\" value=\"1\" />\n");

    let checkboxes = [
        ("deaths", "Show Cholera Deaths", options.show_deaths),
        ("pumps", "Show Pumps", options.show_pumps),
        ("cluster", "Cluster deaths markers", options.cluster),
        ("heatmap", "Show Heatmap", options.show_heatmap),
    ];
    for (name, label, checked) in checkboxes {
        writeln!(
            html,
            "<label><input type=\"checkbox\" name=\"{}\"{}{}{} /> {}</label>",
            name,
            if checked { " checked" } else { "" },
            submit,
            disabled,
            label
        )?;
    }

    writeln!(
        html,
        "<label>Heatmap radius: {r}<br /><input type=\"range\" name=\"radius\" min=\"{}\" max=\"{}\" value=\"{r}\"{}{} /></label>",
        HEATMAP_RADIUS_MIN,
        HEATMAP_RADIUS_MAX,
        submit,
        disabled,
        r = options.clamped_radius(),
    )?;

    writeln!(html, "<label>Select basemap<br /><select name=\"basemap\"{}{}>", submit, disabled)?;
    for basemap in Basemap::ALL {
        writeln!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            basemap.slug(),
            if basemap == options.basemap { " selected" } else { "" },
            basemap.label()
        )?;
    }
    html.push_str("</select></label>\n</form>\n");

    html.push_str("<h3>Summary</h3>\n<ul>\n");
    writeln!(html, "<li>Total deaths: {}</li>", datasets.deaths.len())?;
    writeln!(html, "<li>Total pumps: {}</li>", datasets.pumps.len())?;
    html.push_str("</ul>\n</div>\n");
    Ok(())
}

fn write_legend(html: &mut String, document: &MapDocument) -> std::fmt::Result {
    html.push_str("<div class=\"legend\">\n<b>Legend</b><br />\n");
    for entry in &document.legend.entries {
        writeln!(
            html,
            "<i style=\"background:{};{}\"></i> {}<br />",
            entry.color,
            if entry.round { " border-radius:50%;" } else { "" },
            escape_html(entry.label)
        )?;
    }
    html.push_str("</div>\n");
    Ok(())
}

fn write_table(html: &mut String, preview: &TablePreview) -> std::fmt::Result {
    writeln!(html, "<h2>{}</h2>\n<table>\n<thead><tr>", escape_html(preview.title))?;
    for column in &preview.columns {
        write!(html, "<th>{}</th>", escape_html(column))?;
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &preview.rows {
        html.push_str("<tr>");
        for cell in row {
            write!(html, "<td>{}</td>", escape_html(cell))?;
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    Ok(())
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, PointFeature};
    use geo::Point;

    fn feature(category: Category, lat: f64, lon: f64, attrs: &[(&str, &str)]) -> PointFeature {
        PointFeature {
            point: Point::new(lon, lat),
            category,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn datasets(deaths: usize) -> Datasets {
        Datasets {
            deaths: FeatureCollection::new(
                Category::Death,
                (0..deaths)
                    .map(|i| {
                        let count = i.to_string();
                        feature(Category::Death, 51.5133, -0.1357, &[("Count", count.as_str())])
                    })
                    .collect(),
            ),
            pumps: FeatureCollection::new(
                Category::Pump,
                vec![feature(Category::Pump, 51.513341, -0.136668, &[("Id", "0")])],
            ),
        }
    }

    #[test]
    fn death_preview_is_limited_to_five_rows() {
        let data = datasets(8);
        let preview = table_preview("Top 5 Cholera Deaths", &data.deaths, Some(5));
        assert_eq!(preview.columns, vec!["Count", "geometry"]);
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(preview.rows[0], vec!["0", "POINT (-0.1357 51.5133)"]);

        let all = table_preview("All Pumps", &data.pumps, None);
        assert_eq!(all.rows.len(), 1);
    }

    #[test]
    fn preview_fills_missing_attributes_with_blanks() {
        let pumps = FeatureCollection::new(
            Category::Pump,
            vec![
                feature(Category::Pump, 1.0, 2.0, &[("Id", "0")]),
                feature(Category::Pump, 3.0, 4.0, &[("name", "Broad St")]),
            ],
        );
        let preview = table_preview("All Pumps", &pumps, None);
        assert_eq!(preview.columns, vec!["Id", "name", "geometry"]);
        assert_eq!(preview.rows[1], vec!["", "Broad St", "POINT (4 3)"]);
    }

    #[test]
    fn preview_keeps_source_column_order() {
        let deaths = FeatureCollection::new(
            Category::Death,
            vec![
                feature(Category::Death, 1.0, 2.0, &[("Street", "Broad St"), ("Count", "3")]),
                feature(Category::Death, 3.0, 4.0, &[("Count", "1"), ("Area", "Soho")]),
            ],
        );
        let preview = table_preview("Top 5 Cholera Deaths", &deaths, Some(5));
        assert_eq!(preview.columns, vec!["Street", "Count", "Area", "geometry"]);
        assert_eq!(preview.rows[0], vec!["Broad St", "3", "", "POINT (2 1)"]);
        assert_eq!(preview.rows[1], vec!["", "1", "Soho", "POINT (4 3)"]);
    }

    #[test]
    fn page_contains_map_controls_and_tables() {
        let data = datasets(2);
        let options = DisplayOptions::default();
        let document = map::compose(&data.deaths, &data.pumps, &options);
        let html = render_page(&document, &data, &options, true).unwrap();

        assert!(html.contains("<div id=\"map\"></div>"));
        assert!(html.contains("const doc = {"));
        assert!(html.contains("L.markerClusterGroup()"));
        assert!(html.contains("Top 5 Cholera Deaths"));
        assert!(html.contains("All Pumps"));
        assert!(html.contains("Total deaths: 2"));
        assert!(html.contains("Total pumps: 1"));
        assert!(html.contains("name=\"deaths\" checked"));
        assert!(html.contains("name=\"heatmap\" onchange"));
        assert!(html.contains("<option value=\"openstreetmap\" selected>"));
        assert!(!html.contains(" disabled"));
    }

    #[test]
    fn static_page_disables_controls() {
        let data = datasets(1);
        let options = DisplayOptions::default();
        let document = map::compose(&data.deaths, &data.pumps, &options);
        let html = render_page(&document, &data, &options, false).unwrap();
        assert!(html.contains(" disabled"));
    }

    #[test]
    fn attribute_text_is_escaped() {
        let data = Datasets {
            deaths: FeatureCollection::new(
                Category::Death,
                vec![feature(Category::Death, 0.0, 0.0, &[("note", "</script><b>")])],
            ),
            pumps: FeatureCollection::new(Category::Pump, Vec::new()),
        };
        let options = DisplayOptions::default();
        let document = map::compose(&data.deaths, &data.pumps, &options);
        let html = render_page(&document, &data, &options, true).unwrap();
        assert!(html.contains("&lt;/script&gt;&lt;b&gt;"));
        assert!(!html.contains("<b></td>"));
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(escape_html(r#"a<b>&"c"'"#), "a&lt;b&gt;&amp;&quot;c&quot;&#39;");
    }
}
