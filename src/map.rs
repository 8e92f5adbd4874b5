//! Map composition: turns normalized datasets and a set of display options
//! into a renderer-agnostic description of the Leaflet map.

use crate::style::{all_styles, style_of, CategoryStyle};
use crate::types::{Category, DisplayOptions, FeatureCollection};
use serde::Serialize;

pub const FALLBACK_CENTER: LatLon = LatLon {
    lat: 51.5136,
    lon: -0.1365,
};
pub const ZOOM: u8 = 16;
pub const HEATMAP_BLUR: u32 = 10;
pub const POPUP_MAX_WIDTH: u32 = 150;
pub const DEATH_CLUSTER_NAME: &str = "Death cluster";
pub const HEATMAP_NAME: &str = "Heatmap";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapDocument {
    pub center: LatLon,
    pub zoom: u8,
    pub tiles: TileLayer,
    pub overlays: Vec<FeatureGroup>,
    pub heatmap: Option<Heatmap>,
    pub legend: Legend,
    pub layer_control: LayerControl,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileLayer {
    pub name: &'static str,
    pub url: &'static str,
    pub attribution: &'static str,
}

/// A named, toggleable overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureGroup {
    pub name: &'static str,
    pub show: bool,
    pub children: Vec<LayerContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerContent {
    Marker(Marker),
    Cluster {
        name: &'static str,
        markers: Vec<Marker>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub location: LatLon,
    pub popup: &'static str,
    pub popup_max_width: u32,
    pub color: &'static str,
    pub icon: &'static str,
    pub prefix: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub name: &'static str,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub blur: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: &'static str,
    pub round: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerControl {
    pub collapsed: bool,
}

/// Arithmetic mean of the collection's coordinates.
pub fn mean_location(collection: &FeatureCollection) -> Option<LatLon> {
    if collection.is_empty() {
        return None;
    }
    let n = collection.len() as f64;
    let (lat_sum, lon_sum) = collection
        .iter()
        .fold((0.0, 0.0), |(lat, lon), f| (lat + f.lat(), lon + f.lon()));
    Some(LatLon {
        lat: lat_sum / n,
        lon: lon_sum / n,
    })
}

/// Deaths first, then pumps, then a fixed point near Broad Street.
pub fn compute_center(deaths: &FeatureCollection, pumps: &FeatureCollection) -> LatLon {
    mean_location(deaths)
        .or_else(|| mean_location(pumps))
        .unwrap_or(FALLBACK_CENTER)
}

pub fn compose(
    deaths: &FeatureCollection,
    pumps: &FeatureCollection,
    options: &DisplayOptions,
) -> MapDocument {
    let death_group = FeatureGroup {
        name: style_of(Category::Death).layer_name,
        show: options.show_deaths,
        children: death_children(deaths, options),
    };

    let pump_group = FeatureGroup {
        name: style_of(Category::Pump).layer_name,
        show: options.show_pumps,
        children: if options.show_pumps {
            markers(pumps).into_iter().map(LayerContent::Marker).collect()
        } else {
            Vec::new()
        },
    };

    let heatmap = options.heatmap_enabled().then(|| Heatmap {
        name: HEATMAP_NAME,
        points: deaths.iter().map(|f| [f.lat(), f.lon()]).collect(),
        radius: options.clamped_radius(),
        blur: HEATMAP_BLUR,
    });

    let document = MapDocument {
        center: compute_center(deaths, pumps),
        zoom: ZOOM,
        tiles: TileLayer {
            name: options.basemap.label(),
            url: options.basemap.tile_url(),
            attribution: options.basemap.attribution(),
        },
        overlays: vec![death_group, pump_group],
        heatmap,
        legend: legend(),
        layer_control: LayerControl { collapsed: false },
    };

    tracing::debug!(
        center = ?document.center,
        deaths = deaths.len(),
        pumps = pumps.len(),
        heatmap = document.heatmap.is_some(),
        "composed map"
    );
    document
}

fn death_children(deaths: &FeatureCollection, options: &DisplayOptions) -> Vec<LayerContent> {
    if !options.show_deaths {
        return Vec::new();
    }
    let markers = markers(deaths);
    if options.cluster {
        vec![LayerContent::Cluster {
            name: DEATH_CLUSTER_NAME,
            markers,
        }]
    } else {
        markers.into_iter().map(LayerContent::Marker).collect()
    }
}

fn markers(collection: &FeatureCollection) -> Vec<Marker> {
    let style = style_of(collection.category);
    collection
        .iter()
        .map(|feature| marker(feature.lat(), feature.lon(), style))
        .collect()
}

fn marker(lat: f64, lon: f64, style: &CategoryStyle) -> Marker {
    Marker {
        location: LatLon { lat, lon },
        popup: style.popup,
        popup_max_width: POPUP_MAX_WIDTH,
        color: style.marker_color,
        icon: style.icon,
        prefix: style.icon_prefix,
    }
}

fn legend() -> Legend {
    Legend {
        entries: all_styles()
            .iter()
            .map(|style| LegendEntry {
                label: style.legend_label,
                color: style.swatch_color,
                round: style.swatch_round,
            })
            .collect(),
    }
}
