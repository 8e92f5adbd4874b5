use geo::Point;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub const HEATMAP_RADIUS_MIN: u32 = 5;
pub const HEATMAP_RADIUS_MAX: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Death,
    Pump,
}

impl Category {
    /// Plural form used in URLs and config keys.
    pub fn slug(self) -> &'static str {
        match self {
            Category::Death => "deaths",
            Category::Pump => "pumps",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deaths" | "death" => Ok(Category::Death),
            "pumps" | "pump" => Ok(Category::Pump),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// A single WGS84 location. `point.x()` is longitude, `point.y()` latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub point: Point<f64>,
    pub category: Category,
    // (column, display value) in the source table's column order
    pub attributes: Vec<(String, String)>,
}

impl PointFeature {
    pub fn lat(&self) -> f64 {
        self.point.y()
    }

    pub fn lon(&self) -> f64 {
        self.point.x()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub category: Category,
    pub features: Vec<PointFeature>,
}

impl FeatureCollection {
    pub fn new(category: Category, features: Vec<PointFeature>) -> Self {
        Self { category, features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointFeature> {
        self.features.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Basemap {
    #[default]
    #[serde(rename = "openstreetmap")]
    OpenStreetMap,
    #[serde(rename = "cartodb-positron")]
    CartoDbPositron,
}

impl Basemap {
    pub const ALL: [Basemap; 2] = [Basemap::OpenStreetMap, Basemap::CartoDbPositron];

    pub fn slug(self) -> &'static str {
        match self {
            Basemap::OpenStreetMap => "openstreetmap",
            Basemap::CartoDbPositron => "cartodb-positron",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Basemap::OpenStreetMap => "OpenStreetMap",
            Basemap::CartoDbPositron => "CartoDB positron",
        }
    }

    pub fn tile_url(self) -> &'static str {
        match self {
            Basemap::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            Basemap::CartoDbPositron => {
                "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png"
            }
        }
    }

    pub fn attribution(self) -> &'static str {
        match self {
            Basemap::OpenStreetMap => {
                "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
            }
            Basemap::CartoDbPositron => {
                "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>"
            }
        }
    }
}

impl FromStr for Basemap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Basemap::ALL
            .into_iter()
            .find(|b| b.slug() == s)
            .ok_or_else(|| format!("unknown basemap '{}'", s))
    }
}

/// Snapshot of the map controls for one render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub show_deaths: bool,
    pub show_pumps: bool,
    pub cluster: bool,
    pub show_heatmap: bool,
    pub heatmap_radius: u32,
    pub basemap: Basemap,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_deaths: true,
            show_pumps: true,
            cluster: true,
            show_heatmap: false,
            heatmap_radius: 15,
            basemap: Basemap::OpenStreetMap,
        }
    }
}

impl DisplayOptions {
    /// Radius as the slider would allow it.
    pub fn clamped_radius(&self) -> u32 {
        self.heatmap_radius.clamp(HEATMAP_RADIUS_MIN, HEATMAP_RADIUS_MAX)
    }

    pub fn heatmap_enabled(&self) -> bool {
        self.show_heatmap && self.show_deaths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_singular_and_plural() {
        assert_eq!("deaths".parse::<Category>(), Ok(Category::Death));
        assert_eq!("pump".parse::<Category>(), Ok(Category::Pump));
        assert!("wells".parse::<Category>().is_err());
    }

    #[test]
    fn radius_is_clamped_to_slider_range() {
        let mut options = DisplayOptions { heatmap_radius: 0, ..Default::default() };
        assert_eq!(options.clamped_radius(), HEATMAP_RADIUS_MIN);
        options.heatmap_radius = 500;
        assert_eq!(options.clamped_radius(), HEATMAP_RADIUS_MAX);
        options.heatmap_radius = 22;
        assert_eq!(options.clamped_radius(), 22);
    }

    #[test]
    fn basemap_slug_roundtrips_through_from_str() {
        for basemap in Basemap::ALL {
            assert_eq!(basemap.slug().parse::<Basemap>(), Ok(basemap));
        }
    }

    #[test]
    fn display_defaults_match_dashboard() {
        let options = DisplayOptions::default();
        assert!(options.show_deaths && options.show_pumps && options.cluster);
        assert!(!options.show_heatmap);
        assert_eq!(options.heatmap_radius, 15);
        assert_eq!(options.basemap, Basemap::OpenStreetMap);
    }
}
