use crate::types::Category;

/// How one category is drawn: marker, popup and legend swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryStyle {
    pub category: Category,
    pub layer_name: &'static str,
    pub popup: &'static str,
    // awesome-markers colour name and Font Awesome glyph
    pub marker_color: &'static str,
    pub icon: &'static str,
    pub icon_prefix: &'static str,
    pub legend_label: &'static str,
    pub swatch_color: &'static str,
    pub swatch_round: bool,
}

/// Indexed by `Category` discriminant.
const STYLES: [CategoryStyle; 2] = [
    CategoryStyle {
        category: Category::Death,
        layer_name: "Cholera Deaths",
        popup: "💀 Cholera Death",
        marker_color: "darkred",
        icon: "plus",
        icon_prefix: "fa",
        legend_label: "Deaths",
        swatch_color: "darkred",
        swatch_round: true,
    },
    CategoryStyle {
        category: Category::Pump,
        layer_name: "Pumps",
        popup: "🚰 Pump",
        marker_color: "blue",
        icon: "tint",
        icon_prefix: "fa",
        legend_label: "Pumps",
        swatch_color: "blue",
        swatch_round: false,
    },
];

pub fn style_of(category: Category) -> &'static CategoryStyle {
    &STYLES[category as usize]
}

pub fn all_styles() -> &'static [CategoryStyle] {
    &STYLES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_its_own_entry() {
        for category in [Category::Death, Category::Pump] {
            assert_eq!(style_of(category).category, category);
        }
        assert_eq!(all_styles().len(), 2);
    }

    #[test]
    fn death_and_pump_styles() {
        let death = style_of(Category::Death);
        assert_eq!((death.marker_color, death.icon), ("darkred", "plus"));
        let pump = style_of(Category::Pump);
        assert_eq!((pump.marker_color, pump.icon), ("blue", "tint"));
    }
}
