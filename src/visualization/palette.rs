//! Named categorical palettes for ordinal color visualizations.

use crate::theme::Color;

pub const PALETTE_NAMES: [&str; 3] = ["category10", "category20", "category50"];

/// Pseudo-palette resolved to the smallest palette that fits the domain.
pub const AUTO_PALETTE: &str = "categorical";

const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

const CATEGORY20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

pub fn palette(name: &str) -> Option<Vec<Color>> {
    let parse = |hexes: &[&str]| {
        hexes
            .iter()
            .filter_map(|hex| hex.parse::<Color>().ok())
            .collect::<Vec<_>>()
    };
    match name {
        "category10" => Some(parse(&CATEGORY10)),
        "category20" => Some(parse(&CATEGORY20)),
        "category50" => Some((0..50).map(|idx| Color::spread(50, idx)).collect()),
        _ => None,
    }
}

pub fn smallest_palette_for(domain_len: usize) -> &'static str {
    match domain_len {
        0..=10 => "category10",
        11..=20 => "category20",
        _ => "category50",
    }
}

/// Resolves a configured palette name for a domain of `domain_len` values.
pub fn resolve(name: &str, domain_len: usize) -> Option<Vec<Color>> {
    if name == AUTO_PALETTE {
        return palette(smallest_palette_for(domain_len));
    }
    palette(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palettes_have_their_advertised_size() {
        assert_eq!(palette("category10").map(|p| p.len()), Some(10));
        assert_eq!(palette("category20").map(|p| p.len()), Some(20));
        assert_eq!(palette("category50").map(|p| p.len()), Some(50));
        assert!(palette("viridis").is_none());
    }

    #[test]
    fn auto_palette_prefers_smallest_fit() {
        assert_eq!(resolve(AUTO_PALETTE, 4).map(|p| p.len()), Some(10));
        assert_eq!(resolve(AUTO_PALETTE, 11).map(|p| p.len()), Some(20));
        assert_eq!(resolve(AUTO_PALETTE, 21).map(|p| p.len()), Some(50));
    }

    #[test]
    fn category50_colors_are_distinct() {
        let colors = palette("category50").unwrap();
        for (idx, color) in colors.iter().enumerate() {
            assert!(
                !colors[idx + 1..].contains(color),
                "duplicate color {color} at {idx}"
            );
        }
    }
}
