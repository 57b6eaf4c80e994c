use crate::config::LayoutConfig;
use crate::text_metrics;

/// Approximate advance of a character in ems, used when no font is
/// available or fast metrics are requested.
pub(crate) fn char_width_factor(ch: char) -> f64 {
    match ch {
        ' ' => 0.31,
        'i' | 'j' | 'l' | '\'' | '|' | '!' | '.' | ',' | ':' | ';' => 0.25,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '{' | '}' | '-' | '/' => 0.34,
        'm' | 'w' => 0.84,
        'M' | 'W' | '@' | '%' | '&' | '#' => 0.93,
        'A'..='Z' => 0.67,
        '0'..='9' => 0.59,
        'a'..='z' | '_' => 0.56,
        _ => 0.57,
    }
}

pub(crate) fn fallback_text_width(text: &str, font_size: f64) -> f64 {
    text.chars().map(char_width_factor).sum::<f64>() * font_size
}

pub fn text_width(text: &str, font_size: f64, font_family: &str, fast_metrics: bool) -> f64 {
    if fast_metrics {
        return fallback_text_width(text, font_size);
    }
    text_metrics::measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| fallback_text_width(text, font_size))
}

/// Horizontal space kept free for labels: root offset, the gap between a
/// node and its label, and the widest label.
pub fn reserved_label_space<'a>(
    labels: impl IntoIterator<Item = &'a str>,
    font_family: &str,
    config: &LayoutConfig,
) -> f64 {
    let widest = labels
        .into_iter()
        .map(|label| text_width(label, config.font_size, font_family, config.fast_text_metrics))
        .fold(0.0, f64::max);
    config.root_offset + config.label_gap + widest
}

/// First `max_chars` characters of `label`.
pub fn truncate_label(label: &str, max_chars: usize) -> &str {
    match label.char_indices().nth(max_chars) {
        Some((end, _)) => &label[..end],
        None => label,
    }
}
