use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Linear interpolation in RGB space; `t` outside `[0, 1]` extrapolates
    /// and saturates per channel.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        fn channel(a: u8, b: u8, t: f64) -> u8 {
            let value = f64::from(a) * (1.0 - t) + f64::from(b) * t;
            if value.is_nan() {
                return a;
            }
            value.round().clamp(0.0, 255.0) as u8
        }
        Self {
            r: channel(self.r, other.r, t),
            g: channel(self.g, other.g, t),
            b: channel(self.b, other.b, t),
        }
    }

    fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let h = hue.rem_euclid(360.0) / 60.0;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = lightness - c / 2.0;
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::rgb(to_u8(r), to_u8(g), to_u8(b))
    }

    /// Evenly spread hues, alternating lightness so neighbours stay apart.
    pub(crate) fn spread(count: usize, index: usize) -> Self {
        let hue = 360.0 * index as f64 / count.max(1) as f64;
        let lightness = if index % 2 == 0 { 0.45 } else { 0.6 };
        Self::from_hsl(hue, 0.7, lightness)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color literal '{0}'")]
pub struct ColorParseError(pub String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let err = || ColorParseError(raw.to_string());
        if let Some(hex) = value.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|ch| ch.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()
                .ok_or_else(err)?;
            return match digits.as_slice() {
                [r, g, b] => Ok(Self::rgb(r * 17, g * 17, b * 17)),
                [r1, r2, g1, g2, b1, b2] => {
                    Ok(Self::rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2))
                }
                _ => Err(err()),
            };
        }
        let lower = value.to_ascii_lowercase();
        if let Some(inner) = lower
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<u8> = inner
                .split(',')
                .map(|part| part.trim().parse::<u8>().ok())
                .collect::<Option<_>>()
                .ok_or_else(err)?;
            return match parts.as_slice() {
                [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
                _ => Err(err()),
            };
        }
        match lower.as_str() {
            "black" => Ok(Self::rgb(0, 0, 0)),
            "white" => Ok(Self::rgb(255, 255, 255)),
            "red" => Ok(Self::rgb(255, 0, 0)),
            "green" => Ok(Self::rgb(0, 128, 0)),
            "blue" => Ok(Self::rgb(0, 0, 255)),
            "yellow" => Ok(Self::rgb(255, 255, 0)),
            "orange" => Ok(Self::rgb(255, 165, 0)),
            "purple" => Ok(Self::rgb(128, 0, 128)),
            "gray" | "grey" => Ok(Self::rgb(128, 128, 128)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub background: Color,
    pub branch_color: Color,
    pub label_color: Color,
    pub node_fill: Color,
    pub node_border: Color,
    pub connector_color: Color,
    pub found_a: Color,
    pub found_b: Color,
    pub found_both: Color,
    pub selection: Color,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "Arial, Helvetica, sans-serif".to_string(),
            background: Color::rgb(255, 255, 255),
            branch_color: Color::rgb(170, 170, 170),
            label_color: Color::rgb(32, 32, 32),
            node_fill: Color::rgb(255, 255, 255),
            node_border: Color::rgb(102, 102, 102),
            connector_color: Color::rgb(221, 221, 221),
            found_a: Color::rgb(0, 170, 0),
            found_b: Color::rgb(0, 0, 255),
            found_both: Color::rgb(0, 170, 170),
            selection: Color::rgb(255, 0, 255),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, sans-serif".to_string(),
            background: Color::rgb(24, 26, 31),
            branch_color: Color::rgb(122, 138, 166),
            label_color: Color::rgb(230, 232, 236),
            node_fill: Color::rgb(24, 26, 31),
            node_border: Color::rgb(199, 210, 229),
            connector_color: Color::rgb(58, 64, 76),
            found_a: Color::rgb(102, 255, 102),
            found_b: Color::rgb(102, 178, 255),
            found_both: Color::rgb(102, 255, 255),
            selection: Color::rgb(255, 102, 255),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
