use crate::scale::Interpolate;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Node marker shapes, emitted as SVG path descriptors centred on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    #[default]
    Circle,
    Square,
    Diamond,
    TriangleUp,
    TriangleDown,
    Cross,
}

const TAN30: f64 = 0.577_350_269_189_625_8;
const SQRT3: f64 = 1.732_050_807_568_877_2;

impl Shape {
    pub const ALL: [Self; 6] = [
        Self::Circle,
        Self::Square,
        Self::Diamond,
        Self::TriangleUp,
        Self::TriangleDown,
        Self::Cross,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Diamond => "diamond",
            Self::TriangleUp => "triangle-up",
            Self::TriangleDown => "triangle-down",
            Self::Cross => "cross",
        }
    }

    /// Path for a symbol with the same area as a circle of `radius`.
    pub fn path(self, radius: f64) -> String {
        let area = PI * radius.max(0.0).powi(2);
        match self {
            Self::Circle => {
                let r = (area / PI).sqrt();
                let (p, n) = (coord(r), coord(-r));
                format!("M0,{p}A{p},{p} 0 1,1 0,{n}A{p},{p} 0 1,1 0,{p}Z")
            }
            Self::Square => {
                let r = area.sqrt() / 2.0;
                format!(
                    "M{},{}L{},{} {},{} {},{}Z",
                    coord(-r),
                    coord(-r),
                    coord(r),
                    coord(-r),
                    coord(r),
                    coord(r),
                    coord(-r),
                    coord(r)
                )
            }
            Self::Diamond => {
                let ry = (area / (2.0 * TAN30)).sqrt();
                let rx = ry * TAN30;
                format!("M0,{}L{},0 0,{} {},0Z", coord(-ry), coord(rx), coord(ry), coord(-rx))
            }
            Self::TriangleUp | Self::TriangleDown => {
                let rx = (area / SQRT3).sqrt();
                let ry = rx * SQRT3 / 2.0;
                let dir = if self == Self::TriangleUp { -1.0 } else { 1.0 };
                format!(
                    "M0,{}L{},{} {},{}Z",
                    coord(dir * ry),
                    coord(rx),
                    coord(-dir * ry),
                    coord(-rx),
                    coord(-dir * ry)
                )
            }
            Self::Cross => {
                let r = (area / 5.0).sqrt() / 2.0;
                let (r1, r3) = (coord(r), coord(3.0 * r));
                let (n1, n3) = (coord(-r), coord(-3.0 * r));
                format!(
                    "M{n3},{n1}H{n1}V{n3}H{r1}V{n1}H{r3}V{r1}H{r1}V{r3}H{n1}V{r1}H{n3}Z"
                )
            }
        }
    }
}

fn coord(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{rounded}")
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shapes do not blend; the nearer control point wins.
impl Interpolate for Shape {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        if t < 0.5 { *self } else { *other }
    }
}
