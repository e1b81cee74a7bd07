//! Connector line geometry
//!
//! Lines run from a comment card in the sidebar to its highlight. Orthogonal
//! lines share a vertical channel just right of the viewer: a horizontal run to
//! the channel, a vertical run, and a horizontal run into the highlight, with
//! rounded bends.

use crate::comment::CommentId;
use crate::config::EngineConfig;
use crate::geometry::Point;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Write;

/// Vertical distance under which a line is drawn as one horizontal segment
const FLAT_TOLERANCE_PX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStyle {
    #[default]
    Orthogonal,
    Straight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, to: Point },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectorPath {
    pub commands: Vec<PathCommand>,
}

impl ConnectorPath {
    pub fn start(&self) -> Option<Point> {
        match self.commands.first()? {
            PathCommand::MoveTo(point) => Some(*point),
            _ => None,
        }
    }

    pub fn end(&self) -> Option<Point> {
        match self.commands.last()? {
            PathCommand::MoveTo(point) | PathCommand::LineTo(point) => Some(*point),
            PathCommand::QuadTo { to, .. } => Some(*to),
        }
    }

    pub fn is_rounded(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, PathCommand::QuadTo { .. }))
    }

    /// SVG path data (`d` attribute)
    pub fn to_svg_path(&self) -> String {
        let mut d = String::new();
        for command in &self.commands {
            if !d.is_empty() {
                d.push(' ');
            }
            // Writing to a String cannot fail.
            let _ = match command {
                PathCommand::MoveTo(p) => write!(d, "M {} {}", num(p.x), num(p.y)),
                PathCommand::LineTo(p) => write!(d, "L {} {}", num(p.x), num(p.y)),
                PathCommand::QuadTo { control, to } => write!(
                    d,
                    "Q {} {} {} {}",
                    num(control.x),
                    num(control.y),
                    num(to.x),
                    num(to.y)
                ),
            };
        }
        d
    }
}

impl Serialize for ConnectorPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_svg_path())
    }
}

fn num(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Build the path from `source` (card side) to `target` (highlight side)
///
/// Orthogonal paths whose runs are too short for two rounded bends fall back to
/// sharp corners. A source and target at the same height give one segment.
pub fn build_connector_path(
    source: Point,
    target: Point,
    channel_x: f64,
    radius: f64,
    style: ConnectorStyle,
) -> ConnectorPath {
    use PathCommand::{LineTo, MoveTo, QuadTo};

    if style == ConnectorStyle::Straight {
        return ConnectorPath {
            commands: vec![MoveTo(source), LineTo(target)],
        };
    }

    if (source.y - target.y).abs() <= FLAT_TOLERANCE_PX {
        return ConnectorPath {
            commands: vec![MoveTo(source), LineTo(Point::new(target.x, source.y))],
        };
    }

    let first_run = (channel_x - source.x).abs();
    let vertical_run = (target.y - source.y).abs();
    let last_run = (target.x - channel_x).abs();
    let room = 2.0 * radius;

    // Sharp fallback keeps all three legs through the channel; only the bends go
    if radius <= 0.0 || first_run < room || vertical_run < room || last_run < room {
        return ConnectorPath {
            commands: vec![
                MoveTo(source),
                LineTo(Point::new(channel_x, source.y)),
                LineTo(Point::new(channel_x, target.y)),
                LineTo(target),
            ],
        };
    }

    let dir_in = (channel_x - source.x).signum();
    let dir_out = (target.x - channel_x).signum();
    let dir_v = (target.y - source.y).signum();

    ConnectorPath {
        commands: vec![
            MoveTo(source),
            LineTo(Point::new(channel_x - dir_in * radius, source.y)),
            QuadTo {
                control: Point::new(channel_x, source.y),
                to: Point::new(channel_x, source.y + dir_v * radius),
            },
            LineTo(Point::new(channel_x, target.y - dir_v * radius)),
            QuadTo {
                control: Point::new(channel_x, target.y),
                to: Point::new(channel_x + dir_out * radius, target.y),
            },
            LineTo(target),
        ],
    }
}

/// Stroke and endpoint styling of a line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineVisual {
    pub stroke_width: f64,
    pub endpoint_radius: f64,
    pub opacity: f64,
    pub transition_ms: u64,
}

impl LineVisual {
    pub fn for_state(hovered: bool, config: &EngineConfig) -> Self {
        let (stroke_width, endpoint_radius) = if hovered {
            (config.hover_stroke_width, config.hover_endpoint_radius)
        } else {
            (config.stroke_width, config.endpoint_radius)
        };
        Self {
            stroke_width,
            endpoint_radius,
            opacity: config.base_opacity,
            transition_ms: config.fade_ms,
        }
    }
}

/// A line to draw for one comment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSpec {
    pub comment_id: CommentId,
    pub path: ConnectorPath,
    pub color: String,
    pub hovered: bool,
    pub visual: LineVisual,
}
