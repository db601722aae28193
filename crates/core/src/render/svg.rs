//! SVG serialisation of a [`VisualizationFrame`].

use std::{f64::consts::TAU, fmt::Write as _};

use super::{DrawCommand, Point, VisualizationFrame};
use crate::Rgba;

const FULL_TURN_EPSILON: f64 = 1e-9;

/// Renders the frame as a standalone SVG document.
pub fn to_svg(frame: &VisualizationFrame) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = frame.width,
        h = frame.height
    );
    for command in &frame.commands {
        write_command(&mut out, command);
    }
    out.push_str("</svg>\n");
    out
}

fn write_command(out: &mut String, command: &DrawCommand) {
    match command {
        DrawCommand::FillRect {
            origin,
            width,
            height,
            color,
        } => {
            let _ = writeln!(
                out,
                r#"<rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="{}"/>"#,
                origin.x,
                origin.y,
                width,
                height,
                css_color(*color)
            );
        }
        DrawCommand::StrokeArc {
            center,
            radius,
            start_angle,
            end_angle,
            line_width,
            color,
        } => write_arc(out, *center, *radius, *start_angle, *end_angle, *line_width, *color),
        DrawCommand::StrokePolyline {
            points,
            closed,
            line_width,
            color,
        } => {
            if points.is_empty() {
                return;
            }
            let element = if *closed { "polygon" } else { "polyline" };
            let coords = points
                .iter()
                .map(|p| format!("{:.3},{:.3}", p.x, p.y))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                out,
                r#"<{element} points="{coords}" fill="none" stroke="{}" stroke-width="{:.3}"/>"#,
                css_color(*color),
                line_width
            );
        }
        DrawCommand::FillText {
            text,
            anchor,
            font_size,
            color,
        } => {
            let _ = writeln!(
                out,
                r#"<text x="{:.3}" y="{:.3}" font-family="Arial" font-size="{:.3}" text-anchor="middle" fill="{}">{}</text>"#,
                anchor.x,
                anchor.y,
                font_size,
                css_color(*color),
                escape_text(text)
            );
        }
    }
}

fn write_arc(
    out: &mut String,
    center: Point,
    radius: f64,
    start: f64,
    end: f64,
    line_width: f64,
    color: Rgba,
) {
    let sweep = end - start;
    let stroke = css_color(color);
    if sweep >= TAU - FULL_TURN_EPSILON {
        let _ = writeln!(
            out,
            r#"<circle cx="{:.3}" cy="{:.3}" r="{:.3}" fill="none" stroke="{stroke}" stroke-width="{:.3}"/>"#,
            center.x, center.y, radius, line_width
        );
        return;
    }
    if sweep <= FULL_TURN_EPSILON {
        return;
    }

    let from = Point::new(center.x + radius * start.cos(), center.y + radius * start.sin());
    let to = Point::new(center.x + radius * end.cos(), center.y + radius * end.sin());
    let large_arc = u8::from(sweep > std::f64::consts::PI);
    let _ = writeln!(
        out,
        r#"<path d="M {:.3} {:.3} A {r:.3} {r:.3} 0 {large_arc} 1 {:.3} {:.3}" fill="none" stroke="{stroke}" stroke-width="{:.3}"/>"#,
        from.x,
        from.y,
        to.x,
        to.y,
        line_width,
        r = radius
    );
}

fn css_color(Rgba(r, g, b, a): Rgba) -> String {
    format!("rgba({r},{g},{b},{:.3})", f64::from(a) / 255.0)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render_frame, FrameInput, VisualConfig};

    fn frame(elapsed: f64, duration: f64) -> VisualizationFrame {
        render_frame(
            &VisualConfig::default(),
            &FrameInput {
                samples: &[128; 64],
                elapsed_seconds: elapsed,
                duration_seconds: duration,
                segment_count: 64,
            },
        )
    }

    #[test]
    fn document_contains_every_layer() {
        let svg = to_svg(&frame(30.0, 120.0));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<rect"));
        assert!(svg.contains("<circle"));
        assert!(svg.contains("<path d=\"M "));
        assert_eq!(svg.matches("<polygon").count(), 2);
        assert!(svg.contains(">00:30</text>"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn empty_progress_arc_is_omitted() {
        let svg = to_svg(&frame(0.0, 120.0));
        assert!(!svg.contains("<path"));
        assert_eq!(svg.matches("<circle").count(), 1);
    }

    #[test]
    fn completed_progress_arc_is_a_full_circle() {
        let svg = to_svg(&frame(500.0, 120.0));
        assert_eq!(svg.matches("<circle").count(), 2);
    }

    #[test]
    fn quarter_arc_starts_at_nine_o_clock() {
        let svg = to_svg(&frame(30.0, 120.0));
        assert!(svg.contains("M 150.000 250.000 A 100.000 100.000 0 0 1 250.000 150.000"));
    }
}
