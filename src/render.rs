use crate::config::RenderConfig;
use crate::geometry::{Point, Scale};
use crate::scene::{LineStyle, Scene, Series, SeriesKind};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const LINE_HEIGHT_EM: f64 = 1.2;
const TICK_LENGTH: f64 = 7.0;

/// Maps y-up display pixels onto y-down SVG user units.
struct Canvas {
    height: f64,
}

impl Canvas {
    fn point(&self, (x, y): Point) -> Point {
        (x, self.height - y)
    }
}

pub fn render_svg(scene: &Scene, theme: &Theme, config: &RenderConfig) -> String {
    let context = scene.context();
    let transform = context.transform();
    let (width, height) = context.figure_size_px();
    let canvas = Canvas { height };
    let axis = context.axis_bounds();
    let pt_to_px = context.dpi() / 72.0;
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    ));
    let (ax, ay) = canvas.point((axis.x_min, axis.y_max));
    svg.push_str(&format!(
        "<defs><clipPath id=\"axis\"><rect x=\"{ax:.2}\" y=\"{ay:.2}\" width=\"{:.2}\" height=\"{:.2}\"/></clipPath></defs>",
        axis.width(),
        axis.height()
    ));

    svg.push_str("<g clip-path=\"url(#axis)\">");
    if config.show_grid {
        svg.push_str(&grid_svg(scene, &canvas, theme));
    }
    if config.show_excluded_region {
        let edge = scene.excluded_region(config.excluded_region_points);
        if let (Some(first), Some(last)) = (edge.first(), edge.last()) {
            let top = transform.y_limits().1;
            let mut outline: Vec<Point> = edge.iter().map(|p| transform.point_to_display(*p)).collect();
            outline.push(transform.point_to_display((last.0, top)));
            outline.push(transform.point_to_display((first.0, top)));
            svg.push_str(&format!(
                "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"{}\" stroke=\"none\"/>",
                points_attr(&canvas, &outline),
                theme.excluded_region_color,
                theme.excluded_region_alpha
            ));
        }
    }
    for series in scene.series() {
        svg.push_str(&series_svg(series, scene, &canvas, theme));
    }
    svg.push_str("</g>");

    svg.push_str(&axes_svg(scene, &canvas, theme, config, pt_to_px));

    for series in scene.series() {
        let Some(anchor) = series.label.anchor else {
            continue;
        };
        let text = series.display_label();
        if text.is_empty() {
            continue;
        }
        let display = transform.point_to_display(anchor);
        if !(display.0.is_finite() && display.1.is_finite()) {
            continue;
        }
        svg.push_str(&label_svg(
            &text,
            canvas.point(display),
            series.label.rotation_deg,
            series.label.font_size * pt_to_px,
            &series.label.color,
            theme,
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn series_svg(series: &Series, scene: &Scene, canvas: &Canvas, theme: &Theme) -> String {
    let transform = scene.context().transform();
    let display: Vec<Point> = series
        .curve
        .samples()
        .iter()
        .map(|p| transform.point_to_display(*p))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if display.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    match series.kind {
        SeriesKind::Contour => {
            out.push_str(&format!(
                "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
                points_attr(canvas, &display),
                series.color,
                series.alpha,
                series.color,
                series.linewidth
            ));
        }
        SeriesKind::NeutrinoFog => {
            let floor = scene.context().axis_bounds().y_min;
            let mut fill = display.clone();
            if let (Some(first), Some(last)) = (display.first(), display.last()) {
                fill.push((last.0, floor));
                fill.push((first.0, floor));
            }
            out.push_str(&format!(
                "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"{}\" stroke=\"none\"/>",
                points_attr(canvas, &fill),
                if series.color == "black" {
                    theme.neutrino_fog_color.as_str()
                } else {
                    series.color.as_str()
                },
                series.alpha
            ));
            out.push_str(&polyline_svg(canvas, &display, &series.color, series.linewidth, LineStyle::Dashed));
        }
        SeriesKind::Curve => {
            out.push_str(&polyline_svg(canvas, &display, &series.color, series.linewidth, series.style));
        }
    }
    out
}

fn polyline_svg(canvas: &Canvas, points: &[Point], color: &str, width: f64, style: LineStyle) -> String {
    let dash = style
        .dash_pattern()
        .map(|pattern| {
            let scaled: Vec<String> = pattern.iter().map(|v| format!("{:.2}", v * width)).collect();
            format!(" stroke-dasharray=\"{}\"", scaled.join(" "))
        })
        .unwrap_or_default();
    format!(
        "<polyline points=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"{width}\" stroke-linejoin=\"round\"{dash}/>",
        points_attr(canvas, points)
    )
}

/// Thin lines across the axis at every major tick.
fn grid_svg(scene: &Scene, canvas: &Canvas, theme: &Theme) -> String {
    let transform = scene.context().transform();
    let axis = scene.context().axis_bounds();
    let mut out = String::new();
    let (x_lo, x_hi) = transform.x_limits();
    for value in ticks(x_lo, x_hi, transform.x_scale()) {
        let x = transform.point_to_display((value, transform.y_limits().0)).0;
        let (sx, bottom) = canvas.point((x, axis.y_min));
        let (_, top) = canvas.point((x, axis.y_max));
        out.push_str(&format!(
            "<line x1=\"{sx:.2}\" y1=\"{bottom:.2}\" x2=\"{sx:.2}\" y2=\"{top:.2}\" stroke=\"{}\" stroke-width=\"0.5\"/>",
            theme.grid_color
        ));
    }
    let (y_lo, y_hi) = transform.y_limits();
    for value in ticks(y_lo, y_hi, transform.y_scale()) {
        let y = transform.point_to_display((transform.x_limits().0, value)).1;
        let (left, sy) = canvas.point((axis.x_min, y));
        let (right, _) = canvas.point((axis.x_max, y));
        out.push_str(&format!(
            "<line x1=\"{left:.2}\" y1=\"{sy:.2}\" x2=\"{right:.2}\" y2=\"{sy:.2}\" stroke=\"{}\" stroke-width=\"0.5\"/>",
            theme.grid_color
        ));
    }
    out
}

fn axes_svg(scene: &Scene, canvas: &Canvas, theme: &Theme, config: &RenderConfig, pt_to_px: f64) -> String {
    let transform = scene.context().transform();
    let axis = scene.context().axis_bounds();
    let tick_px = theme.tick_font_size * pt_to_px;
    let mut out = String::new();

    let (x0, y0) = canvas.point((axis.x_min, axis.y_max));
    out.push_str(&format!(
        "<rect x=\"{x0:.2}\" y=\"{y0:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\"/>",
        axis.width(),
        axis.height(),
        theme.axis_color
    ));

    let (x_lo, x_hi) = transform.x_limits();
    for value in ticks(x_lo, x_hi, transform.x_scale()) {
        let x = transform.point_to_display((value, transform.y_limits().0)).0;
        let (sx, sy) = canvas.point((x, axis.y_min));
        let (_, top) = canvas.point((x, axis.y_max));
        out.push_str(&format!(
            "<line x1=\"{sx:.2}\" y1=\"{sy:.2}\" x2=\"{sx:.2}\" y2=\"{:.2}\" stroke=\"{c}\"/><line x1=\"{sx:.2}\" y1=\"{top:.2}\" x2=\"{sx:.2}\" y2=\"{:.2}\" stroke=\"{c}\"/>",
            sy - TICK_LENGTH,
            top + TICK_LENGTH,
            c = theme.axis_color
        ));
        out.push_str(&format!(
            "<text x=\"{sx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{tick_px:.2}\" fill=\"{}\">{}</text>",
            sy + tick_px * 1.3,
            theme.font_family,
            theme.text_color,
            tick_label(value, transform.x_scale())
        ));
    }

    let (y_lo, y_hi) = transform.y_limits();
    for value in ticks(y_lo, y_hi, transform.y_scale()) {
        let y = transform.point_to_display((transform.x_limits().0, value)).1;
        let (sx, sy) = canvas.point((axis.x_min, y));
        let (right, _) = canvas.point((axis.x_max, y));
        out.push_str(&format!(
            "<line x1=\"{sx:.2}\" y1=\"{sy:.2}\" x2=\"{:.2}\" y2=\"{sy:.2}\" stroke=\"{c}\"/><line x1=\"{right:.2}\" y1=\"{sy:.2}\" x2=\"{:.2}\" y2=\"{sy:.2}\" stroke=\"{c}\"/>",
            sx + TICK_LENGTH,
            right - TICK_LENGTH,
            c = theme.axis_color
        ));
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" font-family=\"{}\" font-size=\"{tick_px:.2}\" fill=\"{}\">{}</text>",
            sx - tick_px * 0.4,
            sy + tick_px * 0.35,
            theme.font_family,
            theme.text_color,
            tick_label(value, transform.y_scale())
        ));
    }

    let (cx, bottom) = canvas.point(((axis.x_min + axis.x_max) / 2.0, axis.y_min));
    out.push_str(&format!(
        "<text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{tick_px:.2}\" fill=\"{}\">{}</text>",
        bottom + tick_px * 2.8,
        theme.font_family,
        theme.text_color,
        escape_xml(&config.x_label)
    ));
    let (left, cy) = canvas.point((axis.x_min, (axis.y_min + axis.y_max) / 2.0));
    let lx = left - tick_px * 4.2;
    out.push_str(&format!(
        "<text x=\"{lx:.2}\" y=\"{cy:.2}\" text-anchor=\"middle\" transform=\"rotate(-90 {lx:.2} {cy:.2})\" font-family=\"{}\" font-size=\"{tick_px:.2}\" fill=\"{}\">{}</text>",
        theme.font_family,
        theme.text_color,
        escape_xml(&config.y_label)
    ));
    out
}

/// Decades on a log axis, five even steps on a linear one.
fn ticks(lo: f64, hi: f64, scale: Scale) -> Vec<f64> {
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    match scale {
        Scale::Log => {
            let first = (lo.log10() - 1e-9).ceil() as i32;
            let last = (hi.log10() + 1e-9).floor() as i32;
            (first..=last).map(|exp| 10f64.powi(exp)).collect()
        }
        Scale::Linear => (0..=5).map(|i| lo + (hi - lo) * f64::from(i) / 5.0).collect(),
    }
}

fn tick_label(value: f64, scale: Scale) -> String {
    match scale {
        Scale::Log => {
            let exp = value.log10().round() as i32;
            format!("10<tspan baseline-shift=\"super\" font-size=\"70%\">{exp}</tspan>")
        }
        Scale::Linear => {
            let text = format!("{value:.3}");
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    }
}

/// Text whose un-rotated bottom-left corner sits at `anchor` (SVG units),
/// rotated counter-clockwise by `rotation_deg` around it.
fn label_svg(text: &str, anchor: Point, rotation_deg: f64, font_px: f64, color: &str, theme: &Theme) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let line_height = font_px * LINE_HEIGHT_EM;
    let descent = font_px * 0.22;
    let (x, y) = anchor;
    let mut out = format!(
        "<text transform=\"rotate({:.3} {x:.2} {y:.2})\" font-family=\"{}\" font-size=\"{font_px:.2}\" fill=\"{color}\">",
        -rotation_deg, theme.font_family
    );
    let count = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        let baseline = y - (count - 1 - idx) as f64 * line_height - descent;
        out.push_str(&format!(
            "<tspan x=\"{x:.2}\" y=\"{baseline:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    out.push_str("</text>");
    out
}

fn points_attr(canvas: &Canvas, points: &[Point]) -> String {
    let mut attr = String::new();
    for (idx, point) in points.iter().enumerate() {
        let (x, y) = canvas.point(*point);
        if idx > 0 {
            attr.push(' ');
        }
        attr.push_str(&format!("{x:.2},{y:.2}"));
    }
    attr
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().to_string())
        .unwrap_or_else(|| "DejaVu Sans".to_string());
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::data::{SeriesOptions, parse_series};
    use crate::scene::PlotContext;

    fn scene() -> Scene {
        let context = PlotContext::from_config(&PlotConfig::default()).expect("valid plot");
        let mut scene = Scene::new(context);
        for (key, doc) in [
            (
                "X1T",
                "label: XENON1T\nyear: 2018\nlabel_xpos: 6\nlabel_ypos: 1e-44\nlabel_rotation: -30\n6,1e-44\n20,1e-45\n",
            ),
            ("nT", "label: XENONnT\nstyle: projection\n6,1e-46\n20,1e-47\n"),
        ] {
            let file = parse_series(doc, key).expect("parses");
            let series = Series::from_file(key, SeriesKind::Curve, file, &SeriesOptions::default(), &Theme::paper())
                .expect("builds");
            scene.add_series(series).expect("unique");
        }
        scene
    }

    #[test]
    fn render_svg_basic() {
        let svg = render_svg(&scene(), &Theme::paper(), &RenderConfig::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("XENON1T (2018)"));
        assert!(svg.contains("rotate(30.000"));
        // unplaced labels are not drawn
        assert!(!svg.contains("XENONnT"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("stroke-dasharray").count(), 1);
        assert!(svg.contains(&Theme::paper().excluded_region_color));
    }

    #[test]
    fn grid_follows_major_ticks_when_enabled() {
        let theme = Theme::paper();
        let plain = render_svg(&scene(), &theme, &RenderConfig::default());
        assert!(!plain.contains(&theme.grid_color));

        let config = RenderConfig {
            show_grid: true,
            ..RenderConfig::default()
        };
        let svg = render_svg(&scene(), &theme, &config);
        let x_ticks = ticks(0.1, 20.0, Scale::Log).len();
        let y_ticks = ticks(1e-46, 1e-34, Scale::Log).len();
        assert_eq!(
            svg.matches(&format!("stroke=\"{}\"", theme.grid_color)).count(),
            x_ticks + y_ticks
        );
    }

    #[test]
    fn log_ticks_land_on_decades() {
        assert_eq!(ticks(0.1, 20.0, Scale::Log), vec![0.1, 1.0, 10.0]);
        assert_eq!(tick_label(1e-40, Scale::Log), "10<tspan baseline-shift=\"super\" font-size=\"70%\">-40</tspan>");
        assert_eq!(tick_label(2.5, Scale::Linear), "2.5");
    }

    #[test]
    fn multi_line_labels_stack_upwards() {
        let svg = label_svg("CRESST-III\n(2019)", (100.0, 200.0), 0.0, 10.0, "#000", &Theme::paper());
        assert_eq!(svg.matches("<tspan").count(), 2);
        assert!(svg.contains("y=\"185.80\""));
        assert!(svg.contains("y=\"197.80\""));
    }
}
