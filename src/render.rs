//! Chart rendering with plotters
//!
//! `ChartRenderer` owns the output directory and backend lifecycle; the
//! analysis side only hands over descriptors. Rendering problems are
//! per-chart and non-fatal: a failed chart is logged and skipped while the
//! rest of the run proceeds.
//!
//! The crate uses the pure-Rust `ab_glyph` font path, which needs a font
//! registered before any text is drawn. A system TTF is discovered and
//! registered once; without one, rendering is skipped entirely (the
//! analysis report does not depend on it).

use crate::chart::{BarChart, BoxPlot, ChartSet, LineChart, PieChart, ScatterChart};
use anyhow::Context;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Matplotlib's default categorical cycle, the house style for these charts
const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

static FONT_REGISTERED: OnceLock<bool> = OnceLock::new();

fn scan_fonts(dir: &Path, depth: usize, found: &mut Vec<PathBuf>) {
    if depth > 3 || found.len() >= 8 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_fonts(&path, depth + 1, found);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ttf") | Some("otf")
        ) {
            found.push(path);
        }
    }
}

fn candidate_font_paths() -> Vec<PathBuf> {
    let known = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation-fonts/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial Unicode.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ];
    let mut found: Vec<PathBuf> = known
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .collect();
    for root in ["/usr/share/fonts", "/usr/local/share/fonts"] {
        scan_fonts(Path::new(root), 0, &mut found);
    }
    found
}

/// Register the first readable system font as "sans-serif", once
fn ensure_default_font() -> bool {
    *FONT_REGISTERED.get_or_init(|| {
        for path in candidate_font_paths() {
            if let Ok(bytes) = std::fs::read(&path) {
                let leaked: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                if register_font("sans-serif", FontStyle::Normal, leaked).is_ok() {
                    tracing::debug!(font = %path.display(), "registered chart font");
                    return true;
                }
            }
        }
        false
    })
}

/// Pad a value range so plotters always gets a non-empty span
fn padded_range(min: f32, max: f32) -> (f32, f32) {
    if min < max {
        let pad = (max - min) * 0.05;
        (min - pad, max + pad)
    } else {
        (min - 1.0, max + 1.0)
    }
}

/// Renders chart descriptors to PNG files in an output directory
#[derive(Debug)]
pub struct ChartRenderer {
    out_dir: PathBuf,
    fonts_available: bool,
}

impl ChartRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create chart directory {}", out_dir.display()))?;
        Ok(Self {
            out_dir,
            fonts_available: ensure_default_font(),
        })
    }

    /// Whether a usable font was found; without one nothing is rendered
    pub fn can_render(&self) -> bool {
        self.fonts_available
    }

    /// Render every present descriptor; returns the files written.
    ///
    /// The bar and pie descriptors are each rendered through two distinct
    /// code paths, so the chart pairs agree numerically by construction.
    pub fn render_all(&self, charts: &ChartSet) -> Vec<PathBuf> {
        if !self.fonts_available {
            tracing::warn!("no usable system font found; skipping chart rendering");
            return Vec::new();
        }

        let mut written = Vec::new();
        if let Some(bar) = &charts.regimen_bar {
            self.attempt(&mut written, "regimen_measurements_histogram.png", |p| {
                self.render_bar_histogram(bar, p)
            });
            self.attempt(&mut written, "regimen_measurements_bars.png", |p| {
                self.render_bar_rectangles(bar, p)
            });
        }
        if let Some(pie) = &charts.sex_pie {
            self.attempt(&mut written, "sex_distribution_pie.png", |p| {
                self.render_pie(pie, p, false)
            });
            self.attempt(&mut written, "sex_distribution_pct_pie.png", |p| {
                self.render_pie(pie, p, true)
            });
        }
        if let Some(boxes) = &charts.final_volume_box {
            self.attempt(&mut written, "final_tumor_volume_box.png", |p| {
                self.render_box_plot(boxes, p)
            });
        }
        if let Some(line) = &charts.mouse_line {
            self.attempt(&mut written, "tumor_volume_line.png", |p| {
                self.render_line_chart(line, p)
            });
        }
        if let Some(scatter) = &charts.weight_scatter {
            self.attempt(&mut written, "weight_vs_volume_scatter.png", |p| {
                self.render_scatter(scatter, p)
            });
        }
        written
    }

    fn attempt<F>(&self, written: &mut Vec<PathBuf>, name: &str, render: F)
    where
        F: FnOnce(&Path) -> DrawResult,
    {
        let path = self.out_dir.join(name);
        match render(&path) {
            Ok(()) => written.push(path),
            Err(e) => tracing::warn!(chart = name, error = %e, "chart rendering failed"),
        }
    }

    /// Bar path one: plotters' segmented histogram series
    fn render_bar_histogram(&self, chart: &BarChart, path: &Path) -> DrawResult {
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;
        let n = chart.categories.len() as u32;
        let y_max = chart.values.iter().copied().max().unwrap_or(0).max(1);

        let mut cc = ChartBuilder::on(&root)
            .caption(chart.title.as_str(), ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(50)
            .build_cartesian_2d(0u32..n, 0u32..y_max + y_max / 10 + 1)?;

        let categories = &chart.categories;
        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(n as usize)
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .x_label_formatter(&|i| categories.get(*i as usize).cloned().unwrap_or_default())
            .draw()?;

        cc.draw_series(
            Histogram::vertical(&cc)
                .style(SERIES_COLORS[0].mix(0.7).filled())
                .margin(8)
                .data(chart.values.iter().enumerate().map(|(i, v)| (i as u32, *v))),
        )?;
        root.present()?;
        Ok(())
    }

    /// Bar path two: explicit rectangles with baseline labels
    fn render_bar_rectangles(&self, chart: &BarChart, path: &Path) -> DrawResult {
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;
        let n = chart.categories.len();
        let y_max = chart.values.iter().copied().max().unwrap_or(0).max(1) as f32;

        let mut cc = ChartBuilder::on(&root)
            .caption(chart.title.as_str(), ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0f32..n.max(1) as f32, 0f32..y_max * 1.1)?;

        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()?;

        cc.draw_series(chart.values.iter().enumerate().map(|(i, v)| {
            Rectangle::new(
                [(i as f32 + 0.15, 0.0), (i as f32 + 0.85, *v as f32)],
                SERIES_COLORS[0].mix(0.7).filled(),
            )
        }))?;
        cc.draw_series(chart.categories.iter().enumerate().map(|(i, name)| {
            Text::new(
                name.clone(),
                (i as f32 + 0.18, y_max * 0.06),
                ("sans-serif", 13),
            )
        }))?;
        root.present()?;
        Ok(())
    }

    /// Both pie charts share the wedge geometry; the annotation style is
    /// the difference (category labels vs. percentage labels).
    fn render_pie(&self, chart: &PieChart, path: &Path, annotate_percent: bool) -> DrawResult {
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(chart.title.as_str(), ("sans-serif", 22))?;

        let total = f64::from(chart.total());
        if total <= 0.0 {
            return Err("pie chart has no counts".into());
        }

        let center = (320, 230);
        let radius = 160.0;
        let percentages = chart.percentages();
        let mut angle = -FRAC_PI_2;
        for (i, &count) in chart.counts.iter().enumerate() {
            let sweep = f64::from(count) / total * TAU;
            let color = SERIES_COLORS[i % SERIES_COLORS.len()];
            root.draw(&Polygon::new(
                wedge_points(center, radius, angle, angle + sweep),
                color.mix(0.85).filled(),
            ))?;

            let mid = angle + sweep / 2.0;
            let label = if annotate_percent {
                format!("{:.1}%", percentages[i])
            } else {
                chart.labels.get(i).cloned().unwrap_or_default()
            };
            let at = (
                center.0 + (radius * 0.55 * mid.cos()) as i32,
                center.1 + (radius * 0.55 * mid.sin()) as i32,
            );
            root.draw(&Text::new(label, at, ("sans-serif", 18)))?;
            angle += sweep;
        }
        root.present()?;
        Ok(())
    }

    fn render_box_plot(&self, chart: &BoxPlot, path: &Path) -> DrawResult {
        if chart.groups.is_empty() {
            return Err("box plot has no computed groups".into());
        }
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut y_min = f32::INFINITY;
        let mut y_max = f32::NEG_INFINITY;
        for group in &chart.groups {
            y_min = y_min.min(group.whisker_low);
            y_max = y_max.max(group.whisker_high);
            for &v in &group.outliers {
                y_min = y_min.min(v);
                y_max = y_max.max(v);
            }
        }
        let (y_lo, y_hi) = padded_range(y_min, y_max);

        let mut cc = ChartBuilder::on(&root)
            .caption(chart.title.as_str(), ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(55)
            .build_cartesian_2d(0f32..chart.groups.len() as f32, y_lo..y_hi)?;

        cc.configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .y_desc(chart.y_label.as_str())
            .draw()?;

        let stroke = ShapeStyle::from(&SERIES_COLORS[0]).stroke_width(2);
        cc.draw_series(chart.groups.iter().enumerate().map(|(i, g)| {
            Rectangle::new([(i as f32 + 0.25, g.q1), (i as f32 + 0.75, g.q3)], stroke)
        }))?;
        // Median bar, whisker stems, whisker caps
        let mut segments = Vec::new();
        for (i, g) in chart.groups.iter().enumerate() {
            let x0 = i as f32 + 0.25;
            let x1 = i as f32 + 0.75;
            let xm = i as f32 + 0.5;
            segments.push(vec![(x0, g.median), (x1, g.median)]);
            segments.push(vec![(xm, g.q3), (xm, g.whisker_high)]);
            segments.push(vec![(xm, g.q1), (xm, g.whisker_low)]);
            segments.push(vec![(xm - 0.08, g.whisker_high), (xm + 0.08, g.whisker_high)]);
            segments.push(vec![(xm - 0.08, g.whisker_low), (xm + 0.08, g.whisker_low)]);
        }
        cc.draw_series(
            segments
                .into_iter()
                .map(|points| PathElement::new(points, ShapeStyle::from(&BLACK).stroke_width(1))),
        )?;
        // Outliers in a distinct style: filled red circles
        cc.draw_series(chart.groups.iter().enumerate().flat_map(|(i, g)| {
            g.outliers
                .iter()
                .map(move |&v| Circle::new((i as f32 + 0.5, v), 5, RED.filled()))
        }))?;
        cc.draw_series(chart.groups.iter().enumerate().map(|(i, g)| {
            Text::new(
                g.label.clone(),
                (i as f32 + 0.22, y_lo + (y_hi - y_lo) * 0.03),
                ("sans-serif", 14),
            )
        }))?;
        root.present()?;
        Ok(())
    }

    fn render_line_chart(&self, chart: &LineChart, path: &Path) -> DrawResult {
        if chart.points.is_empty() {
            return Err("line chart has no points".into());
        }
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;

        let x_max = chart.points.iter().map(|(t, _)| *t).max().unwrap_or(0);
        let y_min = chart.points.iter().map(|(_, v)| *v).fold(f32::INFINITY, f32::min);
        let y_max = chart
            .points
            .iter()
            .map(|(_, v)| *v)
            .fold(f32::NEG_INFINITY, f32::max);
        let (y_lo, y_hi) = padded_range(y_min, y_max);

        let mut cc = ChartBuilder::on(&root)
            .caption(chart.title.as_str(), ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(0u32..x_max + 1, y_lo..y_hi)?;

        cc.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()?;

        cc.draw_series(LineSeries::new(
            chart.points.iter().map(|(t, v)| (*t, *v)),
            ShapeStyle::from(&SERIES_COLORS[0]).stroke_width(2),
        ))?;
        root.present()?;
        Ok(())
    }

    fn render_scatter(&self, chart: &ScatterChart, path: &Path) -> DrawResult {
        if chart.points.is_empty() {
            return Err("scatter chart has no points".into());
        }
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;

        let x_min = chart.points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
        let x_max = chart
            .points
            .iter()
            .map(|(x, _)| *x)
            .fold(f64::NEG_INFINITY, f64::max);
        let y_min = chart.points.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
        let y_max = chart
            .points
            .iter()
            .map(|(_, y)| *y)
            .fold(f64::NEG_INFINITY, f64::max);
        let (x_lo, x_hi) = padded_range_f64(x_min, x_max);
        let (y_lo, y_hi) = padded_range_f64(y_min, y_max);

        let mut cc = ChartBuilder::on(&root)
            .caption(chart.title.as_str(), ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        cc.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()?;

        cc.draw_series(
            chart
                .points
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 4, SERIES_COLORS[0].filled())),
        )?;
        if let Some(fit) = chart.fit {
            cc.draw_series(LineSeries::new(
                [x_lo, x_hi]
                    .iter()
                    .map(|&x| (x, fit.slope * x + fit.intercept)),
                ShapeStyle::from(&RED).stroke_width(2),
            ))?;
        }
        root.present()?;
        Ok(())
    }
}

fn padded_range_f64(min: f64, max: f64) -> (f64, f64) {
    if min < max {
        let pad = (max - min) * 0.05;
        (min - pad, max + pad)
    } else {
        (min - 1.0, max + 1.0)
    }
}

fn wedge_points(center: (i32, i32), radius: f64, from: f64, to: f64) -> Vec<(i32, i32)> {
    let mut points = vec![center];
    let steps = (((to - from).abs() / 0.02).ceil() as usize).max(2);
    for step in 0..=steps {
        let angle = from + (to - from) * step as f64 / steps as f64;
        points.push((
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        ));
    }
    points
}
