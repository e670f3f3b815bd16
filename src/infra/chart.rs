// ============================================================
// Layer 6 — Accuracy Chart
// ============================================================
// Renders test accuracy against epoch as a PNG at the end of a
// training run: {chart_dir}/{net}_picture_of_acc_epoch.png
//
// Text needs a font backend; build with the `chart-text`
// feature to enable plotters' system-font rendering. Without it
// plotters panics on any text, so the caption, tick labels and
// axis names are left out and only the mesh, curve and points
// are drawn.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use plotters::prelude::*;

use crate::domain::metrics::AccuracyHistory;

const CHART_SIZE: (u32, u32) = (800, 600);
const DRAW_TEXT:  bool       = cfg!(feature = "chart-text");

pub fn chart_file_name(net: &str) -> String {
    format!("{net}_picture_of_acc_epoch.png")
}

/// Draw the accuracy curve. Returns None when there is nothing
/// to draw (e.g. a resumed run that had no epochs left).
pub fn render_accuracy_chart(
    history: &AccuracyHistory,
    net:     &str,
    dir:     &Path,
) -> Result<Option<PathBuf>> {
    let points = history.points();
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        tracing::warn!("No epochs ran; skipping the accuracy chart");
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create chart directory '{}'", dir.display()))?;
    let path = dir.join(chart_file_name(net));

    let x_min = first.0 as f64;
    let x_max = (last.0 as f64).max(x_min + 1.0);
    let y_max = points.iter().map(|p| p.1).fold(0.0f64, f64::max).max(0.1) * 1.05;
    let series: Vec<(f64, f64)> = points.iter().map(|&(e, a)| (e as f64, a)).collect();

    // the backend borrows `path` until the drawing is presented
    {
        let root = BitMapBackend::new(&path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut builder = ChartBuilder::on(&root);
        builder.margin(20);
        if DRAW_TEXT {
            builder
                .caption(format!("{net}: test accuracy by epoch"), ("sans-serif", 22))
                .x_label_area_size(45)
                .y_label_area_size(55);
        }
        let mut chart = builder.build_cartesian_2d(x_min..x_max, 0.0f64..y_max.min(1.0))?;

        let mut mesh = chart.configure_mesh();
        if DRAW_TEXT {
            mesh.x_desc("Epoch").y_desc("Accuracy");
        }
        mesh.draw()?;

        chart.draw_series(LineSeries::new(series.clone(), &BLUE))?;
        chart.draw_series(series.into_iter().map(|p| Circle::new(p, 3, BLUE.filled())))?;
        root.present()
            .with_context(|| format!("Cannot write chart '{}'", path.display()))?;
    }

    tracing::info!("Accuracy chart written to '{}'", path.display());
    Ok(Some(path))
}
