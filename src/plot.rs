use plotters::prelude::*;
use std::path::Path;

use crate::error::{KnnError, Result};

const CHART_SIZE: (u32, u32) = (800, 600);

/// Draws the accuracy-by-k curve of a sweep as an SVG line chart.
pub fn plot_k_sweep(file_path: impl AsRef<Path>, curve: &[(usize, f64)]) -> Result<()> {
    let Some(max_k) = curve.iter().map(|&(k, _)| k).max() else {
        return Err(KnnError::configuration("nothing to plot, the k sweep is empty"));
    };

    let root = SVGBackend::new(file_path.as_ref(), CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Test accuracy by k", ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0usize..max_k + 1, 0f64..101f64)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("k")
        .y_desc("accuracy (%)")
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(LineSeries::new(curve.iter().copied(), &BLUE))
        .map_err(plot_error)?;
    chart
        .draw_series(
            curve
                .iter()
                .map(|&(k, accuracy)| Circle::new((k, accuracy), 3, BLUE.filled())),
        )
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

fn plot_error<E: std::error::Error + Send + Sync>(error: DrawingAreaErrorKind<E>) -> KnnError {
    KnnError::Plot(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sweep_is_rejected() {
        let result = plot_k_sweep("unused.svg", &[]);
        assert!(matches!(result, Err(KnnError::Configuration(_))));
    }

    #[test]
    fn renders_curve_to_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.svg");

        plot_k_sweep(&path, &[(1, 80.0), (2, 95.0), (3, 90.0)]).unwrap();

        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<svg"));
    }
}
