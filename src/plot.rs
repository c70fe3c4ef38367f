//! SVG charts for the elbow curve, silhouette curve and cluster distribution

use crate::error::{Error, Result};
use plotters::prelude::*;
use std::fmt::Display;

const SIZE: (u32, u32) = (640, 400);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 20);
const BAR_COLORS: [RGBColor; 5] = [BLUE, RED, GREEN, MAGENTA, CYAN];

fn render_error<E: Display>(e: E) -> Error {
    Error::render(e.to_string())
}

/// Pad a value range so single points and flat series still get an axis
fn padded(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let span = (max - min).abs();
    let pad = if span > 0.0 { span * 0.1 } else { max.abs().max(1.0) * 0.1 };
    (min - pad, max + pad)
}

fn k_range(ks: &[usize]) -> (f64, f64) {
    let lo = ks.iter().min().copied().unwrap_or(0) as f64;
    let hi = ks.iter().max().copied().unwrap_or(1) as f64;
    (lo - 0.5, hi + 0.5)
}

/// WCSS against k, with a vertical marker at the suggested k
pub fn elbow_chart(ks: &[usize], wcss: &[f64], suggested_k: Option<usize>) -> Result<String> {
    let points: Vec<(f64, f64)> = ks.iter().zip(wcss).map(|(&k, &w)| (k as f64, w)).collect();
    let (x_min, x_max) = k_range(ks);
    let w_max = wcss.iter().copied().fold(0.0, f64::max);
    let (_, y_max) = padded(0.0, w_max);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Elbow method", CAPTION_FONT)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)
            .map_err(render_error)?;
        chart
            .configure_mesh()
            .x_desc("k")
            .y_desc("WCSS")
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(LineSeries::new(points.clone(), &BLUE))
            .map_err(render_error)?;
        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 4, BLUE.filled())))
            .map_err(render_error)?;

        if let Some(k) = suggested_k {
            let x = k as f64;
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(x, 0.0), (x, y_max)],
                    RED.stroke_width(2),
                )))
                .map_err(render_error)?
                .label(format!("suggested k = {k}"))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
            chart
                .configure_series_labels()
                .border_style(BLACK)
                .background_style(WHITE.mix(0.8))
                .draw()
                .map_err(render_error)?;
        }

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

/// Silhouette score against k; undefined entries are left out
pub fn silhouette_chart(ks: &[usize], scores: &[Option<f64>]) -> Result<String> {
    let points: Vec<(f64, f64)> = ks
        .iter()
        .zip(scores)
        .filter_map(|(&k, s)| s.map(|s| (k as f64, s)))
        .collect();
    let (x_min, x_max) = k_range(ks);
    let lo = points.iter().map(|p| p.1).fold(0.0, f64::min);
    let hi = points.iter().map(|p| p.1).fold(0.0, f64::max);
    let (y_min, y_max) = padded(lo, hi);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Silhouette score by k", CAPTION_FONT)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(render_error)?;
        chart
            .configure_mesh()
            .x_desc("k")
            .y_desc("Silhouette")
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(LineSeries::new(points.clone(), &GREEN))
            .map_err(render_error)?;
        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 4, GREEN.filled())))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

/// Bar chart of members per cluster id
pub fn distribution_chart(counts: &[usize]) -> Result<String> {
    let n = counts.len().max(1) as f64;
    let top = counts.iter().copied().max().unwrap_or(0) as f64;
    let (_, y_max) = padded(0.0, top);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Cluster distribution", CAPTION_FONT)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5f64..n - 0.5, 0f64..y_max)
            .map_err(render_error)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(counts.len().max(1))
            .x_label_formatter(&|x| format!("C{}", x.round() as i64))
            .x_desc("Cluster")
            .y_desc("Respondents")
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(counts.iter().enumerate().map(|(i, &count)| {
                let x = i as f64;
                Rectangle::new(
                    [(x - 0.4, 0.0), (x + 0.4, count as f64)],
                    BAR_COLORS[i % BAR_COLORS.len()].filled(),
                )
            }))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elbow_chart_is_svg() {
        let svg = elbow_chart(&[2, 3, 4], &[10.0, 5.0, 4.0], Some(3)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
        assert!(svg.contains("Elbow method"));
    }

    #[test]
    fn test_silhouette_chart_skips_undefined() {
        let svg = silhouette_chart(&[1, 2, 3], &[None, Some(0.6), Some(0.4)]).unwrap();
        assert!(svg.contains("</svg>"));

        let empty = silhouette_chart(&[1], &[None]).unwrap();
        assert!(empty.contains("</svg>"));
    }

    #[test]
    fn test_distribution_chart() {
        let svg = distribution_chart(&[40, 35, 25]).unwrap();
        assert!(svg.contains("Cluster distribution"));
        assert!(distribution_chart(&[]).unwrap().contains("</svg>"));
    }

    #[test]
    fn test_padded_flat_range() {
        assert_eq!(padded(0.0, 0.0), (-0.1, 0.1));
        let (lo, hi) = padded(2.0, 4.0);
        assert!(lo < 2.0 && hi > 4.0);
    }
}
