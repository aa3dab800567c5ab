//! ASCII plotting for terminal output.
//!
//! Fixed-size grids, deterministic output:
//! - `render_series`: one or more step series on a shared y-axis, each drawn
//!   with its own marker and joined by line segments
//! - `render_histogram`: horizontal bars, one row per score bin

use crate::domain::Histogram;

/// A labelled series indexed by step.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub marker: char,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(label: impl Into<String>, marker: char, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            marker,
            values,
        }
    }
}

/// Render series against the step index.
pub fn render_series(title: &str, series: &[Series], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let steps = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let x_max = steps.saturating_sub(1).max(1) as f64;
    let (y_min, y_max) = y_range(series).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    for s in series {
        let mut prev = None;
        for (i, &v) in s.values.iter().enumerate() {
            if !v.is_finite() {
                prev = None;
                continue;
            }
            let x = map_x(i as f64, x_max, width);
            let y = map_y(v, y_min, y_max, height);
            if let Some((x0, y0)) = prev {
                draw_line(&mut grid, x0, y0, x, y, '.');
            }
            grid[y][x] = s.marker;
            prev = Some((x, y));
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{title}: step=[0, {}] | y=[{y_min:.3}, {y_max:.3}]\n",
        steps.saturating_sub(1)
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    let legend: Vec<String> = series.iter().map(|s| format!("{} {}", s.marker, s.label)).collect();
    out.push_str(&legend.join("  "));
    out.push('\n');
    out
}

/// Render a histogram as horizontal bars scaled to `width` characters.
pub fn render_histogram(title: &str, hist: &Histogram, width: usize) -> String {
    let width = width.max(1);
    let peak = hist.counts.iter().copied().max().unwrap_or(0);
    let mut out = String::new();
    out.push_str(&format!("{title} (n={})\n", hist.total()));
    let last = hist.counts.len().saturating_sub(1);
    for (i, &count) in hist.counts.iter().enumerate() {
        let lo = hist.edges[i];
        let hi = hist.edges[i + 1];
        let close = if i == last { ']' } else { ')' };
        let bar = if peak == 0 {
            0
        } else {
            ((count as f64 / peak as f64) * width as f64).round() as usize
        };
        out.push_str(
            format!("[{lo:>4.0}, {hi:>4.0}{close} {:<width$} {count}", "#".repeat(bar)).trim_end(),
        );
        out.push('\n');
    }
    out
}

fn y_range(series: &[Series]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &v in series.iter().flat_map(|s| s.values.iter()) {
        if v.is_finite() {
            min_y = min_y.min(v);
            max_y = max_y.max(v);
        }
    }
    if !(min_y.is_finite() && max_y.is_finite()) {
        return None;
    }
    if max_y > min_y {
        Some((min_y, max_y))
    } else {
        Some((min_y - 0.5, max_y + 0.5))
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_max: f64, width: usize) -> usize {
    let u = (x / x_max).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Top row holds the maximum.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham). Only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScoreRange;

    #[test]
    fn series_golden_snapshot_small() {
        let s = Series::new("up", 'a', vec![0.0, 10.0]);
        let txt = render_series("Mean score change", &[s], 10, 5);
        let expected = concat!(
            "Mean score change: step=[0, 1] | y=[-0.500, 10.500]\n",
            "        .a\n",
            "      ..\n",
            "    ..\n",
            "  ..\n",
            "a.\n",
            "a up\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn histogram_bars_scale_to_peak() {
        let range = ScoreRange::new(300, 850).unwrap();
        let hist = Histogram::from_scores([300, 310, 320, 850], range, 2);
        let txt = render_histogram("G", &hist, 6);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], "G (n=4)");
        assert_eq!(lines[1], "[ 300,  575) ###### 3");
        assert_eq!(lines[2], "[ 575,  850] ##     1");
    }

    #[test]
    fn empty_input_still_renders() {
        let txt = render_series("Empty", &[], 10, 5);
        assert!(txt.starts_with("Empty: step=[0, 0]"));
    }
}
