// Draws the per-epoch loss history of a training run as a line chart and writes it out as a
// PNG image.

use image::{ImageError, Rgb, RgbImage};
use itertools::Itertools;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub mod colors {
    use image::Rgb;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const BLUE: Rgb<u8> = Rgb([33, 150, 243]);
}

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("loss history is empty, nothing to plot")]
    EmptyHistory,

    #[error("loss at epoch {epoch} is not finite ({value})")]
    NonFinite { epoch: usize, value: f64 },

    #[error("chart of {width}x{height} px leaves no room inside a {margin} px margin")]
    TooSmall { width: u32, height: u32, margin: u32 },

    #[error("failed to write chart: {0}")]
    Image(#[from] ImageError),
}

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    // Space between the image border and the axes, in pixels.
    pub margin: u32,
    pub background: Rgb<u8>,
    pub axis_color: Rgb<u8>,
    pub line_color: Rgb<u8>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            margin: 40,
            background: colors::WHITE,
            axis_color: colors::BLACK,
            line_color: colors::BLUE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LossChart {
    config: ChartConfig,
}

impl LossChart {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn points(losses: &[f64]) -> Vec<(f64, f64)> {
        losses
            .iter()
            .enumerate()
            .map(|(epoch, &loss)| (epoch as f64, loss))
            .collect()
    }

    // Epochs run along the x axis and loss up the y axis.
    pub fn render(&self, losses: &[f64]) -> Result<RgbImage, PlotError> {
        if losses.is_empty() {
            return Err(PlotError::EmptyHistory);
        }
        if let Some((epoch, &value)) = losses.iter().find_position(|loss| !loss.is_finite()) {
            return Err(PlotError::NonFinite { epoch, value });
        }

        let ChartConfig {
            width,
            height,
            margin,
            ..
        } = self.config;
        let both_margins = margin.saturating_mul(2).saturating_add(1);
        if width <= both_margins || height <= both_margins {
            return Err(PlotError::TooSmall {
                width,
                height,
                margin,
            });
        }

        let mut img = RgbImage::from_pixel(width, height, self.config.background);

        let left = margin;
        let right = width - margin - 1;
        let top = margin;
        let bottom = height - margin - 1;

        draw_line(&mut img, (left, top), (left, bottom), self.config.axis_color);
        draw_line(&mut img, (left, bottom), (right, bottom), self.config.axis_color);

        let points = Self::points(losses);
        let (min_loss, max_loss) = points
            .iter()
            .map(|&(_, loss)| loss)
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));
        let last_epoch = (points.len() - 1) as f64;

        // A flat history is drawn through the middle of the plot area.
        let to_pixel = |(epoch, loss): (f64, f64)| -> (u32, u32) {
            let x_fraction = if last_epoch > 0.0 { epoch / last_epoch } else { 0.0 };
            let y_fraction = if max_loss > min_loss {
                (loss - min_loss) / (max_loss - min_loss)
            } else {
                0.5
            };
            let x = left as f64 + x_fraction * (right - left) as f64;
            let y = bottom as f64 - y_fraction * (bottom - top) as f64;
            (x.round() as u32, y.round() as u32)
        };

        if points.len() == 1 {
            let (x, y) = to_pixel(points[0]);
            img.put_pixel(x, y, self.config.line_color);
        }
        for (from, to) in points.iter().map(|&point| to_pixel(point)).tuple_windows() {
            draw_line(&mut img, from, to, self.config.line_color);
        }

        Ok(img)
    }

    pub fn save(&self, losses: &[f64], path: impl AsRef<Path>) -> Result<(), PlotError> {
        let path = path.as_ref();
        let img = self.render(losses)?;
        img.save(path)?;
        info!(path = %path.display(), epochs = losses.len(), "saved loss chart");
        Ok(())
    }
}

// Straight line between two pixels, stepping once per pixel along the longer axis.
fn draw_line(img: &mut RgbImage, from: (u32, u32), to: (u32, u32), color: Rgb<u8>) {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (x1, y1) = (to.0 as f64, to.1 as f64);
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1.0) as u32;

    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let x = (x0 + t * (x1 - x0)).round() as u32;
        let y = (y0 + t * (y1 - y0)).round() as u32;
        if x < img.width() && y < img.height() {
            img.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_chart() -> LossChart {
        LossChart::new(ChartConfig {
            width: 100,
            height: 80,
            margin: 10,
            ..Default::default()
        })
    }

    #[test]
    fn points_pair_losses_with_epochs() {
        assert_eq!(
            LossChart::points(&[0.9, 0.5, 0.25]),
            vec![(0.0, 0.9), (1.0, 0.5), (2.0, 0.25)]
        );
    }

    #[test]
    fn curve_runs_from_top_left_to_bottom_right_for_falling_loss() {
        let chart = small_chart();
        let img = chart.render(&[1.0, 0.6, 0.3, 0.1]).unwrap();
        let line = chart.config().line_color;

        assert_eq!(img.dimensions(), (100, 80));
        assert_eq!(*img.get_pixel(0, 0), chart.config().background);
        // Highest loss sits at the top of the first epoch, lowest at the bottom of the last.
        assert_eq!(*img.get_pixel(10, 10), line);
        assert_eq!(*img.get_pixel(89, 69), line);
    }

    #[test]
    fn flat_and_single_point_histories_still_render() {
        let chart = small_chart();
        let line = chart.config().line_color;

        let flat = chart.render(&[0.5, 0.5, 0.5]).unwrap();
        assert_eq!(*flat.get_pixel(50, 40), line);

        let single = chart.render(&[0.5]).unwrap();
        assert_eq!(*single.get_pixel(10, 40), line);
    }

    #[test]
    fn bad_histories_are_rejected() {
        let chart = small_chart();

        assert!(matches!(chart.render(&[]), Err(PlotError::EmptyHistory)));
        assert!(matches!(
            chart.render(&[1.0, f64::NAN]),
            Err(PlotError::NonFinite { epoch: 1, .. })
        ));

        let cramped = LossChart::new(ChartConfig {
            width: 20,
            height: 20,
            margin: 10,
            ..Default::default()
        });
        assert!(matches!(cramped.render(&[1.0]), Err(PlotError::TooSmall { .. })));

        let huge_margin = LossChart::new(ChartConfig {
            margin: u32::MAX / 2 + 1,
            ..Default::default()
        });
        assert!(matches!(huge_margin.render(&[1.0]), Err(PlotError::TooSmall { .. })));
    }

    #[test]
    fn save_writes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loss_history.png");

        small_chart().save(&[1.0, 0.5, 0.2], &path).unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (100, 80));
    }
}
