use std::io::Cursor;

use common::models::Candle;
use plotters::prelude::*;
use thiserror::Error;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 500;
const PADDING: f64 = 0.002;
const LINE_COLOR: RGBColor = RGBColor(255, 140, 0);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to plot")]
    Empty,
    #[error("drawing failed: {0}")]
    Draw(String),
    #[error("pixel buffer size mismatch")]
    Buffer,
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Signature shared by [`render`] and any replacement renderer.
pub type ChartRenderer = fn(&[Candle], &[f64]) -> Result<Vec<u8>, RenderError>;

fn draw_err<E: std::error::Error>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Y-axis range: combined min/max of lows, highs and `line`, padded by 0.2%.
pub fn chart_bounds(candles: &[Candle], line: &[f64]) -> Option<(f64, f64)> {
    let values = candles
        .iter()
        .flat_map(|c| [c.low, c.high])
        .chain(line.iter().copied())
        .filter(|v| v.is_finite());

    let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;

    let bounds = (min * (1.0 - PADDING), max * (1.0 + PADDING));
    (bounds.1 > bounds.0).then_some(bounds)
}

/// Candlestick PNG of `candles` with `line` (aligned by index) drawn over it.
pub fn render(candles: &[Candle], line: &[f64]) -> Result<Vec<u8>, RenderError> {
    if candles.is_empty() {
        return Err(RenderError::Empty);
    }
    let (y_min, y_max) = chart_bounds(candles, line).ok_or(RenderError::Empty)?;

    let mut pixels = vec![0_u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(-1_i32..candles.len() as i32, y_min..y_max)
            .map_err(draw_err)?;

        let body_width = (WIDTH / (candles.len() as u32 + 2)).clamp(2, 24);
        chart
            .draw_series(candles.iter().enumerate().map(|(i, c)| {
                CandleStick::new(
                    i as i32,
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    GREEN.filled(),
                    RED.filled(),
                    body_width,
                )
            }))
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(
                line.iter().enumerate().map(|(i, v)| (i as i32, *v)),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }

    let frame = image::RgbImage::from_raw(WIDTH, HEIGHT, pixels).ok_or(RenderError::Buffer)?;
    let mut png = Cursor::new(Vec::new());
    frame.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}
