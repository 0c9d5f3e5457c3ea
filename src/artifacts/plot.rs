//! Map image of the matched sheets
//!
//! Rendering is optional: the orchestrator holds an
//! `Option<Box<dyn PlotRenderer>>` and sends a text-only notification when
//! it is absent or fails. [`RasterPlotRenderer`] composes slippy-map
//! basemap tiles in Web Mercator, draws the sheet rectangles on top and
//! stamps the title and the tile attribution onto the image.

use crate::artifacts::geojson::FeatureCollection;
use crate::config::PlotConfig;
use crate::error::Result;
use crate::wfs::types::Envelope;
use async_trait::async_trait;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::f64::consts::PI;
use std::io::Cursor;
use std::time::Duration;

/// MIME type of rendered images
pub const PNG_MIME: &str = "image/png";

/// Caption required by the default tile provider
pub const ATTRIBUTION: &str = "Map © OpenStreetMap contributors";

const TILE_SIZE: u32 = 256;
const GLYPH_SIZE: u32 = 8;
const TEXT_PADDING: u32 = 4;
const BACKGROUND: Rgba<u8> = Rgba([242, 239, 233, 255]);
const OUTLINE: Rgba<u8> = Rgba([24, 72, 168, 255]);
const FILL: Rgba<u8> = Rgba([24, 72, 168, 255]);
const FILL_ALPHA: f32 = 0.25;
const TEXT: Rgba<u8> = Rgba([20, 20, 20, 255]);
const LABEL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LABEL_ALPHA: f32 = 0.8;

/// Something that can draw a feature collection as a PNG
#[async_trait]
pub trait PlotRenderer: Send + Sync {
    async fn render(&self, collection: &FeatureCollection, title: &str) -> Result<Vec<u8>>;
}

/// Web Mercator pixel coordinates at a zoom level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    zoom: u8,
}

impl Projection {
    pub fn new(zoom: u8) -> Self {
        Self { zoom }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    fn world_size(&self) -> f64 {
        f64::from(TILE_SIZE) * 2f64.powi(i32::from(self.zoom))
    }

    /// Global pixel position of a lon/lat point
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-85.051_128, 85.051_128).to_radians();
        let x = (lon + 180.0) / 360.0 * self.world_size();
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * self.world_size();
        (x, y)
    }

    /// Pixel size of an envelope
    pub fn extent_px(&self, e: &Envelope) -> (f64, f64) {
        let (x0, y0) = self.project(e.xmin, e.ymax);
        let (x1, y1) = self.project(e.xmax, e.ymin);
        (x1 - x0, y1 - y0)
    }

    /// Highest zoom ≤ `max_zoom` at which `e` fits in 90% of the canvas
    pub fn fit(e: &Envelope, width: u32, height: u32, max_zoom: u8) -> Self {
        let usable_w = f64::from(width) * 0.9;
        let usable_h = f64::from(height) * 0.9;
        (0..=max_zoom)
            .rev()
            .map(Projection::new)
            .find(|p| {
                let (w, h) = p.extent_px(e);
                w <= usable_w && h <= usable_h
            })
            .unwrap_or_else(|| Projection::new(0))
    }
}

/// Basemap + rectangles renderer built on the `image` crate
pub struct RasterPlotRenderer {
    client: reqwest::Client,
    config: PlotConfig,
}

impl RasterPlotRenderer {
    /// Create a renderer
    ///
    /// # Errors
    ///
    /// Returns error if the tile HTTP client cannot be built
    pub fn new(config: &PlotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn fetch_tile(&self, template: &str, z: u8, x: u32, y: u32) -> Result<RgbaImage> {
        let url = template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string());
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }

    async fn draw_basemap(
        &self,
        canvas: &mut RgbaImage,
        template: &str,
        projection: Projection,
        origin: (f64, f64),
    ) -> Result<()> {
        let tiles_per_axis = 1u32 << projection.zoom();
        let (left, top) = origin;
        let first_x = (left / f64::from(TILE_SIZE)).floor() as i64;
        let first_y = (top / f64::from(TILE_SIZE)).floor() as i64;
        let last_x = ((left + f64::from(canvas.width())) / f64::from(TILE_SIZE)).floor() as i64;
        let last_y = ((top + f64::from(canvas.height())) / f64::from(TILE_SIZE)).floor() as i64;

        for ty in first_y.max(0)..=last_y.min(i64::from(tiles_per_axis) - 1) {
            for tx in first_x..=last_x {
                let wrapped_x = tx.rem_euclid(i64::from(tiles_per_axis)) as u32;
                let tile = self
                    .fetch_tile(template, projection.zoom(), wrapped_x, ty as u32)
                    .await?;
                let dx = (tx * i64::from(TILE_SIZE)) as f64 - left;
                let dy = (ty * i64::from(TILE_SIZE)) as f64 - top;
                imageops::overlay(canvas, &tile, dx.round() as i64, dy.round() as i64);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlotRenderer for RasterPlotRenderer {
    async fn render(&self, collection: &FeatureCollection, title: &str) -> Result<Vec<u8>> {
        let extent = collection
            .extent()
            .ok_or_else(|| anyhow::anyhow!("Nothing to plot: collection has no geometry"))?;

        let (width, height) = (self.config.width, self.config.height);
        let projection = Projection::fit(&extent, width, height, self.config.max_zoom);
        let (x0, y0) = projection.project(extent.xmin, extent.ymax);
        let (x1, y1) = projection.project(extent.xmax, extent.ymin);
        let origin = (
            (x0 + x1) / 2.0 - f64::from(width) / 2.0,
            (y0 + y1) / 2.0 - f64::from(height) / 2.0,
        );
        tracing::info!(zoom = projection.zoom(), width, height, "Generating plot");

        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
        if let Some(template) = &self.config.tile_url_template {
            self.draw_basemap(&mut canvas, template, projection, origin)
                .await?;
        }

        for feature in &collection.features {
            if let Some(e) = feature.geometry.envelope() {
                let (ax, ay) = projection.project(e.xmin, e.ymax);
                let (bx, by) = projection.project(e.xmax, e.ymin);
                draw_rectangle(
                    &mut canvas,
                    (ax - origin.0, ay - origin.1),
                    (bx - origin.0, by - origin.1),
                );
            }
        }

        draw_title(&mut canvas, title);
        if self.config.tile_url_template.is_some() {
            draw_attribution(&mut canvas, ATTRIBUTION);
        }

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        tracing::info!(bytes = png.len(), "Finished generating plot");
        Ok(png)
    }
}

fn blend(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, alpha: f32) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        let under = f32::from(pixel[channel]);
        let over = f32::from(color[channel]);
        pixel[channel] = (under + (over - under) * alpha).round() as u8;
    }
    pixel[3] = 255;
}

/// Filled, outlined axis-aligned rectangle; sheet envelopes stay
/// rectangles under Mercator, so no general polygon fill is needed
fn draw_rectangle(canvas: &mut RgbaImage, top_left: (f64, f64), bottom_right: (f64, f64)) {
    let x0 = top_left.0.min(bottom_right.0).round() as i64;
    let x1 = top_left.0.max(bottom_right.0).round() as i64;
    let y0 = top_left.1.min(bottom_right.1).round() as i64;
    let y1 = top_left.1.max(bottom_right.1).round() as i64;

    // Only the visible part is walked; edges outside the canvas stay unseen.
    let max_x = i64::from(canvas.width()) - 1;
    let max_y = i64::from(canvas.height()) - 1;
    for y in y0.max(0)..=y1.min(max_y) {
        for x in x0.max(0)..=x1.min(max_x) {
            let on_edge = x - x0 < 2 || x1 - x < 2 || y - y0 < 2 || y1 - y < 2;
            if on_edge {
                blend(canvas, x, y, OUTLINE, 1.0);
            } else {
                blend(canvas, x, y, FILL, FILL_ALPHA);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Acute,
    Dot,
    Ogonek,
    Stroke,
}

/// Polish letters missing from the bitmap font, as base letter + mark
fn decompose(c: char) -> (char, Option<Mark>) {
    match c {
        'ą' => ('a', Some(Mark::Ogonek)),
        'ę' => ('e', Some(Mark::Ogonek)),
        'Ą' => ('A', Some(Mark::Ogonek)),
        'Ę' => ('E', Some(Mark::Ogonek)),
        'ć' => ('c', Some(Mark::Acute)),
        'ń' => ('n', Some(Mark::Acute)),
        'ś' => ('s', Some(Mark::Acute)),
        'ź' => ('z', Some(Mark::Acute)),
        'Ć' => ('C', Some(Mark::Acute)),
        'Ń' => ('N', Some(Mark::Acute)),
        'Ś' => ('S', Some(Mark::Acute)),
        'Ź' => ('Z', Some(Mark::Acute)),
        'ż' => ('z', Some(Mark::Dot)),
        'Ż' => ('Z', Some(Mark::Dot)),
        'ł' => ('l', Some(Mark::Stroke)),
        'Ł' => ('L', Some(Mark::Stroke)),
        other => (other, None),
    }
}

/// 8×8 bitmap of `c`, one byte per row, bit 0 leftmost
fn glyph(c: char) -> [u8; 8] {
    let (base, mark) = decompose(c);
    let mut rows = BASIC_FONTS
        .get(base)
        .or_else(|| LATIN_FONTS.get(base))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8]);

    let pixels: &[(usize, u8)] = match mark {
        Some(Mark::Acute) => &[(0, 5), (1, 4)],
        Some(Mark::Dot) => &[(0, 3), (0, 4)],
        Some(Mark::Ogonek) => &[(7, 4), (7, 5)],
        Some(Mark::Stroke) => &[(3, 4), (4, 1)],
        None => &[],
    };
    for &(row, col) in pixels {
        rows[row] |= 1 << col;
    }
    rows
}

fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale
}

fn draw_text(canvas: &mut RgbaImage, text: &str, x: i64, y: i64, scale: u32) {
    let step = i64::from(GLYPH_SIZE * scale);
    for (i, c) in text.chars().enumerate() {
        let cell_x = x + i as i64 * step;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = cell_x + i64::from(col * scale + dx);
                        let py = y + (row as i64) * i64::from(scale) + i64::from(dy);
                        blend(canvas, px, py, TEXT, 1.0);
                    }
                }
            }
        }
    }
}

fn shade_box(canvas: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32) {
    let max_x = (x + i64::from(w)).min(i64::from(canvas.width()));
    let max_y = (y + i64::from(h)).min(i64::from(canvas.height()));
    for py in y.max(0)..max_y {
        for px in x.max(0)..max_x {
            blend(canvas, px, py, LABEL, LABEL_ALPHA);
        }
    }
}

/// Title centred on a light band along the top edge
fn draw_title(canvas: &mut RgbaImage, title: &str) {
    let available = canvas.width().saturating_sub(2 * TEXT_PADDING);
    let scale = if text_width(title, 2) <= available { 2 } else { 1 };
    let band = GLYPH_SIZE * scale + 2 * TEXT_PADDING;
    shade_box(canvas, 0, 0, canvas.width(), band);

    let x = (i64::from(canvas.width()) - i64::from(text_width(title, scale))) / 2;
    draw_text(canvas, title, x.max(i64::from(TEXT_PADDING)), i64::from(TEXT_PADDING), scale);
}

/// Small caption in the bottom-right corner
fn draw_attribution(canvas: &mut RgbaImage, caption: &str) {
    let w = text_width(caption, 1) + 2 * TEXT_PADDING;
    let h = GLYPH_SIZE + 2 * TEXT_PADDING;
    let x = i64::from(canvas.width()) - i64::from(w);
    let y = i64::from(canvas.height()) - i64::from(h);
    shade_box(canvas, x, y, w, h);
    draw_text(
        canvas,
        caption,
        x + i64::from(TEXT_PADDING),
        y + i64::from(TEXT_PADDING),
        1,
    );
}
