//! Renders the refresh summary image.
//!
//! The image is a 600x400 PNG listing the country total, the five largest GDP
//! estimates and the render time. Text is drawn from the 8x8 bitmap glyphs of
//! `font8x8`, scaled up where the line fits.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{ImageFormat, Rgb, RgbImage};

use crate::store::{CountryStore, StoreError};

pub const SUMMARY_FILE_NAME: &str = "summary.png";
pub const IMAGE_WIDTH: u32 = 600;
pub const IMAGE_HEIGHT: u32 = 400;
/// Number of countries ranked in the image.
pub const TOP_COUNTRIES: usize = 5;

const BACKGROUND: Rgb<u8> = Rgb([0xf0, 0xf0, 0xf0]);
const INK: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);
const GLYPH_SIZE: u32 = 8;
const MARGIN: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read summary data: {0}")]
    Store(#[from] StoreError),
    #[error("failed to encode summary image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write summary image: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregates shown in the image.
#[derive(Debug, Clone)]
pub struct SummaryData {
    pub total_countries: i64,
    /// Name and GDP estimate, highest first.
    pub top: Vec<(String, Option<f64>)>,
    pub rendered_at: DateTime<Utc>,
}

/// One line of text placed on the canvas. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub scale: u32,
    pub bold: bool,
}

/// `$X.XXB` in billions of USD, or `N/A`.
pub fn format_gdp(gdp: Option<f64>) -> String {
    match gdp {
        Some(value) => format!("${:.2}B", value / 1e9),
        None => "N/A".to_string(),
    }
}

/// Largest scale, at most `preferred`, at which `text` fits between `x` and the right margin.
fn fit_scale(text: &str, x: u32, preferred: u32) -> u32 {
    let chars = text.chars().count() as u32;
    let mut scale = preferred.max(1);
    while scale > 1 && x + chars * GLYPH_SIZE * scale > IMAGE_WIDTH - MARGIN {
        scale -= 1;
    }
    scale
}

fn line(text: String, x: u32, y: u32, preferred: u32, bold: bool) -> TextLine {
    let scale = fit_scale(&text, x, preferred);
    TextLine {
        text,
        x,
        y,
        scale,
        bold,
    }
}

/// Places every line of the summary.
pub fn layout(data: &SummaryData) -> Vec<TextLine> {
    let mut lines = vec![
        line("Country Currency API - Summary".to_string(), MARGIN, 24, 2, true),
        line(
            format!("Total Countries: {}", data.total_countries),
            MARGIN,
            72,
            2,
            false,
        ),
        line("Top 5 by Estimated GDP:".to_string(), MARGIN, 112, 2, false),
    ];

    for (i, (name, gdp)) in data.top.iter().take(TOP_COUNTRIES).enumerate() {
        lines.push(line(
            format!("{}. {}: {}", i + 1, name, format_gdp(*gdp)),
            30,
            144 + i as u32 * 30,
            2,
            false,
        ));
    }

    lines.push(line(
        format!(
            "Last Refresh: {}",
            data.rendered_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        MARGIN,
        IMAGE_HEIGHT - 40,
        2,
        false,
    ));

    lines
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_text(img: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32) {
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as u32 * GLYPH_SIZE * scale;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                // bit 0 is the leftmost pixel
                if (*bits >> col) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = origin_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < img.width() && py < img.height() {
                            img.put_pixel(px, py, INK);
                        }
                    }
                }
            }
        }
    }
}

/// Draws the summary and encodes it as PNG.
pub fn render_png(data: &SummaryData) -> Result<Vec<u8>, RenderError> {
    let mut img = RgbImage::from_pixel(IMAGE_WIDTH, IMAGE_HEIGHT, BACKGROUND);

    for text_line in layout(data) {
        draw_text(&mut img, &text_line.text, text_line.x, text_line.y, text_line.scale);
        if text_line.bold {
            draw_text(
                &mut img,
                &text_line.text,
                text_line.x + 1,
                text_line.y,
                text_line.scale,
            );
        }
    }

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Writes `bytes` to a fresh temp file in `dir`, then renames it over `target`.
///
/// Each call gets its own temp file, so concurrent renders never share one and
/// readers only ever see a complete image. Last rename wins.
fn write_replacing(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".summary-")
        .suffix(".png.tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Writes the summary image into the cache directory.
#[derive(Debug, Clone)]
pub struct SummaryRenderer {
    cache_dir: PathBuf,
}

impl SummaryRenderer {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn image_path(&self) -> PathBuf {
        self.cache_dir.join(SUMMARY_FILE_NAME)
    }

    /// Creates the cache directory if missing. Idempotent.
    pub async fn ensure_cache_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await
    }

    /// Reads aggregates from `store` and overwrites the summary image.
    pub async fn render(&self, store: &dyn CountryStore) -> Result<PathBuf, RenderError> {
        let total_countries = store.count().await?;
        let top = store
            .top_by_gdp(TOP_COUNTRIES)
            .await?
            .into_iter()
            .map(|c| (c.name, c.estimated_gdp))
            .collect();

        let data = SummaryData {
            total_countries,
            top,
            rendered_at: Utc::now(),
        };
        let png = render_png(&data)?;

        let path = self.image_path();
        let size = png.len();
        let dir = self.cache_dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_replacing(&dir, &target, &png))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        tracing::info!(
            "Summary image written to {} ({} bytes)",
            path.display(),
            size
        );
        Ok(path)
    }

    /// Current image bytes, or `None` before the first successful render.
    pub async fn read_image(&self) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.image_path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Country;
    use crate::store::MemoryCountryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn sample_data() -> SummaryData {
        SummaryData {
            total_countries: 250,
            top: vec![
                ("United States of America".to_string(), Some(25_462_700_000_000.0)),
                ("China".to_string(), Some(17_963_170_000_000.0)),
                ("Åland Islands".to_string(), Some(0.0)),
            ],
            rendered_at: Utc.with_ymd_and_hms(2025, 10, 22, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn gdp_is_formatted_in_billions() {
        assert_eq!(format_gdp(Some(1_234_560_000.0)), "$1.23B");
        assert_eq!(format_gdp(Some(0.0)), "$0.00B");
        assert_eq!(format_gdp(None), "N/A");
    }

    #[test]
    fn layout_lists_total_ranking_and_timestamp() {
        let texts: Vec<String> = layout(&sample_data()).into_iter().map(|l| l.text).collect();

        assert_eq!(texts[0], "Country Currency API - Summary");
        assert_eq!(texts[1], "Total Countries: 250");
        assert_eq!(texts[2], "Top 5 by Estimated GDP:");
        assert_eq!(texts[3], "1. United States of America: $25462.70B");
        assert_eq!(texts[4], "2. China: $17963.17B");
        assert_eq!(texts[5], "3. Åland Islands: $0.00B");
        assert_eq!(texts[6], "Last Refresh: 2025-10-22T09:30:00.000Z");
    }

    #[test]
    fn long_lines_shrink_to_fit() {
        for text_line in layout(&sample_data()) {
            let width = text_line.x
                + text_line.text.chars().count() as u32 * GLYPH_SIZE * text_line.scale;
            assert!(
                text_line.scale == 1 || width <= IMAGE_WIDTH - MARGIN,
                "{:?} overflows",
                text_line
            );
        }
    }

    #[test]
    fn ranking_is_capped_at_five() {
        let mut data = sample_data();
        data.top = (0..8).map(|i| (format!("C{}", i), Some(1e9))).collect();
        let ranked = layout(&data)
            .into_iter()
            .filter(|l| l.text.starts_with(|c: char| c.is_ascii_digit()))
            .count();
        assert_eq!(ranked, TOP_COUNTRIES);
    }

    #[test]
    fn png_has_expected_dimensions_and_ink() {
        let bytes = render_png(&sample_data()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();

        assert_eq!(decoded.width(), IMAGE_WIDTH);
        assert_eq!(decoded.height(), IMAGE_HEIGHT);
        assert!(decoded.pixels().any(|p| *p == INK));
        assert_eq!(*decoded.get_pixel(0, 0), BACKGROUND);
    }

    #[tokio::test]
    async fn render_writes_and_overwrites_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SummaryRenderer::new(dir.path().join("cache"));
        renderer.ensure_cache_dir().await.unwrap();
        renderer.ensure_cache_dir().await.unwrap();
        assert_eq!(renderer.read_image().await.unwrap(), None);

        let store = MemoryCountryStore::new();
        store
            .upsert_many(&[Country {
                name: "Testland".into(),
                capital: None,
                region: None,
                population: 2000,
                currency_code: Some("XYZ".into()),
                exchange_rate: Some(10.0),
                estimated_gdp: Some(300_000.0),
                flag_url: None,
                last_refreshed_at: Utc::now(),
            }])
            .await
            .unwrap();

        let path = renderer.render(&store).await.unwrap();
        assert_eq!(path, renderer.image_path());
        let first = renderer.read_image().await.unwrap().unwrap();
        assert!(first.starts_with(&[0x89, b'P', b'N', b'G']));

        renderer.render(&store).await.unwrap();
        assert!(renderer.read_image().await.unwrap().is_some());
        assert_eq!(cache_entries(renderer.cache_dir()), vec![SUMMARY_FILE_NAME.to_string()]);
    }

    fn cache_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_renders_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(SummaryRenderer::new(dir.path().to_path_buf()));
        let store = Arc::new(MemoryCountryStore::new());

        for _ in 0..10 {
            let mut tasks = Vec::new();
            for _ in 0..8 {
                let renderer = renderer.clone();
                let store = store.clone();
                tasks.push(tokio::spawn(async move {
                    renderer.render(store.as_ref()).await
                }));
            }
            for task in tasks {
                let result = task.await.unwrap();
                assert!(result.is_ok(), "render failed: {:?}", result.err());
            }
        }

        let png = renderer.read_image().await.unwrap().unwrap();
        assert!(image::load_from_memory(&png).is_ok());
        assert_eq!(cache_entries(dir.path()), vec![SUMMARY_FILE_NAME.to_string()]);
    }

    #[tokio::test]
    async fn render_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SummaryRenderer::new(dir.path().join("absent"));

        let err = renderer
            .render(&MemoryCountryStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(_)), "unexpected error: {:?}", err);
        assert_eq!(renderer.read_image().await.unwrap(), None);
    }
}
