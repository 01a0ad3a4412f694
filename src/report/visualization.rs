use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use crate::{
    AnalysisResult, analysis::statistics::ColorHistogram, detection::RiskLevel, error::Result,
    image_utils::encode_png,
};

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;

const LABEL_WIDTH: u32 = 220;
const BAR_WIDTH: u32 = 320;
const BAR_HEIGHT: u32 = 14;
const ROW_HEIGHT: u32 = 24;
const SECTION_GAP: u32 = 36;

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub background: Rgb<u8>,
    pub foreground: Rgb<u8>,
    pub track: Rgb<u8>,
    /// Pixels per glyph dot.
    pub label_scale: u32,
    pub overlay_opacity: f32,
    pub show_legend: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            background: Rgb([255, 255, 255]),
            foreground: Rgb([40, 40, 40]),
            track: Rgb([230, 230, 235]),
            label_scale: 2,
            overlay_opacity: 0.5,
            show_legend: true,
        }
    }
}

pub struct ChartRenderer {
    config: ChartConfig,
}

impl ChartRenderer {
    pub fn new() -> Self {
        Self {
            config: ChartConfig::default(),
        }
    }

    pub fn with_config(config: ChartConfig) -> Self {
        Self { config }
    }

    /// Horizontal bars for the six categories followed by the strongest
    /// manipulation types, colored by risk level.
    pub fn category_chart(&self, analysis: &AnalysisResult) -> RgbImage {
        let c = &analysis.categories;
        let categories = [
            ("Generative AI", c.genai),
            ("Face Manipulation", c.face_manipulation),
            ("Body Manipulation", c.body_manipulation),
            ("Deepfake", c.deepfake),
            ("Inpainting", c.inpainting),
            ("Style Transfer", c.style_transfer),
        ];

        let mut manipulation: Vec<(&str, u32)> = analysis
            .manipulation
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        manipulation.sort_by(|a, b| b.1.cmp(&a.1));
        manipulation.truncate(10);

        let width = LABEL_WIDTH + BAR_WIDTH + 80;
        let sections = if manipulation.is_empty() { 1 } else { 2 };
        let rows = (categories.len() + manipulation.len()) as u32;
        let height = 60 + sections * SECTION_GAP + rows * ROW_HEIGHT;

        let mut chart = RgbImage::from_pixel(width, height, self.config.background);

        let risk = RiskLevel::from_score(analysis.overall);
        let title = format!("Overall {}% {}", analysis.overall, risk.label());
        self.draw_label(&mut chart, 16, 16, &title, to_rgb(risk.color()));

        let mut y = 60u32;
        self.draw_section(&mut chart, &mut y, "Categories", &categories);
        if !manipulation.is_empty() {
            self.draw_section(&mut chart, &mut y, "Manipulation Types", &manipulation);
        }

        chart
    }

    fn draw_section(&self, chart: &mut RgbImage, y: &mut u32, heading: &str, items: &[(&str, u32)]) {
        self.draw_label(chart, 16, *y, heading, self.config.foreground);
        *y += SECTION_GAP;
        for (label, score) in items {
            self.draw_bar_row(chart, *y, label, *score);
            *y += ROW_HEIGHT;
        }
    }

    fn draw_bar_row(&self, chart: &mut RgbImage, y: u32, label: &str, score: u32) {
        let score = score.min(100);
        self.draw_label(chart, 16, y + 2, label, self.config.foreground);

        draw_filled_rect_mut(
            chart,
            Rect::at(LABEL_WIDTH as i32, y as i32).of_size(BAR_WIDTH, BAR_HEIGHT),
            self.config.track,
        );

        let filled = BAR_WIDTH * score / 100;
        if filled > 0 {
            let color = to_rgb(RiskLevel::from_score(score).color());
            draw_filled_rect_mut(
                chart,
                Rect::at(LABEL_WIDTH as i32, y as i32).of_size(filled, BAR_HEIGHT),
                color,
            );
        }

        self.draw_label(
            chart,
            LABEL_WIDTH + BAR_WIDTH + 10,
            y + 2,
            &format!("{}%", score),
            self.config.foreground,
        );
    }

    /// Overlaid per-channel histogram, 2 px per bin, with values on the
    /// 0..=100 scale produced by the statistics pass.
    pub fn histogram_chart(&self, histogram: &ColorHistogram) -> RgbImage {
        let plot_height = 200u32;
        let margin = 20u32;
        let top = 40u32;
        let width = 256 * 2 + margin * 2;
        let height = top + plot_height + margin;

        let mut chart = RgbImage::from_pixel(width, height, self.config.background);
        self.draw_label(&mut chart, margin, 12, "Color Histogram", self.config.foreground);

        let channels = [
            (&histogram.r, Rgb([230, 40, 40])),
            (&histogram.g, Rgb([40, 180, 40])),
            (&histogram.b, Rgb([40, 80, 230])),
        ];

        for (values, color) in channels {
            for (bin, value) in values.iter().take(256).enumerate() {
                let bar = ((value.clamp(0.0, 100.0) / 100.0) * plot_height as f64).round() as u32;
                if bar == 0 {
                    continue;
                }
                let x = margin + bin as u32 * 2;
                let y = top + plot_height - bar;
                self.blend_rect(&mut chart, x, y, 2, bar, color, self.config.overlay_opacity);
            }
        }

        draw_filled_rect_mut(
            &mut chart,
            Rect::at(margin as i32, (top + plot_height) as i32).of_size(256 * 2, 1),
            self.config.foreground,
        );

        if self.config.show_legend {
            self.draw_legend(
                &mut chart,
                &[
                    ("Red", Rgb([230, 40, 40])),
                    ("Green", Rgb([40, 180, 40])),
                    ("Blue", Rgb([40, 80, 230])),
                ],
            );
        }

        chart
    }

    pub fn category_chart_png(&self, analysis: &AnalysisResult) -> Result<Vec<u8>> {
        encode_png(&self.category_chart(analysis))
    }

    pub fn histogram_chart_png(&self, histogram: &ColorHistogram) -> Result<Vec<u8>> {
        encode_png(&self.histogram_chart(histogram))
    }

    fn blend_rect(&self, image: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>, opacity: f32) {
        let (width, height) = image.dimensions();

        for y in y0..(y0 + h).min(height) {
            for x in x0..(x0 + w).min(width) {
                let original = image.get_pixel(x, y);
                let blended = Rgb([
                    ((1.0 - opacity) * original[0] as f32 + opacity * color[0] as f32) as u8,
                    ((1.0 - opacity) * original[1] as f32 + opacity * color[1] as f32) as u8,
                    ((1.0 - opacity) * original[2] as f32 + opacity * color[2] as f32) as u8,
                ]);
                image.put_pixel(x, y, blended);
            }
        }
    }

    /// Renders `text` in the built-in 3x5 face; characters without a glyph
    /// are drawn as solid blocks.
    fn draw_label(&self, image: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
        let scale = self.config.label_scale.max(1);
        let advance = (GLYPH_WIDTH + 1) * scale;

        for (i, c) in text.chars().enumerate() {
            let cx = x + i as u32 * advance;
            if cx + GLYPH_WIDTH * scale > image.width() {
                break;
            }

            for (row, bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    let px = cx + col * scale;
                    let py = y + row as u32 * scale;
                    if py + scale <= image.height() {
                        draw_filled_rect_mut(
                            image,
                            Rect::at(px as i32, py as i32).of_size(scale, scale),
                            color,
                        );
                    }
                }
            }
        }
    }

    fn draw_legend(&self, image: &mut RgbImage, items: &[(&str, Rgb<u8>)]) {
        let width = image.width();
        let scale = self.config.label_scale.max(1);
        let line = GLYPH_HEIGHT * scale + 6;
        let legend_width = 90u32;
        let legend_x = width.saturating_sub(legend_width + 20);
        let legend_y = 44u32;

        for (i, (label, color)) in items.iter().enumerate() {
            let item_y = legend_y + i as u32 * line;
            draw_filled_rect_mut(
                image,
                Rect::at(legend_x as i32, item_y as i32).of_size(14, GLYPH_HEIGHT * scale),
                *color,
            );
            self.draw_label(image, legend_x + 20, item_y, label, self.config.foreground);
        }
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_rgb((r, g, b): (f32, f32, f32)) -> Rgb<u8> {
    Rgb([
        (r.clamp(0.0, 1.0) * 255.0) as u8,
        (g.clamp(0.0, 1.0) * 255.0) as u8,
        (b.clamp(0.0, 1.0) * 255.0) as u8,
    ])
}

/// Rows top to bottom, three bits each, most significant bit leftmost.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [7, 5, 5, 5, 7],
        '1' => [2, 6, 2, 2, 7],
        '2' => [7, 1, 7, 4, 7],
        '3' => [7, 1, 3, 1, 7],
        '4' => [5, 5, 7, 1, 1],
        '5' => [7, 4, 7, 1, 7],
        '6' => [7, 4, 7, 5, 7],
        '7' => [7, 1, 1, 1, 1],
        '8' => [7, 5, 7, 5, 7],
        '9' => [7, 5, 7, 1, 7],
        'A' => [2, 5, 7, 5, 5],
        'B' => [6, 5, 6, 5, 6],
        'C' => [3, 4, 4, 4, 3],
        'D' => [6, 5, 5, 5, 6],
        'E' => [7, 4, 6, 4, 7],
        'F' => [7, 4, 6, 4, 4],
        'G' => [3, 4, 5, 5, 3],
        'H' => [5, 5, 7, 5, 5],
        'I' => [7, 2, 2, 2, 7],
        'J' => [1, 1, 1, 5, 2],
        'K' => [5, 5, 6, 5, 5],
        'L' => [4, 4, 4, 4, 7],
        'M' => [5, 7, 7, 5, 5],
        'N' => [6, 5, 5, 5, 5],
        'O' => [2, 5, 5, 5, 2],
        'P' => [6, 5, 6, 4, 4],
        'Q' => [2, 5, 5, 6, 3],
        'R' => [6, 5, 6, 5, 5],
        'S' => [3, 4, 2, 1, 6],
        'T' => [7, 2, 2, 2, 2],
        'U' => [5, 5, 5, 5, 7],
        'V' => [5, 5, 5, 5, 2],
        'W' => [5, 5, 7, 7, 5],
        'X' => [5, 5, 2, 5, 5],
        'Y' => [5, 5, 2, 2, 2],
        'Z' => [7, 1, 2, 4, 7],
        '%' => [5, 1, 2, 4, 5],
        '-' => [0, 0, 7, 0, 0],
        '.' => [0, 0, 0, 0, 2],
        ',' => [0, 0, 0, 2, 4],
        ':' => [0, 2, 0, 2, 0],
        '/' => [1, 1, 2, 4, 4],
        '(' => [1, 2, 2, 2, 1],
        ')' => [4, 2, 2, 2, 4],
        ' ' => [0, 0, 0, 0, 0],
        _ => [7, 7, 7, 7, 7],
    }
}
