//! A4 authenticity report rendered with the PDF builtin Helvetica faces.
//!
//! Builtin fonts only cover WinAnsi, so every string drawn here sticks to
//! ASCII.

use chrono::{DateTime, NaiveDateTime, Utc};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt, Rgb,
};

use crate::{
    AnalysisResult, ImageHashes, MetadataResult, ModelScores, detection::RiskLevel,
    error::Result,
};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN_X: f32 = 50.0;
const INDENT_X: f32 = 70.0;
const FOOTER_Y: f32 = 50.0;
/// Lowest baseline body text may use before it continues on a new page.
const CONTENT_FLOOR: f32 = FOOTER_Y + 30.0;
const MAX_MANIPULATION_ROWS: usize = 10;

const ACCENT: (f32, f32, f32) = (0.2, 0.4, 1.0);
const SUBTLE: (f32, f32, f32) = (0.3, 0.3, 0.3);
const MUTED: (f32, f32, f32) = (0.4, 0.4, 0.4);
const FAINT: (f32, f32, f32) = (0.5, 0.5, 0.5);
const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);

/// Everything one report page set is drawn from.
pub struct ReportContent<'a> {
    pub analysis: &'a AnalysisResult,
    pub metadata: &'a MetadataResult,
    pub hashes: Option<&'a ImageHashes>,
    pub file_name: Option<&'a str>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Copy)]
enum Face {
    Regular,
    Bold,
    Oblique,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn get(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
            Face::Oblique => &self.oblique,
        }
    }
}

/// Top-down text cursor over a growing list of pages. Coordinates are PDF
/// points measured from the bottom-left corner.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    y: f32,
    pages: usize,
    footer: String,
}

impl PageWriter {
    fn new(title: &str, footer: String) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "Page 1");
        let fonts = Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
            oblique: doc.add_builtin_font(BuiltinFont::HelveticaOblique)?,
        };
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            fonts,
            y: PAGE_HEIGHT - 50.0,
            pages: 1,
            footer,
        })
    }

    fn text(&self, text: &str, x: f32, y: f32, size: f32, face: Face, color: (f32, f32, f32)) {
        let (r, g, b) = color;
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
        self.layer
            .use_text(text, size, pt(x), pt(y), self.fonts.get(face));
    }

    fn draw_footer(&self) {
        self.text(&self.footer, MARGIN_X, FOOTER_Y, 8.0, Face::Regular, FAINT);
        self.text(
            "AI Insight Pro - Professional AI-Image Authenticity Analyzer",
            300.0,
            FOOTER_Y,
            8.0,
            Face::Regular,
            FAINT,
        );
    }

    fn ensure_room(&mut self) {
        if self.y >= CONTENT_FLOOR {
            return;
        }

        self.draw_footer();
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            pt(PAGE_WIDTH),
            pt(PAGE_HEIGHT),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - 50.0;
    }

    /// Draws at the cursor, then moves it down by `advance`.
    fn line(&mut self, text: &str, x: f32, size: f32, face: Face, color: (f32, f32, f32), advance: f32) {
        self.ensure_room();
        self.text(text, x, self.y, size, face, color);
        self.y -= advance;
    }

    fn heading(&mut self, text: &str) {
        self.line(text, MARGIN_X, 12.0, Face::Bold, BLACK, 20.0);
    }

    fn bullet(&mut self, label: &str, score: u32) {
        self.line(
            &format!("- {}: {}%", label, score),
            INDENT_X,
            10.0,
            Face::Regular,
            BLACK,
            18.0,
        );
    }

    fn skip(&mut self, gap: f32) {
        self.y -= gap;
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.draw_footer();
        Ok(self.doc.save_to_bytes()?)
    }
}

fn pt(value: f32) -> Mm {
    Mm::from(Pt(value))
}

fn nonzero(scores: &ModelScores) -> Vec<(&str, u32)> {
    scores
        .iter()
        .filter(|(_, score)| **score > 0)
        .map(|(name, score)| (name.as_str(), *score))
        .collect()
}

fn display_date(iso: &str) -> String {
    NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| iso.to_string())
}

pub struct PdfReportGenerator;

impl PdfReportGenerator {
    pub fn generate(content: &ReportContent<'_>) -> Result<Vec<u8>> {
        let footer = format!(
            "Generated: {}",
            content.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let mut page = PageWriter::new("AI Insight Pro Report", footer)?;

        page.text("AI Insight Pro", MARGIN_X, page.y, 24.0, Face::Bold, ACCENT);
        page.text(
            "Authenticity Analysis Report",
            MARGIN_X,
            page.y - 30.0,
            14.0,
            Face::Oblique,
            SUBTLE,
        );
        page.skip(80.0);

        Self::write_scores(&mut page, content.analysis);
        Self::write_metadata(&mut page, content.metadata);

        if let Some(hashes) = content.hashes {
            page.skip(20.0);
            page.heading("Image Hashes:");
            page.line(&format!("MD5: {}", hashes.md5), INDENT_X, 9.0, Face::Regular, MUTED, 16.0);
            page.line(
                &format!("SHA256: {}", hashes.sha256),
                INDENT_X,
                9.0,
                Face::Regular,
                MUTED,
                16.0,
            );
            if let Some(perceptual) = &hashes.perceptual {
                page.line(
                    &format!("Perceptual Hash: {}", perceptual),
                    INDENT_X,
                    9.0,
                    Face::Regular,
                    MUTED,
                    16.0,
                );
            }
        }

        if let Some(file_name) = content.file_name {
            page.skip(10.0);
            page.line(&format!("File: {}", file_name), MARGIN_X, 9.0, Face::Regular, FAINT, 16.0);
        }

        log::debug!("report rendered on {} page(s)", page.pages);
        page.finish()
    }

    fn write_scores(page: &mut PageWriter, analysis: &AnalysisResult) {
        let risk = RiskLevel::from_score(analysis.overall);
        page.text("Overall AI Likelihood Score:", MARGIN_X, page.y, 14.0, Face::Bold, BLACK);
        page.text(
            &format!("{}%", analysis.overall),
            250.0,
            page.y,
            20.0,
            Face::Bold,
            risk.color(),
        );
        page.text(risk.label(), 320.0, page.y, 10.0, Face::Oblique, SUBTLE);
        page.skip(50.0);

        let categories = &analysis.categories;
        page.line("Category Breakdown:", MARGIN_X, 12.0, Face::Bold, BLACK, 25.0);
        page.bullet("Generative AI", categories.genai);
        page.bullet("Face Manipulation", categories.face_manipulation);
        for (label, score) in [
            ("Body Manipulation", categories.body_manipulation),
            ("Deepfake", categories.deepfake),
            ("Inpainting", categories.inpainting),
            ("Style Transfer", categories.style_transfer),
        ] {
            if score > 0 {
                page.bullet(label, score);
            }
        }
        page.skip(20.0);

        let mut manipulation = nonzero(&analysis.manipulation);
        manipulation.sort_by(|a, b| b.1.cmp(&a.1));
        manipulation.truncate(MAX_MANIPULATION_ROWS);

        for (title, rows) in [
            ("Diffusion Models Detected:", nonzero(&analysis.diffusion)),
            ("GAN Models Detected:", nonzero(&analysis.gan)),
            ("LLM-based Generation Detected:", nonzero(&analysis.llm)),
            ("Manipulation Types Detected:", manipulation),
        ] {
            if rows.is_empty() {
                continue;
            }
            page.heading(title);
            for (name, score) in rows {
                page.bullet(name, score);
            }
            page.skip(20.0);
        }
    }

    fn write_metadata(page: &mut PageWriter, metadata: &MetadataResult) {
        page.skip(20.0);
        page.heading("Image Metadata:");

        let mut rows = Vec::new();
        if let Some(camera) = metadata.camera() {
            rows.push(format!("Camera: {}", camera));
        }
        if let Some(date) = &metadata.date {
            rows.push(format!("Date: {}", display_date(date)));
        }
        if let Some(gps) = &metadata.gps {
            rows.push(format!("GPS: {}", gps));
        }
        if let (Some(w), Some(h)) = (metadata.width, metadata.height) {
            rows.push(format!("Dimensions: {} x {}", w, h));
        }
        if rows.is_empty() {
            rows.push("No camera metadata available".to_string());
        }

        for row in rows {
            page.line(&row, INDENT_X, 10.0, Face::Regular, BLACK, 18.0);
        }
    }
}
