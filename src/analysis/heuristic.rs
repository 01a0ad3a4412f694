//! Randomized "AI likelihood" scoring.
//!
//! Nothing here is a trained model: scores are random draws whose ranges are
//! chosen by file-name keywords and the pixel statistics from
//! [`ImageCharacteristics`]. The random source is injected so callers can
//! seed it.

use rand::Rng;

use crate::{AnalysisResult, CategoryScores, ModelScores, ScoreSource, analysis::characteristics::ImageCharacteristics};

const AI_NAME_KEYWORDS: [&str; 3] = ["ai", "generated", "test"];

/// (name, base, span): score = base + uniform integer in `[0, span)`.
type ScoreRange = (&'static str, u32, u32);

const DIFFUSION_AI: [ScoreRange; 12] = [
    ("Stable Diffusion", 45, 20),
    ("MidJourney", 20, 15),
    ("DALL-E 3", 15, 10),
    ("DALL-E 2", 10, 8),
    ("Flux", 8, 7),
    ("Firefly", 5, 5),
    ("Imagen", 3, 4),
    ("Leonardo AI", 2, 3),
    ("Reve", 1, 2),
    ("Qwen", 1, 2),
    ("Ideogram", 1, 2),
    ("Recraft", 0, 2),
];

const DIFFUSION_OTHER: [ScoreRange; 12] = [
    ("Stable Diffusion", 0, 15),
    ("MidJourney", 0, 10),
    ("DALL-E 3", 0, 8),
    ("DALL-E 2", 0, 5),
    ("Flux", 0, 4),
    ("Firefly", 0, 3),
    ("Imagen", 0, 2),
    ("Leonardo AI", 0, 2),
    ("Reve", 0, 2),
    ("Qwen", 0, 2),
    ("Ideogram", 0, 2),
    ("Recraft", 0, 1),
];

const GAN: [ScoreRange; 6] = [
    ("StyleGAN3", 0, 8),
    ("StyleGAN2", 0, 5),
    ("StyleGAN", 0, 4),
    ("BigGAN", 0, 3),
    ("ProGAN", 0, 2),
    ("PGGAN", 0, 2),
];

const LLM: [ScoreRange; 4] = [
    ("GPT-4 Vision", 0, 5),
    ("GPT-4o", 0, 4),
    ("Claude 3", 0, 3),
    ("Gemini Pro Vision", 0, 3),
];

const MANIPULATION: [ScoreRange; 14] = [
    ("Face Swap", 0, 12),
    ("Deepfake", 0, 10),
    ("Face Reenactment", 0, 8),
    ("Body Morphing", 0, 7),
    ("Age Progression/Regression", 0, 6),
    ("Expression Transfer", 0, 5),
    ("Hair Style Transfer", 0, 4),
    ("Inpainting", 0, 8),
    ("Object Removal", 0, 6),
    ("Style Transfer", 0, 5),
    ("Color Grading", 0, 4),
    ("Background Replacement", 0, 7),
    ("Super Resolution", 0, 3),
    ("Noise Reduction", 0, 2),
];

const OTHER: [ScoreRange; 3] = [
    ("Metadata Anomaly", 0, 5),
    ("Compression Artifacts", 0, 4),
    ("Watermark Removal", 0, 3),
];

pub fn is_ai_named(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    AI_NAME_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn score<R: Rng + ?Sized>(
        file_name: &str,
        characteristics: &ImageCharacteristics,
        rng: &mut R,
    ) -> AnalysisResult {
        let lower = file_name.to_lowercase();
        let mut diffusion = ModelScores::new();

        let mut overall = if is_ai_named(&lower) || characteristics.likely_ai() {
            let mut overall = draw(rng, 85, 15);

            let wan_signal = lower.contains("test")
                || (characteristics.has_faces && characteristics.color_complexity > 0.25)
                || rng.gen_bool(0.7);
            if wan_signal {
                let wan = draw(rng, 85, 15);
                diffusion.insert("Wan".into(), wan);
                overall = overall.max(wan);
            }

            fill(rng, &mut diffusion, &DIFFUSION_AI);
            overall
        } else {
            let mut overall = draw(rng, 0, 30);

            if characteristics.has_faces && rng.gen_bool(0.5) {
                let wan = draw(rng, 60, 30);
                diffusion.insert("Wan".into(), wan);
                overall = overall.max(wan);
            }

            fill(rng, &mut diffusion, &DIFFUSION_OTHER);
            overall
        };

        let mut gan = ModelScores::new();
        let mut llm = ModelScores::new();
        let mut manipulation = ModelScores::new();
        let mut other = ModelScores::new();
        fill(rng, &mut gan, &GAN);
        fill(rng, &mut llm, &LLM);
        fill(rng, &mut manipulation, &MANIPULATION);
        fill(rng, &mut other, &OTHER);

        overall = overall.min(100);
        let categories = derive_categories(&diffusion, &gan, &llm, &manipulation);

        AnalysisResult {
            overall,
            categories,
            diffusion,
            gan,
            llm,
            manipulation,
            other,
            technical_details: None,
            source: ScoreSource::Heuristic,
        }
    }
}

/// Rolls the per-model scores up into the headline categories.
pub fn derive_categories(
    diffusion: &ModelScores,
    gan: &ModelScores,
    llm: &ModelScores,
    manipulation: &ModelScores,
) -> CategoryScores {
    let get = |name: &str| manipulation.get(name).copied().unwrap_or(0);

    let genai = diffusion
        .values()
        .chain(gan.values())
        .chain(llm.values())
        .copied()
        .max()
        .unwrap_or(0);

    CategoryScores {
        genai: genai.min(100),
        face_manipulation: get("Face Swap").max(get("Deepfake")).max(get("Face Reenactment")).min(100),
        body_manipulation: get("Body Morphing").min(100),
        deepfake: get("Deepfake").min(100),
        inpainting: get("Inpainting").min(100),
        style_transfer: get("Style Transfer").max(get("Hair Style Transfer")).min(100),
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, base: u32, span: u32) -> u32 {
    if span == 0 {
        base
    } else {
        base + rng.gen_range(0..span)
    }
}

fn fill<R: Rng + ?Sized>(rng: &mut R, scores: &mut ModelScores, ranges: &[ScoreRange]) {
    for &(name, base, span) in ranges {
        scores.insert(name.to_string(), draw(rng, base, span));
    }
}
