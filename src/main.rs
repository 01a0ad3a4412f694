use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::{SeedableRng, rngs::StdRng};

use image_insight::{
    InsightAnalyzer,
    config::{self, Config},
    detection::RiskLevel,
    hash::HashService,
    report::{
        pdf::{PdfReportGenerator, ReportContent},
        visualization::ChartRenderer,
    },
    server,
};

/// Image authenticity analyzer: AI-generation likelihood, EXIF metadata,
/// hashes and reports, as a CLI or an HTTP API.
#[derive(Parser)]
#[command(name = "image-insight", version)]
struct Cli {
    /// Path to a TOML configuration file. Every section is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Score an image for AI generation and manipulation.
    Analyze {
        path: PathBuf,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print EXIF metadata.
    Metadata { path: PathBuf },
    /// Print MD5, SHA-256 and perceptual hashes.
    Hash { path: PathBuf },
    /// Print image statistics and quality metrics.
    Stats {
        path: PathBuf,
        /// Also render the color histogram to this PNG.
        #[arg(long)]
        histogram: Option<PathBuf>,
    },
    /// Compare two images by content and perceptual hash.
    Compare { first: PathBuf, second: PathBuf },
    /// Write a PDF authenticity report.
    Report {
        path: PathBuf,
        #[arg(short, long, default_value = "report.pdf")]
        output: PathBuf,
    },
}

fn open(path: &Path, config: &Config) -> anyhow::Result<InsightAnalyzer> {
    let analyzer = InsightAnalyzer::open(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .with_config(config.analysis.clone());
    Ok(analyzer)
}

fn rng(config: &Config) -> StdRng {
    match config.analysis.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(cfg).await?;
        }

        Commands::Analyze { path, json } => {
            let analyzer = open(&path, &cfg)?;
            let result = analyzer.analyze(&mut rng(&cfg));

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            let risk = RiskLevel::from_score(result.overall);
            println!("File:    {}", analyzer.upload().file_name);
            println!("Overall: {}% ({})", result.overall, risk.label());
            println!();
            println!("Categories:");
            let c = &result.categories;
            println!("  Generative AI:     {}%", c.genai);
            println!("  Face Manipulation: {}%", c.face_manipulation);
            println!("  Body Manipulation: {}%", c.body_manipulation);
            println!("  Deepfake:          {}%", c.deepfake);
            println!("  Inpainting:        {}%", c.inpainting);
            println!("  Style Transfer:    {}%", c.style_transfer);

            let mut diffusion: Vec<_> = result.diffusion.iter().filter(|(_, v)| **v > 0).collect();
            diffusion.sort_by(|a, b| b.1.cmp(a.1));
            if !diffusion.is_empty() {
                println!();
                println!("Top diffusion models:");
                for (model, score) in diffusion.into_iter().take(5) {
                    println!("  {:<18} {}%", model, score);
                }
            }

            if let Some(details) = &result.technical_details {
                println!();
                println!(
                    "Entropy {:.2} bits, noise {:.3}, sharpness {:.3}, edge density {:.3}",
                    details.entropy, details.noise_level, details.sharpness, details.edge_density
                );
            }
        }

        Commands::Metadata { path } => {
            let analyzer = open(&path, &cfg)?;
            println!("{}", serde_json::to_string_pretty(&analyzer.extract_metadata())?);
        }

        Commands::Hash { path } => {
            let hashes = open(&path, &cfg)?.hashes();
            println!("MD5:        {}", hashes.md5);
            println!("SHA-256:    {}", hashes.sha256);
            println!(
                "Perceptual: {}",
                hashes.perceptual.as_deref().unwrap_or("(image could not be decoded)")
            );
        }

        Commands::Stats { path, histogram } => {
            let analyzer = open(&path, &cfg)?;
            let stats = analyzer.statistics()?;
            let quality = analyzer.quality()?;

            println!("Dimensions:      {}x{} (aspect {:.2})", stats.width, stats.height, stats.aspect_ratio);
            println!("Format:          {}", stats.format);
            println!("Channels:        {}", stats.color_depth);
            println!("Dominant colors: {}", stats.dominant_colors.join(" "));
            println!("Bytes/pixel:     {:.3}", quality.bytes_per_pixel);
            println!("Compression:     {:.1}%", quality.compression_ratio);
            println!(
                "Quality:         {} ({:?})",
                quality.quality_score, quality.quality_level
            );
            for detail in &quality.artifacts.details {
                println!("  ! {}", detail);
            }

            if let Some(out) = histogram {
                let png = ChartRenderer::new().histogram_chart_png(&stats.histogram)?;
                std::fs::write(&out, png)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                println!("Histogram written to {}", out.display());
            }
        }

        Commands::Compare { first, second } => {
            let a = open(&first, &cfg)?.hashes();
            let b = open(&second, &cfg)?.hashes();
            let comparison = HashService::compare(&a, &b)?;

            println!("Identical bytes: {}", comparison.identical);
            match (comparison.hamming_distance, comparison.similarity) {
                (Some(distance), Some(similarity)) => {
                    println!("Hamming distance: {}/64", distance);
                    println!("Similarity:       {:.1}%", similarity * 100.0);
                }
                _ => println!("Perceptual comparison unavailable (undecodable image)"),
            }
        }

        Commands::Report { path, output } => {
            let analyzer = open(&path, &cfg)?;
            let analysis = analyzer.analyze(&mut rng(&cfg));
            let metadata = analyzer.extract_metadata();
            let hashes = analyzer.hashes();

            let pdf = PdfReportGenerator::generate(&ReportContent {
                analysis: &analysis,
                metadata: &metadata,
                hashes: Some(&hashes),
                file_name: Some(&analyzer.upload().file_name),
                generated_at: Utc::now(),
            })?;
            std::fs::write(&output, pdf)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Report written to {}", output.display());
        }
    }

    Ok(())
}
