//! Minimal driver: translate a novel file chapter by chapter.
//!
//! Chapters are separated by lines containing only `***`. Credentials come
//! from `ANTHROPIC_API_KEY`, or `ANTHROPIC_API_KEYS` (comma-separated) to
//! enable rotation.
//!
//! Usage: `translate <input-file> [output-file]`

use chapterloom::graph::MemoryGraph;
use chapterloom::pipeline::{Chapter, NovelPipeline};
use llm::anthropic::AnthropicProvider;
use llm::rotate::RotatingProvider;
use llm::LlmProvider;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let input = args.next().ok_or("usage: translate <input-file> [output-file]")?;
    let output = args.next();

    let provider = build_provider()?;
    let graph = Arc::new(MemoryGraph::new());
    let pipeline = NovelPipeline::new(provider, graph);

    let text = std::fs::read_to_string(&input)?;
    let chapters: Vec<Chapter> = text
        .split("\n***\n")
        .filter(|part| !part.trim().is_empty())
        .enumerate()
        .map(|(i, part)| Chapter::new(i as u32 + 1, part.trim()))
        .collect();

    println!("Translating {} chapters from {input}", chapters.len());
    let report = pipeline.process_document(chapters).await?;

    for chapter in &report.chapters {
        println!(
            "chapter {:>3}: {} ({} rejections)",
            chapter.index,
            chapter.outcome.as_str(),
            chapter.rejection_count
        );
    }

    let pending = pipeline.resolver().pending_reviews();
    if !pending.is_empty() {
        println!("{} entity merges await manual review", pending.len());
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &report.document)?;
            println!("Wrote translation to {path}");
        }
        None => println!("\n{}", report.document),
    }
    Ok(())
}

fn build_provider() -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
    if let Ok(keys) = std::env::var("ANTHROPIC_API_KEYS") {
        let providers: Vec<Arc<dyn LlmProvider>> = keys
            .split(',')
            .map(|key| Arc::new(AnthropicProvider::new(key.trim())) as Arc<dyn LlmProvider>)
            .collect();
        return Ok(Arc::new(RotatingProvider::new(providers)?));
    }
    Ok(Arc::new(AnthropicProvider::from_env()?))
}
