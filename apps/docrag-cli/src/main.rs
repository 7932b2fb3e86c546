mod cli;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use docrag_core::config::Config;
use docrag_core::types::ContextRecord;
use docrag_llm::{AnswerGenerator, AnswerMode, LlmSettings};
use docrag_rag::eval::{EvalRecord, EvalReport, DEFAULT_QUESTIONS, RELEVANCE_THRESHOLD};
use docrag_rag::RagService;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = Config::load_from(&args.config_dir)
        .with_context(|| format!("loading config from {}", args.config_dir.display()))?;
    let service = RagService::from_config(&config).context("starting rag service")?;

    match args.command {
        Command::Ingest { dir } => {
            let report = match dir {
                Some(dir) => service.rebuild_from(&dir),
                None => service.rebuild(),
            }?;
            println!(
                "Indexed {} documents into {} chunks (dim {}) at {}",
                report.documents,
                report.chunks,
                report.dim,
                service.retriever().paths().dir.display()
            );
        }
        Command::Query { question, top_k } => {
            let top_k = top_k.unwrap_or(service.default_top_k());
            let contexts = service.retrieve_top(&question, top_k)?;
            write_contexts(&mut io::stdout().lock(), &contexts)?;
        }
        Command::Ask { question, mode, top_k } => {
            let top_k = top_k.unwrap_or(service.default_top_k());
            let generator = AnswerGenerator::new(config.section::<LlmSettings>("llm")?);
            let answer = ask(&service, &generator, &question, mode, top_k, &mut io::stdout()).await?;
            println!("\nAnswer ({mode}):\n{answer}");
        }
        Command::Eval { output, no_answers, mode } => {
            let generator = if no_answers { None } else { Some(AnswerGenerator::new(config.section("llm")?)) };
            let report = run_evaluation(&service, generator.as_ref(), mode).await;
            report.write_json(&output)?;
            print_summary(&report);
            println!("Results saved to {}", output.display());
        }
    }
    Ok(())
}

fn write_contexts(out: &mut impl Write, contexts: &[ContextRecord]) -> io::Result<()> {
    if contexts.is_empty() {
        writeln!(out, "No context retrieved.")?;
    }
    for (i, c) in contexts.iter().enumerate() {
        writeln!(out, "[{}] {} #{} score={:.3}", i + 1, c.source, c.chunk_id, c.score)?;
        writeln!(out, "    {}", c.text.replace('\n', " "))?;
    }
    out.flush()
}

/// Retrieves, shows the contexts, then generates. The contexts are written
/// even when generation fails.
async fn ask(
    service: &RagService,
    generator: &AnswerGenerator,
    question: &str,
    mode: AnswerMode,
    top_k: usize,
    out: &mut impl Write,
) -> Result<String> {
    let contexts = service.retrieve_top(question, top_k)?;
    write_contexts(out, &contexts)?;
    Ok(generator.generate(question, &contexts, mode).await?)
}

async fn run_evaluation(service: &RagService, generator: Option<&AnswerGenerator>, mode: AnswerMode) -> EvalReport {
    let mut report = EvalReport::default();
    for (idx, question) in DEFAULT_QUESTIONS.iter().enumerate() {
        info!(n = idx + 1, total = DEFAULT_QUESTIONS.len(), question, "evaluating");
        let contexts = match service.retrieve(question) {
            Ok(c) => c,
            Err(e) => {
                warn!(question, error = %e, "retrieval failed");
                report.push(EvalRecord::failure(question, e));
                continue;
            }
        };
        let record = match generator {
            Some(g) => match g.generate(question, &contexts, mode).await {
                Ok(answer) => EvalRecord::success(question, contexts, Some(answer)),
                Err(e) => {
                    warn!(question, error = %e, "answer generation failed");
                    EvalRecord::answer_failed(question, contexts, e)
                }
            },
            None => EvalRecord::success(question, contexts, None),
        };
        report.push(record);
    }
    report
}

fn print_summary(report: &EvalReport) {
    let s = report.summary();
    println!("Questions:               {}", s.total);
    println!("Successful:              {}", s.successful);
    println!("Avg retrieval score:     {:.3} (healthy > {RELEVANCE_THRESHOLD})", s.avg_retrieval_score);
    if s.answer_errors > 0 {
        println!("Answer errors:           {}", s.answer_errors);
    }
    if s.answered > 0 {
        println!(
            "\"Don't know\" answers:    {} ({:.1}%)",
            s.dont_know,
            s.dont_know as f32 / s.answered as f32 * 100.0
        );
    }
}
