use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docrag_llm::AnswerMode;

/// Ask questions about a folder of text documents.
#[derive(Parser, Debug)]
#[command(name = "docrag", version, about = "Local document retrieval and grounded answers")]
pub struct CliArgs {
    /// Directory holding config.toml; relative paths in it resolve against this
    #[arg(long, global = true, default_value = ".", env = "DOCRAG_CONFIG_DIR")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the index from a folder of .txt/.md files
    Ingest {
        /// Corpus folder (defaults to data.corpus_dir)
        dir: Option<PathBuf>,
    },
    /// Show the chunks most similar to a question
    Query {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Answer a question from retrieved chunks
    Ask {
        question: String,
        #[arg(long, default_value_t = AnswerMode::Online)]
        mode: AnswerMode,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Run the built-in question set and write a JSON report
    Eval {
        #[arg(long, default_value = "evaluation_results.json")]
        output: PathBuf,
        /// Only score retrieval; skip answer generation
        #[arg(long)]
        no_answers: bool,
        #[arg(long, default_value_t = AnswerMode::Offline)]
        mode: AnswerMode,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let args = CliArgs::try_parse_from(["docrag", "ask", "What are the payment terms?", "--mode", "offline"]).unwrap();
        assert!(matches!(args.command, Command::Ask { mode: AnswerMode::Offline, top_k: None, .. }));

        let args = CliArgs::try_parse_from(["docrag", "query", "q", "--top-k", "3", "--config-dir", "/tmp"]).unwrap();
        assert_eq!(args.config_dir, PathBuf::from("/tmp"));
        assert!(matches!(args.command, Command::Query { top_k: Some(3), .. }));

        assert!(CliArgs::try_parse_from(["docrag", "ask", "q", "--mode", "cloud"]).is_err());
    }
}
