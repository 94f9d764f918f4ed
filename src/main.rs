//! eperm CLI: evidence-path question answering over knowledge graphs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use eperm::batch::checkpoint::latest_checkpoint;
use eperm::batch::{BatchInferenceProcessor, Checkpoint, DatasetRunner};
use eperm::config::EpermConfig;
use eperm::dataset::{self, DEFAULT_TRIPLE_LIMIT, WebQspVocab};
use eperm::evidence::render_path;
use eperm::graph::{EntityNames, KnowledgeGraph};
use eperm::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "eperm", version, about = "Evidence-path reasoning over knowledge graphs")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the reduced fast profile when no config file is given.
    #[arg(long, global = true)]
    fast: bool,

    /// Log filter, e.g. `debug` or `eperm=trace` (overrides RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DatasetFormat {
    /// One `{id, question, answers, kg}` object per line.
    Native,
    /// WebQSP samples indexing into entities.txt / relations.txt.
    Webqsp,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question against a knowledge graph file.
    Ask {
        /// Knowledge graph JSON file.
        #[arg(long)]
        graph: PathBuf,

        /// Optional id -> display name JSON map.
        #[arg(long)]
        names: Option<PathBuf>,

        /// Print the detailed answer as JSON.
        #[arg(long)]
        json: bool,

        /// The question.
        question: String,
    },

    /// Run a dataset through the batch processor with checkpoints.
    Batch {
        /// Dataset file (JSON lines).
        #[arg(long)]
        dataset: PathBuf,

        #[arg(long, value_enum, default_value = "native")]
        format: DatasetFormat,

        /// Directory holding entities.txt and relations.txt (WebQSP only).
        #[arg(long)]
        vocab_dir: Option<PathBuf>,

        /// Optional id -> display name JSON map.
        #[arg(long)]
        names: Option<PathBuf>,

        /// Process at most this many samples.
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum triples per WebQSP subgraph.
        #[arg(long, default_value_t = DEFAULT_TRIPLE_LIMIT)]
        triple_limit: usize,

        /// Where checkpoints and final results are written.
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,

        /// Continue from the newest checkpoint in the results directory.
        #[arg(long)]
        resume: bool,
    },

    /// Show knowledge graph statistics.
    Stats {
        #[arg(long)]
        graph: PathBuf,
    },

    /// Extract the k-hop subgraph around seed entities.
    Subgraph {
        #[arg(long)]
        graph: PathBuf,

        /// Seed entity ids, comma-separated.
        #[arg(long)]
        seeds: String,

        #[arg(long, default_value = "2")]
        hops: usize,

        #[arg(long, default_value = "50")]
        max_nodes: usize,

        /// Write the subgraph here instead of printing it.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Enumerate bounded directed paths between two entities.
    Paths {
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long, default_value = "3")]
        max_length: usize,

        #[arg(long, default_value = "10")]
        max_paths: usize,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(cli.config.as_deref(), cli.fast)?;

    match cli.command {
        Commands::Ask {
            graph,
            names,
            json,
            question,
        } => {
            let kg = KnowledgeGraph::load_json(&graph)?;
            let names = load_names(names.as_deref())?;
            let pipeline = Orchestrator::from_config(config, kg, names)?;
            let detailed = pipeline.answer_question_detailed(&question)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&detailed).into_diagnostic()?);
            } else {
                println!("Question:   {}", detailed.question);
                println!("Answer:     {}", detailed.answer);
                println!("Confidence: {:.2}", detailed.confidence);
                println!("Reasoning:  {}", detailed.reasoning);
                if !detailed.evidence_paths.is_empty() {
                    println!("Evidence ({}):", detailed.num_evidence_paths);
                    for (i, path) in detailed.evidence_paths.iter().enumerate() {
                        println!("  {}. [{:.3}] {}", i + 1, path.score, path.path);
                    }
                }
            }
        }

        Commands::Batch {
            dataset,
            format,
            vocab_dir,
            names,
            limit,
            triple_limit,
            results_dir,
            resume,
        } => {
            let items = match format {
                DatasetFormat::Native => dataset::load_jsonl(&dataset, limit)?,
                DatasetFormat::Webqsp => {
                    let dir = vocab_dir
                        .clone()
                        .or_else(|| dataset.parent().map(Path::to_path_buf))
                        .unwrap_or_default();
                    let vocab = WebQspVocab::load(&dir)?;
                    dataset::load_webqsp(&dataset, &vocab, limit, triple_limit)?
                }
            };

            let names = load_names(names.as_deref())?;
            let pipeline = Orchestrator::from_config(config.clone(), KnowledgeGraph::new(), names)?;
            let mut processor = BatchInferenceProcessor::new(
                config.batch,
                pipeline.path_finder().clone(),
                pipeline.predictor().clone(),
            );
            if let Some(client) = pipeline.client() {
                processor = processor.with_fallback_client(client.clone());
            }

            let checkpoint = if resume {
                match latest_checkpoint(&results_dir)? {
                    Some(path) => {
                        println!("Resuming from {}", path.display());
                        Some(Checkpoint::load(&path)?)
                    }
                    None => None,
                }
            } else {
                None
            };

            let outcome = DatasetRunner::new(&processor, &results_dir).run(&items, checkpoint)?;
            let stats = &outcome.stats;
            println!("Processed:  {}/{}", stats.processed, stats.total_samples);
            println!("Correct:    {} ({:.1}%)", stats.correct, stats.accuracy() * 100.0);
            println!("Errors:     {}", stats.errors);
            println!("Avg time:   {:.2}s per sample", stats.avg_time_per_sample);
            println!("Results:    {}", outcome.final_path.display());
        }

        Commands::Stats { graph } => {
            let kg = KnowledgeGraph::load_json(&graph)?;
            let stats = kg.stats();
            println!("Entities:       {}", stats.num_entities);
            println!("Relations:      {}", stats.num_relations);
            println!("Entity types:   {}", stats.num_entity_types);
            println!("Relation types: {}", stats.num_relation_types);
        }

        Commands::Subgraph {
            graph,
            seeds,
            hops,
            max_nodes,
            output,
        } => {
            let kg = KnowledgeGraph::load_json(&graph)?;
            let seeds: Vec<String> = seeds
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if seeds.is_empty() {
                miette::bail!("no seed entities provided");
            }
            let subgraph = kg.k_hop_subgraph(&seeds, hops, max_nodes);
            match output {
                Some(path) => {
                    subgraph.save_json(&path)?;
                    println!(
                        "Wrote {} entities and {} relations to {}",
                        subgraph.len(),
                        subgraph.relation_count(),
                        path.display()
                    );
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(&subgraph).into_diagnostic()?);
                }
            }
        }

        Commands::Paths {
            graph,
            from,
            to,
            max_length,
            max_paths,
        } => {
            let kg = KnowledgeGraph::load_json(&graph)?;
            let paths = kg.find_paths(&from, &to, max_length, max_paths);
            if paths.is_empty() {
                println!("No paths from \"{from}\" to \"{to}\" within {max_length} hops.");
            } else {
                let names = EntityNames::new();
                println!("Paths ({}):", paths.len());
                for (i, path) in paths.iter().enumerate() {
                    println!("  {}. {}", i + 1, render_path(path, &kg, &names));
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, fast: bool) -> Result<EpermConfig> {
    match path {
        Some(path) => Ok(EpermConfig::load(path)?),
        None => {
            let mut config = if fast {
                EpermConfig::fast()
            } else {
                EpermConfig::default()
            };
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn load_names(path: Option<&Path>) -> Result<Arc<EntityNames>> {
    let names = match path {
        Some(path) => EntityNames::load_json(path)?,
        None => EntityNames::new(),
    };
    Ok(Arc::new(names))
}
