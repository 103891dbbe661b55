// Research Agent - command line entry point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use research_agent::logging::init_logging;
use research_agent::services::research::resolver::DOCUMENT_EXTENSIONS;
use research_agent::services::research::{
    ExecutionConfig, LocalResourceResolver, MemoryBridge, ResearchExecutor, ResearchPlanner,
    SummaryArchive,
};
use research_agent::storage::{AgentConfig, ConfigService, MemoryStore};
use research_agent_core::RateLimiter;
use research_agent_llm::{create_provider, ModelBackend, ResearchModel};
use research_agent_tools::{DocumentTool, HttpWebTool, LocalDocumentIndex, WebTool};

#[derive(Parser, Debug)]
#[command(name = "research-agent")]
#[command(about = "Plan-and-execute research assistant over the web and local documents")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a question and print the answer
    Ask {
        query: String,
        /// Show what would be done without calling any tool
        #[arg(long)]
        dry_run: bool,
        /// Save the answer to the summaries archive
        #[arg(long)]
        save: bool,
        /// Print the plan before executing it
        #[arg(long)]
        show_plan: bool,
    },
    /// Index a document, or every supported file in a directory
    Index { path: PathBuf },
    /// Search indexed documents
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },
    /// Show the summary of an indexed document
    Document { id: String },
    /// List indexed documents
    Documents,
    /// Saved research summaries
    Summaries {
        #[command(subcommand)]
        action: SummariesCommand,
    },
    /// Ask questions in a loop until `exit` or `quit`
    Interactive {
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SummariesCommand {
    List,
    View { file: String },
}

/// Everything a research run needs, built once per process.
struct Agent {
    config: AgentConfig,
    planner: ResearchPlanner,
    executor: ResearchExecutor,
    documents: Arc<LocalDocumentIndex>,
    archive: SummaryArchive,
    memory: MemoryBridge,
}

impl Agent {
    async fn build(config: AgentConfig) -> anyhow::Result<Self> {
        let provider = create_provider(config.provider_config()?)?;
        let limiter = Arc::new(RateLimiter::per_minute("model", config.api_rate_limit));
        let model: Arc<dyn ModelBackend> =
            Arc::new(ResearchModel::new(provider, limiter, config.current_date()));

        let web: Arc<dyn WebTool> = Arc::new(HttpWebTool::new(config.web_tool_config())?);
        let documents = Arc::new(
            LocalDocumentIndex::open(config.documents_dir())
                .await
                .context("opening document index")?,
        );
        let catalog: Arc<dyn DocumentTool> = documents.clone();

        let resolver =
            LocalResourceResolver::new(LocalResourceResolver::default_dirs(&config.documents_dir()))
                .with_catalog(catalog.clone());

        let store = MemoryStore::open(&config.memory_db_path())?;
        let memory = MemoryBridge::spawn(store, uuid::Uuid::new_v4().to_string());
        tracing::debug!(session = memory.session_id(), "memory session started");

        let planner = ResearchPlanner::new(model.clone(), config.engine.max_query_length);
        let executor = ResearchExecutor::new(
            model,
            web,
            catalog,
            resolver,
            ExecutionConfig::from_agent_config(&config),
        )
        .with_memory(memory.clone());

        Ok(Self {
            archive: SummaryArchive::new(config.summaries_dir()),
            config,
            planner,
            executor,
            documents,
            memory,
        })
    }

    async fn ask(&self, query: &str, dry_run: bool, save: bool, show_plan: bool) -> anyhow::Result<()> {
        let plan = self.planner.create_plan(query).await?;
        if show_plan || dry_run {
            println!("Research plan ({} steps):", plan.len());
            for (i, step) in plan.steps().iter().enumerate() {
                println!("  {}. {}", i + 1, step);
                if !step.reasoning().is_empty() {
                    println!("     {}", step.reasoning());
                }
            }
            println!();
        }

        let outcome = self.executor.execute(plan, dry_run).await;
        tracing::debug!(report = %serde_json::to_string(&outcome.report)?, "execution report");
        if outcome.report.inserted_steps > 0 {
            tracing::info!(inserted = outcome.report.inserted_steps, "plan grew during execution");
        }

        println!("{}", outcome.summary);

        if save && !dry_run {
            let path = self.archive.save(&outcome.plan.query, &outcome.summary)?;
            println!("\nSaved to {}", path.display());
        }
        Ok(())
    }

    async fn index(&self, path: &Path) -> anyhow::Result<()> {
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && has_document_extension(p))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut indexed = 0;
        for file in &files {
            match self.documents.index(file).await? {
                Some(id) => {
                    indexed += 1;
                    println!("Indexed {} ({})", file.display(), short_id(&id));
                }
                None => println!("Skipped {}", file.display()),
            }
        }
        println!("{} of {} file(s) indexed", indexed, files.len());
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> anyhow::Result<()> {
        let hits = self.documents.search(query, k).await?;
        if hits.is_empty() {
            println!("No matching passages.");
        }
        for (i, hit) in hits.iter().enumerate() {
            println!(
                "{}. {} (score {:.2})\n   {}",
                i + 1,
                hit.metadata.source,
                hit.metadata.similarity,
                hit.text.replace('\n', " ")
            );
        }
        Ok(())
    }

    async fn document(&self, id: &str) -> anyhow::Result<()> {
        let summary = self
            .documents
            .get_summary(id)
            .await?
            .with_context(|| format!("document not found: {}", id))?;
        let entry = &summary.metadata;
        println!("{} [{}]", entry.filename, short_id(&entry.id));
        println!("Path: {}", entry.path.display());
        println!("Type: {:?}, {} chars, {} chunks", entry.doc_type, entry.char_count, entry.chunk_count);
        println!("\n{}", summary.content);
        Ok(())
    }

    async fn documents(&self) -> anyhow::Result<()> {
        let entries = self.documents.list().await?;
        if entries.is_empty() {
            println!("No documents indexed.");
        }
        for entry in entries {
            println!(
                "{}  {}  {}",
                short_id(&entry.id),
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.filename
            );
        }
        Ok(())
    }

    fn summaries(&self, action: SummariesCommand) -> anyhow::Result<()> {
        match action {
            SummariesCommand::List => {
                let saved = self.archive.list()?;
                if saved.is_empty() {
                    println!("No saved summaries.");
                }
                for summary in saved {
                    println!("{}", summary.filename);
                }
            }
            SummariesCommand::View { file } => println!("{}", self.archive.view(&file)?),
        }
        Ok(())
    }

    async fn interactive(&self, save: bool) -> anyhow::Result<()> {
        println!("{} - type a question, or 'exit' to quit.", self.config.agent_name);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        loop {
            stdout.write_all(b"\n> ").await?;
            stdout.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
                break;
            }
            if let Err(e) = self.ask(query, false, save, false).await {
                tracing::error!(error = ?e, "research failed");
                println!("Research failed: {}", e);
            }
        }
        Ok(())
    }
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e.as_str()))
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let service = ConfigService::load(cli.config.as_deref())?;
    let config = service.get_config().clone();
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));
    service.ensure_data_dirs()?;
    tracing::debug!(config = %service.config_path().display(), "configuration loaded");

    let agent = Agent::build(config).await?;
    let result = match cli.command {
        Command::Ask {
            query,
            dry_run,
            save,
            show_plan,
        } => agent.ask(&query, dry_run, save, show_plan).await,
        Command::Index { path } => agent.index(&path).await,
        Command::Search { query, k } => agent.search(&query, k).await,
        Command::Document { id } => agent.document(&id).await,
        Command::Documents => agent.documents().await,
        Command::Summaries { action } => agent.summaries(action),
        Command::Interactive { save } => agent.interactive(save).await,
    };

    let stats = agent.memory.close().await;
    tracing::debug!(written = stats.written, failed = stats.failed, "memory writes flushed");
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = ?e, "research agent failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
