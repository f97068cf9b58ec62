use anyhow::Context;
use runfuse::cli::{Cli, Commands, ConfigAction, MethodArg, OutputArgs, StrategyArg};
use runfuse::config::{Config, ConfigValidator, FusionMethodName};
use runfuse::error::{Result, RunfuseError};
use runfuse::fusion::{rescore, RescoreStrategy, RunMerger};
use runfuse::rerank::{
    AttributeLookup, AttributeTable, ExcludeIds, NumericDocId, PatternKey, TieBreakReranker,
};
use runfuse::run::{load_run, Run, RunWriter};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    dispatch(cli)
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Fuse {
            runs,
            method,
            weights,
            depth,
            max_docs,
            rrf_k,
            alpha,
            output,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let overrides = FuseOverrides {
                method,
                weights,
                depth,
                max_docs,
                rrf_k,
                alpha,
            };
            cmd_fuse(&config, &runs, overrides, &output)
                .with_context(|| format!("Failed to fuse {} runs", runs.len()))?;
        }
        Commands::Rescore {
            run,
            strategy,
            rrf_k,
            weight,
            factor,
            output,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let name = strategy;
            let strategy = match strategy {
                StrategyArg::Rrf => RescoreStrategy::Rrf {
                    k: rrf_k.unwrap_or(config.fusion.rrf_k),
                    weight,
                },
                StrategyArg::MinMax => RescoreStrategy::MinMax,
                StrategyArg::Scale => RescoreStrategy::Scale { factor },
            };
            cmd_rescore(&config, &run, &strategy, &output).with_context(|| {
                format!("Failed to rescore {} with {:?}", run.display(), name)
            })?;
        }
        Commands::Rerank {
            run,
            exclude,
            attributes,
            key_pattern,
            output,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_rerank(&config, &run, exclude, attributes, key_pattern, &output)
                .with_context(|| format!("Failed to rerank {}", run.display()))?;
        }
        Commands::Inspect { run, json } => {
            cmd_inspect(&run, json)
                .with_context(|| format!("Failed to inspect {}", run.display()))?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action).context("Config command failed")?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "runfuse=debug" } else { "runfuse=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Command line values that take precedence over the config file
struct FuseOverrides {
    method: Option<MethodArg>,
    weights: Option<Vec<f64>>,
    depth: Option<usize>,
    max_docs: Option<usize>,
    rrf_k: Option<f64>,
    alpha: Option<f64>,
}

fn cmd_fuse(
    config: &Config,
    paths: &[PathBuf],
    overrides: FuseOverrides,
    output: &OutputArgs,
) -> Result<()> {
    let mut fusion = config.fusion.clone();
    if let Some(method) = overrides.method {
        fusion.method = FusionMethodName::from(method);
    }
    if let Some(k) = overrides.rrf_k {
        fusion.rrf_k = k;
    }
    if let Some(depth) = overrides.depth {
        fusion.depth = depth;
    }
    if let Some(max_docs) = overrides.max_docs {
        fusion.max_docs = max_docs;
    }
    if let Some(alpha) = overrides.alpha {
        fusion.alpha = alpha;
    }

    let mut options = fusion.merge_options();
    options.weights = overrides.weights;
    let merger = RunMerger::new(options)?;

    let runs = paths
        .iter()
        .map(|p| load_run(p))
        .collect::<Result<Vec<Run>>>()?;

    let tag = output_tag(config, output);
    let fused = merger.merge(&runs, &tag)?;

    write_output(config, &fused, &tag, output)
}

fn cmd_rescore(
    config: &Config,
    path: &Path,
    strategy: &RescoreStrategy,
    output: &OutputArgs,
) -> Result<()> {
    let run = load_run(path)?;
    let rescored = rescore(&run, strategy)?;

    let tag = output_tag(config, output);
    write_output(config, &rescored, &tag, output)
}

fn cmd_rerank(
    config: &Config,
    path: &Path,
    exclude: Option<PathBuf>,
    attributes: Option<PathBuf>,
    key_pattern: Option<String>,
    output: &OutputArgs,
) -> Result<()> {
    let reranker = TieBreakReranker::new(config.rerank.policy()?);

    let lookup: Box<dyn AttributeLookup> = match (attributes, key_pattern) {
        (Some(path), _) => Box::new(AttributeTable::load(&path)?),
        (None, Some(pattern)) => Box::new(PatternKey::new(&pattern)?),
        (None, None) => match &config.rerank.key_pattern {
            Some(pattern) => Box::new(PatternKey::new(pattern)?),
            None => Box::new(NumericDocId),
        },
    };

    let excluded = match exclude {
        Some(path) => ExcludeIds::load(&path)?,
        None => ExcludeIds::default(),
    };

    let run = load_run(path)?;
    let tag = output_tag(config, output);
    let reranked = reranker.rerank_run(
        &run,
        |doc| excluded.contains(doc) || lookup.is_excluded(doc),
        |doc| lookup.tie_break_key(doc),
        &tag,
    )?;

    tracing::info!(
        "Reranked {} topics: {} of {} documents kept",
        reranked.len(),
        reranked.document_count(),
        run.document_count()
    );

    write_output(config, &reranked, &tag, output)
}

fn cmd_inspect(path: &Path, json: bool) -> Result<()> {
    let run = load_run(path)?;
    let summary = run.summary();

    if json {
        let text = serde_json::to_string_pretty(&summary).map_err(|e| RunfuseError::Json {
            source: e,
            context: "Failed to serialize run summary".to_string(),
        })?;
        println!("{}", text);
        return Ok(());
    }

    println!("Run: {}", path.display());
    println!("  Tag:          {}", summary.tag);
    println!("  Topics:       {}", summary.topics);
    println!("  Documents:    {}", summary.documents);
    println!(
        "  Depth:        {} - {}",
        summary.min_depth, summary.max_depth
    );
    println!("  Empty topics: {}", summary.empty_topics);

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let text = toml::to_string_pretty(&config)?;
            println!("{}", text);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RunfuseError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            // Save default config
            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(path),
        None => Config::default_path().ok(),
    };

    match (path, profile) {
        (Some(path), Some(profile)) => Config::load_with_profile(&path, &profile),
        (Some(path), None) if path.exists() => Config::load(&path),
        (None, Some(_)) => Err(RunfuseError::Config(
            "Cannot determine config directory for profile lookup".to_string(),
        )),
        (_, None) => {
            tracing::warn!(
                "Config file not found, using defaults. Run 'runfuse config init' to create one."
            );
            let mut config = Config::default();
            config.apply_env_overrides();
            ConfigValidator::validate(&config)?;
            Ok(config)
        }
    }
}

fn output_tag(config: &Config, output: &OutputArgs) -> String {
    output
        .tag
        .clone()
        .unwrap_or_else(|| config.output.run_tag.clone())
}

fn write_output(config: &Config, run: &Run, tag: &str, output: &OutputArgs) -> Result<()> {
    let writer = RunWriter::new(tag).with_precision(config.output.precision);

    match &output.output {
        Some(path) => writer.save(run, path),
        None => writer.write(run, std::io::stdout().lock()),
    }
}
