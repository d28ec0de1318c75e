//! Kaoche - Subtitle QA Toolkit
//!
//! Command-line entry point: subtitle alignment, LLM-based localization
//! quality assessment, bilingual file parsing, project editing and subtitle
//! utilities.

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kaoche::align::{AlignmentEvent, AlignmentJob, AnchorMode};
use kaoche::bilingual::{
    BilingualFormat, BilingualPair, ParseOptions, detect_bilingual_format, detect_source_language,
    get_language_stats, parse_bilingual_file,
};
use kaoche::cli::{
    Args, BilingualAction, Commands, ConfigAction, HistoryAction, ProjectAction, StyleAction, ToolboxAction,
};
use kaoche::config::{Config, DEFAULT_CONFIG_FILE};
use kaoche::export::{
    TimeBase, export_content, export_lqa_report_csv, export_lqa_report_json, export_suggestions,
};
use kaoche::history::HistoryManager;
use kaoche::input::{ProjectState, classify_input};
use kaoche::llm::{LlmClient, LlmClientFactory};
use kaoche::lqa::{LqaEvent, LqaMode, LqaResult, LqaRunner, LqaSettings, merge_lqa_results, process_global_lqa};
use kaoche::project::{MergeDirection, Project, Side};
use kaoche::prompts::{self, PromptStore};
use kaoche::secrets;
use kaoche::subtitle::time::parse_timestamp;
use kaoche::subtitle::{Color, Cue, StyleManager, extension_of, load_subtitle, read_text_file, save_cues, save_subtitle};
use kaoche::toolbox::{self, CleanupOptions, TextFilter};

const PASSWORD_ENV: &str = "KAOCHE_PASSWORD";
const HISTORY_KINDS: [&str; 3] = ["subtitle", "bilingual", "project"];

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load_or_default(args.config.as_deref())?;

    // Setup logging to both console and file
    setup_logging(args.verbose, &config.advanced.log_level)?;
    info!("Starting Kaoche - Subtitle QA Toolkit");

    let password = args.password.clone().or_else(|| std::env::var(PASSWORD_ENV).ok());
    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    match args.command {
        Commands::Align { source, target, output, mode, no_fill, video } => {
            info!("Aligning {} with {}", source.display(), target.display());
            run_align(&config, password.as_deref(), &source, &target, &output, mode, no_fill, video).await?;
        }
        Commands::Lqa { project, pair, prompt, context, report } => {
            info!("Running LQA on project: {}", project.display());
            run_lqa(&config, password.as_deref(), &project, pair, prompt, context, report.as_deref()).await?;
        }
        Commands::GlobalLqa { project, output } => {
            info!("Running global LQA on project: {}", project.display());
            let project = Project::load(&project)?;
            let client = create_client(&config, password.as_deref())?;
            let template = PromptStore::from_config(&config).load(prompts::GLOBAL_LQA)?;
            let settings = LqaSettings::from_config(&config, &project.global_context);

            let spinner = spinner("Reviewing whole document...")?;
            let report = process_global_lqa(client.as_ref(), &template, &project.lqa_pairs(), &settings).await;
            spinner.finish_and_clear();

            match output {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
                    println!("Global report written to {}", path.display());
                }
                None => {
                    println!("\nGlobal Score: {:.1}", report.global_score);
                    println!("Summary: {}", report.global_summary);
                    print_findings("Consistency Issues", &report.consistency_issues);
                    print_findings("Major Errors", &report.major_errors);
                }
            }
        }
        Commands::Convert { input, output, ext } => {
            if input.is_dir() {
                info!("Converting directory: {}", input.display());
                let summary = toolbox::convert_dir(&input, &output, &ext)?;
                println!("Converted {} files", summary.converted);
                for (path, error) in &summary.failed {
                    println!("  Failed: {} ({})", path.display(), error);
                }
            } else {
                let count = toolbox::convert_file(&input, &output)?;
                println!("Converted {} cues to {}", count, output.display());
            }
        }
        Commands::Bilingual { action } => run_bilingual(&config, password.as_deref(), action).await?,
        Commands::Project { action } => run_project(action)?,
        Commands::Toolbox { action } => run_toolbox(action)?,
        Commands::Style { action } => {
            let manager = StyleManager::default_location()?;
            match action {
                StyleAction::List => {
                    let names = manager.list()?;
                    if names.is_empty() {
                        println!("No style presets saved.");
                    }
                    for name in names {
                        println!("{}", name);
                    }
                }
                StyleAction::Show { name } => println!("{}", manager.load(&name)?.to_ass_line()),
                StyleAction::Import { file } => {
                    let doc = load_subtitle(&file)?;
                    if doc.styles.is_empty() {
                        bail!("No styles found in {}", file.display());
                    }
                    for style in &doc.styles {
                        manager.save(&style.name, style)?;
                        println!("Saved preset '{}'", style.name);
                    }
                }
                StyleAction::Delete { name } => {
                    if manager.delete(&name)? {
                        println!("Deleted preset '{}'", name);
                    } else {
                        println!("No preset named '{}'", name);
                    }
                }
            }
        }
        Commands::Input { file, project } => {
            let state = match project {
                Some(path) => ProjectState::of(&Project::load(path)?),
                None => ProjectState::default(),
            };
            let decision = classify_input(&file, &state);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Config { action } => run_config(config, &config_path, password.as_deref(), action)?,
        Commands::History { action } => match action {
            HistoryAction::List { kind } => {
                let history = HistoryManager::new()?;
                let kinds: Vec<String> = match kind {
                    Some(kind) => vec![kind],
                    None => HISTORY_KINDS.iter().map(|k| k.to_string()).collect(),
                };
                for kind in kinds {
                    let files = history.recent_files(&kind);
                    println!("\nRecent {} files:", kind);
                    if files.is_empty() {
                        println!("  (none)");
                    }
                    for (i, file) in files.iter().enumerate() {
                        println!("  {:<3} {}", i + 1, file.display());
                    }
                    if let Some(dir) = history.last_dir(&kind) {
                        println!("  Last directory: {}", dir.display());
                    }
                }
            }
        },
    }

    info!("Kaoche completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, configured_level: &str) -> Result<()> {
    // Create log directory
    let kaoche_dir = std::env::current_dir()?.join(".kaoche");
    let log_dir = kaoche_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "kaoche.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose {
        Level::DEBUG
    } else {
        Level::from_str(configured_level).unwrap_or(Level::INFO)
    };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("kaoche.log").display());

    Ok(())
}

fn create_client(config: &Config, password: Option<&str>) -> Result<Arc<dyn LlmClient>> {
    Ok(Arc::from(LlmClientFactory::from_config(config, password)?))
}

fn progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Record a file in history; failures only warn
fn remember(kind: &str, path: &Path) {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let result = HistoryManager::new().and_then(|mut history| {
        history.add_recent_file(kind, &path)?;
        history.set_last_dir(kind, &path)
    });
    if let Err(e) = result {
        warn!("Could not update history: {}", e);
    }
}

fn print_findings(title: &str, items: &[serde_json::Value]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for item in items {
        match item {
            serde_json::Value::String(text) => println!("  - {}", text),
            other => println!("  - {}", other),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_align(
    config: &Config,
    password: Option<&str>,
    source: &Path,
    target: &Path,
    output: &Path,
    mode: Option<String>,
    no_fill: bool,
    video: Option<PathBuf>,
) -> Result<()> {
    let mode: AnchorMode = mode.as_deref().unwrap_or(config.alignment.default_mode.as_str()).parse()?;
    let source_cues = load_subtitle(source)?.cues;
    let target_cues = load_subtitle(target)?.cues;

    let mut job = AlignmentJob::new(source_cues, target_cues, mode);
    if config.alignment.auto_fill && !no_fill {
        match create_client(config, password) {
            Ok(client) => job = job.with_gap_filling(client, PromptStore::from_config(config), &config.alignment),
            Err(e) => warn!("LLM gap filling disabled: {}", e),
        }
    }

    let mut handle = job.spawn();
    let spinner = spinner("Aligning...")?;
    let mut rows = None;
    let mut failure = None;
    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(AlignmentEvent::Progress(message)) => spinner.set_message(message),
                Some(AlignmentEvent::Finished(result)) => rows = Some(result),
                Some(AlignmentEvent::Failed(message)) => failure = Some(message),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                spinner.set_message("Cancelling...");
                handle.cancel();
            }
        }
    }
    spinner.finish_and_clear();

    let rows = match (rows, failure) {
        (Some(rows), _) => rows,
        (None, Some(message)) => bail!("Alignment failed: {}", message),
        (None, None) => bail!("Alignment failed: no result"),
    };

    let mut project = Project::new();
    project.rows = rows;
    project.anchor_mode = mode;
    project.source_file = Some(source.to_path_buf());
    project.target_file = Some(target.to_path_buf());
    project.video_file = video;
    project.global_context = config.lqa.global_context.clone();
    project.save(output)?;

    let gaps = project
        .rows
        .iter()
        .filter(|r| r.source.is_empty() || r.target.is_empty())
        .count();
    println!("Aligned {} rows ({} incomplete) into {}", project.len(), gaps, output.display());

    remember("subtitle", source);
    remember("subtitle", target);
    remember("project", output);
    Ok(())
}

async fn run_lqa(
    config: &Config,
    password: Option<&str>,
    project_path: &Path,
    pair: bool,
    prompt: Option<String>,
    context: Option<String>,
    report: Option<&Path>,
) -> Result<()> {
    let mut project = Project::load(project_path)?;
    if let Some(context) = context {
        project.global_context = context;
    }
    let pairs = project.lqa_pairs();
    if pairs.is_empty() {
        println!("Project has no rows to review.");
        return Ok(());
    }

    let client = create_client(config, password)?;
    let (mode, default_template) = if pair {
        (LqaMode::Pair, prompts::LQA_PAIR.to_string())
    } else {
        (LqaMode::Batch, config.lqa.prompt.clone())
    };
    let template = PromptStore::from_config(config).load(&prompt.unwrap_or(default_template))?;
    let settings = LqaSettings::from_config(config, &project.global_context);

    let total = pairs.len();
    let runner = LqaRunner::new(client, template, pairs, settings).with_mode(mode);
    let control = runner.control();
    let mut handle = runner.spawn();

    let pb = progress_bar(total)?;
    let mut results: Vec<LqaResult> = Vec::new();
    let mut errors = 0;
    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(LqaEvent::Progress { current, .. }) => pb.set_position(current as u64),
                Some(LqaEvent::Result(result)) => results.push(result),
                Some(LqaEvent::BatchComplete { start, end }) => pb.set_message(format!("rows {}-{} done", start + 1, end)),
                Some(LqaEvent::Error { row, message }) => {
                    errors += 1;
                    pb.println(format!("Row {}: {}", row + 1, message));
                }
                Some(LqaEvent::Finished { reviewed, stopped }) => {
                    info!("LQA finished with {} reviewed rows (stopped: {})", reviewed, stopped);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !control.is_stopped() => {
                pb.set_message("stopping after current batch...");
                control.stop();
            }
        }
    }
    pb.finish_and_clear();

    let merged = merge_lqa_results([results]);
    let scores: Vec<f64> = merged.values().filter(|r| r.error.is_none()).map(|r| r.score).collect();
    let applied = project.apply_lqa_results(merged.into_values());
    project.save(project_path)?;

    println!("\nLQA Summary:");
    println!("{:<20} {}", "Rows", total);
    println!("{:<20} {}", "Reviewed", applied);
    println!("{:<20} {}", "Errors", errors);
    if !scores.is_empty() {
        println!("{:<20} {:.2}", "Average score", scores.iter().sum::<f64>() / scores.len() as f64);
        println!("{:<20} {}", "Below 7", scores.iter().filter(|s| **s < 7.0).count());
    }
    if control.is_stopped() {
        println!("Stopped early; partial results were saved.");
    }

    if let Some(report) = report {
        write_report(&project, report)?;
        println!("Report written to {}", report.display());
    }
    remember("project", project_path);
    Ok(())
}

fn write_report(project: &Project, path: &Path) -> Result<()> {
    match extension_of(path).as_str() {
        "json" => export_lqa_report_json(&project.rows, path)?,
        "csv" => export_lqa_report_csv(&project.rows, path)?,
        other => bail!("Unsupported report format '.{}'. Use .json or .csv", other),
    }
    Ok(())
}

async fn run_bilingual(config: &Config, password: Option<&str>, action: BilingualAction) -> Result<()> {
    match action {
        BilingualAction::Detect { file } => {
            let format = detect_bilingual_format(&file);
            let content = read_text_file(&file)?;
            let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
            println!("{:<20} {}", "File", file.display());
            println!("{:<20} {}", "Format", format);
            println!("{:<20} {}", "Bilingual", format != BilingualFormat::Unknown);
            println!("{:<20} {}", "Languages", detect_source_language(&lines));
        }
        BilingualAction::Parse { file, format, no_smart, llm_align, project } => {
            let options = ParseOptions {
                format_hint: format.as_deref().map(BilingualFormat::from_str).transpose()?,
                smart_detect: !no_smart,
                use_llm_alignment: llm_align,
            };
            let client = if llm_align {
                match create_client(config, password) {
                    Ok(client) => Some(client),
                    Err(e) => {
                        warn!("LLM alignment unavailable: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let pairs = parse_bilingual_file(&file, &options, client.as_deref()).await?;
            print_pairs(&pairs);

            let stats = get_language_stats(&pairs);
            println!("\n{:<10} {:<8} {:<8} {:<8}", "Side", "en", "zh", "mixed");
            println!("{:<10} {:<8} {:<8} {:<8}", "Source", stats.source_en, stats.source_zh, stats.source_mixed);
            println!("{:<10} {:<8} {:<8} {:<8}", "Target", stats.target_en, stats.target_zh, stats.target_mixed);

            if let Some(path) = project {
                let mut project = Project::from_bilingual_pairs(&pairs);
                project.global_context = config.lqa.global_context.clone();
                project.save(&path)?;
                println!("Created project {} with {} rows", path.display(), project.len());
                remember("project", &path);
            }
            remember("bilingual", &file);
        }
    }
    Ok(())
}

fn preview(text: &str, width: usize) -> String {
    let flat = text.replace('\n', " / ");
    if flat.chars().count() > width {
        format!("{}...", flat.chars().take(width - 3).collect::<String>())
    } else {
        flat
    }
}

fn print_pairs(pairs: &[BilingualPair]) {
    println!("{:<6} {:<45} {}", "#", "Source", "Target");
    println!("{}", "-".repeat(100));
    for (i, pair) in pairs.iter().enumerate() {
        println!("{:<6} {:<45} {}", i + 1, preview(&pair.source, 45), preview(&pair.target, 45));
    }
}

/// Parse a side name
fn parse_side(value: &str) -> Result<Side> {
    match value.to_lowercase().as_str() {
        "source" | "src" => Ok(Side::Source),
        "target" | "tgt" => Ok(Side::Target),
        _ => bail!("Invalid side '{}'. Valid sides: source, target", value),
    }
}

/// Parse a time base name
fn parse_time_base(value: &str) -> Result<TimeBase> {
    match value.to_lowercase().as_str() {
        "source" => Ok(TimeBase::Source),
        "target" => Ok(TimeBase::Target),
        _ => bail!("Invalid time base '{}'. Valid values: source, target", value),
    }
}

/// Parse a merge direction
fn parse_direction(value: &str) -> Result<MergeDirection> {
    match value.to_lowercase().as_str() {
        "up" => Ok(MergeDirection::Up),
        "down" => Ok(MergeDirection::Down),
        _ => bail!("Invalid direction '{}'. Valid directions: up, down", value),
    }
}

/// Row numbers on the command line are 1-based
fn row_index(row: usize) -> Result<usize> {
    row.checked_sub(1).ok_or_else(|| anyhow!("Row numbers start at 1"))
}

fn run_project(action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Info { project: path } => {
            let project = Project::load(&path)?;
            let reviewed: Vec<&LqaResult> = project.rows.iter().filter_map(|r| r.lqa_result.as_ref()).collect();
            let incomplete = project
                .rows
                .iter()
                .filter(|r| r.source.is_empty() || r.target.is_empty())
                .count();
            let show = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string());

            println!("{:<20} {}", "Project", path.display());
            println!("{:<20} {}", "Version", project.version);
            println!("{:<20} {}", "Id", project.id);
            if let Some(saved_at) = project.saved_at {
                println!("{:<20} {}", "Saved", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!("{:<20} {}", "Source file", show(&project.source_file));
            println!("{:<20} {}", "Target file", show(&project.target_file));
            println!("{:<20} {}", "Video file", show(&project.video_file));
            println!("{:<20} {}", "Anchor", project.anchor_mode);
            println!("{:<20} {}", "Rows", project.len());
            println!("{:<20} {}", "Incomplete rows", incomplete);
            println!("{:<20} {}", "Reviewed rows", reviewed.len());
            if !reviewed.is_empty() {
                let average = reviewed.iter().map(|r| r.score).sum::<f64>() / reviewed.len() as f64;
                println!("{:<20} {:.2}", "Average score", average);
            }
            if !project.global_context.is_empty() {
                println!("{:<20} {}", "Context", preview(&project.global_context, 60));
            }
        }
        ProjectAction::Export { project: path, output, content, time_base } => {
            let project = Project::load(&path)?;
            let time_base = parse_time_base(&time_base)?;
            match content.to_lowercase().as_str() {
                "report" => {
                    write_report(&project, &output)?;
                    println!("Report written to {}", output.display());
                }
                "suggestions" => {
                    let count = export_suggestions(&project.rows, &output, time_base)?;
                    println!("Exported {} lines to {}", count, output.display());
                }
                side => {
                    let count = export_content(&project.rows, &output, parse_side(side)?, time_base)?;
                    println!("Exported {} lines to {}", count, output.display());
                }
            }
        }
        ProjectAction::Merge { project: path, row, direction } => {
            let mut project = Project::load(&path)?;
            let kept = project
                .merge_rows(row_index(row)?, parse_direction(&direction)?)
                .ok_or_else(|| anyhow!("Row {} has no neighbour in that direction", row))?;
            project.save(&path)?;
            println!("Merged into row {}; {} rows remain", kept + 1, project.len());
        }
        ProjectAction::Insert { project: path, row } => {
            let mut project = Project::load(&path)?;
            if !project.insert_row(row_index(row)?) {
                bail!("Row {} is out of range (1-{})", row, project.len() + 1);
            }
            project.save(&path)?;
            println!("Inserted empty row {}", row);
        }
        ProjectAction::Delete { project: path, row } => {
            let mut project = Project::load(&path)?;
            if !project.delete_row(row_index(row)?) {
                bail!("Row {} does not exist", row);
            }
            project.save(&path)?;
            println!("Deleted row {}; {} rows remain", row, project.len());
        }
        ProjectAction::Edit { project: path, row, side, text } => {
            let mut project = Project::load(&path)?;
            if !project.update_text(row_index(row)?, parse_side(&side)?, text) {
                bail!("Row {} does not exist", row);
            }
            project.save(&path)?;
            println!("Updated row {}", row);
        }
    }
    Ok(())
}

fn load_cues(path: &Path) -> Result<Vec<Cue>> {
    Ok(load_subtitle(path)?.cues)
}

/// Milliseconds or a subtitle timestamp
fn parse_time_arg(value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .or_else(|| parse_timestamp(value))
        .ok_or_else(|| anyhow!("Invalid time '{}'", value))
}

fn parse_color(value: &str) -> Result<Color> {
    Color::from_hex(value).ok_or_else(|| anyhow!("Invalid colour '{}'. Use #RRGGBB", value))
}

fn run_toolbox(action: ToolboxAction) -> Result<()> {
    match action {
        ToolboxAction::Concat { inputs, output } => {
            let cues = toolbox::concat(&inputs)?;
            save_cues(&cues, &output)?;
            println!("Joined {} files into {} cues", inputs.len(), cues.len());
        }
        ToolboxAction::Shift { input, output, ms } => {
            let mut cues = load_cues(&input)?;
            toolbox::shift(&mut cues, ms);
            save_cues(&cues, &output)?;
            println!("Shifted {} cues by {} ms", cues.len(), ms);
        }
        ToolboxAction::Crop { input, output, start, end } => {
            let (start, end) = (parse_time_arg(&start)?, parse_time_arg(&end)?);
            if end <= start {
                bail!("Crop end must be after start");
            }
            let cues = toolbox::crop(&load_cues(&input)?, start, end);
            save_cues(&cues, &output)?;
            println!("Kept {} cues", cues.len());
        }
        ToolboxAction::SplitBilingual { input, first, second } => {
            let (a, b) = toolbox::split_bilingual(&load_cues(&input)?);
            save_cues(&a, &first)?;
            save_cues(&b, &second)?;
            println!("Split {} cues into {} and {}", a.len(), first.display(), second.display());
        }
        ToolboxAction::MergeBilingual { base, other, output } => {
            let cues = toolbox::merge_bilingual(&load_cues(&base)?, &load_cues(&other)?);
            save_cues(&cues, &output)?;
            println!("Merged {} cues", cues.len());
        }
        ToolboxAction::Regroup { input, output } => {
            let original = load_cues(&input)?;
            let cues = toolbox::regroup_by_punctuation(&original);
            save_cues(&cues, &output)?;
            println!("Regrouped {} cues into {}", original.len(), cues.len());
        }
        ToolboxAction::TxtToSrt { input, output, interval } => {
            let cues = toolbox::txt_to_srt(&read_text_file(&input)?, interval);
            save_cues(&cues, &output)?;
            println!("Created {} cues", cues.len());
        }
        ToolboxAction::Strip { input, output } => {
            std::fs::write(&output, toolbox::strip_timeline(&load_cues(&input)?))?;
            println!("Wrote text to {}", output.display());
        }
        ToolboxAction::Filter { input, output, keep } => {
            let filter: TextFilter = keep.parse()?;
            let mut cues = load_cues(&input)?;
            toolbox::filter_text(&mut cues, filter);
            save_cues(&cues, &output)?;
            println!("Filtered {} cues", cues.len());
        }
        ToolboxAction::Replace { input, output, rules } => {
            let mut cues = load_cues(&input)?;
            toolbox::batch_replace(&mut cues, &rules);
            save_cues(&cues, &output)?;
            println!("Applied {} rules to {} cues", rules.len(), cues.len());
        }
        ToolboxAction::FixLong { input, output, max_chars } => {
            let original = load_cues(&input)?;
            let cues = toolbox::fix_long_sentences(&original, max_chars);
            save_cues(&cues, &output)?;
            println!("Split {} long cues", cues.len() - original.len());
        }
        ToolboxAction::Clean { input, output, max_chars, min_gap_ms, min_duration_ms } => {
            let options = CleanupOptions { max_chars, min_gap_ms, min_duration_ms };
            let original = load_cues(&input)?;
            let cues = toolbox::process_segments(&original, &options);
            save_cues(&cues, &output)?;
            println!("Cleaned {} cues into {}", original.len(), cues.len());
        }
        ToolboxAction::Gradient { input, output, from, to } => {
            if !matches!(extension_of(&output).as_str(), "ass" | "ssa") {
                bail!("Gradient output must be .ass or .ssa");
            }
            let (start, end) = (parse_color(&from)?, parse_color(&to)?);
            let mut doc = load_subtitle(&input)?;
            for cue in doc.cues.iter_mut() {
                cue.text = toolbox::apply_gradient(&cue.text, start, end);
            }
            save_subtitle(&doc, &output)?;
            println!("Applied gradient to {} cues", doc.cues.len());
        }
    }
    Ok(())
}

fn run_config(mut config: Config, path: &Path, password: Option<&str>, action: ConfigAction) -> Result<()> {
    let require_password = || password.ok_or_else(|| anyhow!("A password is required (--password or {})", PASSWORD_ENV));

    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists; use --force to overwrite", path.display());
            }
            Config::default().save_to_file(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::SetKey { key, provider } => {
            if let Some(id) = provider.as_deref() {
                config.provider(id)?;
            }
            secrets::set_api_key(&mut config, &key, password, provider.as_deref())?;
            config.save_to_file(path)?;
            println!("API key saved{}", if config.encryption.enabled { " (encrypted)" } else { "" });
        }
        ConfigAction::Encrypt => {
            secrets::enable_encryption(&mut config, require_password()?)?;
            config.save_to_file(path)?;
            println!("API keys encrypted");
        }
        ConfigAction::Decrypt => {
            secrets::disable_encryption(&mut config, require_password()?)?;
            config.save_to_file(path)?;
            println!("API keys decrypted");
        }
        ConfigAction::Providers => {
            println!("{:<3}{:<12} {:<10} {:<45} {}", "", "Id", "Type", "Base URL", "Models");
            println!("{}", "-".repeat(100));
            for provider in &config.providers {
                let active = if provider.id == config.api.provider { "*" } else { "" };
                let has_key = secrets::get_api_key(&config, password, Some(&provider.id))
                    .map(|k| !k.is_empty())
                    .unwrap_or(true);
                println!(
                    "{:<3}{:<12} {:<10} {:<45} {}{}",
                    active,
                    provider.id,
                    provider.api_type,
                    provider.api_base,
                    provider.models.join(", "),
                    if has_key { "" } else { "  (no key)" }
                );
            }
        }
    }
    Ok(())
}
