use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Password for encrypted API keys (falls back to KAOCHE_PASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align a source and a target subtitle into a project
    Align {
        /// Source-language subtitle
        #[arg(short, long)]
        source: PathBuf,

        /// Target-language subtitle
        #[arg(short, long)]
        target: PathBuf,

        /// Project file to write (.kcp)
        #[arg(short, long)]
        output: PathBuf,

        /// Anchor side: source, target or auto
        #[arg(short, long)]
        mode: Option<String>,

        /// Skip LLM filling of half-empty rows
        #[arg(long)]
        no_fill: bool,

        /// Video file to record in the project
        #[arg(long)]
        video: Option<PathBuf>,
    },

    /// Review every row of a project with the LLM and store the results
    Lqa {
        /// Project file (.kcp)
        #[arg(short, long)]
        project: PathBuf,

        /// Review one pair per request instead of batches
        #[arg(long)]
        pair: bool,

        /// Prompt template name, overriding the configured one
        #[arg(long)]
        prompt: Option<String>,

        /// Background notes for the reviewer, saved in the project
        #[arg(long)]
        context: Option<String>,

        /// Also write a report (.json or .csv)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Review the whole document for consistency and major errors
    GlobalLqa {
        /// Project file (.kcp)
        #[arg(short, long)]
        project: PathBuf,

        /// Write the report as JSON instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a subtitle file, or every subtitle in a directory
    Convert {
        /// Input file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output file or directory
        #[arg(short, long)]
        output: PathBuf,

        /// Output extension for directory conversion
        #[arg(long, default_value = "srt")]
        ext: String,
    },

    /// Inspect and parse bilingual files
    Bilingual {
        #[command(subcommand)]
        action: BilingualAction,
    },

    /// Inspect, edit and export project files
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Subtitle utilities
    Toolbox {
        #[command(subcommand)]
        action: ToolboxAction,
    },

    /// Manage ASS style presets
    Style {
        #[command(subcommand)]
        action: StyleAction,
    },

    /// Suggest how a file should be loaded into a project
    Input {
        /// File to classify
        file: PathBuf,

        /// Project the file would be added to
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Manage configuration and API keys
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show recently used files
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
pub enum BilingualAction {
    /// Detect the layout and languages of a bilingual file
    Detect {
        file: PathBuf,
    },

    /// Parse a bilingual file into pairs
    Parse {
        file: PathBuf,

        /// Layout: tsv, delimiter, alternating, block, csv or auto
        #[arg(short, long)]
        format: Option<String>,

        /// Keep pair order as written instead of ordering by language
        #[arg(long)]
        no_smart: bool,

        /// Let the LLM pair block files with unequal line counts
        #[arg(long)]
        llm_align: bool,

        /// Write the pairs to a new project file
        #[arg(short, long)]
        project: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Summarize a project
    Info {
        project: PathBuf,
    },

    /// Export rows, suggestions or an LQA report
    Export {
        project: PathBuf,

        /// Output file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,

        /// What to export: source, target, suggestions or report
        #[arg(short, long, default_value = "target")]
        content: String,

        /// Timing taken from: source or target
        #[arg(long, default_value = "source")]
        time_base: String,
    },

    /// Merge a row with its neighbour
    Merge {
        project: PathBuf,

        /// Row number (1-based)
        #[arg(short, long)]
        row: usize,

        /// Neighbour to merge with: up or down
        #[arg(short, long, default_value = "down")]
        direction: String,
    },

    /// Insert an empty row before the given position
    Insert {
        project: PathBuf,

        /// Row number (1-based); one past the end appends
        #[arg(short, long)]
        row: usize,
    },

    /// Delete a row
    Delete {
        project: PathBuf,

        /// Row number (1-based)
        #[arg(short, long)]
        row: usize,
    },

    /// Replace the text of one side of a row
    Edit {
        project: PathBuf,

        /// Row number (1-based)
        #[arg(short, long)]
        row: usize,

        /// Side to edit: source or target
        #[arg(short, long)]
        side: String,

        text: String,
    },
}

#[derive(Subcommand)]
pub enum ToolboxAction {
    /// Join subtitle files end to end
    Concat {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Move every cue in time
    Shift {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Offset in milliseconds, negative moves earlier
        #[arg(long, allow_hyphen_values = true)]
        ms: i64,
    },

    /// Keep cues inside a time window, rebased to its start
    Crop {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Window start (milliseconds or HH:MM:SS,mmm)
        #[arg(long)]
        start: String,

        /// Window end (milliseconds or HH:MM:SS,mmm)
        #[arg(long)]
        end: String,
    },

    /// Split two-language cues into two files
    SplitBilingual {
        input: PathBuf,

        /// Output for the first language
        #[arg(long)]
        first: PathBuf,

        /// Output for the second language
        #[arg(long)]
        second: PathBuf,
    },

    /// Stack a second file's text under the first's cues
    MergeBilingual {
        base: PathBuf,

        other: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Re-cut cues at sentence punctuation
    Regroup {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build timed cues from a plain text file
    TxtToSrt {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Base duration per line in milliseconds
        #[arg(long, default_value = "1000")]
        interval: i64,
    },

    /// Drop timing and write the text only
    Strip {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Keep only Chinese or only English text
    Filter {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// chinese or english
        #[arg(short, long)]
        keep: String,
    },

    /// Apply FROM=TO replacements to every cue
    Replace {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long = "rule", value_parser = parse_replacement, required = true)]
        rules: Vec<(String, String)>,
    },

    /// Split cues longer than a character limit
    FixLong {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "40")]
        max_chars: usize,
    },

    /// Clean a machine transcript: noise, sentence regrouping, timing, line breaks
    Clean {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "38")]
        max_chars: usize,

        #[arg(long, default_value = "80")]
        min_gap_ms: i64,

        #[arg(long, default_value = "500")]
        min_duration_ms: i64,
    },

    /// Colour every cue with a per-character gradient (ASS output)
    Gradient {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Start colour, #RRGGBB
        #[arg(long)]
        from: String,

        /// End colour, #RRGGBB
        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand)]
pub enum StyleAction {
    /// List saved presets
    List,

    /// Print a preset as an ASS style line
    Show {
        name: String,
    },

    /// Save every style of an ASS file as a preset
    Import {
        file: PathBuf,
    },

    /// Delete a preset
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store an API key, encrypted when encryption is on
    SetKey {
        key: String,

        /// Provider id; without it the shared key is set
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Encrypt stored API keys with the password
    Encrypt,

    /// Decrypt stored API keys back to plain text
    Decrypt,

    /// List configured providers
    Providers,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recent files, optionally for one kind (subtitle, bilingual, project)
    List {
        kind: Option<String>,
    },
}

/// Parse `FROM=TO`
fn parse_replacement(value: &str) -> std::result::Result<(String, String), String> {
    let (from, to) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid rule '{}': expected FROM=TO", value))?;
    if from.is_empty() {
        return Err(format!("invalid rule '{}': FROM is empty", value));
    }
    Ok((from.to_string(), to.to_string()))
}
