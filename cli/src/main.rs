mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use procsql::Procedure;
use procsql::block::BlockId;
use procsql::statement::Resolution;
use validator::{
    Conformance, DiagnosticError, ScopeTree, UnresolvedLabelPolicy, Validator, ValidatorConfig,
};

#[derive(Parser)]
#[command(name = "procsql", version, about = "Procedural SQL label checker")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log validation progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the labels of a procedure document and report problems
    Check(CheckArgs),

    /// Run .test.toml test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Procedure document (TOML)
    file: PathBuf,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Print the block each LEAVE/ITERATE resolved to
    #[arg(long)]
    resolutions: bool,

    /// Print the scope tree of the procedure body
    #[arg(long)]
    tree: bool,
}

#[derive(clap::Args)]
struct SettingsArgs {
    /// Validator settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Conformance preset: default, lenient or strict
    #[arg(long)]
    conformance: Option<Conformance>,

    /// Compare labels case-sensitively (`--case-sensitive=false` to turn it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    case_sensitive: Option<bool>,

    /// Treatment of unresolved labels: error, warn or ignore
    #[arg(long)]
    unresolved_label: Option<UnresolvedLabelPolicy>,
}

impl SettingsArgs {
    fn load(&self) -> Result<ValidatorConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
                toml::from_str(&text)
                    .map_err(|e| format!("invalid config '{}': {}", path.display(), e))?
            }
            None => ValidatorConfig::default(),
        };
        if let Some(conformance) = self.conformance {
            config.conformance = conformance;
        }
        if let Some(case_sensitive) = self.case_sensitive {
            config.case_sensitive = Some(case_sensitive);
        }
        if let Some(policy) = self.unresolved_label {
            config.unresolved_label = Some(policy);
        }
        Ok(config)
    }
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.toml file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.no_color);

    match cli.command {
        Command::Check(check_args) => do_check(check_args, cli.no_color),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code =
                test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: bool, no_color: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .try_init()
        .ok(); // Ignore error if already initialized
}

fn do_check(args: CheckArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let config = match args.settings.load() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {}", message);
            process::exit(1);
        }
    };

    tracing::debug!(
        file = %args.file.display(),
        conformance = ?config.conformance,
        matcher = ?config.name_matcher(),
        unresolved_label = ?config.unresolved_label_policy(),
        "loaded settings"
    );

    let mut procedure = match Procedure::load(&args.file) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    // Spans can only be shown against the SQL text they index into.
    let mut files = SimpleFiles::new();
    let has_source = procedure.source.is_some();
    procedure.source_id = files.add(
        source_name(&args.file, &procedure),
        procedure.source.clone().unwrap_or_default(),
    );
    tracing::debug!(
        procedure = %procedure.name,
        has_source,
        transfers = procedure.transfers().len(),
        "loaded procedure"
    );

    if args.tree {
        print!("{}", ScopeTree::build(&procedure.body));
    }

    let validator = Validator::new(config);
    let result = validator.validate(&mut procedure);

    if args.resolutions {
        print_resolutions(&procedure);
    }

    let writer = StandardStream::stderr(color_choice);
    let term_config = term::Config::default();

    match result {
        Ok(warnings) => {
            emit_diagnostics(&writer, &term_config, &files, &warnings, has_source);
            eprintln!("ok: {} validated successfully", args.file.display());
        }
        Err(diagnostics) => {
            emit_diagnostics(&writer, &term_config, &files, &diagnostics, has_source);
            process::exit(1);
        }
    }
}

fn print_resolutions(procedure: &Procedure) {
    for (kind, target, resolution) in Validator::resolutions(procedure) {
        let outcome = match resolution {
            Resolution::Resolved(id) => describe_block(procedure, id),
            Resolution::NotFound => "not found".to_string(),
            Resolution::Unresolved => "unresolved".to_string(),
        };
        println!("{} {} -> {}", kind, target, outcome);
    }
}

fn describe_block(procedure: &Procedure, id: BlockId) -> String {
    match procedure.block(id) {
        Some(block) => match &block.label {
            Some(label) => format!("{} {} {}", id, block.kind.describe(), label),
            None => format!("{} {}", id, block.kind.describe()),
        },
        None => id.to_string(),
    }
}

fn emit_diagnostic_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    error: &DiagnosticError,
    has_source: bool,
) {
    if error.span.is_some() && has_source {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
    } else {
        let prefix = if error.is_warning { "warning" } else { "error" };
        eprintln!("{}: {}", prefix, error);
        for note in &error.notes {
            eprintln!("  = {}", note);
        }
    }
}

fn emit_diagnostics(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostics: &[DiagnosticError],
    has_source: bool,
) {
    for diag in diagnostics {
        emit_diagnostic_error(writer, config, files, diag, has_source);
    }
}

/// Name under which the procedure's SQL text is shown in diagnostics. The
/// positions refer to the `source` text, not to the document itself.
fn source_name(path: &Path, procedure: &Procedure) -> String {
    format!("{} (procedure {})", path.display(), procedure.name)
}

/// Directory holding `path`, for resolving paths relative to a test file.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
