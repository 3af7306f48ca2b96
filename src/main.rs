use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use typtag::checker::types::TypeId;
use typtag::checker::{self, Diagnostic, Severity, parse_shape};
use typtag::config::{CheckConfig, OutputFormat};
use typtag::runtime;

// Wrapper types for clap ValueEnum support
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum FormatArg {
    #[default]
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
    Error,
    Info,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Error => Severity::Error,
            SeverityArg::Info => Severity::Info,
        }
    }
}

#[derive(Parser)]
#[command(name = "typtag")]
#[command(about = "Static type checker for type-tagged programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Type check a source file
    Check {
        /// The source file to check
        file: PathBuf,

        /// Diagnostic output format (human, json)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Also print info diagnostics
        #[arg(long)]
        info: bool,

        /// Maximum number of checking passes
        #[arg(long)]
        pass_limit: Option<u32>,

        /// Severity of strict equality between operands of the same type (error, info)
        #[arg(long, value_enum)]
        strict_equality: Option<SeverityArg>,

        /// Config file to use instead of the nearest typtag.toml
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Parse an array shape descriptor and print its description
    Shape {
        /// The descriptor, e.g. "<int,string[]>[+]"
        descriptor: String,
    },
    /// Run a type tag's value validator on a literal
    Validate {
        /// The type tag (any, undef, nul, string, bool, number, finite, int, bint, symb, array, object, func, regex)
        tag: String,

        /// The literal text between the backticks
        #[arg(allow_hyphen_values = true)]
        literal: String,

        /// Array shape descriptor the value must match
        #[arg(long)]
        shape: Option<String>,
    },
}

fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("TYPTAG_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            file,
            format,
            info,
            pass_limit,
            strict_equality,
            config,
        } => {
            let loaded = match config {
                Some(path) => CheckConfig::load(&path),
                None => CheckConfig::for_file(&file),
            };
            let mut config = match loaded {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            // Command line flags override the config file
            if let Some(format) = format {
                config.format = format.into();
            }
            if info {
                config.show_info = true;
            }
            if let Some(limit) = pass_limit {
                config.pass_limit = limit;
            }
            if let Some(severity) = strict_equality {
                config.strict_equality = severity.into();
            }
            if let Err(e) = config.validate() {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }

            check(&file, &config)
        }
        Commands::Shape { descriptor } => match parse_shape(&descriptor) {
            Ok(shape) => {
                println!("{}", shape.description);
                Ok(true)
            }
            Err(e) => Err(format!("error: {}", e)),
        },
        Commands::Validate {
            tag,
            literal,
            shape,
        } => validate(&tag, &literal, shape.as_deref()),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Checks a file and prints its diagnostics. Returns whether it passed.
fn check(file: &Path, config: &CheckConfig) -> Result<bool, String> {
    let outcome = checker::check_file(file, config)?;
    let shown: Vec<Diagnostic> = outcome
        .diagnostics
        .iter()
        .filter(|d| config.show_info || d.is_error())
        .cloned()
        .collect();
    let errors = outcome.error_count();

    match config.format {
        OutputFormat::Human => {
            let filename = file.to_string_lossy();
            print!("{}", checker::format_diagnostics(&filename, &shown));
            if errors == 0 {
                println!("Type check passed.");
            } else {
                println!(
                    "{} error{} found ({} pass{})",
                    errors,
                    if errors == 1 { "" } else { "s" },
                    outcome.passes,
                    if outcome.passes == 1 { "" } else { "es" }
                );
            }
        }
        OutputFormat::Json => println!("{}", checker::diagnostics_to_json(&shown)?),
    }

    Ok(errors == 0)
}

fn validate(tag: &str, literal: &str, shape: Option<&str>) -> Result<bool, String> {
    let Some(tag) = TypeId::from_name(tag) else {
        return Err(format!("error: {}", runtime::ValidationError::UnknownType(tag.to_string())));
    };
    let shape = match shape {
        Some(descriptor) => Some(parse_shape(descriptor).map_err(|e| format!("error: {}", e))?),
        None => None,
    };

    match runtime::validate_literal(tag, literal, shape.as_ref()) {
        Ok(value) => {
            println!("{}: {}", value.type_name(), value);
            Ok(true)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            Ok(false)
        }
    }
}
