use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use heurist_bytecode::{ClassFile, Value};
use heurist_instrument::config::ENV_LOG_LEVEL;
use heurist_instrument::tracer::additional_info::AdditionalInfoSnapshot;
use heurist_instrument::{ClassReport, InstrumentationConfig, InstrumentingClassLoader, TargetInfo};

#[derive(Parser)]
#[command(name = "heurist", about = "Search-guidance instrumentation for heurist class files")]
struct Cli {
    /// Log filter, e.g. `debug` or `heurist_instrument=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a .hasm source file to the binary class format
    Assemble {
        /// Source file
        file: PathBuf,
        /// Output path (defaults to the source path with a .hcls extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the constants, method refs and code of a class
    Inspect {
        /// Class file (.hasm, .json or binary)
        file: PathBuf,
        /// Show the class as the instrumenting loader rewrites it
        #[arg(long)]
        instrumented: bool,
        /// Instrumentation config (JSON); the environment is used otherwise
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Instrument a class and print the rewritten listing and its report
    Instrument {
        /// Class file (.hasm, .json or binary)
        file: PathBuf,
        /// Instrumentation config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the instrumented class in binary form to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a class under instrumentation, invoke one method and report objectives
    Run {
        /// Class file (.hasm, .json or binary)
        file: PathBuf,
        /// Method name
        #[arg(long)]
        method: String,
        /// Method descriptor, e.g. `(JJ)I`
        #[arg(long)]
        descriptor: String,
        /// Argument as JSON (`5`, `"foo"`, `[1,2]`); bare words are strings
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Instrumentation config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load classes and print the units info snapshot as JSON
    Units {
        /// Class files (.hasm, .json or binary)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Instrumentation config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Assemble { file, output } => {
            let source = fs::read_to_string(&file)?;
            let class = heurist_asm::assemble(&source)?;
            let output = output.unwrap_or_else(|| file.with_extension("hcls"));
            fs::write(&output, class.to_bytes()?)?;
            println!("assembled {} -> {}", class.name, output.display());
        }

        Command::Inspect { file, instrumented, config } => {
            let class = read_class(&file)?;
            if instrumented {
                let loader = loader(config.as_deref())?;
                let loaded = loader.load(class)?;
                print!("{}", heurist_asm::print(&loaded.class));
            } else {
                print!("{}", heurist_asm::print(&class));
            }
        }

        Command::Instrument { file, config, output } => {
            let class = read_class(&file)?;
            let loader = loader(config.as_deref())?;
            let loaded = loader.load(class)?;
            print!("{}", heurist_asm::print(&loaded.class));
            println!("{}", serde_json::to_string_pretty(&loaded.report)?);
            if let Some(output) = output {
                fs::write(&output, loaded.class.to_bytes()?)?;
                println!("wrote {}", output.display());
            }
        }

        Command::Run { file, method, descriptor, args, config, json } => {
            let class = read_class(&file)?;
            let loader = loader(config.as_deref())?;
            let loaded = loader.load(class)?;
            let args = args.iter().map(|a| parse_arg(a)).collect();
            debug!(class = %loaded.class.name, %method, %descriptor, "invoking");
            let result = loader.run(&loaded.class.name, &method, &descriptor, args)?;

            let tracer = loader.tracer();
            let outcome = RunOutcome {
                result,
                report: loaded.report,
                objectives: tracer.objective_coverage().into_values().collect(),
                additional_info: tracer.expose_additional_info_list(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }

        Command::Units { files, config } => {
            let loader = loader(config.as_deref())?;
            for file in &files {
                loader.load(read_class(file)?)?;
            }
            println!("{}", serde_json::to_string_pretty(&loader.units().snapshot())?);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct RunOutcome {
    result: Option<Value>,
    report: ClassReport,
    objectives: Vec<TargetInfo>,
    additional_info: Vec<AdditionalInfoSnapshot>,
}

fn print_outcome(outcome: &RunOutcome) {
    match &outcome.result {
        Some(value) => println!("result: {value}"),
        None => println!("result: void"),
    }
    let (covered, open): (Vec<_>, Vec<_>) = outcome.objectives.iter().partition(|t| t.value >= 1.0);
    println!("covered objectives ({}):", covered.len());
    for target in covered {
        println!("  {}", target.descriptive_id);
    }
    println!("non-covered objectives ({}):", open.len());
    for target in open {
        println!("  {} = {:.4}", target.descriptive_id, target.value);
    }
    for (index, info) in outcome.additional_info.iter().enumerate() {
        if info == &AdditionalInfoSnapshot::default() {
            continue;
        }
        println!("additional info, action {index}:");
        if let Ok(text) = serde_json::to_string_pretty(info) {
            println!("{text}");
        }
    }
}

fn init_logging(flag: Option<&str>) -> Result<(), Box<dyn Error>> {
    let directive = log_directive(flag, |key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// `--log-level`, then `HEURIST_LOG_LEVEL`, then `RUST_LOG`.
fn log_directive(flag: Option<&str>, env: impl Fn(&str) -> Option<String>) -> String {
    flag.map(str::to_string)
        .or_else(|| env(ENV_LOG_LEVEL))
        .or_else(|| env("RUST_LOG"))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "warn".to_string())
}

fn loader(config: Option<&Path>) -> Result<InstrumentingClassLoader, Box<dyn Error>> {
    let config = match config {
        Some(path) => InstrumentationConfig::from_file(path)?,
        None => InstrumentationConfig::from_env()?,
    };
    info!(categories = ?config.replacement_categories, "instrumentation config");
    Ok(InstrumentingClassLoader::new(config)?)
}

/// Reads a class by extension: `.hasm` is assembled, `.json` is the portable
/// form, anything else the binary format.
fn read_class(path: &Path) -> Result<ClassFile, Box<dyn Error>> {
    let class = match path.extension().and_then(|e| e.to_str()) {
        Some("hasm") => heurist_asm::assemble(&fs::read_to_string(path)?)?,
        Some("json") => ClassFile::from_json(&fs::read_to_string(path)?)?,
        _ => ClassFile::from_bytes(&fs::read(path)?)?,
    };
    Ok(class)
}

fn parse_arg(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => heurist_vm::library::from_json(json),
        Err(_) => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC: &str = r#"
.class com/acme/Calc

.method static abs (J)J
    .line 3
    load 0
    ifge done
    load 0
    neg
    ret
done:
    load 0
    ret
.end
"#;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "heurist", "--log-level", "debug", "run", "Calc.hasm", "--method", "abs", "--descriptor", "(J)J",
            "--arg", "-4", "--json",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Run { method, descriptor, args, json, .. } => {
                assert_eq!(method, "abs");
                assert_eq!(descriptor, "(J)J");
                assert_eq!(args, vec!["-4".to_string()]);
                assert!(json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_accepts_negative_and_dashed_args() {
        let cli = Cli::try_parse_from([
            "heurist", "run", "Calc.hasm", "--method", "abs", "--descriptor", "(J)J", "--arg", "-4", "--arg",
            "-x", "--arg", "-1.5",
        ])
        .unwrap();
        let Command::Run { args, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args, vec!["-4".to_string(), "-x".to_string(), "-1.5".to_string()]);
        assert_eq!(parse_arg(&args[0]), Value::Int(-4));
        assert_eq!(parse_arg(&args[1]), Value::from("-x"));
    }

    #[test]
    fn test_units_requires_files() {
        assert!(Cli::try_parse_from(["heurist", "units"]).is_err());
    }

    #[test]
    fn test_parse_arg() {
        assert_eq!(parse_arg("5"), Value::Int(5));
        assert_eq!(parse_arg("\"foo\""), Value::from("foo"));
        assert_eq!(parse_arg("foo"), Value::from("foo"));
        assert_eq!(parse_arg("[1,2]"), Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(parse_arg("null"), Value::Null);
    }

    #[test]
    fn test_log_directive_precedence() {
        let env = |key: &str| match key {
            ENV_LOG_LEVEL => Some("info".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        };
        assert_eq!(log_directive(Some("debug"), env), "debug");
        assert_eq!(log_directive(None, env), "info");
        assert_eq!(log_directive(None, |k| (k == "RUST_LOG").then(|| "trace".to_string())), "trace");
        assert_eq!(log_directive(None, |_| None), "warn");
    }

    #[test]
    fn test_read_class_formats() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Calc.hasm");
        fs::write(&source, CALC).unwrap();
        let class = read_class(&source).unwrap();
        assert_eq!(class.name, "com/acme/Calc");

        let binary = dir.path().join("Calc.hcls");
        fs::write(&binary, class.to_bytes().unwrap()).unwrap();
        assert_eq!(read_class(&binary).unwrap(), class);

        let json = dir.path().join("Calc.json");
        fs::write(&json, class.to_json().unwrap()).unwrap();
        assert_eq!(read_class(&json).unwrap(), class);
    }

    #[test]
    fn test_assemble_writes_binary() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Calc.hasm");
        fs::write(&source, CALC).unwrap();
        let cli = Cli::try_parse_from(["heurist", "assemble", source.to_str().unwrap()]).unwrap();
        run(cli).unwrap();
        let written = fs::read(dir.path().join("Calc.hcls")).unwrap();
        assert_eq!(ClassFile::from_bytes(&written).unwrap().name, "com/acme/Calc");
    }
}
