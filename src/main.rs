//! physcalc CLI
//!
//! Main entry point for the `pcalc` command.

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use physcalc::session::{CommandReader, LinesInput, Repl};
use physcalc::{Calculator, CalculatorConfig, Operand};

#[derive(Parser)]
#[command(name = "pcalc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A calculator for physical quantities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval {
        /// Expression, e.g. `340 m/s [Km/h]`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        expr: Vec<String>,
    },

    /// Run a script
    Run {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Start the interactive calculator
    Repl,

    /// Show the unit systems known at startup
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => CalculatorConfig::load(path)?,
        None => CalculatorConfig::default(),
    };
    tracing::debug!(?config, "configuration");

    match cli.command {
        Commands::Eval { expr } => eval(config, &expr.join(" "), cli.json),
        Commands::Run { input } => run(config, &input),
        Commands::Repl => repl(config),
        Commands::Info => info(config, cli.json),
    }
}

fn eval(config: CalculatorConfig, expr: &str, json: bool) -> Result<()> {
    let precision = config.precision;
    let mut calc = Calculator::with_startup(config)?;
    let value = calc.evaluate(expr)?;

    if json {
        let mut out = serde_json::json!({
            "expression": expr,
            "type": value.type_name(),
            "result": value.format(precision),
        });
        if let Operand::Quantity(q) = &value {
            out["value"] = serde_json::json!(q.value);
            out["unit"] = serde_json::json!(q.unit.to_string());
        }
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| miette::miette!("Failed to serialize result: {}", e))?;
        println!("{}", text);
    } else {
        println!("{}", value.format(precision));
    }
    Ok(())
}

fn run(config: CalculatorConfig, input: &Path) -> Result<()> {
    let mut calc = Calculator::with_startup(config)?;
    let mut reader = CommandReader::new(LinesInput::from_file(input)?);

    let failures = reader.run(&mut calc, |outcome| {
        for line in outcome.output {
            println!("{}", line);
        }
        if let Some(e) = outcome.error {
            eprintln!("{}:{}:", input.display(), outcome.line_number);
            eprintln!("{:?}", miette::Report::new(e));
        }
    });

    if failures > 0 {
        return Err(miette::miette!("{} lines failed", failures));
    }
    Ok(())
}

fn repl(config: CalculatorConfig) -> Result<()> {
    let mut repl = Repl::new(&config.prompt, config.history_file.clone())?;
    let mut calc = Calculator::with_startup(config)?;
    repl.run(&mut calc);
    println!("Goodbye!");
    Ok(())
}

fn info(config: CalculatorConfig, json: bool) -> Result<()> {
    let calc = Calculator::new(config);
    let registry = calc.registry();

    let mut systems = Vec::new();
    for system in registry.systems() {
        let layers: Vec<_> = registry.lineage(system.id).collect();
        let base: Vec<String> = layers
            .iter()
            .rev()
            .flat_map(|l| l.base_units().iter().map(|u| u.symbol.clone()))
            .collect();
        let derived: Vec<String> = layers
            .iter()
            .rev()
            .flat_map(|l| l.derived_units().iter().map(|u| u.symbol.clone()))
            .collect();
        let convertible: Vec<String> = layers
            .iter()
            .rev()
            .flat_map(|l| l.convertible_units().iter().map(|u| u.symbol.clone()))
            .collect();
        systems.push((system.name.clone(), base, derived, convertible));
    }

    if json {
        let out: Vec<_> = systems
            .iter()
            .map(|(name, base, derived, convertible)| {
                serde_json::json!({
                    "name": name,
                    "base": base,
                    "derived": derived,
                    "convertible": convertible,
                })
            })
            .collect();
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| miette::miette!("Failed to serialize systems: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("physcalc {}", env!("CARGO_PKG_VERSION"));
    println!();
    for (name, base, derived, convertible) in &systems {
        println!("{}:", name);
        println!("  base:        {}", base.join(" "));
        println!("  derived:     {}", derived.join(" "));
        println!("  convertible: {}", convertible.join(" "));
    }
    println!();
    let prefixes: Vec<&str> = physcalc::units::PREFIXES.iter().map(|p| p.symbol).collect();
    println!("Prefixes: {}", prefixes.join(" "));
    Ok(())
}
