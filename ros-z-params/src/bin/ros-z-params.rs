use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ros_z_params::format::format_value;
use ros_z_params::manager::{DEFAULT_NAMESPACE, PARAMS_FILE_PATH};
use ros_z_params::native::read_overrides;
use ros_z_params::{
    Builder, NativeDeclaration, NativeParameters, NumericConstraint, ParameterValue, ParamsManager,
};

#[derive(Parser)]
#[command(name = "ros-z-params")]
#[command(about = "Inspect and exercise ros-z parameter files")]
struct Cli {
    /// Output structured JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Node name reported by the in-process host
    #[arg(long, global = true, default_value = "ros_z_params")]
    node: String,

    /// Namespace of the `<NAMESPACE>.params_file_path` bootstrap parameter
    #[arg(long, global = true, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// ROS 2 parameter file (`/**: ros__parameters:`) with value overrides
    #[arg(long, global = true)]
    overrides: Option<PathBuf>,

    /// Parameters file to load, overriding the bootstrap parameter
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap the registry and list the host's declarations
    Check {
        /// Print the declarations as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bootstrap the registry, then submit one update batch
    Apply {
        /// Updates as NAME=VALUE, VALUE written in YAML (e.g. `gains=[1.0, 2.0]`)
        #[arg(value_name = "NAME=VALUE", required = true)]
        updates: Vec<String>,

        /// Log every accepted update
        #[arg(long)]
        verbose: bool,
    },
}

fn init_logger(json_mode: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("ros_z_params=debug")
        } else {
            EnvFilter::new("ros_z_params=info")
        }
    });

    if json_mode {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[derive(Serialize)]
struct DeclarationRow {
    #[serde(flatten)]
    descriptor: NativeDeclaration,
    value: ParameterValue,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.json_logs, cli.debug);

    let outcome = match &cli.command {
        Command::Check { json } => bootstrap(&cli, false).and_then(|(h, _)| check(&h, *json)),
        Command::Apply { updates, verbose } => {
            bootstrap(&cli, *verbose).and_then(|(_, m)| apply(&m, updates))
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the host from the override sources, then run the registry's own
/// bootstrap through `<namespace>.params_file_path`.
fn bootstrap(
    cli: &Cli,
    verbose: bool,
) -> Result<(Arc<NativeParameters>, ParamsManager), Box<dyn std::error::Error>> {
    let mut overrides = match &cli.overrides {
        Some(path) => read_overrides(path, &format!("/{}", cli.node))?,
        None => HashMap::new(),
    };
    if let Some(file) = &cli.file {
        overrides.insert(
            format!("{}.{}", cli.namespace, PARAMS_FILE_PATH),
            ParameterValue::String(file.display().to_string()),
        );
    }

    let host = Arc::new(NativeParameters::new(cli.node.as_str()).with_overrides(overrides));
    let manager = ParamsManager::builder(host.clone())
        .with_namespace(cli.namespace.as_str())
        .with_verbose(verbose)
        .build()?;
    manager.init()?;
    Ok((host, manager))
}

fn check(host: &NativeParameters, json: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let rows: Vec<DeclarationRow> = host
        .names()
        .iter()
        .filter_map(|name| {
            Some(DeclarationRow {
                descriptor: host.describe(name)?,
                value: host.get(name)?,
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(ExitCode::SUCCESS);
    }

    for row in &rows {
        let d = &row.descriptor;
        let range = match d.numeric_constraint() {
            Some(NumericConstraint::Integer(r)) => {
                format!(" [{}, {}] step {}", r.from_value, r.to_value, r.step)
            }
            Some(NumericConstraint::FloatingPoint(r)) => {
                format!(" [{}, {}] step {}", r.from_value, r.to_value, r.step)
            }
            None => String::new(),
        };
        println!(
            "{} ({}{}){} = {}",
            d.name,
            d.type_,
            range,
            if d.read_only { " read-only" } else { "" },
            format_value(&row.value)
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn apply(
    manager: &ParamsManager,
    updates: &[String],
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let batch = updates
        .iter()
        .map(|update| manager.parse_update(update))
        .collect::<Result<Vec<_>, _>>()?;

    let result = manager.apply(&batch);
    println!("{}", serde_json::to_string(&result)?);
    Ok(if result.accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
