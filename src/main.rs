use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;

use gas_o_mat::config::Config;
use gas_o_mat::events::{JsonSink, LogSink, SharedSink};
use gas_o_mat::executor::ExecutionOutcome;
use gas_o_mat::meter::ThreadCpuMeter;
use gas_o_mat::session::Session;

#[derive(Parser)]
#[command(name = "gas-o-mat")]
#[command(about = "Gas-metered contract execution with cooperative cancellation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a session file
    Validate { config: String },
    /// Run the operations sequentially, without the pacer race
    Execute {
        #[arg(long)]
        config: Option<String>,
        #[arg(long, value_enum, default_value_t = EventFormat::Log)]
        events: EventFormat,
    },
    /// Run the operations while racing the watchdog against the pacer
    Run {
        #[arg(long)]
        config: Option<String>,
        /// Override the session gas
        #[arg(long)]
        gas: Option<i64>,
        /// Override the watchdog inner loop bound
        #[arg(long)]
        yardstick: Option<i64>,
        #[arg(long, value_enum, default_value_t = EventFormat::Log)]
        events: EventFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventFormat {
    Log,
    Json,
}

impl EventFormat {
    fn sink(self) -> SharedSink {
        match self {
            EventFormat::Log => Arc::new(LogSink),
            EventFormat::Json => Arc::new(JsonSink),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Execute { config, events } => execute(config.as_deref(), events),
        Commands::Run {
            config,
            gas,
            yardstick,
            events,
        } => run(config.as_deref(), gas, yardstick, events),
    }
}

fn load(path: Option<&str>) -> Option<Config> {
    match path {
        Some(path) => match Config::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Error loading {}: {}", path, e);
                None
            }
        },
        None => Some(Config::demo()),
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load(Some(path)) else {
        return ExitCode::FAILURE;
    };

    println!(
        "Session is valid ({} operations, gas {})",
        config.operations.len(),
        config.gas
    );
    for (i, op) in config.operations.iter().enumerate() {
        println!(
            "  {}: {} x{} (gas limit {})",
            i + 1,
            op.kind,
            op.loops,
            op.gas_limit
        );
    }
    ExitCode::SUCCESS
}

fn execute(path: Option<&str>, events: EventFormat) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };

    let session = Session::new(&config, Arc::new(ThreadCpuMeter::new()), events.sink());
    log::info!(
        "Contract {} ({}) at {}",
        session.contract.info.name,
        session.contract.info.id,
        session.contract.info.address
    );

    match session.execute() {
        Ok(outcome) => {
            summarize(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Execution aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(path: Option<&str>, gas: Option<i64>, yardstick: Option<i64>, events: EventFormat) -> ExitCode {
    let Some(mut config) = load(path) else {
        return ExitCode::FAILURE;
    };
    if let Some(gas) = gas {
        config.gas = gas;
    }
    if let Some(yardstick) = yardstick {
        config.yardstick = yardstick;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let session = Session::new(&config, Arc::new(ThreadCpuMeter::new()), events.sink());
    log::info!(
        "Contract {} ({}) at {}, gas {}",
        session.contract.info.name,
        session.contract.info.id,
        session.contract.info.address,
        config.gas
    );

    match runtime.block_on(session.run()) {
        Ok(report) => {
            if events == EventFormat::Json {
                match serde_json::to_string(&report) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::error!("Failed to serialize report: {}", e),
                }
            } else {
                summarize(&report.execution);
                println!(
                    "Race won by {} after {}",
                    report.race.winner,
                    humantime::format_duration(report.elapsed)
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Session aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn summarize(outcome: &ExecutionOutcome) {
    let overages = outcome.reports().iter().filter(|r| r.exceeded).count();
    match outcome {
        ExecutionOutcome::Completed { reports } => {
            println!("Executed {} operations, {} over their gas limit", reports.len(), overages)
        }
        ExecutionOutcome::Halted { index, cause, .. } => {
            println!("Halted at operation {}: {} ({} overages before)", index, cause, overages)
        }
        ExecutionOutcome::Cancelled { next_index, .. } => println!(
            "Cancelled before operation {} ({} overages before)",
            next_index, overages
        ),
    }
}
