use crate::config::CliConfig;
use crate::error::AppError;
use crate::telemetry;
use clap::{Args, Parser, Subcommand};
use mobility_allocation_core::orchestrator::{reconcile_snapshot, validate_snapshot};
use mobility_allocation_core::tables::{
    read_candidates_path, read_destinations_path, read_withdrawal_table_path, write_assignments,
    write_history, write_ledger, write_occupancy,
};
use mobility_allocation_core::{
    AllocationEngine, AllocationOutcome, EngineConfig, FinalAssignment, FinalStatus,
    ReconcileMode, RunSnapshot,
};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "allocate",
    about = "Run and verify multi-round exchange seat allocations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate seats across every configured round and write the reports
    Run(RunArgs),
    /// Re-check a saved run snapshot, optionally trimming capacity overruns
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Destination table (CSV)
    #[arg(long)]
    destinations: PathBuf,
    /// Candidate table (CSV)
    #[arg(long)]
    candidates: PathBuf,
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Withdrawal-probability table (CSV); replaces the configured rules
    #[arg(long)]
    withdrawals: Option<PathBuf>,
    /// Override the configured RNG seed
    #[arg(long)]
    seed: Option<u64>,
    /// Override the configured output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Snapshot written by `allocate run`
    #[arg(long)]
    snapshot: PathBuf,
    /// Trim over-capacity holders instead of failing
    #[arg(long)]
    repair: bool,
    /// Where to write the repaired snapshot and assignments
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = CliConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Run(args) => run_allocation(args, &config),
        Command::Verify(args) => verify_snapshot(args, &config),
    }
}

fn load_engine_config(args: &RunArgs, config: &CliConfig) -> Result<EngineConfig, AppError> {
    let mut engine_config = match &args.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    if let Some(path) = &args.withdrawals {
        engine_config.withdrawals =
            read_withdrawal_table_path(path, engine_config.withdrawals.default_probability)?;
    }

    if let Some(seed) = args.seed.or(config.seed) {
        engine_config.rng_seed = seed;
    }

    Ok(engine_config)
}

fn run_allocation(args: RunArgs, config: &CliConfig) -> Result<(), AppError> {
    let engine_config = load_engine_config(&args, config)?;
    let destinations = read_destinations_path(&args.destinations)?;
    let candidates = read_candidates_path(&args.candidates)?;

    let outcome = AllocationEngine::new(engine_config, destinations, candidates)?.run()?;

    let out_dir = args.out_dir.unwrap_or_else(|| config.output_dir.clone());
    write_outputs(&out_dir, &outcome)?;
    print_summary(&outcome.assignments);
    println!("ledger digest: {}", outcome.ledger_digest);
    Ok(())
}

fn write_outputs(out_dir: &Path, outcome: &AllocationOutcome) -> Result<(), AppError> {
    fs::create_dir_all(out_dir)?;

    write_ledger(
        create(out_dir, "ledger.csv")?,
        outcome.entries(),
        &outcome.snapshot.config.rounds,
    )?;
    write_assignments(create(out_dir, "assignments.csv")?, &outcome.assignments)?;
    write_occupancy(create(out_dir, "occupancy.csv")?, &outcome.occupancy.rows)?;
    write_history(create(out_dir, "history.csv")?, &outcome.history)?;
    serde_json::to_writer_pretty(create(out_dir, "events.json")?, &outcome.events)?;
    outcome.snapshot.save(out_dir.join("snapshot.json"))?;

    info!(out_dir = %out_dir.display(), "reports written");
    Ok(())
}

fn verify_snapshot(args: VerifyArgs, config: &CliConfig) -> Result<(), AppError> {
    let snapshot = RunSnapshot::load(&args.snapshot)?;

    if !args.repair {
        validate_snapshot(&snapshot)?;
        let reconciled = reconcile_snapshot(&snapshot, ReconcileMode::Verify)?;
        print_summary(&reconciled.assignments);
        println!("snapshot OK: {} entries", snapshot.entries.len());
        return Ok(());
    }

    let reconciled = reconcile_snapshot(&snapshot, ReconcileMode::Repair)?;
    for trim in &reconciled.report.trims {
        println!(
            "trimmed {} from {} (priority {})",
            trim.candidate_id, trim.destination_id, trim.priority_score
        );
    }

    let out_dir = args.out_dir.unwrap_or_else(|| config.output_dir.clone());
    fs::create_dir_all(&out_dir)?;
    reconciled
        .snapshot
        .save(out_dir.join("snapshot.repaired.json"))?;
    write_assignments(
        create(&out_dir, "assignments.repaired.csv")?,
        &reconciled.assignments,
    )?;
    print_summary(&reconciled.assignments);
    Ok(())
}

fn create(dir: &Path, name: &str) -> Result<BufWriter<File>, AppError> {
    Ok(BufWriter::new(File::create(dir.join(name))?))
}

fn print_summary(assignments: &[FinalAssignment]) {
    for status in [
        FinalStatus::Assigned,
        FinalStatus::Withdrawn,
        FinalStatus::Unplaced,
        FinalStatus::Disqualified,
    ] {
        let count = assignments.iter().filter(|a| a.status == status).count();
        println!("{:<13} {}", status.as_str(), count);
    }
}
