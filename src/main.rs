//! ipcbench CLI - topology-aware IPC benchmark driver

use clap::Parser;
use ipcbench::config::{CliArgs, Commands, RunConfig};
use ipcbench::core::{RunEngine, STAGE_DISCOVERY};
use ipcbench::error::Result;
use ipcbench::selection::{expand, select};
use ipcbench::topology::{discover, SysfsTree};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::parse();

    // Initialize logging; RUST_LOG wins over -v/-q
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Engine errors already name their stage
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<()> {
    match &args.command {
        Commands::Topology { json } => cmd_topology(args, *json),
        Commands::Targets => cmd_targets(args),
        Commands::Run { .. } => cmd_run(args),
    }
}

fn cmd_topology(args: &CliArgs, json: bool) -> Result<()> {
    let discovery = discover(&SysfsTree::new(&args.sysfs_root), None)
        .map_err(|e| e.with_context(STAGE_DISCOVERY))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&discovery)?);
    } else {
        discovery.table.print_summary(&discovery.cache);
    }

    Ok(())
}

fn cmd_targets(args: &CliArgs) -> Result<()> {
    let discovery = discover(&SysfsTree::new(&args.sysfs_root), None)
        .map_err(|e| e.with_context(STAGE_DISCOVERY))?;
    let targets = select(&discovery.table, &discovery.cache);
    let pairs = expand(&discovery.table, &targets);

    println!("Target CPUs: {}", targets.record());
    println!("Test pairs:");
    for pair in &pairs {
        println!("  {}", pair);
    }

    if let Some(ref dir) = args.output_dir {
        std::fs::create_dir_all(dir)?;
        let path = targets.write_record(dir)?;
        println!("Target record written to {}", path.display());
    }

    Ok(())
}

fn cmd_run(args: &CliArgs) -> Result<()> {
    let config = RunConfig::from_cli(args)?;

    if config.dry_run {
        println!("=== Dry Run Mode ===");
        println!("No benchmark will be executed.");
        println!();
    }

    let result = RunEngine::new(config).execute()?;

    if !args.quiet {
        result.print_summary();
    }

    Ok(())
}
