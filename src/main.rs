use std::path::PathBuf;
use std::process;
use std::time::Instant;

use ccscriptwriter::config::Config;
use ccscriptwriter::dialogue::Dialogue;
use ccscriptwriter::output;
use ccscriptwriter::project::Project;
use ccscriptwriter::rom::Rom;
use ccscriptwriter::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

/// Dump EarthBound dialogue to CCScript source files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// EarthBound ROM image, with or without a copier header
    rom: PathBuf,

    /// Output directory, or the CoilSnake project with --coilsnake
    output: PathBuf,

    /// Treat OUTPUT as a CoilSnake project: read its text pointers, write
    /// into OUTPUT/ccscript and patch the project tables afterwards
    #[arg(short, long)]
    coilsnake: bool,

    /// TOML file overriding the built-in EarthBound layout
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let rom = Rom::open(&args.rom)?;
    info!("ROM: {}", rom);

    let mut project = if args.coilsnake {
        Some(Project::open(&args.output, &config.coilsnake)?)
    } else {
        None
    };
    let roots = project.as_ref().map(Project::roots).unwrap_or_default();

    let mut dialogue = Dialogue::load(rom.data(), &config, &roots)?;
    dialogue.process()?;

    let dir = if args.coilsnake {
        args.output.join("ccscript")
    } else {
        args.output.clone()
    };
    output::write_dialogue(&dir, &dialogue)?;

    if let Some(project) = project.as_mut() {
        info!("Updating CoilSnake project...");
        project.patch(dialogue.assignment())?;
        project.save()?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    debug!("{:?}", args);

    let started = Instant::now();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    println!("Complete. Time: {:.3}s", started.elapsed().as_secs_f64());
}
