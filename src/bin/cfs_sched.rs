//! cfs-sched - Completely fair scheduling simulator.
//!
//! Usage:
//!   cfs-sched <task-file>
//!
//! The task file holds one task per line as `name start duration`,
//! for example `A 0 5`.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use timberline::scheduler::{CfsScheduler, parse_tasks};

#[derive(Parser)]
#[command(name = "cfs-sched")]
#[command(about = "Simulate a completely fair scheduler over a task file")]
struct Cli {
    /// File of task descriptions, one `name start duration` per line
    task_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file = File::open(&cli.task_file)
        .with_context(|| format!("cannot open file {}", cli.task_file.display()))?;
    let tasks = parse_tasks(file)
        .with_context(|| format!("cannot load tasks from {}", cli.task_file.display()))?;

    let mut scheduler = CfsScheduler::new(tasks);
    for report in scheduler.run() {
        println!("{report}");
    }
    Ok(())
}
