// ========================================================================================
//
//                       THE COMMAND-LINE FRONT END: SLOTBENCH
//
// ========================================================================================
//
// Parses arguments, initializes logging, resolves the slot layout, and drives the
// library pipeline with a terminal progress bar. With no arguments it reads
// `train.csv` and writes `dummy_benchmark.csv` in the working directory.

#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use slotbench::config::SlotLayout;
use slotbench::pipeline::{self, DEFAULT_INPUT_PATH, DEFAULT_OUTPUT_PATH, RunOptions};
use slotbench::progress::{RunProgressObserver, RunStage};
use slotbench::reduce::Weighting;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WeightingCli {
    BinValue,
    RowIndex,
}

impl From<WeightingCli> for Weighting {
    fn from(value: WeightingCli) -> Self {
        match value {
            WeightingCli::BinValue => Weighting::BinValue,
            WeightingCli::RowIndex => Weighting::RowIndex,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "slotbench",
    version,
    about = "Weighted first-positive slot benchmark over sparse per-entity time series."
)]
struct Args {
    /// Observation CSV with id,date,sum columns
    #[arg(default_value = DEFAULT_INPUT_PATH)]
    input: PathBuf,

    /// Destination of the id,sum result table
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// TOML file overriding the entity/slot layout constants
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How histogram bins are scored before picking the winner
    #[arg(long, value_enum, default_value_t = WeightingCli::BinValue)]
    weighting: WeightingCli,

    /// Do not draw a progress bar
    #[arg(long)]
    quiet: bool,
}

/// Draws one progress bar per stage on stderr when it is a terminal.
struct TerminalProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

impl RunProgressObserver for TerminalProgress {
    fn on_stage_start(&mut self, stage: RunStage, total_entities: usize) {
        if self.quiet {
            return;
        }
        self.bar = Some(create_progress_bar(total_entities as u64, stage.describe()));
    }

    fn on_stage_advance(&mut self, _stage: RunStage, processed_entities: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(processed_entities as u64);
        }
    }

    fn on_stage_finish(&mut self, _stage: RunStage) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let layout = match &args.config {
        Some(path) => {
            eprintln!("> Using layout from: {}", path.display());
            SlotLayout::load(path)?
        }
        None => SlotLayout::default(),
    };

    let options = RunOptions {
        input: args.input,
        output: args.output,
        layout,
        weighting: args.weighting.into(),
    };

    eprintln!("> Reading observations from: {}", options.input.display());
    let mut progress = TerminalProgress::new(args.quiet);
    let summary = pipeline::run(&options, &mut progress)?;

    log::info!(
        "Read {} rows ({} skipped), {} stored cells, {} populated entities",
        summary.rows_read,
        summary.rows_skipped,
        summary.stored_cells,
        summary.populated_entities
    );
    for (bin, count) in summary.result_counts.iter().enumerate() {
        if *count > 0 {
            log::debug!("result {bin}: {count} entities");
        }
    }
    eprintln!(
        "> Wrote {} results to: {}",
        summary.entities(),
        options.output.display()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start_time = Instant::now();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    eprintln!("> Finished in {:.2?}", start_time.elapsed());
}
