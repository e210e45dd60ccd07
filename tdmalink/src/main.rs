//! Runs a TDMA link scenario.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use eyre::WrapErr;
use itertools::Itertools;

use tdmalink::scenario::{Report, Scenario, Summary};
use tdmalink::{LogObserver, Observer, Recorder};

/// Runs a TDMA link scenario and reports what every terminal sent and received.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// Path to the scenario in JSON format.
    #[clap(long)]
    scenario: PathBuf,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,

    /// Write the run summary to this file in JSON format.
    #[clap(long)]
    output: Option<PathBuf>,

    /// Write every transmission notification to this file, one JSON object per line.
    #[clap(long)]
    events: Option<PathBuf>,
}

fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("Finished at {:.6} s", summary.end_time);
    for terminal in &summary.terminals {
        println!(
            "{}: sent {}, refused {}, received [{}]",
            terminal.address,
            terminal.sent,
            terminal.refused,
            terminal
                .received
                .iter()
                .map(|reception| reception.serial)
                .join(", ")
        );
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;

    let file = File::open(&opt.scenario).wrap_err("unable to read scenario")?;
    let scenario: Scenario = serde_json::from_reader(file).wrap_err("unable to parse scenario")?;

    let recorder = Recorder::default();
    let observers: Vec<Box<dyn Observer<Report>>> =
        vec![Box::new(LogObserver), Box::new(recorder.clone())];
    let mut simulation = scenario
        .build(observers)
        .wrap_err("unable to set up the network")?;
    let summary = simulation.run();
    print_summary(&summary);

    if let Some(path) = &opt.output {
        let file = File::create(path).wrap_err("unable to create output file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .wrap_err("unable to write summary")?;
    }
    if let Some(path) = &opt.events {
        let mut writer =
            BufWriter::new(File::create(path).wrap_err("unable to create events file")?);
        for event in recorder.events() {
            serde_json::to_writer(&mut writer, &event)?;
            writeln!(writer)?;
        }
        writer.flush()?;
    }
    Ok(())
}
