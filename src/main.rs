use std::fs;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use contourpp::cli::Args;
use contourpp::pipeline::{collect_from_lines, collect_live, render_bayer, render_csv};
use contourpp::session::{Session, SyncOutcome};
use contourpp::transport::hid::HidChannel;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> contourpp::error::Result<()> {
    if args.lowlevel_api {
        let channel = HidChannel::open()?;
        let mut session = Session::new(channel);
        loop {
            match session.sync()? {
                SyncOutcome::Line(line) => println!("{line}"),
                SyncOutcome::EndOfStream => break,
            }
        }
        return Ok(());
    }

    let filter = args.record_filter();
    let shift_minutes = args.shift_minutes()?;

    let records = if args.input_file.is_empty() {
        let channel = HidChannel::open()?;
        collect_live(channel, filter, shift_minutes)?
    } else {
        let mut records = Vec::new();
        for path in &args.input_file {
            let contents = fs::read_to_string(path)?;
            let lines: Vec<&str> = contents.lines().collect();
            records.extend(collect_from_lines(lines, filter, shift_minutes)?);
        }
        records
    };

    let rendered = if args.bayer_format { render_bayer(&records) } else { render_csv(&records) };
    println!("{rendered}");

    Ok(())
}
