use anyhow::{Context, Result};
use clap::Parser;
use confique::Config;
use dt5560_daq::{
    finish_run, spawn_acquisition, Acquisition, Conf, Digitizer, SimulatedDigitizer, Status,
    Transport,
};
use log::{info, LevelFilter};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::{
    fs::File,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use time::OffsetDateTime;

#[derive(Parser, Debug)]
#[command(version, about = "DT5560 waveform acquisition")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of events, overriding the configuration
    #[arg(short = 'n', long)]
    events: Option<usize>,

    /// Use the software digitizer instead of the board
    #[arg(long)]
    simulate: bool,

    /// Log to the terminal instead of showing the status panel
    #[arg(long)]
    headless: bool,

    /// Directory for the run log
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Log every FIFO read
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut conf = Conf::builder()
        .file(&args.config)
        .load()
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(n_events) = args.events {
        conf.acquisition.n_events = n_events;
    }

    let log_file = init_logging(&args)?;
    info!("Logging to {}", log_file.display());

    let layout = conf.frame_layout().context("invalid frame layout")?;
    info!(
        "Frame layout: {} channels x {} samples, {} header words, {} words per frame",
        layout.channel_count(),
        layout.samples_per_waveform(),
        layout.header_word_count(),
        layout.frame_word_count()
    );

    let transport = open_transport(&args, &conf)?;
    let digitizer = Digitizer::new(transport, conf.registers(), layout);
    let mut acq = Acquisition::new(digitizer, conf.acquisition_settings());
    acq.setup()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let (rx, handle) = spawn_acquisition(acq, Arc::clone(&shutdown));
    let mut status = Status::new(&conf, &layout, conf.acquisition.n_events);

    if args.headless {
        status.run_headless(&rx);
    } else {
        let mut terminal = ratatui::init();
        let result = status.run(&mut terminal, &rx, &shutdown);
        ratatui::restore();
        if result.is_err() {
            shutdown.store(true, Ordering::SeqCst);
        }
        result?;
    }

    let summary = finish_run(handle, &status)?;
    println!(
        "Decoded {} of {} events ({} without header, {} incomplete){}",
        summary.decoded,
        summary.requested,
        summary.no_header,
        summary.incomplete,
        if summary.cancelled { ", stopped early" } else { "" }
    );

    Ok(())
}

fn init_logging(args: &Args) -> Result<PathBuf> {
    let stamp = OffsetDateTime::now_utc().unix_timestamp();
    let path = args.log_dir.join(format!("dt5560_{}.log", stamp));
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![WriteLogger::new(level, config.clone(), file)];
    // the status panel owns the terminal
    if args.headless {
        loggers.push(TermLogger::new(
            level,
            config,
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    CombinedLogger::init(loggers)?;

    Ok(path)
}

fn open_transport(args: &Args, conf: &Conf) -> Result<Box<dyn Transport + Send>> {
    if args.simulate {
        info!("Using the simulated digitizer");
        let layout = conf.frame_layout()?;
        return Ok(Box::new(SimulatedDigitizer::new(
            layout,
            conf.device.config_addr,
            conf.sim_settings(),
        )));
    }
    connect(conf)
}

#[cfg(feature = "r5560")]
fn connect(conf: &Conf) -> Result<Box<dyn Transport + Send>> {
    let device = dt5560_daq::R5560::connect(&conf.device.ip_address, conf.device.port)?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "r5560"))]
fn connect(conf: &Conf) -> Result<Box<dyn Transport + Send>> {
    anyhow::bail!(
        "built without the r5560 feature, cannot reach {}; use --simulate",
        conf.device.ip_address
    )
}
