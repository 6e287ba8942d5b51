//! # Segment Counter Application Entry Point
//!
//! This binary wires the library together: it loads the configuration, opens
//! the LED chain, and hands the poller and renderer to the cooperative
//! scheduler. It supports both production mode (LED chain over SPI) and
//! development mode (ASCII frames on stdout).


use anyhow::Context;
use segment_counter_lib::{
    config::Config,
    counter_data::{CounterBinding, HttpFetcher, Poller},
    frame::{ConsoleBus, EmitterBus},
    layout::DisplayLayout,
    renderer::{View, ViewCycler},
    scheduler::{Repeat, Scheduler, SystemClock, Task},
    shared_counters, CounterState,
};
use std::env;

/// Command line options.
struct Args {
    /// Print frames to stdout instead of driving the LED chain
    stdout: bool,
    /// Poll and render once, then exit
    once: bool,
    config: Option<String>,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = Args {
            stdout: false,
            once: false,
            config: None,
        };
        let mut iter = env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--stdout" => args.stdout = true,
                "--once" => args.once = true,
                "--config" => {
                    args.config = Some(iter.next().context("--config needs a path")?);
                }
                other => anyhow::bail!("unknown argument {other:?}"),
            }
        }
        Ok(args)
    }
}

/// Open the emitter chain for production mode.
#[cfg(all(target_os = "linux", feature = "hardware"))]
fn open_bus(config: &Config, _layout: DisplayLayout) -> anyhow::Result<Box<dyn EmitterBus>> {
    use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
    use linux_embedded_hal::SpidevBus;
    use segment_counter_lib::frame::{Ws2812SpiBus, SPI_FREQUENCY_HZ};

    let path = &config.display.spi_device;
    let mut spi = SpidevBus::open(path).map_err(|e| anyhow::anyhow!("open {path}: {e:?}"))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(SPI_FREQUENCY_HZ)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .with_context(|| format!("configure {path}"))?;

    log::info!("Driving LED chain on {} at {} Hz", path, SPI_FREQUENCY_HZ);
    Ok(Box::new(Ws2812SpiBus::new(spi)))
}

#[cfg(not(all(target_os = "linux", feature = "hardware")))]
fn open_bus(config: &Config, layout: DisplayLayout) -> anyhow::Result<Box<dyn EmitterBus>> {
    log::warn!("LED chain support not enabled. Rebuild with --features hardware on Linux.");
    log::warn!("Showing ASCII frames instead");
    Ok(Box::new(ConsoleBus::stdout(layout, config.off_color())))
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse()?;
    let config = match &args.config {
        Some(path) => Config::try_load_from_path(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => Config::load(),
    };
    config.validate().context("invalid configuration")?;

    let layout = config.layout()?;
    log::info!(
        "{} digits, {} LEDs per segment, {} LEDs total",
        layout.digit_count(),
        layout.emitters_per_segment(),
        layout.total_emitters()
    );

    // Development mode: ASCII output for testing
    let bus: Box<dyn EmitterBus> = if args.stdout {
        Box::new(ConsoleBus::stdout(layout, config.off_color()))
    } else {
        open_bus(&config, layout)?
    };

    let counters = shared_counters(CounterState::new(config.counter_names()));

    let bindings = config
        .source
        .counters
        .iter()
        .map(|c| CounterBinding {
            name: c.name.clone(),
            section: c.section.clone(),
        })
        .collect();
    let fetcher = HttpFetcher::new().context("creating HTTP client")?;
    let poller = Poller::new(
        fetcher,
        config.source.url.clone(),
        config.source.field.clone(),
        config.fetch_timeout(),
        bindings,
        counters.clone(),
    )
    .with_policy(config.source.on_failure);

    let views = config.display.views.iter().map(View::from).collect();
    let mut cycler = ViewCycler::new(
        layout,
        bus,
        views,
        config.view_window(),
        config.off_color(),
        counters,
    );
    // Start from a dark strip before any task runs
    cycler.blank();

    let repeat = if args.once {
        Repeat::Times(1)
    } else {
        Repeat::Forever
    };
    let mut scheduler = Scheduler::new(SystemClock::new());
    let poll_task = scheduler.add(Task::new("poll", config.poll_interval(), repeat, poller));
    let render_task = scheduler.add(Task::new("render", config.render_interval(), repeat, cycler));
    scheduler.enable(poll_task);
    scheduler.enable(render_task);

    log::info!(
        "Polling {} every {:?}, repainting every {:?}",
        config.source.url,
        config.poll_interval(),
        config.render_interval()
    );
    scheduler.run_until(|_| false, std::thread::sleep);

    Ok(())
}
