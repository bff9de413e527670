mod app;
mod board;
mod config;
mod input;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use dotenv::dotenv;
use log::{debug, info};
use segpad_gpio::keypad::GpioKeypad;
use segpad_gpio::sevseg::MuxDisplay;
use segpad_gpio::tick::{ThreadTicker, TickSource};
use crate::app::App;
use crate::config::Config;

// Provides the std critical section implementation the drivers lock with.
use critical_section as _;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    let env_loaded = dotenv().is_ok();
    pretty_env_logger::init();

    info!("segpad starting...");
    if !env_loaded {
        debug!("No .env file, using the process environment.");
    }

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    let key_map = config.key_map()?;
    let geometry = key_map.geometry();
    board::check_layout(config.digits)?;

    debug!("Initializing keypad driver...");
    let (lines, columns) = board::keypad_groups(geometry)?;
    let mut keypad = GpioKeypad::new().with_settle_time(config.settle_time());
    keypad.configure(geometry, lines, columns, key_map.codes(), config.debounce)?;
    debug!("{:?} initialized.", keypad);

    debug!("Initializing display driver...");
    let mut display = MuxDisplay::new();
    display.set_ports(
        &board::PORT_D,
        &board::PORT_B,
        board::DISPLAY_SELECT_FIRST,
        config.select_active_level(),
    )?;
    display.configure(config.digits, config.polarity()?)?;
    let display = Arc::new(display);
    debug!("{:?} initialized.", display);

    let timing = config.timing()?;
    let mut ticker = ThreadTicker::new(timing.period());
    let tick_display = Arc::clone(&display);
    ticker.register(Box::new(move || tick_display.advance()))?;
    ticker.start()?;
    info!("Refreshing the display at {:.1} Hz.", timing.frequency_hz());

    let running = Arc::new(AtomicBool::new(true));
    input::spawn_key_presser(&board::PORT_B, key_map, config.hold_time(), Arc::clone(&running))?;

    info!("Starting main loop...");

    let mut app = App::new(&mut keypad, &display)?;
    while running.load(Ordering::Acquire) {
        app.update()?;
        thread::sleep(config.poll_interval());
    }

    ticker.stop();
    info!("Stopped after {} ticks, showing {:?}.", ticker.ticks(), app.render());

    Ok(())
}
