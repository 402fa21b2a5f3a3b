mod config;
mod events;
mod tui;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use config::CtlConfig;
use lanlight::{Client, ClientConfig, ClientEvent, MacAddress};
use tui::{DeviceRow, TuiState};

#[derive(Parser)]
#[command(name = "lanlight-ctl")]
#[command(about = "Discover, monitor and control LAN lights")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    #[arg(short, long, default_value_t = lanlight::DEFAULT_PORT)]
    port: u16,

    #[arg(
        long,
        value_parser = config::parse_broadcast,
        help = "Broadcast address or CIDR subnet, may be repeated"
    )]
    broadcast: Vec<IpAddr>,

    #[arg(short, long, default_value_t = 3000, help = "Request timeout in ms")]
    timeout: u64,

    #[arg(long, default_value_t = 10000, help = "Monitor interval in ms, 0 to discover once")]
    monitor: u64,

    #[arg(long)]
    headless: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Discover, load every device and print the client state as JSON
    Discover {
        #[arg(long, default_value_t = 2000, help = "Discovery window in ms")]
        window: u64,
    },
    Power {
        mac: MacAddress,
        #[arg(value_enum)]
        state: Switch,
    },
    Color {
        mac: MacAddress,
        #[arg(help = "CSS color: name, #rgb, #rrggbb, rgb() or rgba()")]
        css: String,
        #[arg(long)]
        kelvin: Option<u16>,
    },
    Label {
        mac: MacAddress,
        label: String,
    },
    Echo {
        mac: MacAddress,
        text: String,
    },
    Reboot {
        mac: MacAddress,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Args {
    fn config(&self) -> CtlConfig {
        let defaults = ClientConfig::default();
        let broadcast = if self.broadcast.is_empty() {
            defaults.broadcast.clone()
        } else {
            self.broadcast.clone()
        };

        CtlConfig {
            client: ClientConfig {
                bind: self.bind,
                device_port: self.port,
                broadcast,
                request_timeout: Duration::from_millis(self.timeout),
                ..defaults
            },
            monitor_interval: (self.monitor > 0).then(|| Duration::from_millis(self.monitor)),
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config();

    match args.command {
        None if !args.headless => {
            let mut client = Client::new(config.client.clone())?;
            run_with_tui(&mut client, &config)?;
        }
        None => {
            init_logging();
            let mut client = Client::new(config.client.clone())?;
            run_headless(&mut client, &config)?;
        }
        Some(command) => {
            init_logging();
            let mut client = Client::new(config.client.clone())?;
            run_command(&mut client, command)?;
        }
    }

    Ok(())
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn start(client: &mut Client, config: &CtlConfig) -> Result<()> {
    match config.monitor_interval {
        Some(interval) => client.monitor(interval),
        None => {
            client.discover(true)?;
        }
    }
    Ok(())
}

/// Loads newly connected devices and returns every event for display.
fn handle_events(client: &mut Client, config: &CtlConfig) -> Vec<ClientEvent> {
    let events = client.drain_events();
    let mut extra = Vec::new();
    for event in &events {
        if let ClientEvent::Connect { mac, .. } = event {
            if config.load_on_connect {
                if let Err(e) = client.load(*mac) {
                    log::warn!("loading {} failed: {}", mac, e);
                }
                extra.extend(client.drain_events());
            }
        }
    }
    events.into_iter().chain(extra).collect()
}

fn run_headless(client: &mut Client, config: &CtlConfig) -> Result<()> {
    log::info!("Listening on {} as {:08x}", client.local_addr(), client.source());
    start(client, config)?;

    let running = client.running();
    let stop = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        stop.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        client.tick_once();
        for event in handle_events(client, config) {
            let (level, line) = events::describe(&event);
            log::log!(level, "{}", line);
        }
        thread::sleep(config.client.poll_interval);
    }

    log::info!("Shutting down");
    client.shutdown();
    Ok(())
}

fn run_command(client: &mut Client, command: Command) -> Result<()> {
    if let Command::Discover { window } = command {
        let found = client.scan(Duration::from_millis(window))?;
        for mac in found {
            if let Err(e) = client.load(mac) {
                log::warn!("loading {} failed: {}", mac, e);
            }
        }
        println!("{}", serde_json::to_string_pretty(&client.state())?);
        return Ok(());
    }

    let window = client.config().discovery_timeout;
    client.scan(window)?;

    match command {
        Command::Discover { .. } => {}
        Command::Power { mac, state } => {
            let mut device = control(client, mac)?;
            let power = device.set_power(matches!(state, Switch::On))?;
            println!("{}", serde_json::to_string_pretty(&power)?);
        }
        Command::Color { mac, css, kelvin } => {
            let mut device = control(client, mac)?;
            let color = device.set_css(&css, kelvin)?;
            println!("{}", serde_json::to_string_pretty(&color)?);
        }
        Command::Label { mac, label } => {
            let mut device = control(client, mac)?;
            let label = device.set_label(&label)?;
            println!("{}", serde_json::to_string_pretty(&label)?);
        }
        Command::Echo { mac, text } => {
            let mut device = control(client, mac)?;
            println!("{}", device.echo(&text)?);
        }
        Command::Reboot { mac } => {
            control(client, mac)?.reboot()?;
            log::info!("Reboot sent to {}", mac);
        }
    }

    Ok(())
}

fn control(client: &mut Client, mac: MacAddress) -> Result<lanlight::DeviceHandle<'_>> {
    if !client.has_device(&mac) {
        bail!("device {} did not answer discovery", mac);
    }
    Ok(client.control(&mac)?)
}

fn device_rows(client: &Client) -> Vec<DeviceRow> {
    client
        .devices()
        .macs()
        .iter()
        .filter_map(|mac| client.device(mac))
        .map(DeviceRow::from_device)
        .collect()
}

fn run_with_tui(client: &mut Client, config: &CtlConfig) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = client.running();
    let mut tui_state = TuiState::new();

    tui_state.log_info(format!(
        "Listening on {} as {:08x}",
        client.local_addr(),
        client.source()
    ));
    if let Err(e) = start(client, config) {
        tui_state.log_error(format!("Discovery failed: {}", e));
    }

    while running.load(Ordering::SeqCst) {
        client.tick_once();

        for event in handle_events(client, config) {
            let (level, line) = events::describe(&event);
            tui_state.log(level, line);
        }

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let rows = device_rows(client);
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            running.store(false, Ordering::SeqCst);
                        }
                        KeyCode::Up => tui_state.select_prev(rows.len()),
                        KeyCode::Down => tui_state.select_next(rows.len()),
                        KeyCode::Char(' ') => {
                            if let Some(row) = tui_state.selected(&rows) {
                                toggle_power(client, &mut tui_state, row.mac, !row.on);
                            }
                        }
                        KeyCode::Char('r') => match client.discover(true) {
                            Ok(_) => tui_state.log_info("Rescanning"),
                            Err(e) => tui_state.log_error(format!("Rescan failed: {}", e)),
                        },
                        KeyCode::Char('l') => {
                            if let Some(row) = tui_state.selected(&rows) {
                                if let Err(e) = client.load(row.mac) {
                                    tui_state.log_warn(format!("Loading {} failed: {}", row.mac, e));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let rows = device_rows(client);
        let stats = client.stats().clone();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &rows);
        })?;
    }

    tui_state.log_info("Shutting down...");
    client.shutdown();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}

fn toggle_power(client: &mut Client, tui_state: &mut TuiState, mac: MacAddress, on: bool) {
    let Ok(mut device) = client.control(&mac) else {
        return;
    };
    if !device.can_send() {
        tui_state.log_warn(format!("{} is busy", mac));
        return;
    }
    match device.set_power(on) {
        Ok(power) if power.is_confirmed() => {}
        Ok(_) => tui_state.log_warn(format!("{} did not confirm power", mac)),
        Err(e) => tui_state.log_error(format!("Power on {} failed: {}", mac, e)),
    }
}
