//! `solo` binary: load an instrument and play it from stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use solo::commands::HELP;
use solo::core::{AudioEngine, HostConfig};
use solo::keyboard::key_for_char;
use solo::{Command, Keyboard, PluginSource, Result, Session};
use tracing_subscriber::EnvFilter;

const TAP_HOLD: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(author, version, about = "Play a VST2 instrument from the terminal")]
struct Cli {
    /// Plugin binary (.so / .dll / .vst bundle).
    plugin: Option<PathBuf>,

    /// Use the built-in reference synth.
    #[arg(long, conflicts_with = "plugin")]
    builtin: bool,

    /// TOML host configuration; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    block_size: Option<usize>,

    /// Output device index (see --list-devices).
    #[arg(long)]
    device: Option<usize>,

    /// Program selected at start.
    #[arg(long)]
    program: Option<usize>,

    /// Print plugin info as JSON and exit.
    #[arg(long)]
    info: bool,

    /// List output devices and exit.
    #[arg(long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_devices {
        for device in AudioEngine::list_output_devices()? {
            println!("{device}");
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => HostConfig::from_toml_file(path)?,
        None => HostConfig::default(),
    };
    if let Some(sample_rate) = cli.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(block_size) = cli.block_size {
        config.block_size = block_size;
    }
    if cli.device.is_some() {
        config.output_device = cli.device;
    }

    let source = match cli.plugin {
        Some(path) if !cli.builtin => PluginSource::Path(path),
        _ => PluginSource::Builtin,
    };

    let mut builder = Session::builder().config(config).source(source);
    if let Some(program) = cli.program {
        builder = builder.program(program);
    }
    let mut session = builder.build()?;

    if cli.info {
        print_info(&session);
        return Ok(());
    }

    session.start_audio()?;
    println!(
        "{} ready ({} Hz, {} frames). Type 'help' for commands.",
        session.info().name,
        session.config().sample_rate,
        session.config().block_size
    );

    control_loop(&session)?;
    session.stop_audio();
    Ok(())
}

fn print_info(session: &Session) {
    match serde_json::to_string_pretty(session.info()) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("could not serialize plugin info: {e}"),
    }
}

fn control_loop(session: &Session) -> Result<()> {
    let mut keyboard = session.keyboard();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        if let Err(e) = execute(session, &mut keyboard, command.clone()) {
            println!("{e}");
        }
        if command == Command::Quit {
            break;
        }
    }

    keyboard.release()?;
    Ok(())
}

fn execute(session: &Session, keyboard: &mut Keyboard, command: Command) -> Result<()> {
    let instance = session.instance();
    match command {
        Command::On(note) => instance.note_on(note)?,
        Command::Off(note) => instance.note_off(note)?,
        Command::Tap(note) => {
            instance.note_on(note)?;
            thread::sleep(TAP_HOLD);
            instance.note_off(note)?;
        }
        Command::Keys(row) => {
            for c in row.chars() {
                match key_for_char(c) {
                    Some(key) => {
                        keyboard.press(key)?;
                        thread::sleep(TAP_HOLD);
                    }
                    None => keyboard.release()?,
                }
            }
            keyboard.release()?;
        }
        Command::Program(index) => {
            instance.set_program(index)?;
            println!("program {index}: {}", instance.program_names()[index]);
        }
        Command::Programs => {
            let current = instance.program().unwrap_or(0);
            for (i, name) in instance.program_names().iter().enumerate() {
                let marker = if i == current { '*' } else { ' ' };
                println!("{marker} {i:3} {name}");
            }
        }
        Command::Info => print_info(session),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}
