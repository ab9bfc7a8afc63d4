use anyhow::{Context, Result};
use clap::Parser;
use speechrelay::audio::cpal_source::{list_devices, suppress_audio_warnings, CpalCaptureSource};
use speechrelay::cli::{Cli, Commands};
use speechrelay::session::controller::SessionController;
use speechrelay::{Config, GoogleRecognizer, SessionEvent};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    suppress_audio_warnings();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Devices) => {
            for device in list_devices().context("failed to list input devices")? {
                println!("{}", device);
            }
            Ok(())
        }
        None => run_listen(cli).await,
    }
}

async fn run_listen(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?.with_env_overrides();
    let config = apply_cli_overrides(config, &cli);

    let recognizer = Arc::new(GoogleRecognizer::from_config(&config.recognition));
    let capture = CpalCaptureSource::new(config.audio.device.as_deref())
        .context("failed to open audio input")?;

    let (mut controller, mut events) =
        SessionController::new(config, Box::new(capture), recognizer);
    controller.start().context("failed to start session")?;
    eprintln!("Listening... press Ctrl-C to stop.");

    let deadline = async {
        match cli.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => print_event(&event, cli.meter),
                None => break,
            },
        }
    }

    eprintln!("\nStopping...");
    controller.stop().await.context("failed to stop session")?;

    // The flush transcript arrives after stop returns.
    while let Ok(event) = events.try_recv() {
        print_event(&event, cli.meter);
    }
    Ok(())
}

fn apply_cli_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(token) = &cli.token {
        config.recognition.access_token = token.clone();
    }
    if let Some(language) = &cli.language {
        config.recognition.language_code = language.clone();
    }
    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.session.chunk_duration_secs = chunk_size;
        // A chunk longer than the hard cap would fail validation on a field
        // the user never set; grow the cap to keep the pair consistent.
        if config.session.max_duration_secs < chunk_size {
            config.session.max_duration_secs = chunk_size;
        }
    }
    config
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => Ok(Config::load_or_default(Path::new("speechrelay.toml"))?),
    }
}

fn print_event(event: &SessionEvent, meter: bool) {
    match event {
        SessionEvent::Transcript(transcript) => {
            if meter {
                eprint!("\r{:<20}\r", "");
            }
            println!("{}", transcript.text);
        }
        SessionEvent::SoundLevel(db) => {
            if meter {
                eprint!("\r{:>7.1} dB ", db);
            }
        }
        SessionEvent::Error(message) => eprintln!("error: {}", message),
        SessionEvent::Warning(message) => eprintln!("warning: {}", message),
        SessionEvent::Audio(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_override_grows_hard_cap() {
        let cli = Cli::parse_from(["speechrelay", "--token", "t", "-c", "15"]);
        let config = apply_cli_overrides(Config::default(), &cli);
        assert_eq!(config.session.chunk_duration_secs, 15);
        assert_eq!(config.session.max_duration_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_small_chunk_size_keeps_default_cap() {
        let cli = Cli::parse_from(["speechrelay", "-c", "2"]);
        let config = apply_cli_overrides(Config::default(), &cli);
        assert_eq!(config.session.chunk_duration_secs, 2);
        assert_eq!(config.session.max_duration_secs, 10);
    }

    #[test]
    fn test_cli_overrides_beat_config_values() {
        let cli = Cli::parse_from([
            "speechrelay",
            "--token",
            "cli-token",
            "--language",
            "ja-JP",
            "--device",
            "pipewire",
        ]);
        let config = apply_cli_overrides(Config::default(), &cli);
        assert_eq!(config.recognition.access_token, "cli-token");
        assert_eq!(config.recognition.language_code, "ja-JP");
        assert_eq!(config.audio.device.as_deref(), Some("pipewire"));
    }
}
