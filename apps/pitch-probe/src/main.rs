use anyhow::{bail, Context};
use channel::{BinaryMessenger, MethodResult, StreamEvent};
use clap::{Parser, Subcommand};
use pitch::{AudioSource, DetectionConfig, WavSource};
use pitch_plugin::logger::init_logging;
use pitch_plugin::{PluginBinding, PluginBuilder, PluginSettings, SourceFactory, GET_PLATFORM_VERSION};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Drive the pitch detection plugin from the command line, acting as its host.
#[derive(Parser)]
#[command(name = "pitch-probe", version, about)]
struct Cli {
    /// Settings file (defaults to <config dir>/pitch-probe/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the plugin for the platform version
    Version,
    /// Invoke any method on the version channel
    Call {
        method: String,
        /// JSON arguments
        args: Option<String>,
    },
    /// Stream pitch events for a WAV file as JSON lines
    Detect {
        path: PathBuf,
        #[arg(long)]
        buffer_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Stream pitch events from the microphone until Ctrl-C
    Listen {
        #[arg(long)]
        buffer_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging("info")?;

    let settings = PluginSettings::load_or_default(cli.config.as_deref())
        .context("failed to load settings")?;
    let messenger = Arc::new(BinaryMessenger::new());

    match cli.command {
        Command::Version => {
            let binding = PluginBuilder::new(settings).attach(messenger);
            let result = binding
                .version_channel()
                .invoke_method(GET_PLATFORM_VERSION, Value::Null)?;
            print_result(&result);
            binding.detach();
        }
        Command::Call { method, args } => {
            let args = match args {
                Some(raw) => serde_json::from_str(&raw).context("arguments are not valid JSON")?,
                None => Value::Null,
            };
            let binding = PluginBuilder::new(settings).attach(messenger);
            let result = binding.version_channel().invoke_method(&method, args)?;
            print_result(&result);
            binding.detach();
        }
        Command::Detect {
            path,
            buffer_size,
            overlap,
        } => {
            let sample_rate = WavSource::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?
                .sample_rate();
            let binding = PluginBuilder::new(settings)
                .source_factory(wav_factory(path))
                .attach(messenger);
            stream(&binding, start_args(Some(sample_rate), buffer_size, overlap)).await?;
        }
        Command::Listen {
            buffer_size,
            overlap,
        } => {
            let binding = PluginBuilder::new(settings).attach(messenger);
            stream(&binding, start_args(None, buffer_size, overlap)).await?;
        }
    }

    Ok(())
}

fn print_result(result: &MethodResult) {
    match result {
        MethodResult::Success(Value::String(s)) => println!("{s}"),
        MethodResult::Success(value) => println!("{value}"),
        MethodResult::Error(err) => println!("error: {err}"),
        MethodResult::NotImplemented => println!("not implemented"),
    }
}

fn start_args(sample_rate: Option<u32>, buffer_size: Option<usize>, overlap: Option<usize>) -> Value {
    json!({
        "sampleRate": sample_rate,
        "bufferSize": buffer_size,
        "overlap": overlap,
    })
}

fn wav_factory(path: PathBuf) -> SourceFactory {
    Arc::new(move |_config: &DetectionConfig| -> pitch::Result<Box<dyn AudioSource>> {
        Ok(Box::new(WavSource::open(&path)?))
    })
}

/// Listen on the event channel, start detection and print events until the
/// source runs dry or the user interrupts.
async fn stream(binding: &PluginBinding, start: Value) -> anyhow::Result<()> {
    let events = binding.event_channel();
    events.receive_stream(Value::Null, |event: StreamEvent| match event {
        StreamEvent::Data(value) => println!("{value}"),
        StreamEvent::Error(err) => eprintln!("stream error: {err}"),
        StreamEvent::EndOfStream => info!("event stream ended"),
    })?;

    match binding.method_channel().invoke_method("start", start)? {
        MethodResult::Success(_) => {}
        MethodResult::Error(err) => {
            events.cancel_stream(Value::Null)?;
            bail!("start failed: {err}");
        }
        MethodResult::NotImplemented => bail!("plugin does not implement start"),
    }

    let finished = async {
        while binding.pitch().is_detecting() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::select! {
        _ = finished => info!("source exhausted"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("interrupted");
        }
    }

    binding.method_channel().invoke_method("stop", Value::Null)?;
    events.cancel_stream(Value::Null)?;
    Ok(())
}
