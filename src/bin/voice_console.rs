//! Terminal front-end for the voice proxy.
//!
//! Usage:
//!   voice-console [--voice <id>] [--out <file>] <text...>   Synthesize, save and play
//!   voice-console --list                                     List available voices

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use voice_proxy::client::playback::DOWNLOAD_FILE_NAME;
use voice_proxy::client::{Player, ProxyClient, UiState, VoiceConsole};

const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

struct Options {
    voice: Option<String>,
    out: PathBuf,
    list: bool,
    text: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    let server = std::env::var("VOICE_PROXY_URL").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
    let api = match ProxyClient::new(&server) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    #[cfg(feature = "audio-playback")]
    {
        match voice_proxy::client::RodioPlayer::try_default() {
            Ok(player) => {
                let code = run(VoiceConsole::new(player), &api, &options, |p| p.wait_until_end()).await;
                std::process::exit(code);
            }
            Err(e) => tracing::warn!("No audio output, playback disabled: {}", e),
        }
    }

    let code = run(
        VoiceConsole::new(voice_proxy::client::NullPlayer),
        &api,
        &options,
        |_| {},
    )
    .await;
    std::process::exit(code);
}

async fn run<P: Player>(
    mut console: VoiceConsole<P>,
    api: &ProxyClient,
    options: &Options,
    wait: impl FnOnce(&P),
) -> i32 {
    console.load_voices(api).await;
    if let Some(message) = console.error() {
        eprintln!("{message}");
        return 1;
    }

    if options.list {
        for voice in console.voices() {
            println!("{}\t{}", voice.id, voice.name);
        }
        return 0;
    }

    if let Some(voice) = &options.voice {
        if !console.select_voice(voice) {
            eprintln!("Unknown voice '{voice}'. Use --list to see available voices.");
            return 1;
        }
    }
    console.set_text(options.text.clone());

    if let Some(selected) = console.selected_voice() {
        eprintln!("Generating with voice {selected}...");
    }
    console.generate(api).await;

    let code = match console.state() {
        UiState::PlaybackReady(handle) => match handle.save_to(&options.out).await {
            Ok(()) => {
                println!("{}", options.out.display());
                wait(console.player());
                0
            }
            Err(e) => {
                eprintln!("{e}");
                1
            }
        },
        UiState::Error(message) => {
            eprintln!("{message}");
            1
        }
        _ => 1,
    };

    console.unmount();
    code
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut voice = None;
    let mut out = PathBuf::from(DOWNLOAD_FILE_NAME);
    let mut list = false;
    let mut words = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--voice" | "-v" => {
                voice = Some(iter.next().ok_or("--voice needs a value")?.clone());
            }
            "--out" | "-o" => {
                out = PathBuf::from(iter.next().ok_or("--out needs a value")?);
            }
            "--list" | "-l" => list = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with("--") => return Err(format!("Unknown option: {other}")),
            word => words.push(word.to_string()),
        }
    }

    if !list && words.is_empty() {
        return Err("No text given".to_string());
    }

    Ok(Options {
        voice,
        out,
        list,
        text: words.join(" "),
    })
}

fn print_usage() {
    println!(
        r#"voice-console: speak text through the voice proxy

USAGE:
    voice-console [OPTIONS] <TEXT...>
    voice-console --list

OPTIONS:
    -v, --voice <id>    Voice to use (default: first listed)
    -o, --out <file>    Where to save the audio (default: {DOWNLOAD_FILE_NAME})
    -l, --list          List available voices and exit
    -h, --help          Show this help message

ENVIRONMENT:
    VOICE_PROXY_URL     Server base URL (default: {DEFAULT_SERVER})"#
    );
}
