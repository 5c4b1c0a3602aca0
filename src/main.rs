use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use interview_sim::app::{ModeFlags, NoticeLevel, Phase};
use interview_sim::generator::GeminiClient;
use interview_sim::speech::transcriber::ModelStore;
use interview_sim::speech::{CommandSpeaker, SpeechCapture, WhisperCapture};
use interview_sim::{Collaborators, Config, Session, SessionConfig, SessionHandle, SessionSettings, Speaker, SurfaceUpdate};

#[derive(Parser)]
#[command(name = "interview-sim")]
#[command(about = "Practice technical interviews with a spoken AI interviewer", long_about = None)]
struct Cli {
    /// frontend, backend or fullstack
    #[arg(long)]
    role: Option<String>,

    /// junior, mid or senior
    #[arg(long)]
    level: Option<String>,

    /// Start with voice mode on
    #[arg(long)]
    voice: bool,

    /// Don't load the speech recognition model
    #[arg(long)]
    no_capture: bool,
}

/// What the input loop needs to know before forwarding a typed answer.
#[derive(Debug, Clone, Copy)]
struct InputGate {
    flags: ModeFlags,
    phase: Phase,
}

impl InputGate {
    /// Why a typed answer can't be taken right now, if it can't.
    fn hold_reason(&self) -> Option<&'static str> {
        if !self.flags.can_submit() {
            Some("Please wait, the interviewer is still thinking.")
        } else if self.phase != Phase::AwaitingAnswer {
            Some("Please wait for the next question.")
        } else {
            None
        }
    }
}

const HELP: &str = "Type an answer and press Enter. Commands: /voice /listen /stop /retry /reset /quit";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("interview_sim=info"))
        .init();
    let cli = Cli::parse();
    log::info!("Interview simulator starting");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    if cli.voice {
        config.voice_mode = true;
    }

    let session_config = SessionConfig::from_params(cli.role.as_deref(), cli.level.as_deref());
    let capture = build_capture(&config, cli.no_capture).await;

    let collaborators = Collaborators {
        generator: Arc::new(GeminiClient::from_config(&config)),
        capture,
        playback: Arc::new(CommandSpeaker::from_config(&config.speech)),
    };
    let settings = SessionSettings {
        voice_mode: config.voice_mode,
        pacing: config.pacing.clone(),
        generation_timeout: config.generation_timeout(),
    };

    let (session, handle, updates) = Session::new(session_config, settings, collaborators);
    println!(
        "== {} {} interview ==\n{HELP}",
        session_config.role, session_config.level
    );

    let (gate_tx, gate_rx) = watch::channel(InputGate {
        flags: ModeFlags {
            voice_mode_enabled: config.voice_mode,
            ..ModeFlags::default()
        },
        phase: Phase::Starting,
    });
    let session_task = tokio::spawn(session.run());
    let render_task = tokio::spawn(render_updates(updates, gate_tx));

    read_input(&handle, gate_rx, config).await;

    handle.shutdown();
    let _ = session_task.await;
    render_task.abort();
    Ok(())
}

/// Load whisper, downloading it on first use. Without it, voice answers
/// fail with a notice and typed answers still work.
async fn build_capture(config: &Config, skip: bool) -> Arc<dyn SpeechCapture> {
    if skip {
        return Arc::new(WhisperCapture::unavailable(&config.speech));
    }
    match ModelStore::default().ensure().await {
        Ok(ctx) => Arc::new(WhisperCapture::new(Arc::new(ctx), &config.speech)),
        Err(e) => {
            log::warn!("Speech recognition unavailable: {e}");
            Arc::new(WhisperCapture::unavailable(&config.speech))
        }
    }
}

/// Stdin is the input surface; EOF ends the session.
async fn read_input(handle: &SessionHandle, gate: watch::Receiver<InputGate>, mut config: Config) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read input: {e}");
                break;
            }
        };

        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/voice" => {
                handle.toggle_voice_mode();
                config.voice_mode = !config.voice_mode;
                if let Err(e) = config.save() {
                    log::warn!("Failed to save config: {e}");
                }
            }
            "/listen" => {
                handle.start_listening();
            }
            "/stop" => {
                handle.stop_listening();
            }
            "/retry" => {
                handle.retry();
            }
            "/reset" => {
                handle.reset();
            }
            "/help" => println!("{HELP}"),
            command if command.starts_with('/') => println!("Unknown command. {HELP}"),
            answer => match gate.borrow().hold_reason() {
                Some(reason) => println!("* {reason}"),
                None => {
                    handle.submit(answer);
                }
            },
        }
    }
}

async fn render_updates(updates: async_channel::Receiver<SurfaceUpdate>, gate_tx: watch::Sender<InputGate>) {
    let mut flags = gate_tx.borrow().flags;
    while let Ok(update) = updates.recv().await {
        match update {
            SurfaceUpdate::MessageAppended(message) => {
                let who = match message.sender() {
                    Speaker::Interviewer => "Interviewer",
                    Speaker::Candidate => "You",
                };
                println!(
                    "\n[{}] {who}: {}",
                    message.timestamp().format("%H:%M:%S"),
                    message.content()
                );
            }
            SurfaceUpdate::TranscriptCleared => println!("\n----------------------------------------"),
            SurfaceUpdate::Notice(notice) => match notice.level {
                NoticeLevel::Info => println!("* {}", notice.text),
                NoticeLevel::Error => println!("! {}", notice.text),
            },
            SurfaceUpdate::PhaseChanged(phase) => {
                log::debug!("Phase: {phase:?}");
                gate_tx.send_modify(|gate| gate.phase = phase);
            }
            SurfaceUpdate::FlagsChanged(new_flags) => {
                if new_flags.is_listening && !flags.is_listening {
                    println!("(Listening...)");
                }
                if new_flags.is_speaking && !flags.is_speaking {
                    println!("(Interviewer speaking...)");
                }
                if new_flags.is_awaiting_generation && !flags.is_awaiting_generation {
                    println!("(Thinking...)");
                }
                flags = new_flags;
                gate_tx.send_modify(|gate| gate.flags = new_flags);
            }
        }
        let _ = std::io::stdout().flush();
    }
}
