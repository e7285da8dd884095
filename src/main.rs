use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ptt_bridge::audio::{MicrophoneFactory, SpeakerOutput};
use ptt_bridge::bus::ResilientPubSubClient;
use ptt_bridge::nats::{connect_speech_client, NatsConnector, NatsRecognizer, NatsSynthesizer};
use ptt_bridge::orchestrator::{run_display, DisplayState, OrchestratorParts, SessionOrchestrator};
use ptt_bridge::speech::{PlaybackController, StreamingRecognitionSession};
use ptt_bridge::{create_router, AppState, Config};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Push-to-talk voice bridge
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/ptt-bridge")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let routes = cfg.routes();
    let voice_out_topic = routes
        .voice_out_topic()
        .context("no outbound voice topic configured")?
        .to_string();

    // Speech services
    let speech_client = connect_speech_client(&cfg.speech.nats_url).await?;
    let recognizer = NatsRecognizer::new(
        speech_client.clone(),
        cfg.speech.frame_subject_prefix.clone(),
        cfg.speech.transcript_subject.clone(),
    );
    let synthesizer = NatsSynthesizer::new(speech_client, cfg.speech.synthesis_subject.clone());

    let recognition = Arc::new(StreamingRecognitionSession::new(
        Arc::new(recognizer),
        cfg.recognition(),
        cfg.stop_timeout(),
    ));

    let output = SpeakerOutput::open().context("Failed to open audio output")?;
    let playback = Arc::new(PlaybackController::new(
        Arc::new(synthesizer),
        Arc::new(output),
        cfg.voice(),
        cfg.playback.audio_encoding,
    ));

    // Message bus
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let connector = NatsConnector::new(cfg.bus.url.clone(), cfg.bus.client_id.clone());
    let bus = ResilientPubSubClient::new(Arc::new(connector), routes, cfg.retry_policy(), inbound_tx);

    // Display
    let (display_tx, display_rx) = mpsc::unbounded_channel();
    let display = Arc::new(RwLock::new(DisplayState::default()));
    tokio::spawn(run_display(display_rx, Arc::clone(&display)));

    let orchestrator = SessionOrchestrator::spawn(
        OrchestratorParts {
            capture_factory: Arc::new(MicrophoneFactory),
            capture_config: cfg.capture(),
            recognition: Arc::clone(&recognition),
            playback: Arc::clone(&playback),
            bus: bus.clone(),
            voice_out_topic,
            interrupt_delay: cfg.interrupt_delay(),
            display: display_tx,
        },
        inbound_rx,
    );

    let connecting = bus.clone();
    tokio::spawn(async move {
        if let Err(e) = connecting.connect().await {
            error!("Message bus unavailable: {}", e);
        }
    });

    let state = AppState {
        orchestrator: orchestrator.clone(),
        display,
        bus,
        recognition,
        playback,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP control surface listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    orchestrator.shutdown().await;
    info!("Goodbye");
    Ok(())
}
