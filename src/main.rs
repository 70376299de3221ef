use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

use rocku::{
    audio::SessionRegistry,
    bot::MusicBot,
    config::Config,
    sources::{SmartSource, SpotifyClient, TrackResolver, YtDlpResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rocku=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting ROCKU v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let youtube = YtDlpResolver::new();
    if let Err(e) = youtube.verify().await {
        error!("❌ yt-dlp is not usable, every lookup will fail: {}", e);
    }
    let spotify = config
        .spotify_credentials()
        .map(|(id, secret)| SpotifyClient::new(id, secret, http.clone()));
    let resolver: Arc<dyn TrackResolver> = Arc::new(SmartSource::new(youtube, spotify, config.resolve_timeout()));

    let registry = Arc::new(SessionRegistry::new(config.session_settings()));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = MusicBot::new(config.clone(), registry.clone(), resolver, http);

    let mut client = Client::builder(&config.discord_token, intents)
        .application_id(config.discord_application_id()?)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, leaving every voice channel...");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("❌ Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    YtDlpResolver::new().verify().await?;
    println!("OK");
    Ok(())
}
