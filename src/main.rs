use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

use jukebox::{
    audio::player::AudioPlayer,
    bot::JukeboxBot,
    config::Config,
    sources::{ResolverAdapter, YtDlpSource},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        let ytdlp_path = std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string());
        YtDlpSource::new(ytdlp_path).verify_dependencies().await?;
        println!("OK");
        return Ok(());
    }

    let config = Config::load()?;
    info!("{}", config.summary());

    let settings = config.player_settings();
    let source = Arc::new(YtDlpSource::new(&config.ytdlp_path));
    if let Err(e) = source.verify_dependencies().await {
        error!("❌ {:?}", e);
    }
    let resolver = ResolverAdapter::new(source, settings.retry_attempts, settings.backoff)
        .with_max_playlist_size(config.max_playlist_size);
    let player = Arc::new(AudioPlayer::new(resolver, settings));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let handler = JukeboxBot::new(config.clone(), player.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("No se pudo escuchar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando sesiones...");
        player.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
