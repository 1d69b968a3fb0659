//! # Bot Module
//!
//! Discord front end for the jukebox.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]: it registers the
//! slash commands, forwards them to the [`AudioPlayer`] and stops a guild's
//! session when the bot gets disconnected from voice.
//!
//! ## Example
//!
//! ```rust,no_run
//! use jukebox::{audio::player::AudioPlayer, bot::JukeboxBot, config::Config};
//! # use std::sync::Arc;
//! # fn example(player: Arc<AudioPlayer>) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let bot = JukeboxBot::new(config, player);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::player::AudioPlayer, config::Config};

/// Handler de eventos de Serenity para el jukebox
pub struct JukeboxBot {
    /// Configuración del bot cargada desde variables de entorno
    config: Arc<Config>,
    /// Motor de reproducción compartido con el handler de apagado
    pub player: Arc<AudioPlayer>,
}

impl JukeboxBot {
    pub fn new(config: Config, player: Arc<AudioPlayer>) -> Self {
        Self {
            config: Arc::new(config),
            player,
        }
    }

    /// Registra los comandos slash en Discord.
    ///
    /// Con `GUILD_ID` los comandos se registran solo en esa guild y aparecen
    /// en un segundo; los globales pueden tardar una hora.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no es miembro de la guild {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error al registrar comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar los comandos de guild. Verifica que el bot tenga el scope 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error al registrar comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar los comandos globales. Verifica que el bot tenga el scope 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está conectado!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Detiene la sesión del guild cuando sacan al bot de su canal de voz
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }

        let Some(left) = old.and_then(|state| state.channel_id) else {
            return;
        };
        if let Some(guild_id) = new.guild_id {
            if self.player.voice_disconnected(guild_id.get(), left.get()).await {
                info!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
            }
        }
    }
}
