use poise::serenity_prelude as serenity;
use raidcord::commands::raid;
use raidcord::{board, config::Config, Data};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![raid::raid()],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    match event {
                        serenity::FullEvent::ReactionAdd { add_reaction } => {
                            if let Err(e) = board::handle_reaction(ctx, data, add_reaction).await {
                                error!("Failed to handle RSVP reaction: {:#}", e);
                            }
                        }
                        serenity::FullEvent::Message { new_message } => {
                            // The raid channel holds nothing but invite embeds.
                            if new_message.channel_id.get() == data.config.raid_channel_id
                                && !new_message.author.bot
                            {
                                let _ = new_message.delete(&ctx.http).await;
                            }
                        }
                        _ => {}
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                // Set bot status
                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let db = raidcord::db::Database::new(&config).expect("Failed to open database");
                db.execute_init().expect("Failed to initialize database");

                let refresher =
                    board::BoardRefresher::new(db.clone(), config.clone(), ctx.http.clone());
                tokio::spawn(refresher.run());

                Ok(Data { config, db })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
