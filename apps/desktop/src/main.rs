use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::load_settings,
    conversation::{ConversationSync, SyncEvent},
    display::{display_name, premium_active},
    ApiClient, DurableSessionStore, SessionStore,
};
use shared::domain::UserId;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    /// Follow the conversation with this member for a few poll cycles.
    #[arg(long)]
    peer: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let settings = load_settings();
    let persistence = DurableSessionStore::initialize(&settings.session_database_url).await?;
    let session = SessionStore::new(persistence);
    let api = Arc::new(ApiClient::new(&settings, Arc::clone(&session))?);

    let login = api.login(&args.email, &args.password).await?;
    println!("Logged in as user_id={}", login.id.0);

    let me = api.my_profile(login.id).await?;
    let viewer_premium = premium_active(&me);

    let profiles = api.all_profiles().await?;
    println!("{} profiles available:", profiles.len());
    for profile in profiles.iter().take(10) {
        println!("  {}", display_name(profile, viewer_premium));
    }

    if let Some(peer) = args.peer {
        let sync = ConversationSync::new(Arc::clone(&api), login.id, Some(UserId(peer)));
        let mut events = sync.subscribe_events();
        sync.open().await;
        for _ in 0..3 {
            let Ok(SyncEvent::ViewUpdated(view)) = events.recv().await else {
                break;
            };
            println!(
                "{} messages, online={}, unread={}",
                view.messages.len(),
                view.is_online,
                view.unread_count(login.id)
            );
        }
        sync.close().await;
    }

    Ok(())
}
