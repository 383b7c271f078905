use actix::prelude::*;
use common::clock::{Clock, SystemClock};
use common::constants::CHAT_REPLY_DELAY;
use std::env;
use std::sync::Arc;
use tokio::signal::ctrl_c;

mod console;
mod driver_actors;
mod messages;
mod session_store;

use driver_actors::chat_relay::ChatRelay;
use driver_actors::dispatcher::Dispatcher;
use driver_actors::session::{DriverSession, SessionTiming};
use messages::internal_messages::RegisterSession;
use session_store::{FileSessionStore, SessionStore};

#[actix::main]
async fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <driver_id> [store_path]", args[0]);
        std::process::exit(1);
    }

    let driver_id = args[1].clone();
    let store_path = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| format!("{}_session.json", driver_id));

    println!(
        "Starting driver console for {} (session file: {})",
        driver_id, store_path
    );

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(store_path));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let dispatcher = Dispatcher::new(clock.clone()).start();
    let chat = ChatRelay::new(CHAT_REPLY_DELAY).start();
    let session = DriverSession::restore(
        driver_id,
        store,
        dispatcher,
        chat.clone(),
        clock,
        SessionTiming::default(),
    )
    .start();
    chat.do_send(RegisterSession {
        session: session.clone(),
    });

    console::spawn_console(session);

    tokio::select! {
        _ = ctrl_c() => {
            println!("Ctrl-C received, shutting down...");
        }
    }

    Ok(())
}
