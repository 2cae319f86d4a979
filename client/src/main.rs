use agora_client::backend::{ChangeBus, StaticAuth};
use agora_client::storage::SledRecordStore;
use agora_client::{init_tracing, router, AppConfig, AppState, Messenger, RealtimeBridge};
use agora_messaging::UserId;
use axum::serve;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let user = UserId::from(config.user_id.clone());

    let bus = ChangeBus::new();
    let store = SledRecordStore::open(&config.data_dir)?.with_change_bus(bus.clone());
    let auth = Arc::new(StaticAuth::signed_in(user.clone()));
    let messenger = Messenger::new(Arc::new(store), auth);

    if let Err(err) = messenger.load_conversations(&user).await {
        warn!(%err, "initial conversation load failed");
    }
    let bridge = match RealtimeBridge::start(messenger.clone(), Arc::new(bus), user.clone()).await
    {
        Ok(bridge) => Some(bridge),
        Err(err) => {
            warn!(%err, "realtime updates unavailable, serving last known state");
            None
        }
    };

    let state = AppState::new(config.clone(), messenger);
    let app = router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, %user, build_id = %config.build_id, "starting Agora client service");

    serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(bridge) = bridge {
        bridge.shutdown().await;
    }
    Ok(())
}
