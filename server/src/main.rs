use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::gateway::Gateway;
use server::network::{Server, ServerMessage, ServerSettings};
use server::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::parse();

    let store = config.open_store().await?;
    info!("Using {:?} connection store", config.store);

    let registry = ConnectionRegistry::new(store).with_page_size(config.page_size);
    let gateway = Gateway::new(registry).with_owner(config.owner.clone());

    let mut server = Server::new(
        &config.bind_addr(),
        gateway,
        ServerSettings::from(&config),
    )
    .await?;
    let control = server.control();

    let mut server_handle = tokio::spawn(async move { server.run().await });

    tokio::select! {
        result = &mut server_handle => {
            match result {
                Ok(Err(e)) => error!("Server stopped with error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = control.send(ServerMessage::Shutdown);
            if let Ok(Err(e)) = server_handle.await {
                error!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
