// camlink Linux: receive fragmented camera images over UDP, process them, send replies.

mod config;
mod dispatcher;
mod pipeline;
mod sender;
mod store;
mod transport;

#[cfg(test)]
mod test_support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use camlink_core::{Channel, EchoTransform, ReassemblyEngine};
use log::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("camlink-linux {}", VERSION);
            return Ok(());
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cfg = config::load();
    info!("camlink-linux {} starting with {:?}", VERSION, cfg);

    let mut routes = HashMap::new();
    routes.insert(Channel::OutboundFrames, cfg.reply_addr);
    if let Some(addr) = cfg.stats_addr {
        routes.insert(Channel::Statistics, addr);
    }
    let publisher = Arc::new(transport::UdpPublisher::bind(
        "0.0.0.0:0".parse()?,
        routes,
    )?);
    let store = Arc::new(store::DirStore::new(&cfg.image_dir)?);
    info!("storing images in {}", store.dir().display());
    let sender = sender::Sender::new(
        publisher.clone(),
        cfg.chunk_size,
        Duration::from_millis(cfg.pacing_ms),
    );
    let pipeline = Arc::new(pipeline::Pipeline::new(
        Arc::new(EchoTransform),
        store,
        publisher,
        sender,
        cfg.latency_window,
        cfg.stats_addr.is_some(),
    ));
    let dispatcher = Arc::new(dispatcher::Dispatcher::new(
        ReassemblyEngine::with_idle_timeout(cfg.idle_timeout_ticks),
        pipeline,
    ));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let frame_socket = tokio::net::UdpSocket::bind(cfg.frame_bind).await?;
        info!(
            "listening for {} frames on {}",
            Channel::InboundFrames.topic(),
            cfg.frame_bind
        );
        let frame_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = transport::run_frame_receiver(frame_socket, frame_dispatcher).await {
                error!("frame receiver stopped: {}", e);
            }
        });

        if let Some(bind) = cfg.stats_bind {
            let stats_socket = tokio::net::UdpSocket::bind(bind).await?;
            info!(
                "listening for {} statistics on {}",
                Channel::Statistics.topic(),
                bind
            );
            let stats_dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                if let Err(e) = transport::run_stats_receiver(stats_socket, stats_dispatcher).await
                {
                    error!("statistics receiver stopped: {}", e);
                }
            });
        }

        let tick_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                tick_dispatcher.tick();
            }
        });

        shutdown_signal().await?;
        info!("shutting down; {:?}", dispatcher.pipeline().report());
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
