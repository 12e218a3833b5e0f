use anyhow::{Context, Result};
use stockcast_core::config::Config;

pub fn run(config: Config, port: Option<u16>, no_open: bool) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        let url = format!("http://localhost:{}", listener.local_addr()?.port());
        println!("stockcast → {url}");

        tokio::select! {
            res = stockcast_server::serve_on(config, listener, !no_open) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
