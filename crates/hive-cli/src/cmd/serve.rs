use std::path::PathBuf;

pub fn run(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        hive_server::serve_on(root, listener).await
    })
}
