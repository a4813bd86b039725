use pal_server::{ConfigStore, Server, ServerState, init_logger, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv + 日志)
    dotenv::dotenv().ok();
    init_logger();

    print_banner();

    tracing::info!("PrinterPal starting...");

    // 2. 加载配置并准备目录
    let store = ConfigStore::from_env();
    let state = ServerState::initialize(store)?;

    // 3. 启动 HTTP 服务器 (Server::run 会自动启动后台任务)
    let server = Server::with_state(state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {e}");
        return Err(e.into());
    }

    Ok(())
}
