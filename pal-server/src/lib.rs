//! PrinterPal 服务端 - 局域网打印小站
//!
//! # 架构概述
//!
//! 本模块是 PrinterPal 的主入口，提供以下核心功能：
//!
//! - **HTTP API** (`api`): 上传、预览、打印提交、状态流
//! - **配置** (`core::config`): JSON 配置的校验、深合并与原子写入
//! - **认证** (`auth`): 可选共享令牌
//! - **后台任务** (`core::tasks`): AirPrint 定期重发布
//!
//! 打印管线本身 (CUPS 封装、渲染、AirPrint 助手) 在 `pal-printer` 中。
//!
//! # 模块结构
//!
//! ```text
//! pal-server/src/
//! ├── core/          # 配置、状态、错误、服务器、后台任务
//! ├── auth/          # 共享令牌认证
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志、格式化
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod utils;

// Re-export 公共类型
pub use core::{AppConfig, AppError, ConfigStore, Result, Server, ServerState};
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ____       _       __            ____        __
   / __ \_____(_)___  / /____  _____/ __ \____ _/ /
  / /_/ / ___/ / __ \/ __/ _ \/ ___/ /_/ / __ `/ /
 / ____/ /  / / / / / /_/  __/ /  / ____/ /_/ / /
/_/   /_/  /_/_/ /_/\__/\___/_/  /_/    \__,_/_/
    "#
    );
}
