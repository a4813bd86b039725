//! 服务器状态
//!
//! [`ServerState`] 持有所有请求处理器共享的引用：配置快照句柄、
//! 配置存储、上传/缓存目录和 AirPrint 限流器。使用 Arc 实现浅拷贝。
//!
//! 配置采用整体替换：读取方通过 [`ServerState::config`] 克隆一个
//! `Arc<AppConfig>` 快照，更新端用 [`ServerState::swap_config`] 替换
//! 整个对象，并发读取永远不会看到部分合并的结果。

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use pal_printer::{EnsureLimiter, PalResult};

use crate::core::config::{AppConfig, ConfigStore, cache_dir, upload_dir};

#[derive(Clone)]
pub struct ServerState {
    /// 配置快照 (RCU: 整体替换，绝不就地修改)
    config: Arc<RwLock<Arc<AppConfig>>>,
    /// 配置存储
    store: Arc<ConfigStore>,
    /// 上传目录
    upload_dir: PathBuf,
    /// 缓存目录
    cache_dir: PathBuf,
    /// AirPrint 重发布限流器
    limiter: Arc<EnsureLimiter>,
}

impl ServerState {
    /// 初始化：加载配置并确保目录结构存在
    pub fn initialize(store: ConfigStore) -> PalResult<Self> {
        let config = store.load()?;
        let upload_dir = upload_dir();
        let cache_dir = cache_dir();
        std::fs::create_dir_all(&upload_dir)?;
        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(Arc::new(config))),
            store: Arc::new(store),
            upload_dir,
            cache_dir,
            limiter: Arc::new(EnsureLimiter::default()),
        })
    }

    /// 测试用：指定目录构造
    pub fn with_dirs(store: ConfigStore, upload_dir: PathBuf, cache_dir: PathBuf) -> PalResult<Self> {
        let config = store.load()?;
        std::fs::create_dir_all(&upload_dir)?;
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            config: Arc::new(RwLock::new(Arc::new(config))),
            store: Arc::new(store),
            upload_dir,
            cache_dir,
            limiter: Arc::new(EnsureLimiter::default()),
        })
    }

    /// 当前配置快照
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.read().expect("config lock poisoned").clone()
    }

    /// 整体替换配置
    pub fn swap_config(&self, config: AppConfig) {
        *self.config.write().expect("config lock poisoned") = Arc::new(config);
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.upload_dir
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    pub fn limiter(&self) -> &EnsureLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_state() -> (ServerState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let state = ServerState::with_dirs(
            store,
            dir.path().join("uploads"),
            dir.path().join("cache"),
        )
        .unwrap();
        (state, dir)
    }

    #[test]
    fn test_config_swap_is_whole_object() {
        let (state, _dir) = test_state();
        let before = state.config();
        assert_eq!(before.printing.print_dpi, 200);

        let updated = state
            .store()
            .save(&json!({"printing": {"print_dpi": 300}}))
            .unwrap();
        state.swap_config(updated);

        // Old snapshot unchanged, new snapshot complete
        assert_eq!(before.printing.print_dpi, 200);
        assert_eq!(state.config().printing.print_dpi, 300);
    }
}
