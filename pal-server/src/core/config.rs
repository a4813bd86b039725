//! 服务器配置
//!
//! 持久化为一个 JSON 对象，分 `app` / `printing` / `airprint` / `ui` /
//! `security` 五个部分。未知嵌套键通过深合并保留，写入是原子的
//! (先写临时文件再 rename)，权限 0o640。
//!
//! # 环境变量
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | PRINTERPAL_CONFIG | /etc/printerpal/config.json | 配置文件路径 |
//! | PRINTERPAL_UPLOAD_DIR | /var/lib/printerpal/uploads | 上传目录 |
//! | PRINTERPAL_CACHE_DIR | /var/lib/printerpal/cache | 缓存目录 |

use std::fs;
use std::path::{Path, PathBuf};

use pal_printer::{PalError, PalResult, RenderMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub fn config_path() -> PathBuf {
    std::env::var("PRINTERPAL_CONFIG")
        .unwrap_or_else(|_| "/etc/printerpal/config.json".into())
        .into()
}

pub fn upload_dir() -> PathBuf {
    std::env::var("PRINTERPAL_UPLOAD_DIR")
        .unwrap_or_else(|_| "/var/lib/printerpal/uploads".into())
        .into()
}

pub fn cache_dir() -> PathBuf {
    std::env::var("PRINTERPAL_CACHE_DIR")
        .unwrap_or_else(|_| "/var/lib/printerpal/cache".into())
        .into()
}

/// HTTP 与上传限制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSection {
    pub host: String,
    pub port: u64,
    pub secret_key: String,
    pub max_upload_mb: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 打印默认值与处理上限
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintingSection {
    pub default_printer: String,
    pub preview_dpi: u64,
    pub print_dpi: u64,
    pub max_pdf_pages_process: u64,
    pub default_copies: u64,
    pub default_mode: RenderMode,
    pub bw_threshold: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirprintSection {
    pub auto_enable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSection {
    pub default_dark_mode: bool,
    pub default_eink_mode: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySection {
    pub require_token: bool,
    pub token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 完整配置对象
///
/// 整体替换，绝不就地修改：读取方拿到的是一个完整的快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub printing: PrintingSection,
    pub airprint: AirprintSection,
    pub ui: UiSection,
    pub security: SecuritySection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn generate_secret_key() -> String {
    // 64 hex chars from OS randomness; only used to satisfy the length
    // contract, no cookies are signed here.
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection {
                host: "0.0.0.0".into(),
                port: 80,
                secret_key: generate_secret_key(),
                max_upload_mb: 25,
                extra: Map::new(),
            },
            printing: PrintingSection {
                default_printer: String::new(),
                preview_dpi: 150,
                print_dpi: 200,
                max_pdf_pages_process: 30,
                default_copies: 1,
                default_mode: RenderMode::Grayscale,
                bw_threshold: 180,
                extra: Map::new(),
            },
            airprint: AirprintSection {
                auto_enable: true,
                extra: Map::new(),
            },
            ui: UiSection {
                default_dark_mode: false,
                default_eink_mode: false,
                extra: Map::new(),
            },
            security: SecuritySection {
                require_token: false,
                token: String::new(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> PalResult<()> {
    if !(min..=max).contains(&value) {
        return Err(PalError::Config(format!(
            "{name} must be between {min} and {max}"
        )));
    }
    Ok(())
}

impl AppConfig {
    /// 校验所有区间约束
    pub fn validate(&self) -> PalResult<()> {
        check_range("app.port", self.app.port, 1, 65535)?;
        check_range("app.max_upload_mb", self.app.max_upload_mb, 1, 500)?;
        if self.app.secret_key.len() < 16 {
            return Err(PalError::Config(
                "app.secret_key must be at least 16 characters".into(),
            ));
        }
        check_range("printing.preview_dpi", self.printing.preview_dpi, 72, 600)?;
        check_range("printing.print_dpi", self.printing.print_dpi, 72, 1200)?;
        check_range(
            "printing.max_pdf_pages_process",
            self.printing.max_pdf_pages_process,
            1,
            500,
        )?;
        check_range("printing.default_copies", self.printing.default_copies, 1, 99)?;
        check_range("printing.bw_threshold", self.printing.bw_threshold, 1, 254)?;
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.app.max_upload_mb as usize) * 1024 * 1024
    }
}

/// 深合并：嵌套对象递归合并，其余整值覆盖
fn deep_merge(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, src_val) in src_map {
                match dst_map.get_mut(key) {
                    Some(dst_val) if dst_val.is_object() && src_val.is_object() => {
                        deep_merge(dst_val, src_val);
                    }
                    _ => {
                        dst_map.insert(key.clone(), src_val.clone());
                    }
                }
            }
        }
        (dst, src) => *dst = src.clone(),
    }
}

/// Merge raw JSON over defaults, deserialize and range-check.
///
/// `validate(serialize(validate(x))) == validate(x)` holds: unknown nested
/// keys survive through the flattened extras.
pub fn validate_config(raw: &Value) -> PalResult<AppConfig> {
    if !raw.is_object() {
        return Err(PalError::Config("Config file must be a JSON object".into()));
    }
    let mut merged = serde_json::to_value(AppConfig::default())
        .map_err(|e| PalError::Config(format!("Default config serialization failed: {e}")))?;
    deep_merge(&mut merged, raw);

    let config: AppConfig = serde_json::from_value(merged)
        .map_err(|e| PalError::Config(format!("Invalid config: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// 配置存储：加载、校验、原子保存
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        Self::new(config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载并校验；文件缺失时写出默认配置
    pub fn load(&self) -> PalResult<AppConfig> {
        if !self.path.exists() {
            let config = validate_config(&Value::Object(Map::new()))?;
            self.write_atomic(&config)?;
            return Ok(config);
        }
        let content = fs::read_to_string(&self.path)?;
        let raw: Value = serde_json::from_str(&content)
            .map_err(|e| PalError::Config(format!("Config file is not valid JSON: {e}")))?;
        validate_config(&raw)
    }

    /// 校验后原子保存，返回规范化后的配置
    pub fn save(&self, raw: &Value) -> PalResult<AppConfig> {
        let config = validate_config(raw)?;
        self.write_atomic(&config)?;
        Ok(config)
    }

    fn write_atomic(&self, config: &AppConfig) -> PalResult<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut json = serde_json::to_string_pretty(config)
            .map_err(|e| PalError::Config(format!("Config serialization failed: {e}")))?;
        json.push('\n');

        // Sibling temp file, then rename over the target.
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        fs::write(tmp.path(), json.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o640))?;
        }
        tmp.persist(&self.path).map_err(|e| PalError::Io(e.error))?;
        Ok(())
    }
}
