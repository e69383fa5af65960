// ==========================================
// 排放计算引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)，只使用 scope_id='global'
// 规则: 缺省或无法解析时回退默认值，并记录 warn
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::factor_matcher::DEFAULT_FUZZY_THRESHOLD;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    // 匹配
    pub const FUZZY_THRESHOLD: &str = "fuzzy_threshold";

    // 分页
    pub const PAGE_SIZE: &str = "page_size";
    pub const EXISTING_IDS_PAGE_SIZE: &str = "existing_ids_page_size";

    // 协作方超时
    pub const COLLABORATOR_TIMEOUT_MS: &str = "collaborator_timeout_ms";
}

// ==========================================
// EngineConfig - 引擎运行参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 模糊匹配接受阈值（0-100，含等于）
    pub fuzzy_threshold: f64,
    /// 活动记录页大小
    pub page_size: usize,
    /// 已有结果 id 页大小
    pub existing_ids_page_size: usize,
    /// 单次协作方调用超时（毫秒）
    pub collaborator_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            page_size: 100,
            existing_ids_page_size: 100,
            collaborator_timeout_ms: 30_000,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&config_map).map_err(|e| RepositoryError::Other(e.into()))
    }

    /// 读取并解析配置，缺省或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Display + Copy,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(raw) => raw,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 加载引擎运行参数
    pub fn load_engine_config(&self) -> RepositoryResult<EngineConfig> {
        let defaults = EngineConfig::default();

        let mut fuzzy_threshold =
            self.get_parsed_or_default(config_keys::FUZZY_THRESHOLD, defaults.fuzzy_threshold)?;
        if !(0.0..=100.0).contains(&fuzzy_threshold) {
            tracing::warn!(
                config_key = config_keys::FUZZY_THRESHOLD,
                value = fuzzy_threshold,
                "模糊匹配阈值超出 0-100，使用默认值"
            );
            fuzzy_threshold = defaults.fuzzy_threshold;
        }

        let page_size = self.positive_or_default(config_keys::PAGE_SIZE, defaults.page_size)?;
        let existing_ids_page_size = self.positive_or_default(
            config_keys::EXISTING_IDS_PAGE_SIZE,
            defaults.existing_ids_page_size,
        )?;
        let collaborator_timeout_ms = self.get_parsed_or_default(
            config_keys::COLLABORATOR_TIMEOUT_MS,
            defaults.collaborator_timeout_ms,
        )?;

        let config = EngineConfig {
            fuzzy_threshold,
            page_size,
            existing_ids_page_size,
            collaborator_timeout_ms,
        };
        tracing::debug!(?config, "引擎配置已加载");
        Ok(config)
    }

    fn positive_or_default(&self, key: &str, default: usize) -> RepositoryResult<usize> {
        let value = self.get_parsed_or_default(key, default)?;
        if value == 0 {
            tracing::warn!(config_key = key, "页大小不能为 0，使用默认值");
            return Ok(default);
        }
        Ok(value)
    }
}
