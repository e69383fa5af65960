// ==========================================
// 排放计算引擎 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 幂等建库：所有表 CREATE IF NOT EXISTS，可重复执行
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "EMISSION_ENGINE_DB_PATH";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 说明：
/// - 小数列一律存 TEXT，读取时还原为 Decimal，避免浮点误差
/// - emission_result.activity_id 唯一：同一活动至多一个结果
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS emission_factor (
            factor_id TEXT PRIMARY KEY,
            activity_type TEXT NOT NULL,
            lookup_identifier TEXT NOT NULL,
            lookup_key TEXT NOT NULL,
            unit TEXT NOT NULL,
            co2e_factor TEXT NOT NULL,
            scope INTEGER NOT NULL,
            category INTEGER,
            source TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_emission_factor_type
            ON emission_factor(activity_type, active);

        CREATE TABLE IF NOT EXISTS electricity_activity (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            country TEXT NOT NULL,
            usage_kwh TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS air_travel_activity (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            distance_miles TEXT NOT NULL,
            flight_range TEXT NOT NULL,
            passenger_class TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS goods_services_activity (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            supplier_category TEXT,
            spend_gbp TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS emission_result (
            result_id TEXT PRIMARY KEY,
            activity_id TEXT NOT NULL UNIQUE,
            activity_type TEXT NOT NULL,
            activity_date TEXT NOT NULL,
            factor_id TEXT,
            co2e_tonnes TEXT NOT NULL,
            confidence REAL NOT NULL,
            method TEXT NOT NULL,
            calculation_date TEXT NOT NULL,
            metadata_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_emission_result_calc_date
            ON emission_result(calculation_date);
        CREATE INDEX IF NOT EXISTS idx_emission_result_confidence
            ON emission_result(confidence);

        CREATE TABLE IF NOT EXISTS emission_summary (
            summary_type TEXT NOT NULL,
            from_date TEXT NOT NULL,
            to_date TEXT NOT NULL,
            filter_key TEXT NOT NULL,
            scope INTEGER,
            category INTEGER,
            activity_type TEXT,
            total_co2e_tonnes TEXT NOT NULL,
            activity_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (summary_type, from_date, to_date, filter_key)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 打开数据库并确保 schema 就绪
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;

    if let Some(version) = read_schema_version(&conn)? {
        if version != CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                db_path,
                found = version,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本与当前代码不一致"
            );
        }
    }
    Ok(conn)
}

/// 默认数据库路径
///
/// 优先级: 环境变量 EMISSION_ENGINE_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./emission_engine.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("emission-engine");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("emission_engine.db");
        }
    }
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent_before_init() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
