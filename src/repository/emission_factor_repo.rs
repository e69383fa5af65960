// ==========================================
// 排放计算引擎 - 排放因子仓储
// ==========================================
// 表: emission_factor
// 红线: Repository 不含业务逻辑（键规范化在领域层完成）
// ==========================================

use crate::domain::emission_factor::EmissionFactor;
use crate::domain::types::ActivityType;
use crate::engine::collaborators::EmissionFactorSource;
use crate::repository::codec::{parse_activity_type, parse_decimal, parse_scope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT factor_id, activity_type, lookup_identifier, lookup_key, unit,
           co2e_factor, scope, category, source, active
    FROM emission_factor
"#;

/// 未解码的因子行
struct FactorRow {
    factor_id: String,
    activity_type: String,
    lookup_identifier: String,
    lookup_key: String,
    unit: String,
    co2e_factor: String,
    scope: i64,
    category: Option<i64>,
    source: Option<String>,
    active: bool,
}

impl FactorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            factor_id: row.get(0)?,
            activity_type: row.get(1)?,
            lookup_identifier: row.get(2)?,
            lookup_key: row.get(3)?,
            unit: row.get(4)?,
            co2e_factor: row.get(5)?,
            scope: row.get(6)?,
            category: row.get(7)?,
            source: row.get(8)?,
            active: row.get::<_, i64>(9)? != 0,
        })
    }

    fn into_factor(self) -> RepositoryResult<EmissionFactor> {
        Ok(EmissionFactor {
            activity_type: parse_activity_type(&self.activity_type)?,
            co2e_factor: parse_decimal("co2e_factor", &self.co2e_factor)?,
            scope: parse_scope(self.scope)?,
            factor_id: self.factor_id,
            lookup_identifier: self.lookup_identifier,
            lookup_key: self.lookup_key,
            unit: self.unit,
            category: self.category,
            source: self.source,
            active: self.active,
        })
    }
}

// ==========================================
// EmissionFactorRepository - 排放因子仓储
// ==========================================
pub struct EmissionFactorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmissionFactorRepository {
    /// 创建新的 EmissionFactorRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或覆盖单个因子
    pub fn insert(&self, factor: &EmissionFactor) -> RepositoryResult<()> {
        self.batch_insert(std::slice::from_ref(factor)).map(|_| ())
    }

    /// 批量插入因子（事务化，INSERT OR REPLACE）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    /// - Err: 整个事务回滚
    pub fn batch_insert(&self, factors: &[EmissionFactor]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO emission_factor (
                    factor_id, activity_type, lookup_identifier, lookup_key, unit,
                    co2e_factor, scope, category, source, active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for factor in factors {
                stmt.execute(params![
                    factor.factor_id,
                    factor.activity_type.as_str(),
                    factor.lookup_identifier,
                    factor.lookup_key,
                    factor.unit,
                    factor.co2e_factor.to_string(),
                    factor.scope.as_i64(),
                    factor.category,
                    factor.source,
                    factor.active as i64,
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// 按主键查询
    pub fn find_by_id(&self, factor_id: &str) -> RepositoryResult<Option<EmissionFactor>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE factor_id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![factor_id], FactorRow::from_row)
            .optional()?;
        row.map(FactorRow::into_factor).transpose()
    }

    /// 查询某活动类型的启用因子（按 lookup_key 排序）
    pub fn list_active(&self, activity_type: ActivityType) -> RepositoryResult<Vec<EmissionFactor>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE active = 1 AND activity_type = ?1 ORDER BY lookup_key, factor_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![activity_type.as_str()], FactorRow::from_row)?;

        let mut factors = Vec::new();
        for row in rows {
            factors.push(row?.into_factor()?);
        }
        Ok(factors)
    }

    /// 查询全部启用因子
    pub fn list_all_active(&self) -> RepositoryResult<Vec<EmissionFactor>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE active = 1 ORDER BY activity_type, lookup_key, factor_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], FactorRow::from_row)?;

        let mut factors = Vec::new();
        for row in rows {
            factors.push(row?.into_factor()?);
        }
        Ok(factors)
    }

    /// 停用因子（保留历史结果的引用）
    ///
    /// # 返回
    /// - Ok(true): 已停用
    /// - Ok(false): 因子不存在
    pub fn deactivate(&self, factor_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE emission_factor SET active = 0 WHERE factor_id = ?1",
            params![factor_id],
        )?;
        Ok(affected > 0)
    }

    pub fn count_active(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM emission_factor WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl EmissionFactorSource for EmissionFactorRepository {
    async fn load_active_factors(&self) -> RepositoryResult<Vec<EmissionFactor>> {
        self.list_all_active()
    }
}
