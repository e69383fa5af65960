// ==========================================
// 排放计算引擎 - 排放结果仓储
// ==========================================
// 表: emission_result（activity_id 唯一：同一活动至多一个结果）
// 写入: 按页事务化 INSERT OR REPLACE，任一失败整页回滚
// 读取: 已有结果 id 按 activity_id 键集分页，不物化结果行
// ==========================================

use crate::domain::emission_summary::{AggregateTotals, SummaryFilter};
use crate::domain::result::{CalculationMetadata, EmissionResult};
use crate::engine::collaborators::ResultStore;
use crate::repository::codec::{
    format_date, parse_activity_type, parse_date, parse_decimal, parse_method,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT result_id, activity_id, activity_type, activity_date, factor_id,
           co2e_tonnes, confidence, method, calculation_date, metadata_json
    FROM emission_result
"#;

/// 未解码的结果行
struct ResultRow {
    result_id: String,
    activity_id: String,
    activity_type: String,
    activity_date: String,
    factor_id: Option<String>,
    co2e_tonnes: String,
    confidence: f64,
    method: String,
    calculation_date: String,
    metadata_json: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            result_id: row.get(0)?,
            activity_id: row.get(1)?,
            activity_type: row.get(2)?,
            activity_date: row.get(3)?,
            factor_id: row.get(4)?,
            co2e_tonnes: row.get(5)?,
            confidence: row.get(6)?,
            method: row.get(7)?,
            calculation_date: row.get(8)?,
            metadata_json: row.get(9)?,
        })
    }

    fn into_result(self) -> RepositoryResult<EmissionResult> {
        let metadata: CalculationMetadata = serde_json::from_str(&self.metadata_json)
            .map_err(|e| RepositoryError::field_value("metadata_json", e.to_string()))?;
        Ok(EmissionResult {
            activity_type: parse_activity_type(&self.activity_type)?,
            activity_date: parse_date("activity_date", &self.activity_date)?,
            co2e_tonnes: parse_decimal("co2e_tonnes", &self.co2e_tonnes)?,
            method: parse_method(&self.method)?,
            calculation_date: parse_date("calculation_date", &self.calculation_date)?,
            result_id: self.result_id,
            activity_id: self.activity_id,
            factor_id: self.factor_id,
            confidence: self.confidence,
            metadata,
        })
    }
}

// ==========================================
// EmissionResultRepository - 排放结果仓储
// ==========================================
pub struct EmissionResultRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmissionResultRepository {
    /// 创建新的 EmissionResultRepository 实例
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

    // ===== 写入 =====

    /// 持久化一页结果（事务化）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    /// - Err: 整页回滚
    pub fn persist_page(&self, results: &[EmissionResult]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO emission_result (
                    result_id, activity_id, activity_type, activity_date, factor_id,
                    co2e_tonnes, confidence, method, calculation_date, metadata_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for result in results {
                let metadata_json = serde_json::to_string(&result.metadata)
                    .map_err(|e| RepositoryError::field_value("metadata_json", e.to_string()))?;
                stmt.execute(params![
                    result.result_id,
                    result.activity_id,
                    result.activity_type.as_str(),
                    format_date(result.activity_date),
                    result.factor_id,
                    result.co2e_tonnes.to_string(),
                    result.confidence,
                    result.method.as_str(),
                    format_date(result.calculation_date),
                    metadata_json,
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        tracing::debug!(count, "结果页已写入");
        Ok(count)
    }

    /// 删除某活动的结果
    pub fn delete_for_activity(&self, activity_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM emission_result WHERE activity_id = ?1",
            params![activity_id],
        )?;
        Ok(affected > 0)
    }

    // ===== 查询 =====

    /// 已有结果的活动 id（键集分页）
    pub fn existing_ids_page(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT activity_id FROM emission_result
            WHERE (?1 IS NULL OR activity_id > ?1)
            ORDER BY activity_id LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![cursor, page_size as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn find_by_activity_id(&self, activity_id: &str) -> RepositoryResult<Option<EmissionResult>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE activity_id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![activity_id], ResultRow::from_row)
            .optional()?;
        row.map(ResultRow::into_result).transpose()
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM emission_result", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// 全部结果的 CO2e 合计（吨，精确小数求和）
    pub fn total_co2e_tonnes(&self) -> RepositoryResult<Decimal> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT co2e_tonnes FROM emission_result")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut total = Decimal::ZERO;
        for row in rows {
            total += parse_decimal("co2e_tonnes", &row?)?;
        }
        Ok(total)
    }

    /// 低置信度结果（供人工复核）
    ///
    /// # 参数
    /// - threshold: 置信度上限（不含）
    /// - offset / limit: 分页
    pub fn list_low_confidence(
        &self,
        threshold: f64,
        offset: usize,
        limit: usize,
    ) -> RepositoryResult<Vec<EmissionResult>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE confidence < ?1 ORDER BY confidence ASC, activity_id ASC LIMIT ?2 OFFSET ?3",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![threshold, limit as i64, offset as i64],
            ResultRow::from_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.into_result()?);
        }
        Ok(results)
    }

    /// 按维度聚合计算日期窗口 [from, to] 内的结果
    ///
    /// 范围/分类取自结果所引用的排放因子。
    pub fn aggregate(
        &self,
        filter: &SummaryFilter,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<AggregateTotals> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.co2e_tonnes
            FROM emission_result r
            LEFT JOIN emission_factor f ON f.factor_id = r.factor_id
            WHERE r.calculation_date >= ?1 AND r.calculation_date <= ?2
              AND (?3 IS NULL OR f.scope = ?3)
              AND (?4 IS NULL OR f.category = ?4)
              AND (?5 IS NULL OR r.activity_type = ?5)
            "#,
        )?;
        let rows = stmt.query_map(
            params![
                format_date(from),
                format_date(to),
                filter.scope.map(|s| s.as_i64()),
                filter.category,
                filter.activity_type.map(|t| t.as_str()),
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut totals = AggregateTotals {
            total_co2e_tonnes: Decimal::ZERO,
            activity_count: 0,
        };
        for row in rows {
            totals.total_co2e_tonnes += parse_decimal("co2e_tonnes", &row?)?;
            totals.activity_count += 1;
        }
        Ok(totals)
    }
}

#[async_trait]
impl ResultStore for EmissionResultRepository {
    async fn fetch_existing_result_ids(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> RepositoryResult<Vec<String>> {
        self.existing_ids_page(cursor, page_size)
    }

    async fn persist_results(&self, results: &[EmissionResult]) -> RepositoryResult<usize> {
        self.persist_page(results)
    }

    async fn delete_by_activity_id(&self, activity_id: &str) -> RepositoryResult<bool> {
        self.delete_for_activity(activity_id)
    }
}
