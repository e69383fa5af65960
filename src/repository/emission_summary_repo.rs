// ==========================================
// 排放计算引擎 - 排放汇总仓储
// ==========================================
// 表: emission_summary
// 唯一: (summary_type, from_date, to_date, filter_key)；重复聚合覆盖旧行
// ==========================================

use crate::domain::emission_summary::{EmissionSummary, SummaryFilter, SummaryType};
use crate::repository::codec::{
    format_date, parse_activity_type, parse_date, parse_decimal, parse_scope,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT summary_type, from_date, to_date, scope, category, activity_type,
           total_co2e_tonnes, activity_count
    FROM emission_summary
"#;

/// 维度组合的稳定键（NULL 以 * 表示）
pub fn filter_key(filter: &SummaryFilter) -> String {
    format!(
        "scope={}|category={}|activity_type={}",
        filter
            .scope
            .map(|s| s.as_i64().to_string())
            .unwrap_or_else(|| "*".to_string()),
        filter
            .category
            .map(|c| c.to_string())
            .unwrap_or_else(|| "*".to_string()),
        filter.activity_type.map(|t| t.as_str()).unwrap_or("*"),
    )
}

struct SummaryRow {
    summary_type: String,
    from_date: String,
    to_date: String,
    scope: Option<i64>,
    category: Option<i64>,
    activity_type: Option<String>,
    total_co2e_tonnes: String,
    activity_count: i64,
}

impl SummaryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            summary_type: row.get(0)?,
            from_date: row.get(1)?,
            to_date: row.get(2)?,
            scope: row.get(3)?,
            category: row.get(4)?,
            activity_type: row.get(5)?,
            total_co2e_tonnes: row.get(6)?,
            activity_count: row.get(7)?,
        })
    }

    fn into_summary(self) -> RepositoryResult<EmissionSummary> {
        let summary_type = SummaryType::from_str(&self.summary_type).ok_or_else(|| {
            RepositoryError::field_value("summary_type", self.summary_type.clone())
        })?;
        Ok(EmissionSummary {
            summary_type,
            from_date: parse_date("from_date", &self.from_date)?,
            to_date: parse_date("to_date", &self.to_date)?,
            filter: SummaryFilter {
                scope: self.scope.map(parse_scope).transpose()?,
                category: self.category,
                activity_type: self
                    .activity_type
                    .as_deref()
                    .map(parse_activity_type)
                    .transpose()?,
            },
            total_co2e_tonnes: parse_decimal("total_co2e_tonnes", &self.total_co2e_tonnes)?,
            activity_count: self.activity_count,
        })
    }
}

// ==========================================
// EmissionSummaryRepository - 排放汇总仓储
// ==========================================
pub struct EmissionSummaryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmissionSummaryRepository {
    /// 创建新的 EmissionSummaryRepository 实例
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

    /// 写入或覆盖一条汇总
    pub fn upsert(&self, summary: &EmissionSummary) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO emission_summary (
                summary_type, from_date, to_date, filter_key,
                scope, category, activity_type,
                total_co2e_tonnes, activity_count, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
            ON CONFLICT(summary_type, from_date, to_date, filter_key) DO UPDATE SET
                total_co2e_tonnes = excluded.total_co2e_tonnes,
                activity_count = excluded.activity_count,
                updated_at = excluded.updated_at
            "#,
            params![
                summary.summary_type.as_str(),
                format_date(summary.from_date),
                format_date(summary.to_date),
                filter_key(&summary.filter),
                summary.filter.scope.map(|s| s.as_i64()),
                summary.filter.category,
                summary.filter.activity_type.map(|t| t.as_str()),
                summary.total_co2e_tonnes.to_string(),
                summary.activity_count,
            ],
        )?;
        Ok(())
    }

    /// 查询单条汇总
    pub fn find(
        &self,
        summary_type: SummaryType,
        from: NaiveDate,
        to: NaiveDate,
        filter: &SummaryFilter,
    ) -> RepositoryResult<Option<EmissionSummary>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE summary_type = ?1 AND from_date = ?2 AND to_date = ?3 AND filter_key = ?4",
            SELECT_COLUMNS
        );
        let row = conn
            .query_row(
                &sql,
                params![
                    summary_type.as_str(),
                    format_date(from),
                    format_date(to),
                    filter_key(filter)
                ],
                SummaryRow::from_row,
            )
            .optional()?;
        row.map(SummaryRow::into_summary).transpose()
    }

    /// 查询某窗口的全部汇总
    pub fn list_window(
        &self,
        summary_type: SummaryType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<EmissionSummary>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE summary_type = ?1 AND from_date = ?2 AND to_date = ?3 ORDER BY filter_key",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![summary_type.as_str(), format_date(from), format_date(to)],
            SummaryRow::from_row,
        )?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_summary()?);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ActivityType, Scope};

    #[test]
    fn test_filter_key_is_stable() {
        assert_eq!(
            filter_key(&SummaryFilter::overall()),
            "scope=*|category=*|activity_type=*"
        );
        assert_eq!(
            filter_key(&SummaryFilter::scope_activity(Scope::Scope3, ActivityType::AirTravel)),
            "scope=3|category=*|activity_type=AIR_TRAVEL"
        );
    }
}
