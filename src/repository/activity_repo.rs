// ==========================================
// 排放计算引擎 - 活动数据仓储
// ==========================================
// 表: electricity_activity / air_travel_activity / goods_services_activity
// 分页: 按 id 升序的键集分页（cursor = 上一页最后一个 id）
// ==========================================

use crate::domain::activity::{
    ActivityPayload, ActivityRecord, AirTravelActivity, ElectricityActivity,
    GoodsServicesActivity,
};
use crate::domain::types::ActivityType;
use crate::engine::collaborators::ActivitySource;
use crate::repository::codec::{parse_decimal, parse_flight_range};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, ToSql, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// ActivityRepository - 活动数据仓储
// ==========================================
pub struct ActivityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActivityRepository {
    /// 创建新的 ActivityRepository 实例
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

    fn table_name(activity_type: ActivityType) -> &'static str {
        match activity_type {
            ActivityType::Electricity => "electricity_activity",
            ActivityType::AirTravel => "air_travel_activity",
            ActivityType::GoodsServices => "goods_services_activity",
        }
    }

    // ===== 写入 =====

    pub fn insert(&self, record: &ActivityRecord) -> RepositoryResult<()> {
        self.batch_insert(std::slice::from_ref(record)).map(|_| ())
    }

    /// 批量插入活动记录（事务化，混合类型按载荷分表）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    /// - Err: 整个事务回滚
    pub fn batch_insert(&self, records: &[ActivityRecord]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        for record in records {
            Self::insert_tx(&tx, record)?;
        }

        tx.commit()?;
        Ok(records.len())
    }

    fn insert_tx(tx: &Transaction<'_>, record: &ActivityRecord) -> RepositoryResult<()> {
        match &record.payload {
            ActivityPayload::Electricity(e) => {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO electricity_activity (id, date, country, usage_kwh)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![record.id, record.date, e.country, e.usage_kwh.to_string()],
                )?;
            }
            ActivityPayload::AirTravel(a) => {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO air_travel_activity (
                        id, date, distance_miles, flight_range, passenger_class
                    ) VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        record.id,
                        record.date,
                        a.distance_miles,
                        a.flight_range.label(),
                        a.passenger_class
                    ],
                )?;
            }
            ActivityPayload::GoodsServices(g) => {
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO goods_services_activity (
                        id, date, description, supplier_category, spend_gbp
                    ) VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        record.id,
                        record.date,
                        g.description,
                        g.supplier_category,
                        g.spend_gbp.to_string()
                    ],
                )?;
            }
        }
        Ok(())
    }

    // ===== 查询 =====

    /// 键集分页读取
    ///
    /// # 参数
    /// - activity_type: 活动类型（决定读哪张表）
    /// - cursor: 上一页最后一个 id（None 从头开始）
    /// - page_size: 页大小
    pub fn fetch_page(
        &self,
        activity_type: ActivityType,
        cursor: Option<&str>,
        page_size: usize,
    ) -> RepositoryResult<Vec<ActivityRecord>> {
        let limit = page_size as i64;
        self.select(
            activity_type,
            "WHERE (?1 IS NULL OR id > ?1) ORDER BY id LIMIT ?2",
            params![cursor, limit],
        )
    }

    /// 按 id 查询单条活动
    pub fn find_by_id(
        &self,
        activity_type: ActivityType,
        id: &str,
    ) -> RepositoryResult<Option<ActivityRecord>> {
        let records = self.select(activity_type, "WHERE id = ?1", params![id])?;
        Ok(records.into_iter().next())
    }

    fn select(
        &self,
        activity_type: ActivityType,
        clause: &str,
        params: &[&dyn ToSql],
    ) -> RepositoryResult<Vec<ActivityRecord>> {
        let conn = self.get_conn()?;
        let table = Self::table_name(activity_type);

        match activity_type {
            ActivityType::Electricity => {
                let sql = format!("SELECT id, date, country, usage_kwh FROM {} {}", table, clause);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params, |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (id, date, country, usage_kwh) = row?;
                    records.push(ActivityRecord::new(
                        id,
                        date,
                        ActivityPayload::Electricity(ElectricityActivity {
                            country,
                            usage_kwh: parse_decimal("usage_kwh", &usage_kwh)?,
                        }),
                    ));
                }
                Ok(records)
            }
            ActivityType::AirTravel => {
                let sql = format!(
                    "SELECT id, date, distance_miles, flight_range, passenger_class FROM {} {}",
                    table, clause
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params, |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (id, date, distance_miles, flight_range, passenger_class) = row?;
                    records.push(ActivityRecord::new(
                        id,
                        date,
                        ActivityPayload::AirTravel(AirTravelActivity {
                            distance_miles,
                            flight_range: parse_flight_range(&flight_range)?,
                            passenger_class,
                        }),
                    ));
                }
                Ok(records)
            }
            ActivityType::GoodsServices => {
                let sql = format!(
                    "SELECT id, date, description, supplier_category, spend_gbp FROM {} {}",
                    table, clause
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params, |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (id, date, description, supplier_category, spend_gbp) = row?;
                    records.push(ActivityRecord::new(
                        id,
                        date,
                        ActivityPayload::GoodsServices(GoodsServicesActivity {
                            description,
                            supplier_category,
                            spend_gbp: parse_decimal("spend_gbp", &spend_gbp)?,
                        }),
                    ));
                }
                Ok(records)
            }
        }
    }

    pub fn count(&self, activity_type: ActivityType) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT COUNT(*) FROM {}", Self::table_name(activity_type));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ActivitySource for ActivityRepository {
    async fn fetch_pending(
        &self,
        activity_type: ActivityType,
        cursor: Option<&str>,
        page_size: usize,
    ) -> RepositoryResult<Vec<ActivityRecord>> {
        self.fetch_page(activity_type, cursor, page_size)
    }
}
