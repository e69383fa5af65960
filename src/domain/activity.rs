// ==========================================
// 排放计算引擎 - 活动数据实体
// ==========================================
// 表示: 按活动类型打标签的联合体，每条记录恰有一个载荷
// 说明: date / distance_miles 保留原始文本，由规范化阶段校验
// ==========================================

use crate::domain::types::{ActivityType, FlightRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// ActivityRecord - 活动记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// 不透明标识
    pub id: String,
    /// 活动日期原始文本（dd/mm/yyyy 或 yyyy-mm-dd）
    pub date: String,
    pub payload: ActivityPayload,
}

/// 活动载荷（按活动类型区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityPayload {
    Electricity(ElectricityActivity),
    AirTravel(AirTravelActivity),
    GoodsServices(GoodsServicesActivity),
}

/// 电力消耗
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricityActivity {
    pub country: String,
    pub usage_kwh: Decimal,
}

/// 航空差旅
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirTravelActivity {
    /// 里程原始文本，可能含千分位（"3,459"）
    pub distance_miles: String,
    pub flight_range: FlightRange,
    /// 舱位，自由文本，大小写不统一
    pub passenger_class: String,
}

/// 外购商品与服务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsServicesActivity {
    pub description: String,
    pub supplier_category: Option<String>,
    pub spend_gbp: Decimal,
}

impl ActivityRecord {
    pub fn new(id: impl Into<String>, date: impl Into<String>, payload: ActivityPayload) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            payload,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        self.payload.activity_type()
    }
}

impl ActivityPayload {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityPayload::Electricity(_) => ActivityType::Electricity,
            ActivityPayload::AirTravel(_) => ActivityType::AirTravel,
            ActivityPayload::GoodsServices(_) => ActivityType::GoodsServices,
        }
    }
}
