// ==========================================
// 排放计算引擎 - 批处理入口
// ==========================================
// 用法:
//   emission-engine [db_path] [data_dir]
// - db_path: 优先环境变量 EMISSION_ENGINE_DB_PATH，其次参数，最后用户数据目录
// - data_dir: 可选，含标准 CSV 文件时先导入再计算
// 输出: stdout 打印运行汇总 JSON；日志写 stderr
// ==========================================

use anyhow::Context;
use chrono::{Datelike, Utc};
use emission_engine::config::ConfigManager;
use emission_engine::db::{get_default_db_path, open_and_init, DB_PATH_ENV};
use emission_engine::engine::{EmissionAggregator, StreamingBatchProcessor};
use emission_engine::importer::CsvImporter;
use emission_engine::repository::{
    ActivityRepository, EmissionFactorRepository, EmissionResultRepository,
    EmissionSummaryRepository,
};
use emission_engine::{logging, APP_NAME, VERSION};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// 解析数据库路径
fn resolve_db_path(arg: Option<String>) -> String {
    let from_env = std::env::var(DB_PATH_ENV)
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    from_env
        .or_else(|| arg.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()))
        .unwrap_or_else(get_default_db_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = resolve_db_path(args.next());
    let data_dir = args.next().map(PathBuf::from);

    tracing::info!("{} v{}", APP_NAME, VERSION);
    tracing::info!("使用数据库: {}", db_path);

    let conn = open_and_init(&db_path).with_context(|| format!("无法打开数据库: {}", db_path))?;
    let conn = Arc::new(Mutex::new(conn));

    let factor_repo = Arc::new(EmissionFactorRepository::from_connection(conn.clone()));
    let activity_repo = Arc::new(ActivityRepository::from_connection(conn.clone()));
    let result_repo = Arc::new(EmissionResultRepository::from_connection(conn.clone()));
    let summary_repo = Arc::new(EmissionSummaryRepository::from_connection(conn.clone()));

    // ===== 可选：导入 CSV =====
    if let Some(dir) = data_dir {
        let importer = CsvImporter::new(factor_repo.clone(), activity_repo.clone());
        let seed = importer
            .seed_directory(&dir)
            .with_context(|| format!("导入目录失败: {}", dir.display()))?;
        tracing::info!(
            factors = seed.factors.imported,
            electricity = seed.electricity.imported,
            air_travel = seed.air_travel.imported,
            goods_services = seed.goods_services.imported,
            "CSV 导入完成"
        );
    }

    // ===== 批量计算 =====
    let config = ConfigManager::from_connection(conn.clone())?.load_engine_config()?;
    let mut processor =
        StreamingBatchProcessor::new(factor_repo, activity_repo, result_repo.clone(), config)
            .with_progress(|progress| {
                tracing::debug!(
                    activity_type = %progress.activity_type,
                    page_index = progress.page_index,
                    records = progress.records_in_page,
                    "页进度"
                );
            });

    let cancel = processor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，将在当前页提交后停止");
            cancel.cancel();
        }
    });

    let summary = processor.run().await?;

    // ===== 汇总聚合 =====
    let today = Utc::now().date_naive();
    let aggregator = EmissionAggregator::new(result_repo, summary_repo);
    aggregator.aggregate_daily(today)?;
    aggregator.aggregate_monthly(today.year(), today.month())?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
