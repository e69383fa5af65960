// ==========================================
// 端到端集成测试（SQLite）
// ==========================================
// 测试目标: CSV 导入 → 批量计算 → 结果持久化 → 汇总聚合
// ==========================================


use chrono::{Datelike, Utc};
use emission_engine::config::{config_keys, ConfigManager};
use emission_engine::domain::{SummaryFilter, SummaryType};
use emission_engine::engine::{EmissionAggregator, StreamingBatchProcessor};
use emission_engine::importer::CsvImporter;
use emission_engine::repository::{
    ActivityRepository, EmissionFactorRepository, EmissionResultRepository,
    EmissionSummaryRepository,
};
use emission_engine::{logging, ActivityType, MatchMethod, Scope};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use test_helpers::*;

struct Repos {
    factors: Arc<EmissionFactorRepository>,
    activities: Arc<ActivityRepository>,
    results: Arc<EmissionResultRepository>,
    summaries: Arc<EmissionSummaryRepository>,
    conn: Arc<Mutex<Connection>>,
}

fn repos(db_path: &str) -> Repos {
    let conn = open_shared(db_path).expect("Failed to open db");
    Repos {
        factors: Arc::new(EmissionFactorRepository::from_connection(conn.clone())),
        activities: Arc::new(ActivityRepository::from_connection(conn.clone())),
        results: Arc::new(EmissionResultRepository::from_connection(conn.clone())),
        summaries: Arc::new(EmissionSummaryRepository::from_connection(conn.clone())),
        conn,
    }
}

/// 写入一套标准 CSV 文件
fn write_seed_files(dir: &Path) {
    fs::write(
        dir.join("Emission_Factors.csv"),
        "Activity,Lookup identifiers,Unit,CO2e,Scope,Category\n\
         Electricity,United Kingdom,kWh,0.3,2,\n\
         Air Travel,\"Long-haul, Business class\",kilometres,0.04696,3,6\n\
         Purchased Goods and Services,Office paper products,GBP,0.8,3,1\n\
         Rail,Somewhere,km,0.1,3,\n",
    )
    .unwrap();
    fs::write(
        dir.join("Electricity.csv"),
        "Date,Country,Electricity Usage\n\
         15/03/2024,United Kingdom,\"1,000\"\n\
         16/03/2024,Atlantis,10\n\
         bad,United Kingdom,5\n",
    )
    .unwrap();
    fs::write(
        dir.join("Air_Travel.csv"),
        "Date,Distance travelled,Flight range,Passenger class\n\
         20/03/2024,\"3,459\",Long-haul,Business Class\n",
    )
    .unwrap();
    fs::write(
        dir.join("Purchased_Goods_and_Services.csv"),
        "Date,Supplier category,Spend,Description\n\
         01/03/2024,Stationery,£100,Office paper product\n",
    )
    .unwrap();
}

fn seed(repos: &Repos) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_seed_files(dir.path());
    let importer = CsvImporter::new(repos.factors.clone(), repos.activities.clone());
    importer.seed_directory(dir.path()).unwrap();
    dir
}

// ==========================================
// 测试用例
// ==========================================

#[tokio::test]
async fn test_seed_directory_imports_standard_files() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let repos = repos(&db_path);
    let dir = tempfile::tempdir().unwrap();
    write_seed_files(dir.path());

    let importer = CsvImporter::new(repos.factors.clone(), repos.activities.clone());
    let seed = importer.seed_directory(dir.path()).unwrap();

    assert_eq!(seed.factors.total_rows, 4);
    assert_eq!(seed.factors.imported, 3);
    assert_eq!(seed.factors.rejected.len(), 1);
    assert_eq!(seed.factors.rejected[0].row, 5);

    assert_eq!(seed.electricity.imported, 2);
    assert_eq!(seed.electricity.rejected[0].row, 4);
    assert_eq!(seed.air_travel.imported, 1);
    assert_eq!(seed.goods_services.imported, 1);

    assert_eq!(repos.factors.count_active().unwrap(), 3);
    assert_eq!(repos.activities.count(ActivityType::Electricity).unwrap(), 2);

    // 重复导入因子表：按派生 id 覆盖
    importer.seed_directory(dir.path()).unwrap();
    assert_eq!(repos.factors.count_active().unwrap(), 3);
    assert_eq!(repos.activities.count(ActivityType::Electricity).unwrap(), 4);
}

#[tokio::test]
async fn test_seed_directory_skips_missing_files() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let repos = repos(&db_path);
    let dir = tempfile::tempdir().unwrap();

    let importer = CsvImporter::new(repos.factors.clone(), repos.activities.clone());
    let seed = importer.seed_directory(dir.path()).unwrap();

    assert_eq!(seed.factors.total_rows, 0);
    assert_eq!(seed.electricity.imported, 0);
}

#[tokio::test]
async fn test_full_pipeline_on_sqlite() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let repos = repos(&db_path);
    let _dir = seed(&repos);

    let mut processor = StreamingBatchProcessor::new(
        repos.factors.clone(),
        repos.activities.clone(),
        repos.results.clone(),
        Default::default(),
    );
    let summary = processor.run().await.unwrap();

    assert_eq!(summary.total_processed, 4);
    assert_eq!(summary.total_matched, 3);
    assert_eq!(summary.total_unmatched, 1);
    // 0.3 + 0.2614 + 0.08
    assert_eq!(summary.total_co2e_tonnes, dec("0.6414"));
    assert_eq!(repos.results.count().unwrap(), 3);
    assert_eq!(repos.results.total_co2e_tonnes().unwrap(), dec("0.6414"));

    // 模糊匹配的商品记录进入低置信度列表
    let low = repos.results.list_low_confidence(1.0, 0, 10).unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].method, MatchMethod::Fuzzy);
    assert!(low[0].confidence >= 0.8 && low[0].confidence < 1.0);
    assert_eq!(low[0].metadata.matched_key, "office paper products");

    // 第二次运行不产生新结果
    let mut again = StreamingBatchProcessor::new(
        repos.factors.clone(),
        repos.activities.clone(),
        repos.results.clone(),
        Default::default(),
    );
    let second = again.run().await.unwrap();
    assert_eq!(second.total_matched, 0);
    assert_eq!(second.existing_results, 3);
    assert_eq!(repos.results.count().unwrap(), 3);
    assert_eq!(repos.results.total_co2e_tonnes().unwrap(), dec("0.6414"));
}

#[tokio::test]
async fn test_aggregation_after_run() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let repos = repos(&db_path);
    let _dir = seed(&repos);

    StreamingBatchProcessor::new(
        repos.factors.clone(),
        repos.activities.clone(),
        repos.results.clone(),
        Default::default(),
    )
    .run()
    .await
    .unwrap();

    let today = Utc::now().date_naive();
    let aggregator = EmissionAggregator::new(repos.results.clone(), repos.summaries.clone());
    let daily = aggregator.aggregate_daily(today).unwrap();
    assert!(!daily.is_empty());

    let overall = repos
        .summaries
        .find(SummaryType::Daily, today, today, &SummaryFilter::overall())
        .unwrap()
        .unwrap();
    assert_eq!(overall.total_co2e_tonnes, dec("0.6414"));
    assert_eq!(overall.activity_count, 3);

    let scope2 = repos
        .summaries
        .find(SummaryType::Daily, today, today, &SummaryFilter::scope(Scope::Scope2))
        .unwrap()
        .unwrap();
    assert_eq!(scope2.total_co2e_tonnes, dec("0.3"));

    let travel = repos
        .summaries
        .find(
            SummaryType::Daily,
            today,
            today,
            &SummaryFilter::scope_category(Scope::Scope3, 6),
        )
        .unwrap()
        .unwrap();
    assert_eq!(travel.total_co2e_tonnes, dec("0.2614"));
    assert_eq!(travel.activity_count, 1);

    // 重新聚合覆盖而不是追加
    aggregator.aggregate_daily(today).unwrap();
    let listed = repos
        .summaries
        .list_window(SummaryType::Daily, today, today)
        .unwrap();
    assert_eq!(listed.len(), daily.len());

    let monthly = aggregator
        .aggregate_monthly(today.year(), today.month())
        .unwrap();
    assert_eq!(monthly.len(), daily.len());
    assert!(aggregator.aggregate_monthly(today.year(), 13).is_err());
}

#[tokio::test]
async fn test_config_overrides_reach_processor() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let repos = repos(&db_path);
    let _dir = seed(&repos);

    let config_manager = ConfigManager::from_connection(repos.conn.clone()).unwrap();
    config_manager
        .set_global_config_value(config_keys::FUZZY_THRESHOLD, "99")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::PAGE_SIZE, "1")
        .unwrap();
    let config = config_manager.load_engine_config().unwrap();
    assert_eq!(config.page_size, 1);

    let mut processor = StreamingBatchProcessor::new(
        repos.factors.clone(),
        repos.activities.clone(),
        repos.results.clone(),
        config,
    );
    let summary = processor.run().await.unwrap();

    // 阈值 99 时 "office paper product" 不再被接受
    assert_eq!(summary.total_matched, 2);
    assert_eq!(summary.total_unmatched, 2);
    assert_eq!(summary.peak_page_records, 1);
}

#[tokio::test]
async fn test_recalculate_after_factor_deactivation() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let repos = repos(&db_path);
    let record = electricity("E-001", "United Kingdom", "1000");
    repos.factors.batch_insert(&reference_factors()).unwrap();
    repos.activities.insert(&record).unwrap();

    let processor = StreamingBatchProcessor::new(
        repos.factors.clone(),
        repos.activities.clone(),
        repos.results.clone(),
        Default::default(),
    );
    processor.recalculate_activity(&record).await.unwrap();
    let stored = repos.results.find_by_activity_id("E-001").unwrap().unwrap();
    assert_eq!(stored.co2e_tonnes, dec("0.3"));

    assert!(repos.factors.deactivate("ELECTRICITY:united kingdom").unwrap());
    processor.recalculate_activity(&record).await.unwrap();
    // 剩余电力因子 "france" 与 "united kingdom" 相似度低于阈值
    assert!(repos.results.find_by_activity_id("E-001").unwrap().is_none());
}
