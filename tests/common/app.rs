use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use progression_backend::config::{
    Config, LimitsConfig, RateLimitConfig, RewardsConfig, WorkerConfig,
};
use progression_backend::rewards::RewardEngine;
use progression_backend::routes::build_router;
use progression_backend::state::AppState;
use progression_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

async fn spawn_with(api_limit: u64, max_sse_connections: usize) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("progression-test.sled");

    // 直接构造 Config，避免使用 set_var 造成多线程测试环境变量竞态
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        cors_origin: "http://localhost:5173".to_string(),
        trust_proxy: false,
        rate_limit: RateLimitConfig {
            window_secs: 60,
            max_requests: api_limit,
        },
        worker: WorkerConfig {
            is_leader: false,
            quest_retention_days: 14,
        },
        rewards: RewardsConfig {
            utc_offset_minutes: 0,
            leaderboard_poll_secs: 1,
        },
        limits: LimitsConfig {
            max_sse_connections,
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let rewards = Arc::new(RewardEngine::new(store.clone(), &config.rewards));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store, rewards, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with(1_000, 8).await
}

pub async fn spawn_test_server_with_limits(api_limit: u64, max_sse_connections: usize) -> TestApp {
    spawn_with(api_limit, max_sse_connections).await
}
