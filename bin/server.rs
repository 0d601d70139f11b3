// Sleek - Web Server
// JSON API over the cashback ledger and subscription book

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use sleek::{
    ActivatedSubscription, CashbackBalance, CashbackStats, CashbackTransaction, Category, Config,
    LocalProgram, OrderHistoryItem, SleekApp, Subscription, SubscriptionStats, WalletAddress,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    app: Arc<Mutex<SleekApp<LocalProgram>>>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, SleekApp<LocalProgram>> {
        self.app.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }

    fn err(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                success: false,
                data: None,
                error: Some(message.into()),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct CashbackResponse {
    balance: CashbackBalance,
    stats: CashbackStats,
}

#[derive(Serialize)]
struct StatsResponse {
    subscriptions: SubscriptionStats,
    cashback: CashbackStats,
    catalog_plans: usize,
}

#[derive(Serialize)]
struct SubscriptionResponse {
    #[serde(flatten)]
    subscription: ActivatedSubscription,
    status: &'static str,
    days_remaining: i64,
}

#[derive(Serialize)]
struct AddressResponse {
    input: String,
    base58: String,
    bytes: usize,
}

#[derive(Deserialize)]
struct RedeemRequest {
    amount: f64,
    #[serde(default)]
    label: Option<String>,
}

/// Percent-decode a path segment, keeping it as-is when it is not valid UTF-8
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok(format!("sleek {}", sleek::VERSION))
}

/// GET /api/catalog - All categories with their plans
async fn get_catalog(State(state): State<AppState>) -> Response {
    let app = state.lock();
    ApiResponse::ok(app.catalog().categories().to_vec())
}

/// GET /api/catalog/:category - One category's plans
async fn get_category(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let decoded = decode_segment(&name);

    let app = state.lock();
    match app.catalog().category(&decoded) {
        Some(category) => ApiResponse::<Category>::ok(category.clone()),
        None => ApiResponse::<Category>::err(
            StatusCode::NOT_FOUND,
            format!("Unknown category: {}", decoded),
        ),
    }
}

/// GET /api/cashback - Balance and aggregates
async fn get_cashback(State(state): State<AppState>) -> Response {
    let app = state.lock();
    ApiResponse::ok(CashbackResponse {
        balance: app.cashback_balance(),
        stats: app.cashback_stats(),
    })
}

/// GET /api/cashback/transactions - Cashback log, newest first
async fn get_cashback_transactions(State(state): State<AppState>) -> Response {
    let app = state.lock();
    ApiResponse::<Vec<CashbackTransaction>>::ok(app.cashback_transactions())
}

/// POST /api/cashback/redeem - Redeem part of the available balance
async fn redeem_cashback(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Response {
    let label = request.label.unwrap_or_else(|| "Manual Redemption".to_string());
    let mut app = state.lock();

    match app.redeem(request.amount, &label) {
        Ok(tx) => {
            log::info!("Redeemed {:.2} ({})", tx.cashback_amount, tx.id);
            ApiResponse::ok(tx)
        }
        Err(sleek::AppError::Cashback(e)) => {
            ApiResponse::<CashbackTransaction>::err(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            log::error!("Error redeeming cashback: {}", e);
            ApiResponse::<CashbackTransaction>::err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/subscriptions - Activated subscriptions with derived status
async fn get_subscriptions(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    let app = state.lock();

    let response: Vec<SubscriptionResponse> = app
        .book()
        .all()
        .iter()
        .map(|sub| SubscriptionResponse {
            status: sub.status(now).as_str(),
            days_remaining: sub.days_remaining(now).max(0),
            subscription: sub.clone(),
        })
        .collect();

    ApiResponse::ok(response)
}

/// GET /api/stats - Subscription and cashback totals
async fn get_stats(State(state): State<AppState>) -> Response {
    let app = state.lock();
    ApiResponse::ok(StatsResponse {
        subscriptions: app.subscription_stats(Utc::now()),
        cashback: app.cashback_stats(),
        catalog_plans: app.catalog().count(),
    })
}

/// GET /api/history - Order history
async fn get_history(State(state): State<AppState>) -> Response {
    let app = state.lock();
    ApiResponse::<Vec<OrderHistoryItem>>::ok(app.order_history())
}

/// GET /api/address/:raw - Decode a wallet address
async fn decode_address(Path(raw): Path<String>) -> Response {
    let decoded = decode_segment(&raw);

    match WalletAddress::parse(&decoded) {
        Ok(address) => ApiResponse::ok(AddressResponse {
            input: decoded,
            base58: address.to_string(),
            bytes: address.as_bytes().len(),
        }),
        Err(e) => ApiResponse::<AddressResponse>::err(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// GET /api/search/:query - Plans whose name matches
async fn search_catalog(State(state): State<AppState>, Path(query): Path<String>) -> Response {
    let decoded = decode_segment(&query);

    let app = state.lock();
    let results: Vec<Subscription> = app.catalog().search(&decoded).into_iter().cloned().collect();
    ApiResponse::ok(results)
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/catalog", get(get_catalog))
        .route("/catalog/:category", get(get_category))
        .route("/search/:query", get(search_catalog))
        .route("/cashback", get(get_cashback))
        .route("/cashback/transactions", get(get_cashback_transactions))
        .route("/cashback/redeem", post(redeem_cashback))
        .route("/subscriptions", get(get_subscriptions))
        .route("/stats", get(get_stats))
        .route("/history", get(get_history))
        .route("/address/:raw", get(decode_address))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 Sleek - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━");

    let config = match Config::load(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let app = match SleekApp::open(&config, LocalProgram::from_config(&config)) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to open store at {:?}: {}", config.database_path, e);
            std::process::exit(1);
        }
    };
    log::info!("Store opened: {:?}", config.database_path);

    let state = AppState {
        app: Arc::new(Mutex::new(app)),
    };

    let listener = match tokio::net::TcpListener::bind(&config.server_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", config.server_addr, e);
            std::process::exit(1);
        }
    };

    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/catalog", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    if let Err(e) = axum::serve(listener, router(state)).await {
        log::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
