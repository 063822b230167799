//! Shared test harness: in-memory database, seeded catalog, and a
//! scripted gateway double that counts its calls.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atlas_core::money::ExchangeRate;
use atlas_core::{PaymentMethod, Variant, Voucher};
use atlas_db::{Database, DbConfig};
use atlas_engine::gateway::{
    CreateIntentRequest, GatewayCapture, GatewayClient, GatewayError, GatewayIntent, GatewayResult,
};
use atlas_engine::{
    CustomerInfo, DbCatalog, DraftItem, EngineConfig, GatewayConfig, OrderDraft, OrderService,
    PaymentReconciler, ShippingInfo, SweepConfig,
};

// =============================================================================
// Scripted Gateway
// =============================================================================

/// What the next capture call should do.
#[derive(Debug, Clone)]
pub enum CaptureScript {
    /// Return status "COMPLETED".
    Completed,
    /// Return the given gateway-defined status.
    Status(&'static str),
    /// Fail with a transport error.
    TransportError,
}

/// Gateway double with scripted responses and call counters.
pub struct ScriptedGateway {
    capture_scripts: Mutex<VecDeque<CaptureScript>>,
    intent_requests: Mutex<Vec<CreateIntentRequest>>,
    create_calls: AtomicUsize,
    capture_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptedGateway {
            capture_scripts: Mutex::new(VecDeque::new()),
            intent_requests: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            capture_calls: AtomicUsize::new(0),
        })
    }

    /// Queues the behavior of the next capture call. With an empty queue
    /// captures return "COMPLETED".
    pub fn script_capture(&self, script: CaptureScript) {
        self.capture_scripts.lock().unwrap().push_back(script);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    /// The intent requests the engine sent, in order.
    pub fn intent_requests(&self) -> Vec<CreateIntentRequest> {
        self.intent_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayClient for ScriptedGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> GatewayResult<GatewayIntent> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.intent_requests.lock().unwrap().push(request);

        Ok(GatewayIntent {
            intent_id: format!("intent-{n}"),
            approval_link: format!("https://gateway.example/approve/intent-{n}"),
        })
    }

    async fn capture(&self, intent_id: &str) -> GatewayResult<GatewayCapture> {
        let n = self.capture_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let script = self
            .capture_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CaptureScript::Completed);

        match script {
            CaptureScript::Completed => Ok(GatewayCapture {
                status: "COMPLETED".to_string(),
                capture_id: format!("cap-{intent_id}-{n}"),
                amount_cents: 0,
                captured_at: Utc::now(),
            }),
            CaptureScript::Status(status) => Ok(GatewayCapture {
                status: status.to_string(),
                capture_id: format!("cap-{intent_id}-{n}"),
                amount_cents: 0,
                captured_at: Utc::now(),
            }),
            CaptureScript::TransportError => {
                Err(GatewayError::Transport("connection reset".to_string()))
            }
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub db: Database,
    pub service: OrderService,
    pub reconciler: PaymentReconciler,
    pub gateway: Arc<ScriptedGateway>,
    pub config: EngineConfig,
}

/// Engine configuration for tests: identity exchange rate, tight
/// timeouts, one-hour staleness.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        store_currency: "USD".to_string(),
        price_tolerance_cents: 1,
        gateway: GatewayConfig {
            base_url: "http://gateway.invalid".to_string(),
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            settlement_currency: "USD".to_string(),
            exchange_rate: ExchangeRate::identity(),
            minimum_charge_cents: 0,
            capture_timeout: Duration::from_secs(5),
        },
        sweep: SweepConfig {
            staleness: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(60),
            batch_size: 200,
        },
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: EngineConfig) -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = Arc::new(DbCatalog::new(db.clone()));
    let gateway = ScriptedGateway::new();

    let service = OrderService::new(db.clone(), catalog, &config);
    let reconciler =
        PaymentReconciler::new(service.clone(), gateway.clone(), config.gateway.clone());

    Harness {
        db,
        service,
        reconciler,
        gateway,
        config,
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Inserts a variant with the given price and availability.
pub async fn seed_variant(db: &Database, id: &str, name: &str, price_cents: i64, available: i64) {
    let now = Utc::now();
    db.variants()
        .insert(&Variant {
            id: id.to_string(),
            product_id: format!("prod-{id}"),
            sku: format!("SKU-{id}"),
            name: name.to_string(),
            color: Some("Black".to_string()),
            size: Some("M".to_string()),
            price_cents,
            available,
            reserved: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

/// Inserts a voucher with a fixed discount.
pub async fn seed_voucher(
    db: &Database,
    id: &str,
    code: &str,
    discount_cents: i64,
    usage_limit: Option<i64>,
) {
    db.vouchers()
        .insert(&Voucher {
            id: id.to_string(),
            code: code.to_string(),
            discount_cents,
            min_subtotal_cents: 0,
            usage_limit,
            used_count: 0,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// A draft ordering the given (variant_id, quantity, unit_price_cents)
/// triples, shipped for 500 cents.
pub fn draft(items: &[(&str, i64, i64)], method: PaymentMethod) -> OrderDraft {
    OrderDraft {
        customer: CustomerInfo {
            user_id: None,
            name: "Ada Lovelace".to_string(),
            phone: "555-0100".to_string(),
            email: Some("ada@example.com".to_string()),
        },
        items: items
            .iter()
            .map(|(variant_id, quantity, unit_price_cents)| DraftItem {
                variant_id: variant_id.to_string(),
                quantity: *quantity,
                unit_price_cents: *unit_price_cents,
            })
            .collect(),
        shipping: ShippingInfo {
            recipient: "Ada Lovelace".to_string(),
            phone: "555-0100".to_string(),
            address_line: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            fee_cents: 500,
        },
        voucher_code: None,
        payment_method: method,
    }
}

/// Reads the (available, reserved) counters of a variant.
pub async fn counters(db: &Database, variant_id: &str) -> (i64, i64) {
    sqlx::query_as::<_, (i64, i64)>("SELECT available, reserved FROM variants WHERE id = ?1")
        .bind(variant_id)
        .fetch_one(db.pool())
        .await
        .unwrap()
}

/// Counts rows in a table.
pub async fn count_rows(db: &Database, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await
        .unwrap()
}

/// Rewrites an order's creation time (for staleness tests).
pub async fn backdate_order(db: &Database, order_id: &str, created_at: DateTime<Utc>) {
    sqlx::query("UPDATE orders SET created_at = ?1 WHERE id = ?2")
        .bind(created_at)
        .bind(order_id)
        .execute(db.pool())
        .await
        .unwrap();
}
