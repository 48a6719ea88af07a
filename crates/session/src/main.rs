//! Drives one purchase through a session backed by the in-memory store.
//!
//! Validation goes to the real HTTP backend configured by `IAP_VALIDATION_*`.

use std::sync::Arc;
use std::time::Duration;

use iapkit_core::{
    PlatformEvidence, ProductDescriptor, ProductKind, PurchaseBatch, PurchaseRecord, ResponseCode,
    Sku, TransactionId,
};
use iapkit_session::{IapSession, InMemoryEntitlements, SessionConfig};
use iapkit_store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    iapkit_observability::init_from_env();

    let config = SessionConfig::from_env()?;
    let store = Arc::new(InMemoryStore::new());
    let skus = config.skus.for_platform(config.platform).to_vec();
    store.set_products(
        ResponseCode::Ok,
        skus.iter().map(demo_product).collect(),
    );

    let entitlements = InMemoryEntitlements::new();
    let session =
        IapSession::with_http_validator(config, store.clone(), Arc::new(entitlements.clone()))?;
    session.start().await?;

    let products = session.get_products().await;
    tracing::info!(count = products.len(), "catalog loaded");

    let Some(product) = products.first() else {
        tracing::warn!("no products configured; nothing to buy");
        session.shutdown().await;
        return Ok(());
    };

    session.purchase(&product.id).await?;
    let record = PurchaseRecord::new(
        product.id.clone(),
        TransactionId::new(format!("DEMO.{}", session.id()))?,
        demo_evidence(session.platform()),
    );
    store.deliver(PurchaseBatch::ok(vec![record])).await?;

    let mut processing = session.subscribe_processing();
    let _ = tokio::time::timeout(
        Duration::from_secs(15),
        processing.wait_for(|in_flight| !in_flight),
    )
    .await;

    session.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&session.stats())?);
    if let Some(plan) = entitlements.active() {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }
    Ok(())
}

fn demo_product(sku: &Sku) -> ProductDescriptor {
    ProductDescriptor {
        id: sku.clone(),
        title: sku.to_string(),
        description: format!("Demo product {sku}"),
        price: "$0.99".to_string(),
        price_amount_micros: 990_000,
        price_currency_code: "USD".to_string(),
        kind: ProductKind::Inapp,
        subscription_period: None,
    }
}

fn demo_evidence(platform: iapkit_core::Platform) -> PlatformEvidence {
    match platform {
        iapkit_core::Platform::Ios => PlatformEvidence::Ios {
            transaction_receipt: "demo-receipt".to_string(),
            original_order_id: None,
            original_purchase_time: None,
        },
        iapkit_core::Platform::Android => PlatformEvidence::Android {
            package_name: "com.example.iapkit".to_string(),
            purchase_token: "demo-token".to_string(),
        },
    }
}
