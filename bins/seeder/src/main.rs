//! Database seeder for Andino development and testing.
//!
//! Seeds a demo company with a valid NIT, an admin user, a warehouse with
//! stock, a customer, the billing and inventory modules, and an active
//! billing resolution with its technical key — everything the invoice
//! pipeline needs to run end to end in dev mode.
//!
//! Usage: cargo run --bin seeder

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use andino_core::auth::hash_password;
use andino_core::dian::nit::compute_check_digit;
use andino_db::entities::{
    billing_resolutions, companies, company_modules, customers, products,
    sea_orm_active_enums::UserRole, stock, users, warehouses,
};

/// Demo company ID (consistent for all seeds).
const DEMO_COMPANY_ID: &str = "00000000-0000-0000-0000-000000000001";
/// Demo admin user ID.
const DEMO_USER_ID: &str = "00000000-0000-0000-0000-000000000002";
/// Demo warehouse ID.
const DEMO_WAREHOUSE_ID: &str = "00000000-0000-0000-0000-000000000003";
/// Demo customer ID.
const DEMO_CUSTOMER_ID: &str = "00000000-0000-0000-0000-000000000004";

/// Technical key of the demo resolution (habilitación test key).
const DEMO_TECHNICAL_KEY: &str =
    "fc8eac422eba16e22ffd8c6f94b3f40a6e38162c354673d3a603956897890cd";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = andino_db::connect(&database_url, 5)
        .await
        .expect("Failed to connect to database");

    println!("Seeding demo company...");
    seed_company(&db).await;

    println!("Seeding admin user...");
    seed_admin(&db).await;

    println!("Seeding warehouse and products...");
    seed_inventory(&db).await;

    println!("Seeding customer...");
    seed_customer(&db).await;

    println!("Seeding billing resolution...");
    seed_resolution(&db).await;

    println!("Seeding complete!");
    println!("Login: admin@demo.andino.co / andino-demo (change it)");
}

fn demo_company_id() -> Uuid {
    Uuid::parse_str(DEMO_COMPANY_ID).unwrap()
}

async fn seed_company(db: &DatabaseConnection) {
    let now = Utc::now().into();
    let root = "900123456";
    let dv = compute_check_digit(root).expect("valid NIT root");

    let existing = companies::Entity::find_by_id(demo_company_id())
        .one(db)
        .await
        .unwrap();
    if existing.is_some() {
        println!("  demo company already present, skipping");
        return;
    }

    companies::ActiveModel {
        id: Set(demo_company_id()),
        name: Set("Andino Demo SAS".to_string()),
        nit: Set(format!("{root}-{dv}")),
        address: Set(Some("Cra 7 # 12-34, Bogotá".to_string())),
        phone: Set(None),
        email: Set(Some("facturacion@demo.andino.co".to_string())),
        status: Set("active".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();

    for module in ["billing", "inventory"] {
        company_modules::ActiveModel {
            company_id: Set(demo_company_id()),
            module_name: Set(module.to_string()),
            active: Set(true),
            expires_at: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
    }
}

async fn seed_admin(db: &DatabaseConnection) {
    let user_id = Uuid::parse_str(DEMO_USER_ID).unwrap();
    if users::Entity::find_by_id(user_id).one(db).await.unwrap().is_some() {
        println!("  admin already present, skipping");
        return;
    }

    let now = Utc::now().into();
    users::ActiveModel {
        id: Set(user_id),
        company_id: Set(demo_company_id()),
        email: Set("admin@demo.andino.co".to_string()),
        password_hash: Set(hash_password("andino-demo").unwrap()),
        full_name: Set("Administrador Demo".to_string()),
        role: Set(UserRole::Admin),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
}

async fn seed_inventory(db: &DatabaseConnection) {
    let warehouse_id = Uuid::parse_str(DEMO_WAREHOUSE_ID).unwrap();
    let now = Utc::now().into();

    if warehouses::Entity::find_by_id(warehouse_id)
        .one(db)
        .await
        .unwrap()
        .is_none()
    {
        warehouses::ActiveModel {
            id: Set(warehouse_id),
            company_id: Set(demo_company_id()),
            name: Set("Bodega Principal".to_string()),
            address: Set(Some("Parque industrial, Funza".to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
    }

    let catalog: [(&str, &str, Decimal, Decimal, Decimal); 3] = [
        ("CAFE-500", "Café tostado 500g", dec!(38000), dec!(0.19), dec!(40)),
        ("PANELA-1K", "Panela orgánica 1kg", dec!(9500), dec!(0.05), dec!(100)),
        ("MIEL-350", "Miel de abejas 350g", dec!(22000), dec!(0), dec!(25)),
    ];

    for (sku, name, price, tax_rate, initial_stock) in catalog {
        let existing = products::Entity::find()
            .all(db)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.sku == sku && p.company_id == demo_company_id());
        if existing.is_some() {
            continue;
        }

        let product = products::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(demo_company_id()),
            sku: Set(sku.to_string()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            cost: Set(Decimal::ZERO),
            tax_rate: Set(tax_rate),
            unit_measure: Set("94".to_string()),
            classification_code: Set(None),
            reorder_point: Set(dec!(10)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();

        stock::ActiveModel {
            product_id: Set(product.id),
            warehouse_id: Set(warehouse_id),
            quantity: Set(initial_stock),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
    }
}

async fn seed_customer(db: &DatabaseConnection) {
    let customer_id = Uuid::parse_str(DEMO_CUSTOMER_ID).unwrap();
    if customers::Entity::find_by_id(customer_id)
        .one(db)
        .await
        .unwrap()
        .is_some()
    {
        println!("  customer already present, skipping");
        return;
    }

    let now = Utc::now().into();
    let dv = compute_check_digit("800987654").expect("valid NIT root");
    customers::ActiveModel {
        id: Set(customer_id),
        company_id: Set(demo_company_id()),
        name: Set("Comercializadora Ejemplo LTDA".to_string()),
        tax_id: Set(format!("800987654-{dv}")),
        email: Set(Some("compras@ejemplo.co".to_string())),
        phone: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
}

async fn seed_resolution(db: &DatabaseConnection) {
    let existing = billing_resolutions::Entity::find()
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.company_id == demo_company_id() && r.prefix == "SETP" && r.is_active);
    if existing.is_some() {
        println!("  active resolution already present, skipping");
        return;
    }

    let now = Utc::now().into();
    let today = Utc::now().date_naive();
    billing_resolutions::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(demo_company_id()),
        resolution_number: Set("18764000000001".to_string()),
        prefix: Set("SETP".to_string()),
        range_from: Set(990_000_000),
        range_to: Set(995_000_000),
        date_from: Set(today - Duration::days(30)),
        date_to: Set(today + Duration::days(335)),
        technical_key: Set(DEMO_TECHNICAL_KEY.to_string()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
}
