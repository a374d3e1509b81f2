//! Initial database migration.
//!
//! Creates enums, tables, indexes and triggers for the inventory + billing
//! core. Stock non-negativity and the product-cost re-average live here so
//! the database holds the invariants regardless of the code path.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TENANCY
        // ============================================================
        db.execute_unprepared(COMPANIES_SQL).await?;
        db.execute_unprepared(COMPANY_MODULES_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 3: INVENTORY
        // ============================================================
        db.execute_unprepared(WAREHOUSES_SQL).await?;
        db.execute_unprepared(PRODUCTS_SQL).await?;
        db.execute_unprepared(STOCK_SQL).await?;
        db.execute_unprepared(INVENTORY_MOVEMENTS_SQL).await?;

        // ============================================================
        // PART 4: BILLING
        // ============================================================
        db.execute_unprepared(CUSTOMERS_SQL).await?;
        db.execute_unprepared(SALES_CHANNELS_SQL).await?;
        db.execute_unprepared(BILLING_RESOLUTIONS_SQL).await?;
        db.execute_unprepared(INVOICES_SQL).await?;
        db.execute_unprepared(INVOICE_LINES_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE user_role AS ENUM ('admin', 'warehouse_operator', 'salesperson');
CREATE TYPE movement_type AS ENUM ('IN', 'OUT', 'ADJUSTMENT', 'TRANSFER');
CREATE TYPE dian_status AS ENUM ('DRAFT', 'SIGNED', 'SUBMITTED', 'ACCEPTED', 'REJECTED', 'GENERATION_ERROR');
";

const COMPANIES_SQL: &str = r"
CREATE TABLE companies (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    nit         TEXT NOT NULL UNIQUE,
    address     TEXT,
    phone       TEXT,
    email       TEXT,
    status      TEXT NOT NULL DEFAULT 'active',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const COMPANY_MODULES_SQL: &str = r"
CREATE TABLE company_modules (
    company_id  UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    module_name TEXT NOT NULL,
    active      BOOLEAN NOT NULL DEFAULT true,
    expires_at  DATE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (company_id, module_name)
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id            UUID PRIMARY KEY,
    company_id    UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name     TEXT NOT NULL,
    role          user_role NOT NULL,
    is_active     BOOLEAN NOT NULL DEFAULT true,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_users_company ON users (company_id);
";

const WAREHOUSES_SQL: &str = r"
CREATE TABLE warehouses (
    id          UUID PRIMARY KEY,
    company_id  UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    address     TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_warehouses_company ON warehouses (company_id);
";

const PRODUCTS_SQL: &str = r"
CREATE TABLE products (
    id                  UUID PRIMARY KEY,
    company_id          UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    sku                 TEXT NOT NULL,
    name                TEXT NOT NULL,
    description         TEXT,
    price               NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cost                NUMERIC(19, 4) NOT NULL DEFAULT 0 CHECK (cost >= 0),
    tax_rate            NUMERIC(5, 4) NOT NULL DEFAULT 0.19,
    unit_measure        TEXT NOT NULL DEFAULT '94',
    classification_code TEXT,
    reorder_point       NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (company_id, sku)
);
";

const STOCK_SQL: &str = r"
CREATE TABLE stock (
    product_id   UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    warehouse_id UUID NOT NULL REFERENCES warehouses(id) ON DELETE CASCADE,
    quantity     NUMERIC(19, 4) NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (product_id, warehouse_id)
);
";

const INVENTORY_MOVEMENTS_SQL: &str = r"
CREATE TABLE inventory_movements (
    id             UUID PRIMARY KEY,
    transaction_id UUID NOT NULL,
    product_id     UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    warehouse_id   UUID NOT NULL REFERENCES warehouses(id) ON DELETE CASCADE,
    movement_type  movement_type NOT NULL,
    quantity       NUMERIC(19, 4) NOT NULL,
    unit_cost      NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_cost     NUMERIC(19, 4) NOT NULL DEFAULT 0,
    moved_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by     UUID NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_movements_product ON inventory_movements (product_id, movement_type);
CREATE INDEX idx_movements_transaction ON inventory_movements (transaction_id);
";

const CUSTOMERS_SQL: &str = r"
CREATE TABLE customers (
    id          UUID PRIMARY KEY,
    company_id  UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    tax_id      TEXT NOT NULL,
    email       TEXT,
    phone       TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_customers_company ON customers (company_id);
";

const SALES_CHANNELS_SQL: &str = r"
CREATE TABLE sales_channels (
    id              UUID PRIMARY KEY,
    company_id      UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    channel_type    TEXT NOT NULL DEFAULT 'direct',
    commission_rate NUMERIC(5, 4) NOT NULL DEFAULT 0,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const BILLING_RESOLUTIONS_SQL: &str = r"
CREATE TABLE billing_resolutions (
    id                UUID PRIMARY KEY,
    company_id        UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    resolution_number TEXT NOT NULL,
    prefix            TEXT NOT NULL,
    range_from        BIGINT NOT NULL,
    range_to          BIGINT NOT NULL,
    date_from         DATE NOT NULL,
    date_to           DATE NOT NULL,
    technical_key     TEXT NOT NULL DEFAULT '',
    is_active         BOOLEAN NOT NULL DEFAULT false,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- At most one active resolution per (company, prefix).
CREATE UNIQUE INDEX ux_resolutions_active
    ON billing_resolutions (company_id, prefix)
    WHERE is_active;
";

const INVOICES_SQL: &str = r"
CREATE TABLE invoices (
    id          UUID PRIMARY KEY,
    company_id  UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    customer_id UUID NOT NULL REFERENCES customers(id),
    channel_id  UUID REFERENCES sales_channels(id),
    prefix      TEXT NOT NULL,
    number      TEXT NOT NULL,
    issue_date  TIMESTAMPTZ NOT NULL,
    net_total   NUMERIC(19, 4) NOT NULL,
    tax_total   NUMERIC(19, 4) NOT NULL,
    grand_total NUMERIC(19, 4) NOT NULL,
    dian_status dian_status NOT NULL DEFAULT 'DRAFT',
    cufe        TEXT,
    uuid        TEXT,
    xml_signed  TEXT,
    qr_data     TEXT,
    track_id    TEXT,
    dian_errors TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (company_id, prefix, number)
);

CREATE INDEX idx_invoices_company_status ON invoices (company_id, dian_status);
";

const INVOICE_LINES_SQL: &str = r"
CREATE TABLE invoice_lines (
    id         UUID PRIMARY KEY,
    invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    product_id UUID NOT NULL REFERENCES products(id),
    quantity   NUMERIC(19, 4) NOT NULL CHECK (quantity > 0),
    unit_price NUMERIC(19, 4) NOT NULL CHECK (unit_price >= 0),
    tax_rate   NUMERIC(5, 4) NOT NULL CHECK (tax_rate >= 0 AND tax_rate <= 1),
    subtotal   NUMERIC(19, 4) NOT NULL
);

CREATE INDEX idx_invoice_lines_invoice ON invoice_lines (invoice_id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: refresh_product_average_cost
-- Recomputes the weighted-average cost over the full IN history
-- after every IN movement, making cost recomputation idempotent
-- under backfill. Rounded to 4 decimal places.
-- ============================================================
CREATE OR REPLACE FUNCTION refresh_product_average_cost()
RETURNS TRIGGER AS $$
DECLARE
    in_total NUMERIC(19, 4);
    in_qty   NUMERIC(19, 4);
BEGIN
    SELECT COALESCE(SUM(m.total_cost), 0), COALESCE(SUM(m.quantity), 0)
      INTO in_total, in_qty
      FROM inventory_movements m
     WHERE m.product_id = NEW.product_id
       AND m.movement_type = 'IN';

    IF in_qty > 0 THEN
        UPDATE products
           SET cost = round(in_total / in_qty, 4),
               updated_at = now()
         WHERE id = NEW.product_id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_refresh_product_cost
AFTER INSERT ON inventory_movements
FOR EACH ROW
WHEN (NEW.movement_type = 'IN')
EXECUTE FUNCTION refresh_product_average_cost();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_refresh_product_cost ON inventory_movements;
DROP FUNCTION IF EXISTS refresh_product_average_cost();
DROP TABLE IF EXISTS invoice_lines;
DROP TABLE IF EXISTS invoices;
DROP TABLE IF EXISTS billing_resolutions;
DROP TABLE IF EXISTS sales_channels;
DROP TABLE IF EXISTS customers;
DROP TABLE IF EXISTS inventory_movements;
DROP TABLE IF EXISTS stock;
DROP TABLE IF EXISTS products;
DROP TABLE IF EXISTS warehouses;
DROP TABLE IF EXISTS users;
DROP TABLE IF EXISTS company_modules;
DROP TABLE IF EXISTS companies;
DROP TYPE IF EXISTS dian_status;
DROP TYPE IF EXISTS movement_type;
DROP TYPE IF EXISTS user_role;
";
