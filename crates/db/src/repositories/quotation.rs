use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use presswork_core::cpq::pricing::CommercialTerms;
use presswork_core::domain::customer::CustomerId;
use presswork_core::domain::order::OrderId;
use presswork_core::domain::quotation::{
    ProductSpec, ProductVariant, Quotation, QuotationFilter, QuotationHistoryEntry,
    QuotationHistoryId, QuotationId, QuotationItem, QuotationItemId, QuotationStatus,
};

use super::rows::{
    encode_date, encode_json, encode_optional_timestamp, encode_timestamp, parse_date,
    parse_decimal, parse_json, parse_optional_decimal, parse_optional_timestamp, parse_timestamp,
    parse_u32,
};
use super::{map_write_error, QuotationRepository, RepositoryError};
use crate::DbPool;

const QUOTATION_COLUMNS: &str = "id,
    quotation_number,
    version,
    parent_quotation_id,
    status,
    customer_id,
    quotation_date,
    valid_until,
    product_type,
    product_details_json,
    product_name,
    quantity,
    length_mm,
    width_mm,
    height_mm,
    gsm,
    board_type,
    paper_type,
    color_front,
    color_back,
    spot_colors_json,
    finishing_json,
    pre_press_json,
    profit_margin_percent,
    discount_percent,
    tax_percent,
    pricing_json,
    total_amount,
    notes,
    terms_and_conditions,
    converted_to_order_id,
    converted_at,
    created_by,
    sent_at,
    approved_at,
    rejected_at,
    created_at,
    updated_at";

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, id: &QuotationId) -> Result<Vec<QuotationItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, position, description, quantity, unit, unit_price, total_price
             FROM quotation_items
             WHERE quotation_id = ?
             ORDER BY position ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<Quotation>, RepositoryError> {
        let mut quotations = Vec::with_capacity(rows.len());
        for row in rows {
            let id = QuotationId(row.try_get("id")?);
            let items = self.load_items(&id).await?;
            quotations.push(quotation_from_row(&row, items)?);
        }
        Ok(quotations)
    }
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE 1=1"
        ));

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(customer_id) = &filter.customer_id {
            builder.push(" AND customer_id = ").push_bind(customer_id.0.clone());
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", term.to_ascii_lowercase());
            builder
                .push(" AND (LOWER(quotation_number) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(product_name, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        builder
            .push(" ORDER BY created_at DESC, quotation_number DESC LIMIT ")
            .push_bind(i64::from(filter.effective_limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let rows = builder.build().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn latest_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let latest = sqlx::query_scalar::<_, String>(
            "SELECT quotation_number
             FROM quotations
             WHERE quotation_number LIKE ?
             ORDER BY length(quotation_number) DESC, quotation_number DESC
             LIMIT 1",
        )
        .bind(format!("{prefix}%"))
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn insert(&self, quotation: &Quotation) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_quotation(&mut *tx, quotation).await?;
        insert_items(&mut *tx, quotation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(
        &self,
        quotation: &Quotation,
        replace_items: bool,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_quotation(&mut *tx, quotation).await?;
        if replace_items {
            sqlx::query("DELETE FROM quotation_items WHERE quotation_id = ?")
                .bind(&quotation.id.0)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut *tx, quotation).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_transition(
        &self,
        quotation: &Quotation,
        entry: &QuotationHistoryEntry,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_quotation(&mut *tx, quotation).await?;
        sqlx::query(
            "INSERT INTO quotation_history (
                id,
                quotation_id,
                old_status,
                new_status,
                changed_by,
                note,
                changed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.quotation_id.0)
        .bind(entry.old_status.as_str())
        .bind(entry.new_status.as_str())
        .bind(&entry.changed_by)
        .bind(entry.note.as_deref())
        .bind(encode_timestamp(&entry.changed_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &QuotationId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM quotations WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_history(
        &self,
        id: &QuotationId,
    ) -> Result<Vec<QuotationHistoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, quotation_id, old_status, new_status, changed_by, note, changed_at
             FROM quotation_history
             WHERE quotation_id = ?
             ORDER BY changed_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(history_from_row).collect()
    }

    async fn list_expirable(&self, as_of: NaiveDate) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS}
             FROM quotations
             WHERE status IN ('draft', 'sent', 'approved') AND valid_until < ?
             ORDER BY valid_until ASC, created_at ASC"
        ))
        .bind(encode_date(as_of))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

async fn upsert_quotation(
    conn: &mut SqliteConnection,
    quotation: &Quotation,
) -> Result<(), RepositoryError> {
    let spec = &quotation.spec;
    let product_details_json = encode_json("product_details_json", &spec.product)?;
    let spot_colors_json = encode_json("spot_colors_json", &spec.spot_colors)?;
    let finishing_json = encode_json("finishing_json", &spec.finishing)?;
    let pre_press_json = encode_json("pre_press_json", &spec.pre_press)?;
    let pricing_json = encode_json("pricing_json", &quotation.pricing)?;

    sqlx::query(&format!(
        "INSERT INTO quotations ({QUOTATION_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                 ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            quotation_number = excluded.quotation_number,
            version = excluded.version,
            parent_quotation_id = excluded.parent_quotation_id,
            status = excluded.status,
            customer_id = excluded.customer_id,
            quotation_date = excluded.quotation_date,
            valid_until = excluded.valid_until,
            product_type = excluded.product_type,
            product_details_json = excluded.product_details_json,
            product_name = excluded.product_name,
            quantity = excluded.quantity,
            length_mm = excluded.length_mm,
            width_mm = excluded.width_mm,
            height_mm = excluded.height_mm,
            gsm = excluded.gsm,
            board_type = excluded.board_type,
            paper_type = excluded.paper_type,
            color_front = excluded.color_front,
            color_back = excluded.color_back,
            spot_colors_json = excluded.spot_colors_json,
            finishing_json = excluded.finishing_json,
            pre_press_json = excluded.pre_press_json,
            profit_margin_percent = excluded.profit_margin_percent,
            discount_percent = excluded.discount_percent,
            tax_percent = excluded.tax_percent,
            pricing_json = excluded.pricing_json,
            total_amount = excluded.total_amount,
            notes = excluded.notes,
            terms_and_conditions = excluded.terms_and_conditions,
            converted_to_order_id = excluded.converted_to_order_id,
            converted_at = excluded.converted_at,
            sent_at = excluded.sent_at,
            approved_at = excluded.approved_at,
            rejected_at = excluded.rejected_at,
            updated_at = excluded.updated_at"
    ))
    .bind(&quotation.id.0)
    .bind(&quotation.quotation_number)
    .bind(i64::from(quotation.version))
    .bind(quotation.parent_quotation_id.as_ref().map(|id| id.0.as_str()))
    .bind(quotation.status.as_str())
    .bind(&quotation.customer_id.0)
    .bind(encode_date(quotation.quotation_date))
    .bind(encode_date(quotation.valid_until))
    .bind(spec.product.product_type())
    .bind(product_details_json)
    .bind(spec.product_name.as_deref())
    .bind(i64::from(spec.quantity))
    .bind(spec.length_mm.map(|value| value.to_string()))
    .bind(spec.width_mm.map(|value| value.to_string()))
    .bind(spec.height_mm.map(|value| value.to_string()))
    .bind(spec.gsm.map(i64::from))
    .bind(spec.board_type.as_deref())
    .bind(spec.paper_type.as_deref())
    .bind(i64::from(spec.color_front))
    .bind(i64::from(spec.color_back))
    .bind(spot_colors_json)
    .bind(finishing_json)
    .bind(pre_press_json)
    .bind(quotation.terms.profit_margin_percent.to_string())
    .bind(quotation.terms.discount_percent.to_string())
    .bind(quotation.terms.tax_percent.to_string())
    .bind(pricing_json)
    .bind(quotation.pricing.total_amount.to_string())
    .bind(quotation.notes.as_deref())
    .bind(quotation.terms_and_conditions.as_deref())
    .bind(quotation.converted_to_order_id.as_ref().map(|id| id.0.as_str()))
    .bind(encode_optional_timestamp(quotation.converted_at.as_ref()))
    .bind(&quotation.created_by)
    .bind(encode_optional_timestamp(quotation.sent_at.as_ref()))
    .bind(encode_optional_timestamp(quotation.approved_at.as_ref()))
    .bind(encode_optional_timestamp(quotation.rejected_at.as_ref()))
    .bind(encode_timestamp(&quotation.created_at))
    .bind(encode_timestamp(&quotation.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| {
        map_write_error(error, &format!("quotation number `{}`", quotation.quotation_number))
    })?;

    Ok(())
}

async fn insert_items(
    conn: &mut SqliteConnection,
    quotation: &Quotation,
) -> Result<(), RepositoryError> {
    for item in &quotation.items {
        sqlx::query(
            "INSERT INTO quotation_items (
                id,
                quotation_id,
                position,
                description,
                quantity,
                unit,
                unit_price,
                total_price
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id.0)
        .bind(&quotation.id.0)
        .bind(i64::from(item.position))
        .bind(&item.description)
        .bind(item.quantity.to_string())
        .bind(&item.unit)
        .bind(item.unit_price.to_string())
        .bind(item.total_price.to_string())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn quotation_from_row(
    row: &SqliteRow,
    items: Vec<QuotationItem>,
) -> Result<Quotation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuotationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown quotation status `{status_raw}`"))
    })?;

    let product_type = row.try_get::<String, _>("product_type")?;
    let product: ProductVariant =
        parse_json("product_details_json", row.try_get("product_details_json")?)?;
    if product.product_type() != product_type {
        return Err(RepositoryError::Decode(format!(
            "product_type `{product_type}` disagrees with product details `{}`",
            product.product_type()
        )));
    }

    let spec = ProductSpec {
        product,
        product_name: row.try_get("product_name")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        length_mm: parse_optional_decimal("length_mm", row.try_get("length_mm")?)?,
        width_mm: parse_optional_decimal("width_mm", row.try_get("width_mm")?)?,
        height_mm: parse_optional_decimal("height_mm", row.try_get("height_mm")?)?,
        gsm: row
            .try_get::<Option<i64>, _>("gsm")?
            .map(|gsm| parse_u32("gsm", gsm))
            .transpose()?,
        board_type: row.try_get("board_type")?,
        paper_type: row.try_get("paper_type")?,
        color_front: parse_u32("color_front", row.try_get("color_front")?)?,
        color_back: parse_u32("color_back", row.try_get("color_back")?)?,
        spot_colors: parse_json("spot_colors_json", row.try_get("spot_colors_json")?)?,
        finishing: parse_json("finishing_json", row.try_get("finishing_json")?)?,
        pre_press: parse_json("pre_press_json", row.try_get("pre_press_json")?)?,
    };

    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        quotation_number: row.try_get("quotation_number")?,
        version: parse_u32("version", row.try_get("version")?)?,
        parent_quotation_id: row.try_get::<Option<String>, _>("parent_quotation_id")?.map(QuotationId),
        status,
        customer_id: CustomerId(row.try_get("customer_id")?),
        quotation_date: parse_date("quotation_date", row.try_get("quotation_date")?)?,
        valid_until: parse_date("valid_until", row.try_get("valid_until")?)?,
        spec,
        terms: CommercialTerms {
            profit_margin_percent: parse_decimal(
                "profit_margin_percent",
                row.try_get("profit_margin_percent")?,
            )?,
            discount_percent: parse_decimal("discount_percent", row.try_get("discount_percent")?)?,
            tax_percent: parse_decimal("tax_percent", row.try_get("tax_percent")?)?,
        },
        pricing: parse_json("pricing_json", row.try_get("pricing_json")?)?,
        items,
        notes: row.try_get("notes")?,
        terms_and_conditions: row.try_get("terms_and_conditions")?,
        converted_to_order_id: row.try_get::<Option<String>, _>("converted_to_order_id")?.map(OrderId),
        converted_at: parse_optional_timestamp("converted_at", row.try_get("converted_at")?)?,
        created_by: row.try_get("created_by")?,
        sent_at: parse_optional_timestamp("sent_at", row.try_get("sent_at")?)?,
        approved_at: parse_optional_timestamp("approved_at", row.try_get("approved_at")?)?,
        rejected_at: parse_optional_timestamp("rejected_at", row.try_get("rejected_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<QuotationItem, RepositoryError> {
    Ok(QuotationItem {
        id: QuotationItemId(row.try_get("id")?),
        position: parse_u32("position", row.try_get("position")?)?,
        description: row.try_get("description")?,
        quantity: parse_decimal("quantity", row.try_get("quantity")?)?,
        unit: row.try_get("unit")?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        total_price: parse_decimal("total_price", row.try_get("total_price")?)?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<QuotationHistoryEntry, RepositoryError> {
    let parse_status = |column: &str| -> Result<QuotationStatus, RepositoryError> {
        let raw = row.try_get::<String, _>(column)?;
        QuotationStatus::parse(&raw)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown {column} `{raw}`")))
    };

    Ok(QuotationHistoryEntry {
        id: QuotationHistoryId(row.try_get("id")?),
        quotation_id: QuotationId(row.try_get("quotation_id")?),
        old_status: parse_status("old_status")?,
        new_status: parse_status("new_status")?,
        changed_by: row.try_get("changed_by")?,
        note: row.try_get("note")?,
        changed_at: parse_timestamp("changed_at", row.try_get("changed_at")?)?,
    })
}
