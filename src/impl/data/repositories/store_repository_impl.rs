use std::{collections::BTreeMap, path::Path};

use chrono::{NaiveDate, NaiveDateTime};
use fractic_server_error::ServerError;
use rusqlite::{params, params_from_iter, types::Type, Connection, OptionalExtension, Row};

use crate::{
    data::{
        datasources::sqlite_datasource::{SqliteDatasource, SqliteDatasourceImpl},
        models::{
            cash_breakdown_model::CashBreakdownModel,
            category_kind_model::{from_columns, to_columns},
        },
    },
    domain::repositories::store_repository::{DayFilter, NewTransaction, StoreRepository},
    entities::{
        BusinessDay, BusinessDayId, Category, CategoryId, CategorySpec, DailySettlement,
        DayStatus, Location, LocationId, LocationSpec, Permission, Role, RoleId, Signatures,
        Transaction, TransactionId, TransactionItem, TransactionItemId, User, UserId,
    },
    errors::EntityNotFound,
};

const DAY_COLUMNS: &str = "id, date, location_id, location_notes, status, opening_cash, \
     total_sales, discount_total, donation_total, other_total, closing_cash, expected_cash, \
     cash_diff, total_items, total_transactions, cash_breakdown, signature_operator, \
     signature_reviewer, signature_cashier, updated_at";

const CATEGORY_COLUMNS: &str = "id, location_id, name, color, category_type, rule";

pub(crate) struct StoreRepositoryImpl<DS: SqliteDatasource = SqliteDatasourceImpl> {
    datasource: DS,
}

impl StoreRepositoryImpl<SqliteDatasourceImpl> {
    pub(crate) fn open(path: &Path) -> Result<Self, ServerError> {
        Ok(Self {
            datasource: SqliteDatasourceImpl::open(path)?,
        })
    }

    pub(crate) fn open_in_memory() -> Result<Self, ServerError> {
        Ok(Self {
            datasource: SqliteDatasourceImpl::open_in_memory()?,
        })
    }
}

// Row mapping.
// --

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: LocationId(row.get(0)?),
        name: row.get(1)?,
        slug: row.get(2)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let type_key: String = row.get(4)?;
    let rule: Option<String> = row.get(5)?;
    Ok(Category {
        id: CategoryId(row.get(0)?),
        location_id: LocationId(row.get(1)?),
        name: row.get(2)?,
        color: row.get(3)?,
        kind: from_columns(&type_key, rule.as_deref()).map_err(|e| conversion_error(4, e))?,
    })
}

fn day_from_row(row: &Row<'_>) -> rusqlite::Result<BusinessDay> {
    let status: String = row.get(4)?;
    let breakdown: Option<String> = row.get(15)?;
    Ok(BusinessDay {
        id: BusinessDayId(row.get(0)?),
        date: row.get(1)?,
        location_id: LocationId(row.get(2)?),
        location_notes: row.get(3)?,
        status: status
            .parse::<DayStatus>()
            .map_err(|e| conversion_error(4, e.to_string()))?,
        opening_cash: row.get(5)?,
        total_sales: row.get(6)?,
        discount_total: row.get(7)?,
        donation_total: row.get(8)?,
        other_total: row.get(9)?,
        closing_cash: row.get(10)?,
        expected_cash: row.get(11)?,
        cash_diff: row.get(12)?,
        total_items: row.get(13)?,
        total_transactions: row.get(14)?,
        cash_breakdown: breakdown
            .filter(|b| !b.trim().is_empty())
            .map(|b| CashBreakdownModel::from_json(&b))
            .transpose()
            .map_err(|e| conversion_error(15, e.to_string()))?,
        signatures: Signatures {
            operator: row.get(16)?,
            reviewer: row.get(17)?,
            cashier: row.get(18)?,
        },
        updated_at: row.get(19)?,
    })
}

fn settlement_from_row(row: &Row<'_>) -> rusqlite::Result<DailySettlement> {
    let remarks: String = row.get(3)?;
    Ok(DailySettlement {
        date: row.get(0)?,
        total_deposit: row.get(1)?,
        total_next_day_opening_cash: row.get(2)?,
        remarks: serde_json::from_str::<BTreeMap<String, String>>(&remarks)
            .map_err(|e| conversion_error(3, e.to_string()))?,
    })
}

fn role_from_row(row: &Row<'_>) -> rusqlite::Result<Role> {
    let permissions: String = row.get(2)?;
    Ok(Role {
        id: RoleId(row.get(0)?),
        name: row.get(1)?,
        permissions: permissions
            .split(',')
            .filter_map(|p| p.trim().parse::<Permission>().ok())
            .collect(),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn day_params(day: &BusinessDay) -> rusqlite::Result<Option<String>> {
    day.cash_breakdown
        .as_ref()
        .map(CashBreakdownModel::to_json)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn update_day(conn: &Connection, day: &BusinessDay) -> rusqlite::Result<()> {
    let breakdown = day_params(day)?;
    conn.execute(
        r#"
        UPDATE business_day SET
            location_notes = ?2, status = ?3, opening_cash = ?4, total_sales = ?5,
            discount_total = ?6, donation_total = ?7, other_total = ?8, closing_cash = ?9,
            expected_cash = ?10, cash_diff = ?11, total_items = ?12, total_transactions = ?13,
            cash_breakdown = ?14, signature_operator = ?15, signature_reviewer = ?16,
            signature_cashier = ?17, updated_at = ?18
        WHERE id = ?1
        "#,
        params![
            day.id.0,
            day.location_notes,
            day.status.as_str(),
            day.opening_cash,
            day.total_sales,
            day.discount_total,
            day.donation_total,
            day.other_total,
            day.closing_cash,
            day.expected_cash,
            day.cash_diff,
            day.total_items,
            day.total_transactions,
            breakdown,
            day.signatures.operator,
            day.signatures.reviewer,
            day.signatures.cashier,
            day.updated_at,
        ],
    )?;
    Ok(())
}

fn load_day(conn: &Connection, id: BusinessDayId) -> rusqlite::Result<Option<BusinessDay>> {
    conn.query_row(
        &format!("SELECT {} FROM business_day WHERE id = ?1", DAY_COLUMNS),
        params![id.0],
        day_from_row,
    )
    .optional()
}

fn missing_day(id: BusinessDayId) -> ServerError {
    EntityNotFound::new("BusinessDay", &id.to_string())
}

fn load_transactions(conn: &Connection, days: &[i64]) -> rusqlite::Result<Vec<Transaction>> {
    let mut transactions: Vec<Transaction> = conn
        .prepare(&format!(
            r#"
            SELECT id, business_day_id, timestamp, amount, item_count, cash_received, change_given
            FROM "transaction" WHERE business_day_id IN ({})
            ORDER BY timestamp, id
            "#,
            placeholders(days.len())
        ))?
        .query_map(params_from_iter(days.iter()), transaction_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut items: BTreeMap<i64, Vec<TransactionItem>> = BTreeMap::new();
    let rows = conn
        .prepare(&format!(
            r#"
            SELECT i.id, i.transaction_id, i.price, i.category_id
            FROM transaction_item i JOIN "transaction" t ON t.id = i.transaction_id
            WHERE t.business_day_id IN ({})
            ORDER BY i.id
            "#,
            placeholders(days.len())
        ))?
        .query_map(params_from_iter(days.iter()), item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (transaction_id, item) in rows {
        items.entry(transaction_id).or_default().push(item);
    }
    for t in &mut transactions {
        t.items = items.remove(&t.id.0).unwrap_or_default();
    }
    Ok(transactions)
}

fn load_roles_of(conn: &Connection, user: UserId) -> rusqlite::Result<Vec<Role>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT r.id, r.name, r.permissions
        FROM role r JOIN roles_users ru ON ru.role_id = r.id
        WHERE ru.user_id = ?1
        ORDER BY r.name
        "#,
    )?;
    let roles = stmt
        .query_map(params![user.0], role_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(roles)
}

fn load_user(conn: &Connection, row: (i64, String, Option<String>, Option<String>)) -> rusqlite::Result<User> {
    let (id, username, email, password_hash) = row;
    Ok(User {
        id: UserId(id),
        roles: load_roles_of(conn, UserId(id))?,
        username,
        email,
        password_hash,
    })
}

impl<DS: SqliteDatasource> StoreRepository for StoreRepositoryImpl<DS> {
    // Locations.
    // --

    fn list_locations(&self) -> Result<Vec<Location>, ServerError> {
        self.datasource.read("list locations", |c| {
            c.prepare("SELECT id, name, slug FROM location ORDER BY id")?
                .query_map([], location_from_row)?
                .collect()
        })
    }

    fn location_by_id(&self, id: LocationId) -> Result<Option<Location>, ServerError> {
        self.datasource.read("get location", |c| {
            c.query_row(
                "SELECT id, name, slug FROM location WHERE id = ?1",
                params![id.0],
                location_from_row,
            )
            .optional()
        })
    }

    fn location_by_slug(&self, slug: &str) -> Result<Option<Location>, ServerError> {
        self.datasource.read("get location by slug", |c| {
            c.query_row(
                "SELECT id, name, slug FROM location WHERE slug = ?1",
                params![slug],
                location_from_row,
            )
            .optional()
        })
    }

    fn location_by_name(&self, name: &str) -> Result<Option<Location>, ServerError> {
        self.datasource.read("get location by name", |c| {
            c.query_row(
                "SELECT id, name, slug FROM location WHERE name = ?1",
                params![name],
                location_from_row,
            )
            .optional()
        })
    }

    fn insert_location(&self, spec: &LocationSpec) -> Result<Location, ServerError> {
        self.datasource.write("insert location", |tx| {
            tx.execute(
                "INSERT INTO location (name, slug) VALUES (?1, ?2)",
                params![spec.name, spec.slug],
            )?;
            Ok(Location {
                id: LocationId(tx.last_insert_rowid()),
                name: spec.name.clone(),
                slug: spec.slug.clone(),
            })
        })
    }

    fn update_location(
        &self,
        id: LocationId,
        spec: &LocationSpec,
    ) -> Result<Location, ServerError> {
        self.datasource.write("update location", |tx| {
            tx.execute(
                "UPDATE location SET name = ?2, slug = ?3 WHERE id = ?1",
                params![id.0, spec.name, spec.slug],
            )?;
            Ok(Location {
                id,
                name: spec.name.clone(),
                slug: spec.slug.clone(),
            })
        })
    }

    fn delete_location(&self, id: LocationId) -> Result<(), ServerError> {
        self.datasource.write("delete location", |tx| {
            tx.execute("DELETE FROM location WHERE id = ?1", params![id.0])?;
            Ok(())
        })
    }

    // Categories.
    // --

    fn list_categories(&self, location: LocationId) -> Result<Vec<Category>, ServerError> {
        self.datasource.read("list categories", |c| {
            c.prepare(&format!(
                "SELECT {} FROM category WHERE location_id = ?1 ORDER BY id",
                CATEGORY_COLUMNS
            ))?
            .query_map(params![location.0], category_from_row)?
            .collect()
        })
    }

    fn category_by_id(&self, id: CategoryId) -> Result<Option<Category>, ServerError> {
        self.datasource.read("get category", |c| {
            c.query_row(
                &format!("SELECT {} FROM category WHERE id = ?1", CATEGORY_COLUMNS),
                params![id.0],
                category_from_row,
            )
            .optional()
        })
    }

    fn insert_category(
        &self,
        location: LocationId,
        spec: &CategorySpec,
    ) -> Result<Category, ServerError> {
        self.datasource.write("insert category", |tx| {
            let (type_key, rule) =
                to_columns(&spec.kind).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                r#"
                INSERT INTO category (location_id, name, color, category_type, rule)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![location.0, spec.name, spec.color, type_key, rule],
            )?;
            Ok(Category {
                id: CategoryId(tx.last_insert_rowid()),
                location_id: location,
                name: spec.name.clone(),
                color: spec.color.clone(),
                kind: spec.kind.clone(),
            })
        })
    }

    fn update_category(
        &self,
        id: CategoryId,
        spec: &CategorySpec,
    ) -> Result<Category, ServerError> {
        self.datasource.write("update category", |tx| {
            let (type_key, rule) =
                to_columns(&spec.kind).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                r#"
                UPDATE category SET name = ?2, color = ?3, category_type = ?4, rule = ?5
                WHERE id = ?1
                "#,
                params![id.0, spec.name, spec.color, type_key, rule],
            )?;
            tx.query_row(
                &format!("SELECT {} FROM category WHERE id = ?1", CATEGORY_COLUMNS),
                params![id.0],
                category_from_row,
            )
        })
    }

    fn delete_category(&self, id: CategoryId) -> Result<(), ServerError> {
        self.datasource.write("delete category", |tx| {
            tx.execute(
                "UPDATE transaction_item SET category_id = NULL WHERE category_id = ?1",
                params![id.0],
            )?;
            tx.execute("DELETE FROM category WHERE id = ?1", params![id.0])?;
            Ok(())
        })
    }

    // Business days.
    // --

    fn business_day(
        &self,
        location: LocationId,
        date: NaiveDate,
    ) -> Result<Option<BusinessDay>, ServerError> {
        self.datasource.read("get business day", |c| {
            c.query_row(
                &format!(
                    "SELECT {} FROM business_day WHERE location_id = ?1 AND date = ?2",
                    DAY_COLUMNS
                ),
                params![location.0, date],
                day_from_row,
            )
            .optional()
        })
    }

    fn business_day_by_id(&self, id: BusinessDayId) -> Result<Option<BusinessDay>, ServerError> {
        self.datasource
            .read("get business day by id", |c| load_day(c, id))
    }

    fn business_days(&self, filter: DayFilter) -> Result<Vec<BusinessDay>, ServerError> {
        self.datasource.read("list business days", |c| {
            c.prepare(&format!(
                r#"
                SELECT {} FROM business_day
                WHERE date BETWEEN ?1 AND ?2
                  AND (?3 IS NULL OR location_id = ?3)
                  AND (?4 IS NULL OR status = ?4)
                ORDER BY date, location_id
                "#,
                DAY_COLUMNS
            ))?
            .query_map(
                params![
                    filter.start,
                    filter.end,
                    filter.location.map(|l| l.0),
                    filter.status.map(|s| s.as_str()),
                ],
                day_from_row,
            )?
            .collect()
        })
    }

    fn count_business_days(&self, location: LocationId) -> Result<i64, ServerError> {
        self.datasource.read("count business days", |c| {
            c.query_row(
                "SELECT COUNT(*) FROM business_day WHERE location_id = ?1",
                params![location.0],
                |row| row.get(0),
            )
        })
    }

    fn insert_business_day(
        &self,
        location: LocationId,
        date: NaiveDate,
        opening_cash: f64,
        notes: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<BusinessDay, ServerError> {
        self.datasource.write("insert business day", |tx| {
            tx.execute(
                r#"
                INSERT INTO business_day (date, location_id, location_notes, status, opening_cash, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    date,
                    location.0,
                    notes,
                    DayStatus::Open.as_str(),
                    opening_cash,
                    now
                ],
            )?;
            tx.query_row(
                &format!("SELECT {} FROM business_day WHERE id = ?1", DAY_COLUMNS),
                params![tx.last_insert_rowid()],
                day_from_row,
            )
        })
    }

    fn update_business_day<F>(&self, id: BusinessDayId, f: F) -> Result<BusinessDay, ServerError>
    where
        F: FnOnce(&mut BusinessDay) -> Result<(), ServerError>,
    {
        self.datasource.try_write("update business day", |tx| {
            let Some(mut day) = load_day(tx, id)? else {
                return Ok(Err(missing_day(id)));
            };
            if let Err(e) = f(&mut day) {
                return Ok(Err(e));
            }
            update_day(tx, &day)?;
            Ok(Ok(day))
        })
    }

    // Transactions.
    // --

    fn record_transaction<F>(
        &self,
        day_id: BusinessDayId,
        transaction: &NewTransaction,
        f: F,
    ) -> Result<(TransactionId, BusinessDay), ServerError>
    where
        F: FnOnce(&mut BusinessDay) -> Result<(), ServerError>,
    {
        self.datasource.try_write("record transaction", |tx| {
            let Some(mut day) = load_day(tx, day_id)? else {
                return Ok(Err(missing_day(day_id)));
            };
            if let Err(e) = f(&mut day) {
                return Ok(Err(e));
            }
            tx.execute(
                r#"
                INSERT INTO "transaction"
                    (business_day_id, timestamp, amount, item_count, cash_received, change_given)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    day_id.0,
                    transaction.timestamp,
                    transaction.amount,
                    transaction.item_count,
                    transaction.cash_received,
                    transaction.change_given,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let mut stmt = tx.prepare(
                "INSERT INTO transaction_item (transaction_id, price, category_id) VALUES (?1, ?2, ?3)",
            )?;
            for item in &transaction.items {
                stmt.execute(params![id, item.price, item.category_id.map(|c| c.0)])?;
            }
            update_day(tx, &day)?;
            Ok(Ok((TransactionId(id), day)))
        })
    }

    fn transaction_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, ServerError> {
        self.datasource.read("get transaction", |c| {
            let Some(mut transaction) = c
                .query_row(
                    r#"
                    SELECT id, business_day_id, timestamp, amount, item_count, cash_received, change_given
                    FROM "transaction" WHERE id = ?1
                    "#,
                    params![id.0],
                    transaction_from_row,
                )
                .optional()?
            else {
                return Ok(None);
            };
            transaction.items = c
                .prepare(
                    "SELECT id, transaction_id, price, category_id FROM transaction_item WHERE transaction_id = ?1 ORDER BY id",
                )?
                .query_map(params![id.0], |row| item_from_row(row).map(|(_, item)| item))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Some(transaction))
        })
    }

    fn transactions_for_days(
        &self,
        days: &[BusinessDayId],
    ) -> Result<Vec<Transaction>, ServerError> {
        if days.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = days.iter().map(|d| d.0).collect();
        self.datasource
            .read("list transactions", |c| load_transactions(c, &ids))
    }

    fn save_transaction<F>(&self, transaction: &Transaction, f: F) -> Result<BusinessDay, ServerError>
    where
        F: FnOnce(&mut BusinessDay, &[Transaction]) -> Result<(), ServerError>,
    {
        self.datasource.try_write("save transaction", |tx| {
            tx.execute(
                r#"
                UPDATE "transaction"
                SET amount = ?2, item_count = ?3, cash_received = ?4, change_given = ?5
                WHERE id = ?1
                "#,
                params![
                    transaction.id.0,
                    transaction.amount,
                    transaction.item_count,
                    transaction.cash_received,
                    transaction.change_given,
                ],
            )?;
            let mut stmt = tx.prepare(
                "UPDATE transaction_item SET price = ?3, category_id = ?4 WHERE id = ?1 AND transaction_id = ?2",
            )?;
            for item in &transaction.items {
                stmt.execute(params![
                    item.id.0,
                    transaction.id.0,
                    item.price,
                    item.category_id.map(|c| c.0)
                ])?;
            }
            let day_id = transaction.business_day_id;
            let Some(mut day) = load_day(tx, day_id)? else {
                return Ok(Err(missing_day(day_id)));
            };
            let transactions = load_transactions(tx, &[day_id.0])?;
            if let Err(e) = f(&mut day, &transactions) {
                return Ok(Err(e));
            }
            update_day(tx, &day)?;
            Ok(Ok(day))
        })
    }

    // Settlements.
    // --

    fn settlement(&self, date: NaiveDate) -> Result<Option<DailySettlement>, ServerError> {
        self.datasource.read("get settlement", |c| {
            c.query_row(
                r#"
                SELECT date, total_deposit, total_next_day_opening_cash, remarks
                FROM daily_settlement WHERE date = ?1
                "#,
                params![date],
                settlement_from_row,
            )
            .optional()
        })
    }

    fn settlements_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySettlement>, ServerError> {
        self.datasource.read("list settlements", |c| {
            c.prepare(
                r#"
                SELECT date, total_deposit, total_next_day_opening_cash, remarks
                FROM daily_settlement WHERE date BETWEEN ?1 AND ?2 ORDER BY date
                "#,
            )?
            .query_map(params![start, end], settlement_from_row)?
            .collect()
        })
    }

    fn insert_settlement(&self, settlement: &DailySettlement) -> Result<(), ServerError> {
        self.datasource.write("insert settlement", |tx| {
            let remarks = serde_json::to_string(&settlement.remarks)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                r#"
                INSERT INTO daily_settlement (date, total_deposit, total_next_day_opening_cash, remarks)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    settlement.date,
                    settlement.total_deposit,
                    settlement.total_next_day_opening_cash,
                    remarks
                ],
            )?;
            Ok(())
        })
    }

    // Users and roles.
    // --

    fn user_by_username(&self, username: &str) -> Result<Option<User>, ServerError> {
        self.datasource.read("get user", |c| {
            let row = c
                .query_row(
                    "SELECT id, username, email, password_hash FROM user WHERE username = ?1",
                    params![username],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            row.map(|r| load_user(c, r)).transpose()
        })
    }

    fn list_users(&self) -> Result<Vec<User>, ServerError> {
        self.datasource.read("list users", |c| {
            let rows = c
                .prepare("SELECT id, username, email, password_hash FROM user ORDER BY username")?
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(|r| load_user(c, r)).collect()
        })
    }

    fn insert_user(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> Result<User, ServerError> {
        self.datasource.write("insert user", |tx| {
            tx.execute(
                "INSERT INTO user (username, email, password_hash) VALUES (?1, ?2, ?3)",
                params![username, email, password_hash],
            )?;
            Ok(User {
                id: UserId(tx.last_insert_rowid()),
                username: username.to_string(),
                email: email.map(str::to_string),
                password_hash: Some(password_hash.to_string()),
                roles: Vec::new(),
            })
        })
    }

    fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), ServerError> {
        self.datasource.write("update password", |tx| {
            tx.execute(
                "UPDATE user SET password_hash = ?2 WHERE id = ?1",
                params![id.0, password_hash],
            )?;
            Ok(())
        })
    }

    fn set_user_roles(&self, id: UserId, roles: &[RoleId]) -> Result<(), ServerError> {
        self.datasource.write("set user roles", |tx| {
            tx.execute("DELETE FROM roles_users WHERE user_id = ?1", params![id.0])?;
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO roles_users (user_id, role_id) VALUES (?1, ?2)")?;
            for role in roles {
                stmt.execute(params![id.0, role.0])?;
            }
            Ok(())
        })
    }

    fn list_roles(&self) -> Result<Vec<Role>, ServerError> {
        self.datasource.read("list roles", |c| {
            c.prepare("SELECT id, name, permissions FROM role ORDER BY name")?
                .query_map([], role_from_row)?
                .collect()
        })
    }

    fn role_by_name(&self, name: &str) -> Result<Option<Role>, ServerError> {
        self.datasource.read("get role", |c| {
            c.query_row(
                "SELECT id, name, permissions FROM role WHERE name = ?1",
                params![name],
                role_from_row,
            )
            .optional()
        })
    }

    fn upsert_role(&self, name: &str, permissions: &[Permission]) -> Result<Role, ServerError> {
        let joined = permissions
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.datasource.write("upsert role", |tx| {
            tx.execute(
                r#"
                INSERT INTO role (name, permissions) VALUES (?1, ?2)
                ON CONFLICT(name) DO UPDATE SET permissions = ?2
                "#,
                params![name, joined],
            )?;
            tx.query_row(
                "SELECT id, name, permissions FROM role WHERE name = ?1",
                params![name],
                role_from_row,
            )
        })
    }

    // Runtime settings.
    // --

    fn setting(&self, key: &str) -> Result<Option<String>, ServerError> {
        self.datasource.read("get setting", |c| {
            c.query_row(
                "SELECT value FROM system_setting WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
        })
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), ServerError> {
        self.datasource.write("set setting", |tx| {
            tx.execute(
                r#"
                INSERT INTO system_setting (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = ?2
                "#,
                params![key, value],
            )?;
            Ok(())
        })
    }
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: TransactionId(row.get(0)?),
        business_day_id: BusinessDayId(row.get(1)?),
        timestamp: row.get(2)?,
        amount: row.get(3)?,
        item_count: row.get(4)?,
        cash_received: row.get(5)?,
        change_given: row.get(6)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, TransactionItem)> {
    Ok((
        row.get(1)?,
        TransactionItem {
            id: TransactionItemId(row.get(0)?),
            price: row.get(2)?,
            category_id: row.get::<_, Option<i64>>(3)?.map(CategoryId),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::entities::transaction::NewTransactionItem, entities::CategoryKind};
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn repo_with_location() -> (StoreRepositoryImpl, Location) {
        let repo = StoreRepositoryImpl::open_in_memory().unwrap();
        let location = repo
            .insert_location(&LocationSpec::new("Main", "main"))
            .unwrap();
        (repo, location)
    }

    #[test]
    fn categories_keep_rule_parameters() {
        let (repo, location) = repo_with_location();
        let books = repo
            .insert_category(
                location.id,
                &CategorySpec::new("Books", "#112233", CategoryKind::Product),
            )
            .unwrap();
        let rule = repo
            .insert_category(
                location.id,
                &CategorySpec::new(
                    "Buy2Get1",
                    "#445566",
                    CategoryKind::BuyNGetM {
                        target: books.id,
                        buy_n: 2,
                        get_m: 1,
                    },
                ),
            )
            .unwrap();
        assert_eq!(repo.category_by_id(rule.id).unwrap(), Some(rule));
        assert_eq!(repo.list_categories(location.id).unwrap().len(), 2);
    }

    fn sale(amount: f64) -> NewTransaction {
        NewTransaction {
            timestamp: date().and_hms_opt(10, 30, 0).unwrap(),
            amount,
            item_count: 2,
            cash_received: 200.0,
            change_given: 200.0 - amount,
            items: vec![
                NewTransactionItem {
                    category_id: None,
                    price: amount - 50.0,
                },
                NewTransactionItem {
                    category_id: None,
                    price: 50.0,
                },
            ],
        }
    }

    #[test]
    fn recording_a_transaction_updates_day_atomically() {
        let (repo, location) = repo_with_location();
        let now = date().and_hms_opt(9, 0, 0).unwrap();
        let day = repo
            .insert_business_day(location.id, date(), 1000.0, Some("rainy"), now)
            .unwrap();
        assert_eq!(day.status, DayStatus::Open);
        let (id, updated) = repo
            .record_transaction(day.id, &sale(150.0), |day| {
                day.total_sales += 150.0;
                day.total_items += 2;
                day.total_transactions += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.total_sales, 150.0);
        let stored = repo.business_day(location.id, date()).unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(stored.location_notes.as_deref(), Some("rainy"));
        let transaction = repo.transaction_by_id(id).unwrap().unwrap();
        assert_eq!(transaction.items.len(), 2);
        let listed = repo.transactions_for_days(&[day.id]).unwrap();
        assert_eq!(listed, vec![transaction]);
    }

    #[test]
    fn rejected_day_change_writes_nothing() {
        let (repo, location) = repo_with_location();
        let now = date().and_hms_opt(9, 0, 0).unwrap();
        let day = repo
            .insert_business_day(location.id, date(), 1000.0, None, now)
            .unwrap();
        repo.update_business_day(day.id, |day| {
            day.status = DayStatus::PendingReport;
            Ok(())
        })
        .unwrap();

        // The closure sees the stored status, not the caller's stale copy.
        let result = repo.record_transaction(day.id, &sale(150.0), |current| {
            crate::domain::logic::day_lifecycle::ensure_status(
                current,
                "Main",
                &[DayStatus::Open],
            )?;
            current.total_sales += 150.0;
            Ok(())
        });
        assert!(result.is_err());
        assert!(repo.transactions_for_days(&[day.id]).unwrap().is_empty());
        let stored = repo.business_day_by_id(day.id).unwrap().unwrap();
        assert_eq!(stored.status, DayStatus::PendingReport);
        assert_eq!(stored.total_sales, 0.0);

        assert!(repo
            .update_business_day(BusinessDayId(999), |_| Ok(()))
            .is_err());
    }

    #[test]
    fn edited_transaction_recomputes_from_stored_rows() {
        let (repo, location) = repo_with_location();
        let now = date().and_hms_opt(9, 0, 0).unwrap();
        let day = repo
            .insert_business_day(location.id, date(), 0.0, None, now)
            .unwrap();
        for amount in [150.0, 100.0] {
            repo.record_transaction(day.id, &sale(amount), |day| {
                day.total_sales += amount;
                Ok(())
            })
            .unwrap();
        }
        let mut first = repo.transactions_for_days(&[day.id]).unwrap().remove(0);
        first.items[0].price = 40.0;
        first.amount = 90.0;
        let updated = repo
            .save_transaction(&first, |day, transactions| {
                day.total_sales = transactions
                    .iter()
                    .flat_map(|t| &t.items)
                    .map(|i| i.price)
                    .sum();
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.total_sales, 190.0);
        assert_eq!(repo.business_day_by_id(day.id).unwrap().unwrap().total_sales, 190.0);
    }

    #[test]
    fn unknown_stored_status_is_rejected() {
        let (repo, location) = repo_with_location();
        let now = date().and_hms_opt(9, 0, 0).unwrap();
        let day = repo
            .insert_business_day(location.id, date(), 0.0, None, now)
            .unwrap();
        repo.datasource
            .write("overwrite status", |tx| {
                tx.execute(
                    "UPDATE business_day SET status = 'SETTLED' WHERE id = ?1",
                    params![day.id.0],
                )
            })
            .unwrap();
        assert!(repo.business_day_by_id(day.id).is_err());
    }

    #[test]
    fn users_roles_and_settings() {
        let repo = StoreRepositoryImpl::open_in_memory().unwrap();
        let role = repo
            .upsert_role("Cashier", &[Permission::OperatePos, Permission::ViewReports])
            .unwrap();
        let user = repo.insert_user("alice", None, "hash").unwrap();
        repo.set_user_roles(user.id, &[role.id]).unwrap();
        let loaded = repo.user_by_username("alice").unwrap().unwrap();
        assert!(loaded.can(Permission::ViewReports));
        assert!(!loaded.can(Permission::ManageUsers));

        assert_eq!(repo.setting("drive_folder_name").unwrap(), None);
        repo.set_setting("drive_folder_name", "Reports").unwrap();
        repo.set_setting("drive_folder_name", "Archive").unwrap();
        assert_eq!(
            repo.setting("drive_folder_name").unwrap().as_deref(),
            Some("Archive")
        );
    }

    #[test]
    fn settlements_round_trip_remarks() {
        let repo = StoreRepositoryImpl::open_in_memory().unwrap();
        let settlement = DailySettlement {
            date: date(),
            total_deposit: 5000.0,
            total_next_day_opening_cash: 3000.0,
            remarks: BTreeMap::from([("A".to_string(), "checked".to_string())]),
        };
        repo.insert_settlement(&settlement).unwrap();
        assert!(repo.insert_settlement(&settlement).is_err());
        assert_eq!(repo.settlement(date()).unwrap(), Some(settlement));
    }
}
