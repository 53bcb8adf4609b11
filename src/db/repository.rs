//! SQLite-backed record store.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::models::{
    Account, AccountTemplate, Asset, Label, Node, Platform, Protocol, PushTask,
};
use super::store::RecordStore;
use crate::choices::SecretType;
use crate::error::{Result, WardenError};
use crate::push::PushQueue;

const ACCOUNT_COLUMNS: &str = "id, asset_id, name, username, secret, secret_type, source, \
    source_id, version, privileged, is_active, comment, su_from, date_created, date_updated";

const TEMPLATE_COLUMNS: &str = "id, org_id, name, username, secret, secret_type, privileged, \
    is_active, comment, date_created, date_updated";

const ASSET_COLUMNS: &str =
    "id, name, address, platform_id, category, type, domain, is_active, comment, date_created";

const PLATFORM_COLUMNS: &str = "id, name, category, type, charset, domain_enabled, su_enabled, \
    su_method, automation_json, custom_fields_json, comment, date_created";

/// Repository over a single SQLite connection.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Create a new repository with the given connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| WardenError::Other(e.to_string()))
    }

    // ========================================================================
    // Push outbox
    // ========================================================================

    fn insert_push_task(&self, account_ids: &[String], params: Option<&Value>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO push_tasks (account_ids_json, params_json, created_at) VALUES (?1, ?2, ?3)",
            params![
                serde_json::to_string(account_ids)?,
                params.map(serde_json::to_string).transpose()?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List queued push tasks, newest first.
    pub fn list_push_tasks(&self, limit: Option<usize>) -> Result<Vec<PushTask>> {
        let conn = self.conn()?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(
            r#"
            SELECT id, account_ids_json, params_json, created_at
            FROM push_tasks
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let tasks = stmt
            .query_map([limit], |row| {
                Ok(PushTask {
                    id: row.get(0)?,
                    account_ids: json_column(1, row.get::<_, String>(1)?)?,
                    params: row
                        .get::<_, Option<String>>(2)?
                        .map(|s| json_column(2, s))
                        .transpose()?,
                    created_at: timestamp(row.get::<_, String>(3)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn load_platform_protocols(conn: &Connection, platform_id: &str) -> Result<Vec<Protocol>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT name, port, is_primary, required, is_default, secret_types_json
            FROM platform_protocols WHERE platform_id = ?
            ORDER BY id
            "#,
        )?;
        let protocols = stmt
            .query_map([platform_id], |row| {
                Ok(Protocol {
                    name: row.get(0)?,
                    port: row.get(1)?,
                    primary: row.get(2)?,
                    required: row.get(3)?,
                    default: row.get(4)?,
                    secret_types: json_column(5, row.get::<_, String>(5)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(protocols)
    }

    fn load_asset_relations(conn: &Connection, asset: &mut Asset) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT name, port, is_primary FROM asset_protocols WHERE asset_id = ? ORDER BY name",
        )?;
        asset.protocols = stmt
            .query_map([&asset.id], |row| {
                Ok(Protocol {
                    name: row.get(0)?,
                    port: row.get(1)?,
                    primary: row.get(2)?,
                    required: false,
                    default: false,
                    secret_types: Default::default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT l.name, l.value FROM labels l
            INNER JOIN asset_labels al ON al.label_id = l.id
            WHERE al.asset_id = ?
            ORDER BY l.name, l.value
            "#,
        )?;
        asset.labels = stmt
            .query_map([&asset.id], |row| {
                Ok(Label {
                    name: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt =
            conn.prepare("SELECT node_id FROM asset_nodes WHERE asset_id = ? ORDER BY node_id")?;
        asset.node_ids = stmt
            .query_map([&asset.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(())
    }

    fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            asset_id: row.get(1)?,
            name: row.get(2)?,
            username: row.get(3)?,
            secret: row.get(4)?,
            secret_type: choice_column(5, row.get(5)?)?,
            source: choice_column(6, row.get(6)?)?,
            source_id: row.get(7)?,
            version: row.get(8)?,
            privileged: row.get(9)?,
            is_active: row.get(10)?,
            comment: row.get(11)?,
            su_from: row.get(12)?,
            date_created: timestamp(row.get(13)?),
            date_updated: timestamp(row.get(14)?),
        })
    }

    fn row_to_template(row: &rusqlite::Row) -> rusqlite::Result<AccountTemplate> {
        Ok(AccountTemplate {
            id: row.get(0)?,
            org_id: row.get(1)?,
            name: row.get(2)?,
            username: row.get(3)?,
            secret: row.get(4)?,
            secret_type: choice_column(5, row.get(5)?)?,
            privileged: row.get(6)?,
            is_active: row.get(7)?,
            comment: row.get(8)?,
            date_created: timestamp(row.get(9)?),
            date_updated: timestamp(row.get(10)?),
        })
    }

    fn row_to_asset(row: &rusqlite::Row) -> rusqlite::Result<Asset> {
        Ok(Asset {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            platform_id: row.get(3)?,
            category: choice_column(4, row.get(4)?)?,
            asset_type: choice_column(5, row.get(5)?)?,
            domain: row.get(6)?,
            is_active: row.get(7)?,
            comment: row.get(8)?,
            protocols: Vec::new(),
            labels: Vec::new(),
            node_ids: Vec::new(),
            date_created: timestamp(row.get(9)?),
        })
    }

    fn row_to_platform(row: &rusqlite::Row) -> rusqlite::Result<Platform> {
        Ok(Platform {
            id: row.get(0)?,
            name: row.get(1)?,
            category: choice_column(2, row.get(2)?)?,
            asset_type: choice_column(3, row.get(3)?)?,
            charset: choice_column(4, row.get(4)?)?,
            domain_enabled: row.get(5)?,
            su_enabled: row.get(6)?,
            su_method: row
                .get::<_, Option<String>>(7)?
                .map(|s| choice_column(7, s))
                .transpose()?,
            automation: json_column(8, row.get(8)?)?,
            custom_fields: json_column(9, row.get(9)?)?,
            comment: row.get(10)?,
            protocols: Vec::new(),
            date_created: timestamp(row.get(11)?),
        })
    }
}

/// Run `f` inside a savepoint so it nests under any open transaction.
fn within_savepoint<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch("SAVEPOINT warden_tx")?;
    match f() {
        Ok(value) => {
            conn.execute_batch("RELEASE warden_tx")?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK TO warden_tx; RELEASE warden_tx");
            Err(e)
        }
    }
}

fn timestamp(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn choice_column<T: FromStr<Err = WardenError>>(idx: usize, s: String) -> rusqlite::Result<T> {
    s.parse()
        .map_err(|e: WardenError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(idx: usize, s: String) -> rusqlite::Result<T> {
    serde_json::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl RecordStore for SqliteRepository {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.conn()?.execute_batch("SAVEPOINT warden_tx")?;
        match f(self) {
            Ok(value) => {
                self.conn()?.execute_batch("RELEASE warden_tx")?;
                Ok(value)
            }
            Err(e) => {
                let rolled_back = self.conn().and_then(|conn| {
                    conn.execute_batch("ROLLBACK TO warden_tx; RELEASE warden_tx")
                        .map_err(WardenError::from)
                });
                if let Err(rollback_err) = rolled_back {
                    tracing::warn!(error = %rollback_err, "savepoint rollback failed");
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Platform operations
    // ========================================================================

    fn insert_platform(&self, platform: &Platform) -> Result<()> {
        let conn = self.conn()?;
        within_savepoint(&conn, || {
            conn.execute(
                &format!(
                    "INSERT INTO platforms ({PLATFORM_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    platform.id,
                    platform.name,
                    platform.category.as_str(),
                    platform.asset_type.as_str(),
                    platform.charset.as_str(),
                    platform.domain_enabled,
                    platform.su_enabled,
                    platform.su_method.map(|m| m.as_str()),
                    serde_json::to_string(&platform.automation)?,
                    serde_json::to_string(&platform.custom_fields)?,
                    platform.comment,
                    platform.date_created.to_rfc3339(),
                ],
            )?;
            for protocol in &platform.protocols {
                conn.execute(
                    r#"
                    INSERT INTO platform_protocols
                        (platform_id, name, port, is_primary, required, is_default, secret_types_json)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        platform.id,
                        protocol.name,
                        protocol.port,
                        protocol.primary,
                        protocol.required,
                        protocol.default,
                        serde_json::to_string(&protocol.secret_types)?,
                    ],
                )?;
            }
            Ok(())
        })
    }

    fn get_platform(&self, id: &str) -> Result<Option<Platform>> {
        let conn = self.conn()?;
        let platform = conn
            .query_row(
                &format!("SELECT {PLATFORM_COLUMNS} FROM platforms WHERE id = ?"),
                [id],
                |row| Self::row_to_platform(row),
            )
            .optional()?;
        match platform {
            Some(mut platform) => {
                platform.protocols = Self::load_platform_protocols(&conn, &platform.id)?;
                Ok(Some(platform))
            }
            None => Ok(None),
        }
    }

    fn list_platforms(&self) -> Result<Vec<Platform>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {PLATFORM_COLUMNS} FROM platforms ORDER BY name"))?;
        let mut platforms = stmt
            .query_map([], |row| Self::row_to_platform(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for platform in &mut platforms {
            platform.protocols = Self::load_platform_protocols(&conn, &platform.id)?;
        }
        Ok(platforms)
    }

    // ========================================================================
    // Asset operations
    // ========================================================================

    fn insert_asset(&self, asset: &Asset) -> Result<()> {
        let conn = self.conn()?;
        within_savepoint(&conn, || {
            conn.execute(
                &format!(
                    "INSERT INTO assets ({ASSET_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    asset.id,
                    asset.name,
                    asset.address,
                    asset.platform_id,
                    asset.category.as_str(),
                    asset.asset_type.as_str(),
                    asset.domain,
                    asset.is_active,
                    asset.comment,
                    asset.date_created.to_rfc3339(),
                ],
            )?;
            for protocol in &asset.protocols {
                conn.execute(
                    "INSERT INTO asset_protocols (asset_id, name, port, is_primary) VALUES (?1, ?2, ?3, ?4)",
                    params![asset.id, protocol.name, protocol.port, protocol.primary],
                )?;
            }
            for label in &asset.labels {
                conn.execute(
                    "INSERT OR IGNORE INTO labels (name, value) VALUES (?1, ?2)",
                    params![label.name, label.value],
                )?;
                let label_id: i64 = conn.query_row(
                    "SELECT id FROM labels WHERE name = ? AND value = ?",
                    params![label.name, label.value],
                    |row| row.get(0),
                )?;
                conn.execute(
                    "INSERT OR IGNORE INTO asset_labels (asset_id, label_id) VALUES (?1, ?2)",
                    params![asset.id, label_id],
                )?;
            }
            for node_id in &asset.node_ids {
                conn.execute(
                    "INSERT OR IGNORE INTO asset_nodes (asset_id, node_id) VALUES (?1, ?2)",
                    params![asset.id, node_id],
                )?;
            }
            Ok(())
        })
    }

    fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        let conn = self.conn()?;
        let asset = conn
            .query_row(
                &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?"),
                [id],
                |row| Self::row_to_asset(row),
            )
            .optional()?;
        match asset {
            Some(mut asset) => {
                Self::load_asset_relations(&conn, &mut asset)?;
                Ok(Some(asset))
            }
            None => Ok(None),
        }
    }

    fn list_assets(&self) -> Result<Vec<Asset>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {ASSET_COLUMNS} FROM assets ORDER BY name"))?;
        let mut assets = stmt
            .query_map([], |row| Self::row_to_asset(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for asset in &mut assets {
            Self::load_asset_relations(&conn, asset)?;
        }
        Ok(assets)
    }

    fn delete_asset(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        // Protocols, label links, node links and accounts go via CASCADE
        let deleted = conn.execute("DELETE FROM assets WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    fn find_node(&self, full_value: &str) -> Result<Option<Node>> {
        let conn = self.conn()?;
        let node = conn
            .query_row(
                "SELECT id, full_value, parent_id FROM nodes WHERE full_value = ?",
                [full_value],
                |row| {
                    Ok(Node {
                        id: row.get(0)?,
                        full_value: row.get(1)?,
                        parent_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(node)
    }

    fn insert_node(&self, node: &Node) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO nodes (id, full_value, parent_id) VALUES (?1, ?2, ?3)",
            params![node.id, node.full_value, node.parent_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Template operations
    // ========================================================================

    fn insert_template(&self, template: &AccountTemplate) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO account_templates ({TEMPLATE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                template.id,
                template.org_id,
                template.name,
                template.username,
                template.secret,
                template.secret_type.as_str(),
                template.privileged,
                template.is_active,
                template.comment,
                template.date_created.to_rfc3339(),
                template.date_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_template(&self, id: &str) -> Result<Option<AccountTemplate>> {
        let conn = self.conn()?;
        let template = conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM account_templates WHERE id = ?"),
                [id],
                |row| Self::row_to_template(row),
            )
            .optional()?;
        Ok(template)
    }

    fn list_templates(&self, secret_types: Option<&[SecretType]>) -> Result<Vec<AccountTemplate>> {
        let conn = self.conn()?;
        let (filter, values): (String, Vec<&str>) = match secret_types {
            Some(types) if !types.is_empty() => {
                let placeholders = vec!["?"; types.len()].join(", ");
                (
                    format!("WHERE secret_type IN ({placeholders})"),
                    types.iter().map(|t| t.as_str()).collect(),
                )
            }
            _ => (String::new(), Vec::new()),
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM account_templates {filter} ORDER BY name"
        ))?;
        let templates = stmt
            .query_map(params_from_iter(values), |row| Self::row_to_template(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(templates)
    }

    fn delete_template(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM account_templates WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    // ========================================================================
    // Account operations
    // ========================================================================

    fn insert_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO accounts ({ACCOUNT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                account.id,
                account.asset_id,
                account.name,
                account.username,
                account.secret,
                account.secret_type.as_str(),
                account.source.as_str(),
                account.source_id,
                account.version,
                account.privileged,
                account.is_active,
                account.comment,
                account.su_from,
                account.date_created.to_rfc3339(),
                account.date_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE accounts SET
                name = ?2, username = ?3, secret = ?4, secret_type = ?5, source = ?6,
                source_id = ?7, version = ?8, privileged = ?9, is_active = ?10,
                comment = ?11, su_from = ?12, date_updated = ?13
            WHERE id = ?1
            "#,
            params![
                account.id,
                account.name,
                account.username,
                account.secret,
                account.secret_type.as_str(),
                account.source.as_str(),
                account.source_id,
                account.version,
                account.privileged,
                account.is_active,
                account.comment,
                account.su_from,
                account.date_updated.to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(WardenError::not_found(format!(
                "Account not found: {}",
                account.id
            )));
        }
        Ok(())
    }

    fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"),
                [id],
                |row| Self::row_to_account(row),
            )
            .optional()?;
        Ok(account)
    }

    fn list_accounts(&self, asset_id: Option<&str>) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let accounts = match asset_id {
            Some(asset_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE asset_id = ? ORDER BY name"
                ))?;
                stmt.query_map([asset_id], |row| Self::row_to_account(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY asset_id, name"
                ))?;
                stmt.query_map([], |row| Self::row_to_account(row))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(accounts)
    }

    fn find_account_by_name(&self, asset_id: &str, name: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE asset_id = ? AND name = ?"),
                params![asset_id, name],
                |row| Self::row_to_account(row),
            )
            .optional()?;
        Ok(account)
    }

    fn find_account_by_slot(
        &self,
        asset_id: &str,
        username: &str,
        secret_type: SecretType,
    ) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts \
                     WHERE asset_id = ? AND username = ? AND secret_type = ?"
                ),
                params![asset_id, username, secret_type.as_str()],
                |row| Self::row_to_account(row),
            )
            .optional()?;
        Ok(account)
    }
}

impl PushQueue for SqliteRepository {
    fn enqueue_push(&self, account_ids: &[String], params: Option<&Value>) {
        match self.insert_push_task(account_ids, params) {
            Ok(id) => tracing::debug!(task = id, accounts = account_ids.len(), "push task queued"),
            Err(e) => tracing::warn!(error = %e, "failed to queue push task"),
        }
    }
}

impl Clone for SqliteRepository {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}
