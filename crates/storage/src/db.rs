use chrono::{DateTime, Utc};
use fincat_core::{
    Catalog, CategoryRef, HistoricalPattern, InternalAccount, Money, PersistedDecision, Rule,
    RuleMatchType, TransactionType, ValidationStatus,
};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cost_centers (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classification_rules (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            pattern TEXT NOT NULL,
            match_type TEXT NOT NULL DEFAULT 'contains',
            category_id TEXT NOT NULL,
            cost_center_id TEXT,
            threshold REAL,
            amount_min_cents INTEGER,
            amount_max_cents INTEGER,
            transaction_type TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories(id),
            FOREIGN KEY (cost_center_id) REFERENCES cost_centers(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS internal_accounts (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL,
            aliases TEXT NOT NULL DEFAULT '[]',
            account_number TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            transaction_type TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            category_id TEXT,
            cost_center_id TEXT,
            is_transfer INTEGER NOT NULL DEFAULT 0,
            validation_status TEXT,
            confidence REAL,
            source TEXT,
            reasoning TEXT,
            FOREIGN KEY (category_id) REFERENCES categories(id),
            FOREIGN KEY (cost_center_id) REFERENCES cost_centers(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_org_status ON transactions(organization_id, validation_status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// A bank transaction as imported, before any classification.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: String,
    pub organization_id: String,
    pub description: String,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub occurred_at: DateTime<Utc>,
}

// ── Catalog ───────────────────────────────────────────────────────────────────

pub async fn insert_category(
    pool: &DbPool,
    organization_id: &str,
    category: &CategoryRef,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO categories (id, organization_id, name) VALUES (?, ?, ?)")
        .bind(&category.id)
        .bind(organization_id)
        .bind(&category.name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_cost_center(
    pool: &DbPool,
    organization_id: &str,
    cost_center: &CategoryRef,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO cost_centers (id, organization_id, name) VALUES (?, ?, ?)")
        .bind(&cost_center.id)
        .bind(organization_id)
        .bind(&cost_center.name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_categories(pool: &DbPool, organization_id: &str) -> Result<Vec<CategoryRef>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT id, name FROM categories WHERE organization_id = ? ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id, name)| CategoryRef { id, name }).collect())
}

pub async fn get_cost_centers(pool: &DbPool, organization_id: &str) -> Result<Vec<CategoryRef>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT id, name FROM cost_centers WHERE organization_id = ? ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id, name)| CategoryRef { id, name }).collect())
}

pub async fn get_catalog(pool: &DbPool, organization_id: &str) -> Result<Catalog, sqlx::Error> {
    Ok(Catalog {
        categories: get_categories(pool, organization_id).await?,
        cost_centers: get_cost_centers(pool, organization_id).await?,
    })
}

// ── Rules ─────────────────────────────────────────────────────────────────────

pub async fn insert_rule(pool: &DbPool, rule: &Rule) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO classification_rules
            (id, organization_id, pattern, match_type, category_id, cost_center_id, threshold,
             amount_min_cents, amount_max_cents, transaction_type, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&rule.id)
    .bind(&rule.organization_id)
    .bind(&rule.pattern)
    .bind(rule.match_type.to_string())
    .bind(&rule.category.id)
    .bind(rule.cost_center.as_ref().map(|c| c.id.as_str()))
    .bind(rule.threshold.map(f64::from))
    .bind(rule.amount_min.map(|m| m.to_cents()))
    .bind(rule.amount_max.map(|m| m.to_cents()))
    .bind(rule.transaction_type.map(|t| t.to_string()))
    .bind(rule.is_active)
    .bind(rule.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

type RuleRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    bool,
    DateTime<Utc>,
);

pub async fn get_active_rules(pool: &DbPool, organization_id: &str) -> Result<Vec<Rule>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RuleRow>(
        r#"
        SELECT r.id, r.organization_id, r.pattern, r.match_type,
               r.category_id, c.name, r.cost_center_id, cc.name,
               r.threshold, r.amount_min_cents, r.amount_max_cents, r.transaction_type,
               r.is_active, r.created_at
        FROM classification_rules r
        JOIN categories c ON c.id = r.category_id
        LEFT JOIN cost_centers cc ON cc.id = r.cost_center_id
        WHERE r.organization_id = ? AND r.is_active = 1
        ORDER BY r.created_at DESC, r.id
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(rule_from_row).collect())
}

/// A row with an unknown match type or transaction type is skipped rather than
/// guessed at, so a corrupt rule can never fire with looser semantics.
fn rule_from_row(r: RuleRow) -> Option<Rule> {
    let match_type = match r.3.parse::<RuleMatchType>() {
        Ok(m) => m,
        Err(_) => {
            tracing::warn!(rule_id = %r.0, match_type = %r.3, "skipping rule with unknown match type");
            return None;
        }
    };
    let transaction_type = match r.11.as_deref().map(str::parse::<TransactionType>).transpose() {
        Ok(t) => t,
        Err(_) => {
            tracing::warn!(rule_id = %r.0, transaction_type = ?r.11, "skipping rule with unknown transaction type");
            return None;
        }
    };
    Some(Rule {
        id: r.0,
        organization_id: r.1,
        pattern: r.2,
        match_type,
        category: CategoryRef { id: r.4, name: r.5 },
        cost_center: pair(r.6, r.7),
        threshold: r.8.map(|t| t as f32),
        amount_min: r.9.map(Money::from_cents),
        amount_max: r.10.map(Money::from_cents),
        transaction_type,
        is_active: r.12,
        created_at: r.13,
    })
}

// ── Internal accounts ─────────────────────────────────────────────────────────

pub async fn insert_internal_account(pool: &DbPool, account: &InternalAccount) -> Result<(), sqlx::Error> {
    let aliases = serde_json::to_string(&account.aliases).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "INSERT OR REPLACE INTO internal_accounts (id, organization_id, name, aliases, account_number) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&account.id)
    .bind(&account.organization_id)
    .bind(&account.name)
    .bind(aliases)
    .bind(&account.account_number)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_internal_accounts(
    pool: &DbPool,
    organization_id: &str,
) -> Result<Vec<InternalAccount>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String, String, String, Option<String>)>(
        "SELECT id, organization_id, name, aliases, account_number FROM internal_accounts WHERE organization_id = ? ORDER BY id",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let aliases = match serde_json::from_str(&r.3) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(account_id = %r.0, "skipping account with unreadable aliases: {e}");
                    return None;
                }
            };
            Some(InternalAccount {
                id: r.0,
                organization_id: r.1,
                name: r.2,
                aliases,
                account_number: r.4,
            })
        })
        .collect())
}

// ── Transactions ──────────────────────────────────────────────────────────────

pub async fn insert_transaction(pool: &DbPool, tx: &TransactionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transactions (id, organization_id, description, amount_cents, transaction_type, occurred_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.organization_id)
    .bind(&tx.description)
    .bind(tx.amount.to_cents())
    .bind(tx.transaction_type.to_string())
    .bind(tx.occurred_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// A reviewer's verdict: sets the category and marks the transaction confirmed.
/// The category and cost center must belong to the transaction's organization.
/// Returns that organization, or `None` when nothing matched.
pub async fn confirm_classification(
    pool: &DbPool,
    transaction_id: &str,
    category_id: &str,
    cost_center_id: Option<&str>,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        UPDATE transactions
        SET category_id = ?, cost_center_id = ?, is_transfer = 0, validation_status = ?
        WHERE id = ?
          AND EXISTS (SELECT 1 FROM categories c
                      WHERE c.id = ? AND c.organization_id = transactions.organization_id)
          AND (? IS NULL OR EXISTS (SELECT 1 FROM cost_centers cc
                                    WHERE cc.id = ? AND cc.organization_id = transactions.organization_id))
        RETURNING organization_id
        "#,
    )
    .bind(category_id)
    .bind(cost_center_id)
    .bind(ValidationStatus::Confirmed.to_string())
    .bind(transaction_id)
    .bind(category_id)
    .bind(cost_center_id)
    .bind(cost_center_id)
    .fetch_optional(pool)
    .await
}

type HistoryRow = (
    String,
    String,
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    String,
);

/// Settled, categorized, non-transfer transactions: what pattern matching learns from.
pub async fn get_categorized_history(
    pool: &DbPool,
    organization_id: &str,
) -> Result<Vec<HistoricalPattern>, sqlx::Error> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT t.id, t.description, t.amount_cents, t.transaction_type,
               t.category_id, c.name, t.cost_center_id, cc.name, t.occurred_at,
               t.validation_status
        FROM transactions t
        JOIN categories c ON c.id = t.category_id
        LEFT JOIN cost_centers cc ON cc.id = t.cost_center_id
        WHERE t.organization_id = ?
          AND t.is_transfer = 0
          AND t.validation_status IS NOT NULL
        ORDER BY t.occurred_at DESC, t.id
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter(|r| {
            r.9.parse::<ValidationStatus>()
                .is_ok_and(ValidationStatus::is_settled)
        })
        .filter_map(|r| {
            let Ok(transaction_type) = r.3.parse::<TransactionType>() else {
                tracing::warn!(transaction_id = %r.0, transaction_type = %r.3, "skipping history row with unknown transaction type");
                return None;
            };
            Some(HistoricalPattern {
                transaction_id: r.0,
                description: r.1,
                amount: Money::from_cents(r.2),
                transaction_type,
                category: CategoryRef { id: r.4, name: r.5 },
                cost_center: pair(r.6, r.7),
                occurred_at: r.8,
            })
        })
        .collect())
}

/// Idempotent write-back keyed by transaction id. Returns whether a row matched.
pub async fn save_classification(pool: &DbPool, decision: &PersistedDecision) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET category_id = ?, cost_center_id = ?, is_transfer = ?, validation_status = ?,
            confidence = ?, source = ?, reasoning = ?
        WHERE id = ?
        "#,
    )
    .bind(&decision.category_id)
    .bind(&decision.cost_center_id)
    .bind(decision.is_transfer)
    .bind(decision.validation_status.to_string())
    .bind(f64::from(decision.confidence))
    .bind(decision.source.to_string())
    .bind(&decision.reasoning)
    .bind(&decision.transaction_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

type DecisionRow = (
    String,
    Option<String>,
    Option<String>,
    bool,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<String>,
);

pub async fn get_classification(
    pool: &DbPool,
    transaction_id: &str,
) -> Result<Option<PersistedDecision>, sqlx::Error> {
    let row = sqlx::query_as::<_, DecisionRow>(
        r#"
        SELECT id, category_id, cost_center_id, is_transfer, validation_status, confidence, source, reasoning
        FROM transactions WHERE id = ?
        "#,
    )
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|r| {
        Some(PersistedDecision {
            transaction_id: r.0,
            category_id: r.1,
            cost_center_id: r.2,
            is_transfer: r.3,
            validation_status: r.4?.parse().ok()?,
            confidence: r.5? as f32,
            source: r.6?.parse().ok()?,
            reasoning: r.7.unwrap_or_default(),
        })
    }))
}

fn pair(id: Option<String>, name: Option<String>) -> Option<CategoryRef> {
    match (id, name) {
        (Some(id), Some(name)) => Some(CategoryRef { id, name }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fincat_core::Source;

    async fn test_db() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("fincat.db")).await.unwrap();
        insert_category(&pool, "org", &CategoryRef::new("travel", "Travel")).await.unwrap();
        insert_category(&pool, "org", &CategoryRef::new("software", "Software")).await.unwrap();
        insert_cost_center(&pool, "org", &CategoryRef::new("ops", "Operations")).await.unwrap();
        (dir, pool)
    }

    fn tx(id: &str, desc: &str, day: u32) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            organization_id: "org".to_string(),
            description: desc.to_string(),
            amount: Money::from_cents(2350),
            transaction_type: TransactionType::Expense,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap(),
        }
    }

    fn decision(id: &str, status: ValidationStatus) -> PersistedDecision {
        PersistedDecision {
            transaction_id: id.to_string(),
            category_id: Some("travel".to_string()),
            cost_center_id: Some("ops".to_string()),
            is_transfer: false,
            validation_status: status,
            confidence: 0.9,
            source: Source::Pattern,
            reasoning: "pattern match".to_string(),
        }
    }

    #[tokio::test]
    async fn rules_round_trip_with_names_and_filters() {
        let (_dir, pool) = test_db().await;
        let mut rule = Rule {
            id: "r1".to_string(),
            organization_id: "org".to_string(),
            pattern: "uber".to_string(),
            match_type: RuleMatchType::StartsWith,
            category: CategoryRef::new("travel", "Travel"),
            cost_center: Some(CategoryRef::new("ops", "Operations")),
            threshold: Some(0.9),
            amount_min: Some(Money::from_cents(100)),
            amount_max: None,
            transaction_type: Some(TransactionType::Expense),
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        insert_rule(&pool, &rule).await.unwrap();
        rule.id = "r2".to_string();
        rule.is_active = false;
        insert_rule(&pool, &rule).await.unwrap();

        let rules = get_active_rules(&pool, "org").await.unwrap();
        assert_eq!(rules.len(), 1);
        let r = &rules[0];
        assert_eq!(r.id, "r1");
        assert_eq!(r.match_type, RuleMatchType::StartsWith);
        assert_eq!(r.category.name, "Travel");
        assert_eq!(r.cost_center.as_ref().map(|c| c.name.as_str()), Some("Operations"));
        assert_eq!(r.amount_min, Some(Money::from_cents(100)));
        assert_eq!(r.transaction_type, Some(TransactionType::Expense));
        assert!(get_active_rules(&pool, "other-org").await.unwrap().is_empty());
    }

    async fn insert_raw_rule(pool: &DbPool, id: &str, match_type: &str, transaction_type: Option<&str>) {
        sqlx::query(
            r#"
            INSERT INTO classification_rules
                (id, organization_id, pattern, match_type, category_id, transaction_type, is_active, created_at)
            VALUES (?, 'org', 'uber', ?, 'travel', ?, 1, '2024-01-01T00:00:00Z')
            "#,
        )
        .bind(id)
        .bind(match_type)
        .bind(transaction_type)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn rules_with_unknown_match_type_are_skipped() {
        let (_dir, pool) = test_db().await;
        insert_raw_rule(&pool, "r-glob", "glob", None).await;
        insert_raw_rule(&pool, "r-ok", "contains", None).await;

        let rules = get_active_rules(&pool, "org").await.unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r-ok"]);
    }

    #[tokio::test]
    async fn rules_with_unknown_transaction_type_are_skipped() {
        let (_dir, pool) = test_db().await;
        insert_raw_rule(&pool, "r-refund", "contains", Some("refund")).await;
        insert_raw_rule(&pool, "r-income", "contains", Some("income")).await;

        let rules = get_active_rules(&pool, "org").await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "r-income");
        assert_eq!(rules[0].transaction_type, Some(TransactionType::Income));
    }

    #[tokio::test]
    async fn accounts_with_unreadable_aliases_are_skipped() {
        let (_dir, pool) = test_db().await;
        sqlx::query(
            "INSERT INTO internal_accounts (id, organization_id, name, aliases) VALUES ('acc-bad', 'org', 'Broken', 'reserva')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let good = InternalAccount::new("acc-ok", "org", "Savings").with_alias("Reserva");
        insert_internal_account(&pool, &good).await.unwrap();

        assert_eq!(get_internal_accounts(&pool, "org").await.unwrap(), vec![good]);
    }

    #[tokio::test]
    async fn confirm_reports_organization_and_checks_catalog() {
        let (_dir, pool) = test_db().await;
        insert_category(&pool, "other", &CategoryRef::new("rent", "Rent")).await.unwrap();
        insert_transaction(&pool, &tx("t1", "UBER TRIP", 1)).await.unwrap();

        assert_eq!(confirm_classification(&pool, "missing", "travel", None).await.unwrap(), None);
        assert_eq!(confirm_classification(&pool, "t1", "rent", None).await.unwrap(), None);
        assert_eq!(confirm_classification(&pool, "t1", "travel", Some("nope")).await.unwrap(), None);

        let org = confirm_classification(&pool, "t1", "travel", Some("ops")).await.unwrap();
        assert_eq!(org.as_deref(), Some("org"));
        let history = get_categorized_history(&pool, "org").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].cost_center.as_ref().map(|c| c.id.as_str()), Some("ops"));
    }

    #[tokio::test]
    async fn accounts_keep_aliases() {
        let (_dir, pool) = test_db().await;
        let account = InternalAccount::new("acc-1", "org", "Savings")
            .with_alias("Reserva")
            .with_account_number("12345-6");
        insert_internal_account(&pool, &account).await.unwrap();
        assert_eq!(get_internal_accounts(&pool, "org").await.unwrap(), vec![account]);
    }

    #[tokio::test]
    async fn history_contains_only_settled_categorized_rows() {
        let (_dir, pool) = test_db().await;
        for (id, day) in [("t1", 1), ("t2", 2), ("t3", 3), ("t4", 4)] {
            insert_transaction(&pool, &tx(id, "UBER TRIP", day)).await.unwrap();
        }
        save_classification(&pool, &decision("t1", ValidationStatus::AutoApproved)).await.unwrap();
        save_classification(&pool, &decision("t2", ValidationStatus::PendingReview)).await.unwrap();
        confirm_classification(&pool, "t3", "software", None).await.unwrap();
        let mut transfer = decision("t4", ValidationStatus::AutoApproved);
        transfer.is_transfer = true;
        transfer.category_id = None;
        transfer.cost_center_id = None;
        save_classification(&pool, &transfer).await.unwrap();

        let history = get_categorized_history(&pool, "org").await.unwrap();
        let ids: Vec<&str> = history.iter().map(|h| h.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1"]);
        assert_eq!(history[0].category.name, "Software");
        assert!(history[0].cost_center.is_none());
        assert_eq!(history[1].cost_center.as_ref().map(|c| c.id.as_str()), Some("ops"));
    }

    #[tokio::test]
    async fn save_classification_is_idempotent() {
        let (_dir, pool) = test_db().await;
        insert_transaction(&pool, &tx("t1", "NETFLIX", 1)).await.unwrap();
        let d = decision("t1", ValidationStatus::AutoApproved);
        assert!(save_classification(&pool, &d).await.unwrap());
        assert!(save_classification(&pool, &d).await.unwrap());
        assert_eq!(get_classification(&pool, "t1").await.unwrap(), Some(d));
    }

    #[tokio::test]
    async fn save_for_unknown_transaction_matches_nothing() {
        let (_dir, pool) = test_db().await;
        let d = decision("missing", ValidationStatus::AutoApproved);
        assert!(!save_classification(&pool, &d).await.unwrap());
    }

    #[tokio::test]
    async fn catalog_is_scoped_to_organization() {
        let (_dir, pool) = test_db().await;
        insert_category(&pool, "other", &CategoryRef::new("rent", "Rent")).await.unwrap();
        let catalog = get_catalog(&pool, "org").await.unwrap();
        let names: Vec<&str> = catalog.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Software", "Travel"]);
        assert_eq!(catalog.cost_centers.len(), 1);
    }
}
