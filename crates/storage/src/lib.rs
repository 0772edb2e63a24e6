pub mod db;

pub use db::{
    confirm_classification, create_db, get_active_rules, get_catalog, get_categories,
    get_categorized_history, get_classification, get_cost_centers, get_internal_accounts,
    insert_category, insert_cost_center, insert_internal_account, insert_rule, insert_transaction,
    save_classification, DbPool, TransactionRecord,
};
