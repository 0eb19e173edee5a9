pub mod db;
pub mod error;
pub mod matches;
pub mod pairs;
pub mod transactions;

pub use db::{create_db, create_memory_db, DbPool};
pub use error::StoreError;
pub use matches::{
    active_uids, get_match, insert_matches, list_match_views, matches_for_uid, rejected_pairs,
    update_match_status,
};
pub use pairs::{
    canonical_pair_counts, company_activity, directional_pair_counts, get_upload_pair, insert_declared_pair,
    insert_upload_pair, list_declared_pairs, list_upload_pairs, PairCount,
};
pub use transactions::{
    get_transaction, get_transactions, insert_transactions, list_transactions, list_unmatched,
};
