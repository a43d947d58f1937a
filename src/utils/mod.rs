pub mod batch_owner_cache;
pub mod db_utils;
