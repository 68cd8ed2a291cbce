pub mod find_key;
pub mod info;
pub mod parse_auth_log;
pub mod resolve;
