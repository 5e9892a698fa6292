pub mod config;
pub mod location;
pub mod name_edit;
pub mod notifications;
pub mod query_view;
pub mod saved_query;
pub mod saved_query_api;
