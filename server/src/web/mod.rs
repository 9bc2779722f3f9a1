pub mod app_state;
pub mod router;
pub mod ws_handler;
