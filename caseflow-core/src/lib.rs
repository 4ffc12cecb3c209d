pub mod activity_log;
pub mod backend;
pub mod config;
pub mod model;
pub mod notices;
pub mod status;

// Controllers driven by backend responses
pub mod dispatch;
pub mod inspection;
pub mod processes;
pub mod search;

// Session state and the event loop around it
pub mod console;
pub mod reducer;
pub mod state;
