pub mod analytics;
pub mod ask;
pub mod history;
pub mod status;
