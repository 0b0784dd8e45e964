pub mod audit;
pub mod calibration;
pub mod conflict;
pub mod decide;
pub mod dispatch;
pub mod ingest;
pub mod member;
pub mod project;
pub mod queue;
pub mod reliability;
pub mod rescore;
pub mod schema;
pub mod shared;
pub mod stats;
pub mod study;
pub mod sweep;
