// Services module - provider clients and the resolution pipeline

pub mod retry;

// Upstream providers
pub mod addon;
pub mod cinemeta;
pub mod fanart;
pub mod tmdb;
pub mod tvdb;

// Record construction and reconciliation
pub mod builder;
pub mod merge;

// Translation and orchestration
pub mod metadata;
pub mod translate;
