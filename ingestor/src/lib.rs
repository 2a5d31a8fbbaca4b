pub mod aggregate;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod rest;
pub mod seed;
pub mod status;
pub mod upstream;
pub mod view;
