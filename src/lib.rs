pub mod aggregator;
pub mod app;
pub mod attributes;
pub mod config;
pub mod domain;
pub mod entrez;
pub mod error;
pub mod genome;
pub mod output;
pub mod report;
pub mod resolver;
pub mod taxonomy;
