pub mod config;
pub mod corpus;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod retrieval;
pub mod vector;
