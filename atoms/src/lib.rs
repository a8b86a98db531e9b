//! DynamoDB and S3 building blocks. Every function takes its clients and
//! table as arguments; nothing here reads global state.

pub mod gallery;
pub mod uploads;
