// src/repository/mod.rs

//! sqlx queries. Functions take a `&mut SqliteConnection` so the caller owns
//! the transaction boundary.

pub mod answer;
pub mod content;
pub mod exam;
pub mod practice;
pub mod report;
pub mod survey;
