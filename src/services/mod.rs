// src/services/mod.rs

pub mod admin;
pub mod assembler;
pub mod content;
pub mod exam;
pub mod grading;
pub mod history;
pub mod layout;
pub mod practice;
pub mod report;
