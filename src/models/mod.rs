// src/models/mod.rs

pub mod exam;
pub mod exam_answer;
pub mod history;
pub mod practice;
pub mod question;
pub mod report;
pub mod survey;
