// src/clients/mod.rs

pub mod ai;
pub mod alarm;
pub mod storage;
