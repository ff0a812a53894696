// src/handlers/mod.rs

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{clients::storage::UploadFile, error::AppError};

pub mod admin;
pub mod exam;
pub mod history;
pub mod practice;
pub mod survey;

/// A parsed multipart body: the `file` part plus every text field.
#[derive(Debug, Default)]
pub struct AnswerForm {
    pub file: Option<UploadFile>,
    pub fields: HashMap<String, String>,
}

impl AnswerForm {
    pub async fn parse(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = AnswerForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("audio").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.file = Some(UploadFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned().filter(|v| !v.trim().is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing field '{}'", name)))
    }

    pub fn required_i64(&self, name: &str) -> Result<i64, AppError> {
        self.required_text(name)?
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Field '{}' must be an integer", name)))
    }
}
