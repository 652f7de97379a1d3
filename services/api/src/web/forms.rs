//! services/api/src/web/forms.rs
//!
//! Reads the multipart lesson forms: text fields plus an optional `pdf` file.

use axum::extract::Multipart;
use axum::http::StatusCode;
use lesson_portal_core::domain::Attachment;
use std::collections::HashMap;

const PDF_FIELD: &str = "pdf";
const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Default)]
pub struct LessonForm {
    fields: HashMap<String, String>,
    pub pdf: Option<Attachment>,
}

impl LessonForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, (StatusCode, String)> {
        let mut form = LessonForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| (e.status(), format!("Failed to read multipart data: {}", e.body_text())))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == PDF_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(PDF_CONTENT_TYPE)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (e.status(), format!("Failed to read file bytes: {}", e.body_text())))?;

                // Browsers send an empty part when no file was picked.
                if bytes.is_empty() {
                    continue;
                }
                if !is_pdf(&file_name, &content_type) {
                    return Err((StatusCode::BAD_REQUEST, "Attachment must be a PDF".to_string()));
                }
                form.pdf = Some(Attachment {
                    file_name,
                    content_type: PDF_CONTENT_TYPE.to_string(),
                    bytes,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (e.status(), format!("Failed to read field '{}': {}", name, e.body_text())))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Reads a checkbox-style flag. Absent means `None`.
    pub fn take_flag(&mut self, name: &str) -> Result<Option<bool>, (StatusCode, String)> {
        match self.take(name).as_deref().map(str::trim) {
            None => Ok(None),
            Some("true") | Some("on") | Some("1") => Ok(Some(true)),
            Some("false") | Some("off") | Some("0") | Some("") => Ok(Some(false)),
            Some(other) => Err((
                StatusCode::BAD_REQUEST,
                format!("Invalid value for '{}': {}", name, other),
            )),
        }
    }
}

fn is_pdf(file_name: &str, content_type: &str) -> bool {
    content_type == PDF_CONTENT_TYPE || file_name.to_ascii_lowercase().ends_with(".pdf")
}
