//! `multipart/mixed` response bodies

use uuid::Uuid;

const CRLF: &str = "\r\n";

pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::with_boundary(format!("{}{}", "-".repeat(26), Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Append a named part. `headers` are written in order after the
    /// `Content-Disposition` line.
    pub fn part(mut self, name: &str, headers: &[(&str, &str)], body: &[u8]) -> Self {
        let mut head = format!("--{}{CRLF}", self.boundary);
        head.push_str(&format!(
            "Content-Disposition: form-data; name=\"{name}\"{CRLF}"
        ));
        for (header, value) in headers {
            head.push_str(&format!("{header}: {value}{CRLF}"));
        }
        head.push_str(CRLF);

        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(body);
        self.body.extend_from_slice(CRLF.as_bytes());
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--{CRLF}", self.boundary).as_bytes());
        self.body
    }
}
