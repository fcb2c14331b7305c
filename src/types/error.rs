use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use thiserror::Error;

/// Failures that can occur while configuring or proxying.
///
/// Only `Config` is fatal; it aborts startup before serving begins. Every
/// other variant is handled per request and mapped to the fixed XML error
/// envelope with status 500. The variants exist to differentiate the logged
/// detail, not the response the caller sees.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not obtain credentials: {0}")]
    Credential(String),
    #[error("{0}")]
    Validation(String),
    #[error("could not rewrite target URL: {0}")]
    Rewrite(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

/// S3-style XML error body returned for every internal failure.
///
/// All fields of the S3 error schema are present, possibly empty, so that
/// client-side XML parsers expecting the full schema keep working. Only
/// `Code`, `Message` and `BucketName` are ever populated by the proxy.
#[derive(Debug)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub bucket_name: String,
}

impl ErrorEnvelope {
    pub fn new(code: u16, message: String, bucket_name: &str) -> Self {
        Self {
            code: code.to_string(),
            message,
            bucket_name: bucket_name.to_string(),
        }
    }

    /// Serialize to the exact wire format: XML declaration, a newline, then
    /// a single `<Error>` element. Empty fields are written as open/close
    /// element pairs rather than self-closing tags.
    pub fn to_xml(&self) -> String {
        self.write_xml().unwrap_or_else(|_| {
            // Writing into a Vec cannot fail in practice; keep a minimal
            // fallback so the caller always gets a body.
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{}</Code></Error>",
                self.code
            )
        })
    }

    fn write_xml(&self) -> std::io::Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;

        let fields = [
            ("Code", self.code.as_str()),
            ("Message", self.message.as_str()),
            ("BucketName", self.bucket_name.as_str()),
            ("Key", ""),
            ("Resource", ""),
            ("RequestId", ""),
            ("HostId", ""),
            ("Region", ""),
            ("Server", ""),
        ];

        writer
            .create_element("Error")
            .write_inner_content(|w| -> std::io::Result<()> {
                for (tag, value) in fields {
                    w.create_element(tag)
                        .write_text_content(BytesText::new(value))?;
                }
                Ok(())
            })?;

        let bytes = writer.into_inner();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
