//! Pairing credential rendering.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Luma};
use qrcode::QrCode;

use crate::error::{Result, WwebError};

/// Rendered width/height handed to the QR renderer.
const RENDER_DIMENSIONS: u32 = 400;

/// The live pairing credential: the raw pairing string the backend issued
/// plus its rendered forms for the HTTP surface.
///
/// At most one credential is live at a time. It is replaced whenever the
/// backend issues a new one and dropped when the session becomes ready, so a
/// credential is never reused across pairing attempts.
#[derive(Debug, Clone)]
pub struct PairingCredential {
    raw: String,
    png: Vec<u8>,
    data_uri: String,
}

impl PairingCredential {
    /// Renders a pairing string into PNG bytes and a data URI.
    pub fn render(raw: &str) -> Result<Self> {
        let code = QrCode::new(raw.as_bytes()).map_err(|e| WwebError::QrRender(e.to_string()))?;
        let img = code
            .render::<Luma<u8>>()
            .max_dimensions(RENDER_DIMENSIONS, RENDER_DIMENSIONS)
            .build();

        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| WwebError::QrRender(e.to_string()))?;
        let data_uri = format!("data:image/png;base64,{}", STANDARD.encode(&png));

        Ok(Self {
            raw: raw.to_string(),
            png,
            data_uri,
        })
    }

    /// The raw pairing string as issued by the backend.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// PNG image bytes.
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// `data:image/png;base64,...` URI for embedding in an HTML page.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}
