//! Shipping label storage and local PDF synthesis.
//!
//! Carriers that hand back a label document get it stored as-is. When no
//! carrier artifact exists, a 4x6 inch thermal-printer label is synthesized
//! locally: address blocks, a Code 128 barcode of the AWB, a COD/PREPAID
//! callout, a capped contents summary and a weight/value footer.
//!
//! Barcode encoding failure is non-fatal: the label falls back to the AWB
//! as large text and the operation still succeeds.

use std::sync::Arc;

use barcoders::sym::code128::Code128;
use dogeared_core::{Address, Money};
use printpdf::{
    BuiltinFont, Color, Greyscale, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference,
    Point,
};
use tracing::warn;

use crate::error::ShippingError;
use crate::order::Order;
use crate::profile::PackageDefaults;
use crate::request::{self, ContentLine, DimensionOverride, PackageSpec, PaymentMode};
use crate::store::{ArtifactStore, StoredArtifact};

/// 4 inch label width.
const LABEL_WIDTH_MM: f64 = 101.6;
/// 6 inch label height.
const LABEL_HEIGHT_MM: f64 = 152.4;
const MARGIN_MM: f64 = 7.0;
const BARCODE_HEIGHT_MM: f64 = 18.0;

/// Most items shown on the contents block before eliding.
const MAX_CONTENT_LINES: usize = 2;
const MAX_TITLE_CHARS: usize = 28;

/// Everything a synthesized label prints.
#[derive(Debug, Clone)]
pub struct LabelSheet {
    /// AWB number (barcode + text).
    pub awb: String,
    /// Human-facing order number.
    pub order_number: String,
    /// Shipper block.
    pub consignor: Address,
    /// Recipient block.
    pub consignee: Address,
    /// Prepaid-vs-COD handling.
    pub payment_mode: PaymentMode,
    /// Amount collected on delivery.
    pub cod_amount: Money,
    /// Declared value of the contents.
    pub declared_value: Money,
    /// Package dimensions and weight.
    pub package: PackageSpec,
    /// Content lines, elided on the sheet past [`MAX_CONTENT_LINES`].
    pub items: Vec<ContentLine>,
}

impl LabelSheet {
    /// Assemble a sheet from a booked order.
    #[must_use]
    pub fn for_order(
        order: &Order,
        consignor: &Address,
        defaults: &PackageDefaults,
        awb: &str,
    ) -> Self {
        Self {
            awb: awb.to_string(),
            order_number: order.number.clone(),
            consignor: consignor.clone(),
            consignee: order.shipping.consignee.clone(),
            payment_mode: request::payment_mode(order),
            cod_amount: request::cod_amount(order),
            declared_value: order.amount,
            package: request::resolve_package(&DimensionOverride::default(), order, defaults),
            items: order
                .items
                .iter()
                .map(|item| ContentLine {
                    sku: item.sku.clone(),
                    title: item.title.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

/// Renders and stores label documents.
pub struct LabelRenderer {
    artifacts: Arc<dyn ArtifactStore>,
    folder: String,
}

impl std::fmt::Debug for LabelRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelRenderer")
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

impl LabelRenderer {
    /// Create a renderer uploading into `folder`.
    #[must_use]
    pub fn new(artifacts: Arc<dyn ArtifactStore>, folder: impl Into<String>) -> Self {
        Self {
            artifacts,
            folder: folder.into(),
        }
    }

    /// Upload a label document, returning its durable URL.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Label`] when the buffer is empty, otherwise
    /// propagates artifact-store failures.
    pub async fn store(&self, awb: &str, bytes: Vec<u8>) -> Result<StoredArtifact, ShippingError> {
        if bytes.is_empty() {
            return Err(ShippingError::Label("label document is empty".to_string()));
        }
        self.artifacts
            .upload_buffer(bytes, &format!("label-{awb}.pdf"), &self.folder)
            .await
    }

    /// Render a 4x6 in label PDF.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Label`] when the PDF itself cannot be
    /// produced. A failed barcode is NOT an error; see module docs.
    pub fn synthesize(&self, sheet: &LabelSheet) -> Result<Vec<u8>, ShippingError> {
        let (doc, page, layer) = PdfDocument::new(
            format!("Label {}", sheet.awb),
            Mm(LABEL_WIDTH_MM),
            Mm(LABEL_HEIGHT_MM),
            "label",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ShippingError::Label(format!("font load failed: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ShippingError::Label(format!("font load failed: {e}")))?;
        let layer = doc.get_page(page).get_layer(layer);
        layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));

        let mut cursor = LABEL_HEIGHT_MM - MARGIN_MM - 5.0;

        // Header: order number, shipper name.
        layer.use_text(&sheet.order_number, 13.0, Mm(MARGIN_MM), Mm(cursor), &bold);
        cursor -= 8.0;

        cursor = address_block(&layer, &regular, &bold, "FROM", &sheet.consignor, cursor);
        cursor -= 3.0;
        cursor = address_block(&layer, &regular, &bold, "TO", &sheet.consignee, cursor);
        cursor -= 6.0;

        // AWB barcode, falling back to large text when encoding fails.
        match code128_modules(&sheet.awb) {
            Ok(modules) => {
                draw_barcode(&layer, &modules, cursor);
                cursor -= BARCODE_HEIGHT_MM + 5.0;
                layer.use_text(&sheet.awb, 11.0, Mm(MARGIN_MM), Mm(cursor), &regular);
            }
            Err(e) => {
                warn!(awb = %sheet.awb, error = %e, "barcode encoding failed, printing AWB as text");
                cursor -= 6.0;
                layer.use_text(&sheet.awb, 20.0, Mm(MARGIN_MM), Mm(cursor), &bold);
            }
        }
        cursor -= 10.0;

        // Payment callout.
        let callout = match sheet.payment_mode {
            PaymentMode::Cod => format!("COD - COLLECT INR {}", sheet.cod_amount),
            PaymentMode::Prepaid => "PREPAID".to_string(),
        };
        layer.use_text(&callout, 14.0, Mm(MARGIN_MM), Mm(cursor), &bold);
        cursor -= 9.0;

        // Contents, capped.
        layer.use_text("Contents:", 9.0, Mm(MARGIN_MM), Mm(cursor), &bold);
        cursor -= 5.0;
        for line in content_lines(&sheet.items) {
            layer.use_text(&line, 9.0, Mm(MARGIN_MM + 2.0), Mm(cursor), &regular);
            cursor -= 5.0;
        }

        // Footer: weight, dimensions, declared value.
        let footer = format!(
            "Wt {} kg | {}x{}x{} cm | Decl INR {}",
            sheet.package.chargeable_weight_kg().round_dp(2),
            sheet.package.length_cm,
            sheet.package.breadth_cm,
            sheet.package.height_cm,
            sheet.declared_value,
        );
        layer.use_text(&footer, 8.0, Mm(MARGIN_MM), Mm(MARGIN_MM), &regular);

        doc.save_to_bytes()
            .map_err(|e| ShippingError::Label(format!("pdf serialization failed: {e}")))
    }
}

/// Contents summary lines: `SKU title xQty`, at most [`MAX_CONTENT_LINES`]
/// plus an elision line.
fn content_lines(items: &[ContentLine]) -> Vec<String> {
    let mut lines: Vec<String> = items
        .iter()
        .take(MAX_CONTENT_LINES)
        .map(|item| {
            let mut title = item.title.clone();
            if title.chars().count() > MAX_TITLE_CHARS {
                title = title.chars().take(MAX_TITLE_CHARS - 1).collect::<String>() + "…";
            }
            format!("{} {} x{}", item.sku, title, item.quantity)
        })
        .collect();
    if items.len() > MAX_CONTENT_LINES {
        lines.push(format!("… {} more", items.len() - MAX_CONTENT_LINES));
    }
    lines
}

/// Encode an AWB as Code 128 modules (1 = bar, 0 = space).
///
/// The `\u{0181}` prefix selects character set B (printable ASCII).
fn code128_modules(awb: &str) -> Result<Vec<u8>, ShippingError> {
    let barcode = Code128::new(format!("\u{0181}{awb}"))
        .map_err(|e| ShippingError::Label(format!("barcode encoding failed: {e}")))?;
    Ok(barcode.encode())
}

/// Draw barcode modules as filled rectangles across the label width.
fn draw_barcode(layer: &PdfLayerReference, modules: &[u8], top: f64) {
    if modules.is_empty() {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let module_width = (LABEL_WIDTH_MM - 2.0 * MARGIN_MM) / modules.len() as f64;
    let bottom = top - BARCODE_HEIGHT_MM;
    for (i, module) in modules.iter().enumerate() {
        if *module == 0 {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let x = MARGIN_MM + i as f64 * module_width;
        layer.add_shape(filled_rect(x, bottom, module_width, BARCODE_HEIGHT_MM));
    }
}

fn filled_rect(x: f64, y: f64, width: f64, height: f64) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(x), Mm(y)), false),
            (Point::new(Mm(x + width), Mm(y)), false),
            (Point::new(Mm(x + width), Mm(y + height)), false),
            (Point::new(Mm(x), Mm(y + height)), false),
        ],
        is_closed: true,
        has_fill: true,
        has_stroke: false,
        is_clipping_path: false,
    }
}

/// Write a labeled address block, returning the new cursor position.
fn address_block(
    layer: &PdfLayerReference,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
    heading: &str,
    address: &Address,
    mut cursor: f64,
) -> f64 {
    layer.use_text(heading, 8.0, Mm(MARGIN_MM), Mm(cursor), bold);
    cursor -= 4.5;
    layer.use_text(&address.name, 10.0, Mm(MARGIN_MM), Mm(cursor), bold);
    cursor -= 4.5;
    for line in [
        address.address.clone(),
        format!("{}, {} {}", address.city, address.state, address.pincode),
        format!("Ph {}", address.phone),
    ] {
        layer.use_text(&line, 9.0, Mm(MARGIN_MM), Mm(cursor), regular);
        cursor -= 4.5;
    }
    cursor
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn address(name: &str) -> Address {
        Address {
            name: name.to_string(),
            phone: "9876543210".to_string(),
            email: None,
            address: "22 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
        }
    }

    fn item(sku: &str, title: &str) -> ContentLine {
        ContentLine {
            sku: sku.to_string(),
            title: title.to_string(),
            quantity: 1,
            unit_price: Money::from(450),
        }
    }

    fn sheet(awb: &str, items: Vec<ContentLine>) -> LabelSheet {
        LabelSheet {
            awb: awb.to_string(),
            order_number: "DG-1042".to_string(),
            consignor: address("Dogeared Books"),
            consignee: address("Asha Rao"),
            payment_mode: PaymentMode::Cod,
            cod_amount: Money::from(600),
            declared_value: Money::from(1000),
            package: PackageSpec {
                weight_kg: Decimal::new(5, 1),
                length_cm: Decimal::from(20),
                breadth_cm: Decimal::from(15),
                height_cm: Decimal::from(3),
            },
            items,
        }
    }

    fn renderer() -> LabelRenderer {
        LabelRenderer::new(
            Arc::new(crate::store::MemoryArtifactStore::new()),
            "labels",
        )
    }

    #[test]
    fn test_synthesize_produces_pdf() {
        let bytes = renderer().synthesize(&sheet("7X998877", vec![])).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_barcode_failure_falls_back_to_text() {
        // Code 128 set B cannot encode non-ASCII; the label must still render.
        let bytes = renderer()
            .synthesize(&sheet("AWB\u{20AC}42", vec![]))
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_code128_encodes_plain_awb() {
        let modules = code128_modules("7X998877").unwrap();
        assert!(!modules.is_empty());
        assert!(modules.iter().all(|m| *m <= 1));
    }

    #[test]
    fn test_content_lines_cap_at_two_plus_elision() {
        let items = vec![
            item("BK-1", "The Palace of Illusions"),
            item("BK-2", "Em and the Big Hoom"),
            item("BK-3", "A Suitable Boy"),
            item("BK-4", "Train to Pakistan"),
        ];
        let lines = content_lines(&items);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "… 2 more");
    }

    #[test]
    fn test_content_lines_truncate_long_titles() {
        let items = vec![item(
            "BK-9",
            "The Inconceivably Long and Winding Title of a Book",
        )];
        let lines = content_lines(&items);
        assert!(lines[0].chars().count() < 45);
        assert!(lines[0].contains('…'));
    }

    #[tokio::test]
    async fn test_store_rejects_empty_buffer() {
        let err = renderer().store("7X1", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ShippingError::Label(_)));
    }

    #[tokio::test]
    async fn test_store_uploads_into_folder() {
        let artifact = renderer().store("7X1", b"%PDF".to_vec()).await.unwrap();
        assert!(artifact.url.contains("labels"));
        assert!(artifact.url.contains("label-7X1.pdf"));
    }
}
