use std::sync::Arc;

use image::{DynamicImage, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use variance_report::config::CaptureConfig;
use variance_report::{
    DepartmentRow, Period, ReportBuilder, ReportConfig, ReportContext, StaticVisual, TrendRow,
};

fn chart() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(60, 30, |x, y| {
        if (x + y) % 7 == 0 {
            Rgba([40, 90, 200, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

fn sample_context() -> ReportContext {
    ReportContext::builder(Period::new(2024, 3, 3).expect("period"))
        .department_rows(vec![DepartmentRow {
            department: "Engineering".into(),
            budget: 50_000.0,
            actual: 52_500.0,
            variance: 2_500.0,
            variance_percent: 5.0,
        }])
        .trend_rows(vec![
            TrendRow::from_totals("2024-01", 100_000.0, 105_000.0),
            TrendRow::from_totals("2024-02", 110_000.0, 108_000.0),
            TrendRow::from_totals("2024-03", 120_000.0, 115_000.0),
        ])
        .visual("Budget vs Actual", Arc::new(StaticVisual::new("budget-chart", chart())))
        .visual("Hidden", Arc::new(StaticVisual::new("hidden", chart()).hidden()))
        .build()
        .expect("valid context")
}

async fn render_sample_pdf() -> Vec<u8> {
    let config =
        ReportConfig::default().with_capture(CaptureConfig::default().without_settle_delay());
    ReportBuilder::new()
        .with_config(config)
        .with_timestamp("2024-04-01 12:00:00")
        .render(&sample_context())
        .await
        .expect("render sample pdf")
        .bytes
}

fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if data[index..].starts_with(tag) {
                let mut cursor = index + tag.len();
                while cursor < data.len() {
                    let byte = data[cursor];
                    if byte == terminator {
                        break;
                    }
                    if terminator == b')' {
                        data[cursor] = b'0';
                    } else if !matches!(byte, b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t') {
                        data[cursor] = b'0';
                    }
                    cursor += 1;
                }
                index = cursor;
            } else {
                index += 1;
            }
        }
    }

    fn scrub_xml(data: &mut [u8], start: &[u8], end: &[u8]) {
        let mut offset = 0;
        while offset + start.len() < data.len() {
            if let Some(start_pos) = data[offset..]
                .windows(start.len())
                .position(|window| window == start)
            {
                let start_index = offset + start_pos + start.len();
                if let Some(end_pos) = data[start_index..]
                    .windows(end.len())
                    .position(|window| window == end)
                {
                    for byte in &mut data[start_index..start_index + end_pos] {
                        if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                            *byte = b'0';
                        }
                    }
                    offset = start_index + end_pos + end.len();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    let mut normalized = bytes.to_vec();
    scrub_segment(&mut normalized, b"/CreationDate(", b')');
    scrub_segment(&mut normalized, b"/ModDate(", b')');
    scrub_segment(&mut normalized, b"/ID[", b']');
    scrub_segment(&mut normalized, b"/Producer(", b')');
    scrub_xml(&mut normalized, b"<xmp:CreateDate>", b"</xmp:CreateDate>");
    scrub_xml(&mut normalized, b"<xmp:ModifyDate>", b"</xmp:ModifyDate>");
    scrub_xml(
        &mut normalized,
        b"<xmp:MetadataDate>",
        b"</xmp:MetadataDate>",
    );
    scrub_xml(
        &mut normalized,
        b"<xmpMM:DocumentID>",
        b"</xmpMM:DocumentID>",
    );
    scrub_xml(
        &mut normalized,
        b"<xmpMM:InstanceID>",
        b"</xmpMM:InstanceID>",
    );
    scrub_xml(&mut normalized, b"<xmpMM:VersionID>", b"</xmpMM:VersionID>");
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    let normalized = scrub_pdf(bytes);
    let digest = Sha256::digest(&normalized);
    digest.into()
}

#[tokio::test]
async fn renders_non_empty_output() {
    let bytes = render_sample_pdf().await;
    assert!(bytes.starts_with(b"%PDF"), "output should carry a PDF header");
    assert!(bytes.len() > 1_000);
}

#[tokio::test]
async fn rendering_is_deterministic() {
    let bytes_a = render_sample_pdf().await;
    let bytes_b = render_sample_pdf().await;

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&bytes_a),
        normalized_hash(&bytes_b),
        "PDF renders must be deterministic after metadata normalization"
    );
}
