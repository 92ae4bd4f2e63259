use std::fmt::Write as _;
use std::io::{Seek, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{column_letters, NS_MAIN, NS_PKG_REL, NS_REL, PART_CORE, PART_WORKBOOK, PART_WORKBOOK_RELS};
use crate::container::{DocumentProperties, Sheet};
use crate::error::Result;
use crate::model::{format_float, Cell};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Style index of the bold, centred header cells
const HEADER_STYLE: u8 = 1;

const STYLES: &str = concat!(
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font>"#,
    r#"<font><b/><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill>"#,
    r#"<fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1" applyAlignment="1">"#,
    r#"<alignment horizontal="center"/></xf></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

const APP: &str = concat!(
    r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">"#,
    r#"<Application>dsff</Application></Properties>"#,
);

/// Serialize `sheets` (in order) and `properties` as a workbook package into `out`
pub(crate) fn write_workbook<W: Write + Seek>(
    out: W,
    sheets: &[&Sheet],
    properties: &DocumentProperties,
) -> Result<W> {
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let put = |zip: &mut ZipWriter<W>, name: &str, body: &str| -> Result<()> {
        zip.start_file(name, options)?;
        zip.write_all(XML_DECLARATION.as_bytes())?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };

    put(&mut zip, "[Content_Types].xml", &content_types(sheets.len()))?;
    put(&mut zip, "_rels/.rels", &package_rels())?;
    put(&mut zip, PART_CORE, &core_properties(properties))?;
    put(&mut zip, "docProps/app.xml", APP)?;
    put(&mut zip, PART_WORKBOOK, &workbook(sheets))?;
    put(&mut zip, PART_WORKBOOK_RELS, &workbook_rels(sheets.len()))?;
    put(&mut zip, "xl/styles.xml", STYLES)?;
    for (i, sheet) in sheets.iter().enumerate() {
        put(&mut zip, &format!("xl/worksheets/sheet{}.xml", i + 1), &worksheet(sheet))?;
    }

    Ok(zip.finish()?)
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        );
    }
    xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    xml.push_str(r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#);
    xml.push_str(r#"<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#);
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    format!(
        concat!(
            r#"<Relationships xmlns="{}">"#,
            r#"<Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
            r#"<Relationship Id="rId3" Type="{}/extended-properties" Target="docProps/app.xml"/>"#,
            "</Relationships>"
        ),
        NS_PKG_REL, NS_REL, NS_REL
    )
}

fn workbook(sheets: &[&Sheet]) -> String {
    let mut xml = format!(r#"<workbook xmlns="{}" xmlns:r="{}"><sheets>"#, NS_MAIN, NS_REL);
    for (i, sheet) in sheets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(sheet.name()),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = format!(r#"<Relationships xmlns="{}">"#, NS_PKG_REL);
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i, NS_REL, i
        );
    }
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{}" Type="{}/styles" Target="styles.xml"/>"#,
        sheet_count + 1,
        NS_REL
    );
    xml.push_str("</Relationships>");
    xml
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn core_properties(p: &DocumentProperties) -> String {
    let mut xml = String::from(concat!(
        r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties""#,
        r#" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/""#,
        r#" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    ));
    let texts = [
        ("dc:title", &p.title),
        ("dc:subject", &p.subject),
        ("dc:creator", &p.creator),
        ("cp:keywords", &p.keywords),
        ("dc:description", &p.description),
        ("cp:lastModifiedBy", &p.last_modified_by),
        ("cp:revision", &p.revision),
        ("cp:category", &p.category),
        ("dc:identifier", &p.identifier),
        ("dc:language", &p.language),
        ("cp:version", &p.version),
        ("cp:contentStatus", &p.content_status),
    ];
    for (tag, value) in texts {
        if let Some(v) = value {
            let _ = write!(xml, "<{}>{}</{}>", tag, escape(v.as_str()), tag);
        }
    }
    let times = [("created", &p.created), ("modified", &p.modified)];
    for (tag, value) in times {
        if let Some(t) = value {
            let _ = write!(
                xml,
                r#"<dcterms:{} xsi:type="dcterms:W3CDTF">{}</dcterms:{}>"#,
                tag,
                timestamp(t),
                tag
            );
        }
    }
    if let Some(t) = &p.last_printed {
        let _ = write!(xml, "<cp:lastPrinted>{}</cp:lastPrinted>", timestamp(t));
    }
    xml.push_str("</cp:coreProperties>");
    xml
}

fn worksheet(sheet: &Sheet) -> String {
    let mut xml = format!(r#"<worksheet xmlns="{}" xmlns:r="{}">"#, NS_MAIN, NS_REL);
    let widths = sheet.column_widths();
    if !widths.is_empty() {
        xml.push_str("<cols>");
        for (i, w) in widths.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<col min="{}" max="{}" width="{}" customWidth="1"/>"#,
                i + 1,
                i + 1,
                (*w).max(1) + 2
            );
        }
        xml.push_str("</cols>");
    }
    xml.push_str("<sheetData>");
    for (r, row) in sheet.rows().iter().enumerate() {
        let _ = write!(xml, r#"<row r="{}">"#, r + 1);
        let style = if r == 0 { HEADER_STYLE } else { 0 };
        for (c, cell) in row.iter().enumerate() {
            write_cell(&mut xml, &format!("{}{}", column_letters(c), r + 1), style, cell);
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn write_cell(xml: &mut String, reference: &str, style: u8, cell: &Cell) {
    let s = if style > 0 {
        format!(r#" s="{}""#, style)
    } else {
        String::new()
    };
    let _ = match cell {
        Cell::Empty if style == 0 => Ok(()),
        Cell::Empty => write!(xml, r#"<c r="{}"{}/>"#, reference, s),
        Cell::Bool(b) => write!(xml, r#"<c r="{}"{} t="b"><v>{}</v></c>"#, reference, s, u8::from(*b)),
        Cell::Int(i) => write!(xml, r#"<c r="{}"{}><v>{}</v></c>"#, reference, s, i),
        Cell::Float(f) if f.is_finite() => {
            write!(xml, r#"<c r="{}"{}><v>{}</v></c>"#, reference, s, format_float(*f))
        }
        Cell::Float(f) => write_inline(xml, reference, &s, &format_float(*f)),
        Cell::Text(t) => write_inline(xml, reference, &s, t),
    };
}

fn write_inline(xml: &mut String, reference: &str, style: &str, text: &str) -> std::fmt::Result {
    write!(
        xml,
        r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        reference,
        style,
        escape(text)
    )
}
