//! Small XLSX workbooks written on the fly for tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    /// Excel serial day number, styled with the built-in `mm-dd-yy` format.
    Date(f64),
    Empty,
}

pub struct Sheet<'a> {
    pub name: &'a str,
    pub rows: Vec<Vec<Cell<'a>>>,
}

/// Write a workbook whose sheets appear in the given order.
pub fn write_xlsx(path: &Path, sheets: &[Sheet<'_>]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());

    let mut sheet_entries = String::new();
    let mut relationships = String::new();
    for (idx, sheet) in sheets.iter().enumerate() {
        let n = idx + 1;
        sheet_entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            sheet.name
        ));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }

    put(
        &mut zip,
        "xl/workbook.xml",
        format!(r#"<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>{sheet_entries}</sheets></workbook>"#),
    );
    put(
        &mut zip,
        "xl/_rels/workbook.xml.rels",
        format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
        ),
    );
    // Style 0 is general, style 1 is numFmt 14 (a date).
    put(
        &mut zip,
        "xl/styles.xml",
        format!(
            r#"<styleSheet xmlns="{MAIN_NS}"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#
        ),
    );

    for (idx, sheet) in sheets.iter().enumerate() {
        put(
            &mut zip,
            &format!("xl/worksheets/sheet{}.xml", idx + 1),
            sheet_xml(&sheet.rows),
        );
    }

    zip.finish().unwrap();
}

fn put(zip: &mut ZipWriter<File>, name: &str, body: String) {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file(name, options).unwrap();
    zip.write_all(body.as_bytes()).unwrap();
}

fn sheet_xml(rows: &[Vec<Cell<'_>>]) -> String {
    let mut data = String::new();
    for (r, row) in rows.iter().enumerate() {
        data.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letter(c), r + 1);
            match cell {
                Cell::Text(text) => data.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#
                )),
                Cell::Number(value) => {
                    data.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#))
                }
                Cell::Date(serial) => {
                    data.push_str(&format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#))
                }
                Cell::Empty => {}
            }
        }
        data.push_str("</row>");
    }
    format!(r#"<worksheet xmlns="{MAIN_NS}"><sheetData>{data}</sheetData></worksheet>"#)
}

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}
