#![allow(dead_code)]

use calamine::{Data, Reader, open_workbook_auto};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const SHARED_STRINGS: &[&str] = &["Setor:", "Pedido Nº", "Data:"];

/// Sheet body resembling the order template: labels next to the stamped cells
pub const ORDER_SHEET_DATA: &str = r#"<sheetData><row r="4"><c r="B4" t="s"><v>0</v></c><c r="G4" t="s"><v>1</v></c></row><row r="5"><c r="A5" t="s"><v>2</v></c></row></sheetData>"#;

// Helper to create a minimal valid XLSX file for testing.
// `sheets` pairs each sheet name with its <sheetData> element.
pub fn create_mock_xlsx(
    path: &Path,
    sheets: &[(&str, &str)],
    active_tab: Option<usize>,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    // 1. [Content_Types].xml
    zip.start_file("[Content_Types].xml", options)?;
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }
    content_types.push_str("</Types>");
    zip.write_all(content_types.as_bytes())?;

    // 2. _rels/.rels
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#.as_bytes())?;

    // 3. xl/workbook.xml
    zip.start_file("xl/workbook.xml", options)?;
    let mut workbook_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
"#,
    );
    if let Some(tab) = active_tab {
        workbook_xml.push_str(&format!(
            r#"<bookViews><workbookView activeTab="{}"/></bookViews>"#,
            tab
        ));
    }
    workbook_xml.push_str("<sheets>");
    for (i, (name, _)) in sheets.iter().enumerate() {
        workbook_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            name,
            i + 1,
            i + 1
        ));
    }
    workbook_xml.push_str("</sheets></workbook>");
    zip.write_all(workbook_xml.as_bytes())?;

    // 4. xl/_rels/workbook.xml.rels
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    let mut rels_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        rels_xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1, i + 1
        ));
    }
    rels_xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        sheets.len() + 1
    ));
    rels_xml.push_str("</Relationships>");
    zip.write_all(rels_xml.as_bytes())?;

    // 5. xl/sharedStrings.xml
    zip.start_file("xl/sharedStrings.xml", options)?;
    let mut shared = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        SHARED_STRINGS.len()
    );
    for s in SHARED_STRINGS {
        shared.push_str(&format!("<si><t>{}</t></si>", s));
    }
    shared.push_str("</sst>");
    zip.write_all(shared.as_bytes())?;

    // 6. sheets
    for (i, (_, sheet_data)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}</worksheet>"#,
                sheet_data
            )
            .as_bytes(),
        )?;
    }

    zip.finish()?;
    Ok(())
}

/// Rewrite the workbook at `path` with a calculation chain listing `cells`
/// of the first sheet, registered in the content types and workbook rels.
pub fn add_calc_chain(path: &Path, cells: &[&str]) -> anyhow::Result<()> {
    let mut parts = Vec::new();
    {
        let mut zip = zip::ZipArchive::new(File::open(path)?)?;
        for i in 0..zip.len() {
            let mut part = zip.by_index(i)?;
            let mut content = String::new();
            part.read_to_string(&mut content)?;
            parts.push((part.name().to_string(), content));
        }
    }

    let mut chain = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    for cell in cells {
        chain.push_str(&format!(r#"<c r="{}" i="1"/>"#, cell));
    }
    chain.push_str("</calcChain>");
    parts.push(("xl/calcChain.xml".to_string(), chain));

    for (name, content) in parts.iter_mut() {
        match name.as_str() {
            "[Content_Types].xml" => {
                *content = content.replace(
                    "</Types>",
                    r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#,
                )
            }
            "xl/_rels/workbook.xml.rels" => {
                *content = content.replace(
                    "</Relationships>",
                    r#"<Relationship Id="rIdCalc" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#,
                )
            }
            _ => {}
        }
    }

    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in &parts {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

/// Raw content of one archive part
pub fn read_zip_part(path: &Path, name: &str) -> anyhow::Result<String> {
    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut part = zip.by_name(name)?;
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(content)
}

/// String value of `(row, col)` (0-based) as calamine sees it
pub fn read_cell(path: &Path, sheet: &str, row: u32, col: u32) -> anyhow::Result<Option<String>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range(sheet)?;
    Ok(match range.get_value((row, col)) {
        Some(Data::String(s)) => Some(s.clone()),
        Some(Data::Empty) | None => None,
        Some(other) => Some(other.to_string()),
    })
}
