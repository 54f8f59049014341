//! XML parsing utilities for locating sheets inside XLSX archives

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

/// A worksheet declared in `xl/workbook.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    /// Path of the worksheet part inside the archive, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
}

/// Sheet list and active tab of an XLSX workbook
#[derive(Debug, Clone, Default)]
pub struct WorkbookStructure {
    pub sheets: Vec<SheetEntry>,
    /// 0-based index from `workbookView/@activeTab` (0 when absent)
    pub active_tab: usize,
}

impl WorkbookStructure {
    /// The sheet Excel opens on, which is where templates get stamped
    pub fn active_sheet(&self) -> Result<&SheetEntry> {
        if self.sheets.is_empty() {
            anyhow::bail!("Workbook declares no sheets");
        }
        self.sheets.get(self.active_tab).ok_or_else(|| {
            anyhow::anyhow!(
                "Active tab {} is out of range ({} sheets)",
                self.active_tab,
                self.sheets.len()
            )
        })
    }
}

/// Read the sheet list and active tab, resolving each sheet to its archive part
pub fn read_workbook_structure<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<WorkbookStructure> {
    // 1. Sheet names, rIds and the active tab from xl/workbook.xml
    let mut declared: Vec<(String, String)> = Vec::new();
    let mut active_tab = 0usize;
    {
        let workbook_xml = archive
            .by_name("xl/workbook.xml")
            .context("Failed to find xl/workbook.xml")?;
        let mut reader = Reader::from_reader(BufReader::new(workbook_xml));
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"sheet" => {
                        let mut name = String::new();
                        let mut r_id = String::new();
                        for attr in e.attributes().flatten() {
                            match attr.key.local_name().as_ref() {
                                b"name" => name = attr.unescape_value()?.to_string(),
                                // r:id, whatever prefix the relationships namespace uses
                                b"id" if attr.key.prefix().is_some() => {
                                    r_id = attr.unescape_value()?.to_string()
                                }
                                _ => {}
                            }
                        }
                        declared.push((name, r_id));
                    }
                    b"workbookView" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"activeTab" {
                                active_tab = attr
                                    .unescape_value()?
                                    .parse()
                                    .context("Invalid activeTab in workbook.xml")?;
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
    }

    // 2. Resolve rIds through xl/_rels/workbook.xml.rels
    let targets = read_relationship_targets(archive, "xl/_rels/workbook.xml.rels")?;

    let mut sheets = Vec::with_capacity(declared.len());
    for (name, r_id) in declared {
        let target = targets.get(&r_id).ok_or_else(|| {
            anyhow::anyhow!("Relationship '{}' not found for sheet '{}'", r_id, name)
        })?;
        sheets.push(SheetEntry {
            name,
            part: resolve_part_path(target),
        });
    }

    Ok(WorkbookStructure { sheets, active_tab })
}

fn read_relationship_targets<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    rels_path: &str,
) -> Result<HashMap<String, String>> {
    let rels_xml = archive
        .by_name(rels_path)
        .with_context(|| format!("Failed to find {}", rels_path))?;
    let mut reader = Reader::from_reader(BufReader::new(rels_xml));
    reader.config_mut().trim_text(true);

    let mut targets = HashMap::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = attr.unescape_value()?.to_string(),
                        b"Target" => target = attr.unescape_value()?.to_string(),
                        _ => {}
                    }
                }
                targets.insert(id, target);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// Relationship targets are relative to `xl/` unless they start with `/`
fn resolve_part_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{}", target.trim_start_matches("./"))
    }
}
