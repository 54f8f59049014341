// ! XLSX writer that stamps string values into cells of the active sheet

use anyhow::Result;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::mem;
use std::path::Path;
use tracing::debug;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::reader::{format_cell_ref, parse_cell_ref, read_workbook_structure};

/// String values to write, keyed by 0-based (row, col)
#[derive(Debug, Default, Clone)]
pub struct CellStamps {
    cells: BTreeMap<(u32, u32), String>,
}

impl CellStamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `value` for the cell at `cell_ref` (e.g. "C4")
    pub fn set(&mut self, cell_ref: &str, value: impl Into<String>) -> Result<&mut Self> {
        let position = parse_cell_ref(cell_ref)
            .ok_or_else(|| anyhow::anyhow!("Invalid cell reference: {}", cell_ref))?;
        self.cells.insert(position, value.into());
        Ok(self)
    }

    pub fn get(&self, cell_ref: &str) -> Option<&str> {
        parse_cell_ref(cell_ref).and_then(|pos| self.cells.get(&pos).map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    fn by_row(&self) -> BTreeMap<u32, BTreeMap<u32, &str>> {
        let mut rows: BTreeMap<u32, BTreeMap<u32, &str>> = BTreeMap::new();
        for (&(row, col), value) in &self.cells {
            rows.entry(row).or_default().insert(col, value.as_str());
        }
        rows
    }
}

/// Calculation chain; Excel rebuilds it on open when the part is missing
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Copy an XLSX file to `output_path`, writing `stamps` into its active sheet.
///
/// Every other part of the archive is copied without recompression, except
/// the calculation chain, which is dropped along with its references since
/// stamped cells may have held formulas it lists.
pub fn stamp_workbook_xlsx(
    input_path: &Path,
    output_path: &Path,
    stamps: &CellStamps,
) -> Result<()> {
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);
    let mut archive = ZipArchive::new(reader)?;

    let structure = read_workbook_structure(&mut archive)?;
    let active = structure.active_sheet()?.clone();
    debug!(sheet = %active.name, part = %active.part, "stamping active sheet");

    // Parts written with new content, by archive name
    let mut replaced: BTreeMap<String, String> = BTreeMap::new();
    let sheet_xml = read_file_from_zip(&mut archive, &active.part)?;
    replaced.insert(active.part.clone(), stamp_sheet_xml(&sheet_xml, stamps)?);

    let has_calc_chain = archive.file_names().any(|name| name == CALC_CHAIN_PART);
    if has_calc_chain {
        debug!("dropping calculation chain");
        let types = read_file_from_zip(&mut archive, CONTENT_TYPES_PART)?;
        let types = remove_elements(&types, b"Override", |e| {
            Ok(attribute_value(e, b"PartName")?.as_deref() == Some("/xl/calcChain.xml"))
        })?;
        replaced.insert(CONTENT_TYPES_PART.to_string(), types);

        if archive.file_names().any(|name| name == WORKBOOK_RELS_PART) {
            let rels = read_file_from_zip(&mut archive, WORKBOOK_RELS_PART)?;
            let rels = remove_elements(&rels, b"Relationship", |e| {
                Ok(attribute_value(e, b"Type")?.is_some_and(|t| t.ends_with("/calcChain")))
            })?;
            replaced.insert(WORKBOOK_RELS_PART.to_string(), rels);
        }
    }

    // Create output ZIP
    let output_file = File::create(output_path)?;
    let mut zip_writer = ZipWriter::new(output_file);

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_string();

        if has_calc_chain && name == CALC_CHAIN_PART {
            continue;
        }
        if let Some(content) = replaced.get(&name) {
            drop(file);
            zip_writer.start_file(name, SimpleFileOptions::default())?;
            zip_writer.write_all(content.as_bytes())?;
        } else {
            zip_writer.raw_copy_file(file)?;
        }
    }

    zip_writer.finish()?;
    Ok(())
}

fn read_file_from_zip(archive: &mut ZipArchive<BufReader<File>>, filename: &str) -> Result<String> {
    let mut file = archive.by_name(filename)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Rewrite a worksheet part so that every stamped cell holds an inline string.
///
/// Existing cells keep their style index; missing rows and cells are inserted
/// in sorted position so the sheet stays valid for Excel.
pub fn stamp_sheet_xml(xml: &str, stamps: &CellStamps) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stamper = SheetStamper::new(stamps.by_row());
    let mut saw_sheet_data = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(event) if stamper.skip_depth > 0 => stamper.skip(&event)?,
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                stamper.prefix = element_prefix(&e);
                stamper.in_sheet_data = true;
                stamper.writer.write_event(Event::Start(e))?;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                stamper.prefix = element_prefix(&e);
                let end = e.to_end().into_owned();
                stamper.writer.write_event(Event::Start(e))?;
                stamper.flush_rows_before(None)?;
                stamper.writer.write_event(Event::End(end))?;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"sheetData" => {
                stamper.flush_rows_before(None)?;
                stamper.in_sheet_data = false;
                stamper.writer.write_event(Event::End(e))?;
            }
            Ok(Event::Start(e)) if stamper.in_sheet_data && e.local_name().as_ref() == b"row" => {
                stamper.open_row(&e)?;
                stamper.writer.write_event(Event::Start(e))?;
            }
            Ok(Event::Empty(e)) if stamper.in_sheet_data && e.local_name().as_ref() == b"row" => {
                stamper.open_row(&e)?;
                if stamper.row_cells.is_empty() {
                    stamper.current_row = None;
                    stamper.writer.write_event(Event::Empty(e))?;
                } else {
                    let end = e.to_end().into_owned();
                    stamper.writer.write_event(Event::Start(e))?;
                    stamper.close_row()?;
                    stamper.writer.write_event(Event::End(end))?;
                }
            }
            Ok(Event::End(e)) if stamper.in_sheet_data && e.local_name().as_ref() == b"row" => {
                stamper.close_row()?;
                stamper.writer.write_event(Event::End(e))?;
            }
            Ok(Event::Start(e)) if stamper.current_row.is_some() && e.local_name().as_ref() == b"c" => {
                if stamper.stamp_cell(&e)? {
                    // Drop the old <v>, <f> and <is> children
                    stamper.skip_depth = 1;
                } else {
                    stamper.writer.write_event(Event::Start(e))?;
                }
            }
            Ok(Event::Empty(e)) if stamper.current_row.is_some() && e.local_name().as_ref() == b"c" => {
                if !stamper.stamp_cell(&e)? {
                    stamper.writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => stamper.writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    if !saw_sheet_data && !stamps.is_empty() {
        anyhow::bail!("Worksheet has no sheetData element");
    }

    let result = stamper.writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

/// Drop every `local_name` element (and its children) for which `matches` holds
fn remove_elements<F>(xml: &str, local_name: &[u8], matches: F) -> Result<String>
where
    F: Fn(&BytesStart) -> Result<bool>,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(_)) if skip_depth > 0 => skip_depth += 1,
            Ok(Event::End(_)) if skip_depth > 0 => skip_depth -= 1,
            Ok(_) if skip_depth > 0 => {}
            Ok(Event::Empty(e)) if e.local_name().as_ref() == local_name => {
                if !matches(&e)? {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == local_name => {
                if matches(&e)? {
                    skip_depth = 1;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn attribute_value(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

struct SheetStamper<'a> {
    writer: Writer<Cursor<Vec<u8>>>,
    /// Stamps not yet written, by row then column
    pending: BTreeMap<u32, BTreeMap<u32, &'a str>>,
    /// Namespace prefix of the sheet elements, e.g. "x:" (usually empty)
    prefix: String,
    in_sheet_data: bool,
    current_row: Option<u32>,
    row_cells: BTreeMap<u32, &'a str>,
    next_row: u32,
    next_col: u32,
    skip_depth: usize,
}

impl<'a> SheetStamper<'a> {
    fn new(pending: BTreeMap<u32, BTreeMap<u32, &'a str>>) -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
            pending,
            prefix: String::new(),
            in_sheet_data: false,
            current_row: None,
            row_cells: BTreeMap::new(),
            next_row: 0,
            next_col: 0,
            skip_depth: 0,
        }
    }

    fn skip(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Start(_) => self.skip_depth += 1,
            Event::End(_) => self.skip_depth -= 1,
            Event::Eof => anyhow::bail!("Unexpected end of worksheet inside a cell"),
            _ => {}
        }
        Ok(())
    }

    /// Enter a <row>: emit any pending rows that sort before it
    fn open_row(&mut self, e: &BytesStart) -> Result<()> {
        let mut row = self.next_row;
        for attr in e.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == b"r" {
                let number: u32 = attr.unescape_value()?.parse()?;
                row = number.saturating_sub(1);
            }
        }
        self.next_row = row + 1;
        self.next_col = 0;

        self.flush_rows_before(Some(row))?;
        self.row_cells = self.pending.remove(&row).unwrap_or_default();
        self.current_row = Some(row);
        Ok(())
    }

    /// Leave a <row>: append stamps for columns after its last cell
    fn close_row(&mut self) -> Result<()> {
        if let Some(row) = self.current_row.take() {
            let cells = mem::take(&mut self.row_cells);
            for (col, value) in cells {
                self.write_cell(row, col, value, None)?;
            }
        }
        Ok(())
    }

    /// Returns true when `e` was replaced by a stamped cell
    fn stamp_cell(&mut self, e: &BytesStart) -> Result<bool> {
        let Some(row) = self.current_row else {
            return Ok(false);
        };

        let mut col = self.next_col;
        let mut style = None;
        for attr in e.attributes() {
            let attr = attr?;
            match attr.key.as_ref() {
                b"r" => {
                    let cell_ref = attr.unescape_value()?;
                    if let Some((_, c)) = parse_cell_ref(&cell_ref) {
                        col = c;
                    }
                }
                b"s" => style = Some(attr.unescape_value()?.into_owned()),
                _ => {}
            }
        }
        self.next_col = col + 1;

        let rest = self.row_cells.split_off(&col);
        let before = mem::replace(&mut self.row_cells, rest);
        for (c, value) in before {
            self.write_cell(row, c, value, None)?;
        }

        match self.row_cells.remove(&col) {
            Some(value) => {
                self.write_cell(row, col, value, style.as_deref())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Emit pending rows sorting before `row` (all of them for `None`)
    fn flush_rows_before(&mut self, row: Option<u32>) -> Result<()> {
        let flushed = match row {
            Some(row) => {
                let rest = self.pending.split_off(&row);
                mem::replace(&mut self.pending, rest)
            }
            None => mem::take(&mut self.pending),
        };

        for (row, cells) in flushed {
            let mut start = BytesStart::new(format!("{}row", self.prefix));
            start.push_attribute(("r", (row + 1).to_string().as_str()));
            self.writer.write_event(Event::Start(start))?;
            for (col, value) in cells {
                self.write_cell(row, col, value, None)?;
            }
            self.writer
                .write_event(Event::End(BytesEnd::new(format!("{}row", self.prefix))))?;
        }
        Ok(())
    }

    fn write_cell(&mut self, row: u32, col: u32, value: &str, style: Option<&str>) -> Result<()> {
        let p = self.prefix.clone();
        let mut cell = BytesStart::new(format!("{p}c"));
        cell.push_attribute(("r", format_cell_ref(row, col).as_str()));
        if let Some(style) = style {
            cell.push_attribute(("s", style));
        }
        cell.push_attribute(("t", "inlineStr"));

        let mut text = BytesStart::new(format!("{p}t"));
        if value.trim() != value {
            text.push_attribute(("xml:space", "preserve"));
        }

        self.writer.write_event(Event::Start(cell))?;
        self.writer
            .write_event(Event::Start(BytesStart::new(format!("{p}is"))))?;
        self.writer.write_event(Event::Start(text))?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.writer.write_event(Event::End(BytesEnd::new(format!("{p}t"))))?;
        self.writer.write_event(Event::End(BytesEnd::new(format!("{p}is"))))?;
        self.writer.write_event(Event::End(BytesEnd::new(format!("{p}c"))))?;
        Ok(())
    }
}

fn element_prefix(e: &BytesStart) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}
