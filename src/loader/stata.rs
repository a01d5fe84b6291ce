//! Stata `.dta` loader for the tagged releases 117, 118 and 119.
//!
//! Layout: a `<header>`, a `<map>` of section offsets, then tagged sections.
//! Only the sections needed for a table are visited: variable types,
//! variable names, display formats, variable labels, the strL table and the
//! data block. Column names are the variable labels, falling back to the
//! variable name where no label was set. Stata's missing codes (`.`, `.a`
//! ... `.z`) and empty strings load as null.
//!
//! Variables displayed as `%td` dates or `%tc` clock times are stored as
//! offsets from 1960-01-01 and are decoded to ISO text.

use super::columns::{RawCell, TextPolicy, build_table};
use crate::constants::{
    MAX_EXACT_FLOAT_INT, SPREADSHEET_DATETIME_FORMAT, STATA_DATE_FORMAT, stata_missing,
    stata_types,
};
use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{NaiveDate, TimeDelta};
use std::collections::HashMap;
use tracing::debug;

/// Map entries, by position in the `<map>` section
const MAP_ENTRIES: usize = 14;
const MAP_VARIABLE_TYPES: usize = 2;
const MAP_VARNAMES: usize = 3;
const MAP_FORMATS: usize = 5;
const MAP_VARIABLE_LABELS: usize = 7;
const MAP_DATA: usize = 9;
const MAP_STRLS: usize = 10;

/// strL payload type for null-terminated text
const GSO_ASCII: u8 = 130;

pub fn load(blob: &[u8]) -> Result<UniformTable> {
    if blob.is_empty() {
        return Err(WorkbenchError::EmptyInput {
            format: DataFormat::Dta,
        });
    }
    if !blob.starts_with(b"<stata_dta>") {
        let reason = match blob[0] {
            release @ 102..=115 => format!(
                "Stata release {release} files are not supported, re-save as release 117 or later"
            ),
            _ => "missing <stata_dta> signature".to_string(),
        };
        return Err(malformed(reason));
    }

    let mut reader = DtaReader::new(blob);
    let header = reader.read_header()?;
    let map = reader.read_map()?;

    let types = reader.read_variable_types(&map, &header)?;
    let names = reader.read_strings(
        map[MAP_VARNAMES],
        "varnames",
        header.variables,
        header.release.varname_len(),
    )?;
    let formats = reader.read_strings(
        map[MAP_FORMATS],
        "formats",
        header.variables,
        header.release.format_len(),
    )?;
    let labels = reader.read_strings(
        map[MAP_VARIABLE_LABELS],
        "variable_labels",
        header.variables,
        header.release.label_len(),
    )?;
    let strls = reader.read_strls(map[MAP_STRLS], header.release)?;
    let mut rows = reader.read_data(map[MAP_DATA], &header, &types, &strls)?;

    let clocks: Vec<Option<StataClock>> = formats.iter().map(|f| StataClock::parse(f)).collect();
    if clocks.iter().any(Option::is_some) {
        for row in rows.iter_mut() {
            for (cell, clock) in row.iter_mut().zip(&clocks) {
                if let Some(clock) = clock {
                    clock.decode(cell);
                }
            }
        }
    }

    let columns: Vec<String> = names
        .into_iter()
        .zip(labels)
        .map(|(name, label)| if label.trim().is_empty() { name } else { label })
        .collect();

    debug!(
        "Read Stata release {:?} ({:?}): {} variables, {} observations, {} strLs",
        header.release,
        reader.endian,
        header.variables,
        header.observations,
        strls.len()
    );

    build_table(columns, rows, TextPolicy::Keep)
}

fn malformed(reason: impl Into<String>) -> WorkbenchError {
    WorkbenchError::malformed(DataFormat::Dta, reason)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    R117,
    R118,
    R119,
}

impl Release {
    fn parse(tag: &[u8]) -> Option<Self> {
        match tag {
            b"117" => Some(Release::R117),
            b"118" => Some(Release::R118),
            b"119" => Some(Release::R119),
            _ => None,
        }
    }

    fn varname_len(self) -> usize {
        match self {
            Release::R117 => 33,
            Release::R118 | Release::R119 => 129,
        }
    }

    fn label_len(self) -> usize {
        match self {
            Release::R117 => 81,
            Release::R118 | Release::R119 => 321,
        }
    }

    fn format_len(self) -> usize {
        match self {
            Release::R117 => 49,
            Release::R118 | Release::R119 => 57,
        }
    }

    /// Bytes of the `v` half of an 8-byte strL reference in the data block
    fn strl_v_len(self) -> usize {
        match self {
            Release::R117 => 4,
            Release::R118 => 2,
            Release::R119 => 3,
        }
    }
}

/// Elapsed-time display formats with a 1960-01-01 epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StataClock {
    /// `%td` (or the older `%d`): days
    Days,
    /// `%tc` and `%tC`: milliseconds
    Millis,
}

impl StataClock {
    fn parse(format: &str) -> Option<Self> {
        let format = format.strip_prefix('%')?;
        let format = format.strip_prefix('-').unwrap_or(format);
        if format.starts_with("td") || format.starts_with('d') {
            Some(StataClock::Days)
        } else if format.starts_with("tc") || format.starts_with("tC") {
            Some(StataClock::Millis)
        } else {
            None
        }
    }

    /// Replace a numeric cell with its calendar text; out-of-range
    /// offsets keep their number
    fn decode(self, cell: &mut RawCell) {
        let offset = match cell {
            RawCell::Int(v) => *v,
            RawCell::Float(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_FLOAT_INT => *v as i64,
            _ => return,
        };
        let Some(epoch) = NaiveDate::from_ymd_opt(1960, 1, 1) else {
            return;
        };
        let text = match self {
            StataClock::Days => TimeDelta::try_days(offset)
                .and_then(|delta| epoch.checked_add_signed(delta))
                .map(|date| date.format(STATA_DATE_FORMAT).to_string()),
            StataClock::Millis => TimeDelta::try_milliseconds(offset)
                .and_then(|delta| epoch.and_hms_opt(0, 0, 0)?.checked_add_signed(delta))
                .map(|datetime| datetime.format(SPREADSHEET_DATETIME_FORMAT).to_string()),
        };
        if let Some(text) = text {
            *cell = RawCell::Text(text);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    fn u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(buf),
            Endian::Big => BigEndian::read_u64(buf),
        }
    }

    fn uint(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_uint(buf, buf.len()),
            Endian::Big => BigEndian::read_uint(buf, buf.len()),
        }
    }

    fn i16(self, buf: &[u8]) -> i16 {
        match self {
            Endian::Little => LittleEndian::read_i16(buf),
            Endian::Big => BigEndian::read_i16(buf),
        }
    }

    fn i32(self, buf: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(buf),
            Endian::Big => BigEndian::read_i32(buf),
        }
    }

    fn f32(self, buf: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(buf),
            Endian::Big => BigEndian::read_f32(buf),
        }
    }

    fn f64(self, buf: &[u8]) -> f64 {
        match self {
            Endian::Little => LittleEndian::read_f64(buf),
            Endian::Big => BigEndian::read_f64(buf),
        }
    }
}

#[derive(Debug)]
struct DtaHeader {
    release: Release,
    variables: usize,
    observations: usize,
}

struct DtaReader<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> DtaReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            endian: Endian::Little,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| malformed(format!("unexpected end of file at byte {}", self.pos)))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        let at = self.pos;
        let found = self.take(tag.len())?;
        if found != tag.as_bytes() {
            return Err(malformed(format!("expected {tag} at byte {at}")));
        }
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|offset| *offset <= self.buf.len())
            .ok_or_else(|| malformed(format!("section offset {offset} is out of range")))?;
        self.pos = offset;
        Ok(())
    }

    fn peek(&self, bytes: &[u8]) -> bool {
        self.buf[self.pos..].starts_with(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(self.endian.u16(bytes))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(self.endian.u32(bytes))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(self.endian.u64(bytes))
    }

    fn read_header(&mut self) -> Result<DtaHeader> {
        self.expect("<stata_dta>")?;
        self.expect("<header>")?;

        self.expect("<release>")?;
        let tag = self.take(3)?;
        let release = Release::parse(tag).ok_or_else(|| {
            malformed(format!(
                "unsupported release {}",
                String::from_utf8_lossy(tag)
            ))
        })?;
        self.expect("</release>")?;

        self.expect("<byteorder>")?;
        self.endian = match self.take(3)? {
            b"LSF" => Endian::Little,
            b"MSF" => Endian::Big,
            other => {
                return Err(malformed(format!(
                    "unknown byte order {}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
        self.expect("</byteorder>")?;

        self.expect("<K>")?;
        let variables = match release {
            Release::R119 => self.read_u32()? as usize,
            Release::R117 | Release::R118 => self.read_u16()? as usize,
        };
        self.expect("</K>")?;

        self.expect("<N>")?;
        let observations = match release {
            Release::R117 => u64::from(self.read_u32()?),
            Release::R118 | Release::R119 => self.read_u64()?,
        };
        let observations = usize::try_from(observations)
            .map_err(|_| malformed(format!("{observations} observations do not fit in memory")))?;
        self.expect("</N>")?;

        self.expect("<label>")?;
        let label_len = match release {
            Release::R117 => usize::from(self.read_u8()?),
            Release::R118 | Release::R119 => usize::from(self.read_u16()?),
        };
        self.take(label_len)?;
        self.expect("</label>")?;

        self.expect("<timestamp>")?;
        let timestamp_len = usize::from(self.read_u8()?);
        self.take(timestamp_len)?;
        self.expect("</timestamp>")?;

        self.expect("</header>")?;

        Ok(DtaHeader {
            release,
            variables,
            observations,
        })
    }

    fn read_map(&mut self) -> Result<[u64; MAP_ENTRIES]> {
        self.expect("<map>")?;
        let mut map = [0u64; MAP_ENTRIES];
        for entry in map.iter_mut() {
            *entry = self.read_u64()?;
        }
        self.expect("</map>")?;
        Ok(map)
    }

    fn read_variable_types(
        &mut self,
        map: &[u64; MAP_ENTRIES],
        header: &DtaHeader,
    ) -> Result<Vec<u16>> {
        self.seek(map[MAP_VARIABLE_TYPES])?;
        self.expect("<variable_types>")?;
        let types = (0..header.variables)
            .map(|_| self.read_u16())
            .collect::<Result<Vec<_>>>()?;
        self.expect("</variable_types>")?;
        Ok(types)
    }

    /// Read `count` fixed-width, null-padded strings from a tagged section
    fn read_strings(
        &mut self,
        offset: u64,
        section: &str,
        count: usize,
        width: usize,
    ) -> Result<Vec<String>> {
        self.seek(offset)?;
        self.expect(&format!("<{section}>"))?;
        let strings = (0..count)
            .map(|_| self.take(width).map(c_string))
            .collect::<Result<Vec<_>>>()?;
        self.expect(&format!("</{section}>"))?;
        Ok(strings)
    }

    fn read_strls(&mut self, offset: u64, release: Release) -> Result<HashMap<(u64, u64), String>> {
        self.seek(offset)?;
        self.expect("<strls>")?;

        let mut strls = HashMap::new();
        while self.peek(b"GSO") {
            self.take(3)?;
            let v = u64::from(self.read_u32()?);
            let o = match release {
                Release::R117 => u64::from(self.read_u32()?),
                Release::R118 | Release::R119 => self.read_u64()?,
            };
            let kind = self.read_u8()?;
            let len = self.read_u32()? as usize;
            let payload = self.take(len)?;
            let text = if kind == GSO_ASCII {
                c_string(payload)
            } else {
                String::from_utf8_lossy(payload).into_owned()
            };
            strls.insert((v, o), text);
        }

        self.expect("</strls>")?;
        Ok(strls)
    }

    fn read_data(
        &mut self,
        offset: u64,
        header: &DtaHeader,
        types: &[u16],
        strls: &HashMap<(u64, u64), String>,
    ) -> Result<Vec<Vec<RawCell>>> {
        self.seek(offset)?;
        self.expect("<data>")?;

        // A table without variables has no cells, whatever <N> claims
        let row_width = types
            .iter()
            .map(|code| value_width(*code))
            .sum::<Result<usize>>()?;
        if row_width == 0 {
            self.expect("</data>")?;
            return Ok(Vec::new());
        }

        let remaining = self.buf.len() - self.pos;
        let fits = header
            .observations
            .checked_mul(row_width)
            .is_some_and(|needed| needed <= remaining);
        if !fits {
            return Err(malformed(format!(
                "{} observations of {} bytes do not fit in the {} bytes of the data section",
                header.observations, row_width, remaining
            )));
        }

        let mut rows = Vec::with_capacity(header.observations);
        for _ in 0..header.observations {
            let row = types
                .iter()
                .map(|code| self.read_value(*code, header.release, strls))
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        self.expect("</data>")?;
        Ok(rows)
    }

    fn read_value(
        &mut self,
        code: u16,
        release: Release,
        strls: &HashMap<(u64, u64), String>,
    ) -> Result<RawCell> {
        let endian = self.endian;
        let cell = match code {
            1..=stata_types::MAX_FIXED_STR => text_cell(c_string(self.take(usize::from(code))?)),
            stata_types::STRL => {
                let bytes = self.take(8)?;
                let (v_bytes, o_bytes) = bytes.split_at(release.strl_v_len());
                let key = (endian.uint(v_bytes), endian.uint(o_bytes));
                if key == (0, 0) {
                    RawCell::Empty
                } else {
                    let text = strls.get(&key).ok_or_else(|| {
                        malformed(format!("strL ({}, {}) is missing from the strL table", key.0, key.1))
                    })?;
                    text_cell(text.clone())
                }
            }
            stata_types::DOUBLE => {
                let value = endian.f64(self.take(8)?);
                if value.is_nan() || value >= f64::from_bits(stata_missing::DOUBLE_MISSING_BITS) {
                    RawCell::Empty
                } else {
                    RawCell::Float(value)
                }
            }
            stata_types::FLOAT => {
                let value = endian.f32(self.take(4)?);
                if value.is_nan() || value >= f32::from_bits(stata_missing::FLOAT_MISSING_BITS) {
                    RawCell::Empty
                } else {
                    RawCell::Float(f64::from(value))
                }
            }
            stata_types::LONG => {
                let value = endian.i32(self.take(4)?);
                if value > stata_missing::LONG_MAX {
                    RawCell::Empty
                } else {
                    RawCell::Int(i64::from(value))
                }
            }
            stata_types::INT => {
                let value = endian.i16(self.take(2)?);
                if value > stata_missing::INT_MAX {
                    RawCell::Empty
                } else {
                    RawCell::Int(i64::from(value))
                }
            }
            stata_types::BYTE => {
                let value = i8::from_ne_bytes([self.read_u8()?]);
                if value > stata_missing::BYTE_MAX {
                    RawCell::Empty
                } else {
                    RawCell::Int(i64::from(value))
                }
            }
            other => return Err(malformed(format!("unknown variable type code {other}"))),
        };
        Ok(cell)
    }
}

/// Bytes one value of type `code` takes in the data block
fn value_width(code: u16) -> Result<usize> {
    match code {
        1..=stata_types::MAX_FIXED_STR => Ok(usize::from(code)),
        stata_types::STRL | stata_types::DOUBLE => Ok(8),
        stata_types::FLOAT | stata_types::LONG => Ok(4),
        stata_types::INT => Ok(2),
        stata_types::BYTE => Ok(1),
        other => Err(malformed(format!("unknown variable type code {other}"))),
    }
}

fn text_cell(text: String) -> RawCell {
    if text.is_empty() {
        RawCell::Empty
    } else {
        RawCell::Text(text)
    }
}

/// Text up to the first NUL byte
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
