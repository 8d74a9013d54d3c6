use crate::codec::{Block, Color, FieldValue};
use crate::file::{FileType, IndexedFileWriter};
use crate::index::{DEFAULT_ARITY, DEFAULT_MIN_BIN_SIZE};
use crate::types::Range;
use crate::{Error, Result};
use noodles::core::Position;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One BED line, converted to closed 1-based coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BedRecord {
    pub reference_name: String,
    pub interval: Range,
    pub name: Option<String>,
    pub score: Option<f32>,
    pub strand: Option<char>,
    pub thick: Option<Range>,
    pub color: Option<Color>,
    pub blocks: Vec<Block>,
}

impl BedRecord {
    /// Parse a data line. `line_number` is only used in error messages.
    pub fn parse(line: &str, line_number: usize) -> Result<Self> {
        let invalid = |msg: String| Error::InvalidInput(format!("line {}: {}", line_number, msg));
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 3 {
            return Err(invalid(format!("expected at least 3 columns, got {}", columns.len())));
        }

        let start = parse_coordinate(columns[1]).map_err(&invalid)?;
        let end = parse_coordinate(columns[2]).map_err(&invalid)?;
        if end <= start {
            return Err(invalid(format!("empty or inverted feature {}-{}", start, end)));
        }
        let interval = to_range(start, end).map_err(&invalid)?;

        let column = |i: usize| columns.get(i).map(|c| c.trim()).filter(|c| !c.is_empty());

        let name = column(3).map(str::to_string);
        let score = match column(4) {
            None | Some(".") => None,
            Some(s) => Some(
                s.parse::<f32>()
                    .map_err(|_| invalid(format!("bad score {:?}", s)))?,
            ),
        };
        let strand = match column(5) {
            None => None,
            Some(s @ ("+" | "-" | ".")) => s.chars().next(),
            Some(s) => return Err(invalid(format!("bad strand {:?}", s))),
        };
        let thick = match (column(6), column(7)) {
            (Some(s), Some(e)) => {
                let s = parse_coordinate(s).map_err(&invalid)?;
                let e = parse_coordinate(e).map_err(&invalid)?;
                // thickStart == thickEnd means "no thick part"
                if e > s { Some(to_range(s, e).map_err(&invalid)?) } else { None }
            }
            _ => None,
        };
        let color = column(8).map(parse_color).transpose().map_err(&invalid)?;
        let blocks = match (column(9), column(10), column(11)) {
            (Some(count), Some(sizes), Some(starts)) => {
                parse_blocks(count, sizes, starts).map_err(&invalid)?
            }
            _ => Vec::new(),
        };

        Ok(Self {
            reference_name: columns[0].to_string(),
            interval,
            name,
            score,
            strand,
            thick,
            color,
            blocks,
        })
    }

    /// Field values in the layout `file_type` declares.
    pub fn values(&self, file_type: FileType) -> Vec<FieldValue> {
        let name = FieldValue::String(self.name.clone().unwrap_or_default());
        match file_type {
            FileType::IntervalGeneric => vec![FieldValue::Range(self.interval), name],
            FileType::IntervalBed => {
                let thick = self.thick.unwrap_or(self.interval);
                vec![
                    FieldValue::Range(self.interval),
                    name,
                    FieldValue::Float(self.score.unwrap_or(0.0)),
                    FieldValue::Char(self.strand.unwrap_or('.')),
                    FieldValue::Integer(thick.from),
                    FieldValue::Integer(thick.to),
                    FieldValue::Color(self.color.unwrap_or_default()),
                    FieldValue::Blocks(self.blocks.clone()),
                ]
            }
        }
    }
}

fn parse_coordinate(s: &str) -> std::result::Result<usize, String> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| format!("bad coordinate {:?}", s))
}

/// Half-open 0-based `[start, end)` to closed 1-based `[start + 1, end]`.
fn to_range(start: usize, end: usize) -> std::result::Result<Range, String> {
    let from = Position::try_from(start + 1).map_err(|e| e.to_string())?;
    let to = Position::try_from(end).map_err(|e| e.to_string())?;
    let convert = |p: Position| {
        i32::try_from(usize::from(p)).map_err(|_| format!("coordinate {} out of range", p))
    };
    Ok(Range::new(convert(from)?, convert(to)?))
}

fn parse_color(s: &str) -> std::result::Result<Color, String> {
    if s == "0" {
        return Ok(Color::default());
    }
    let parts: Vec<&str> = s.split(',').collect();
    match parts.as_slice() {
        [r, g, b] => {
            let channel = |c: &str| c.trim().parse::<u8>().map_err(|_| format!("bad color {:?}", s));
            Ok(Color {
                r: channel(*r)?,
                g: channel(*g)?,
                b: channel(*b)?,
            })
        }
        _ => Err(format!("bad color {:?}", s)),
    }
}

fn parse_blocks(count: &str, sizes: &str, starts: &str) -> std::result::Result<Vec<Block>, String> {
    let count: usize = count
        .parse()
        .map_err(|_| format!("bad block count {:?}", count))?;
    let list = |s: &str| -> std::result::Result<Vec<i32>, String> {
        s.split(',')
            .filter(|v| !v.is_empty())
            .map(|v| v.trim().parse::<i32>().map_err(|_| format!("bad block value {:?}", v)))
            .collect()
    };
    let sizes = list(sizes)?;
    let starts = list(starts)?;
    if sizes.len() != count || starts.len() != count {
        return Err(format!(
            "block count {} does not match {} sizes and {} starts",
            count,
            sizes.len(),
            starts.len()
        ));
    }
    Ok(starts
        .into_iter()
        .zip(sizes)
        .map(|(position, size)| Block { position, size })
        .collect())
}

/// Read every data line of a BED stream. Blank lines, comments and
/// `track`/`browser` lines are skipped.
pub fn read_bed<R: BufRead>(reader: R) -> Result<Vec<BedRecord>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }
        records.push(BedRecord::parse(trimmed, i + 1)?);
    }
    Ok(records)
}

#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub file_type: FileType,
    pub arity: usize,
    pub min_bin_size: i64,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            file_type: FileType::IntervalBed,
            arity: DEFAULT_ARITY,
            min_bin_size: DEFAULT_MIN_BIN_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSummary {
    pub references: usize,
    pub records: u64,
    pub bytes: u64,
}

/// Build an indexed writer from parsed records. Each reference gets the root
/// range `[1, max end]`, in order of first appearance.
pub fn index_records(records: &[BedRecord], options: &FormatOptions) -> Result<IndexedFileWriter> {
    let mut extents: Vec<(&str, i32)> = Vec::new();
    for record in records {
        match extents
            .iter_mut()
            .find(|(name, _)| *name == record.reference_name)
        {
            Some((_, end)) => *end = (*end).max(record.interval.to),
            None => extents.push((record.reference_name.as_str(), record.interval.to)),
        }
    }

    let mut writer = IndexedFileWriter::new(options.file_type)?
        .with_bin_parameters(options.arity, options.min_bin_size)?;
    for (name, end) in &extents {
        writer.add_reference(name, Range::new(1, *end))?;
    }
    for record in records {
        writer.push(&record.reference_name, &record.values(options.file_type))?;
    }
    Ok(writer)
}

/// Convert a BED file into an indexed file.
pub fn format_bed(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &FormatOptions,
) -> Result<FormatSummary> {
    let input = input.as_ref();
    let file = File::open(input)
        .map_err(|e| Error::NotFound(format!("{}: {}", input.display(), e)))?;
    let records = read_bed(BufReader::new(file))?;
    tracing::info!("read {} BED records from {:?}", records.len(), input);

    let writer = index_records(&records, options)?;
    let references = records
        .iter()
        .map(|r| r.reference_name.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    let record_count = writer.record_count();
    let bytes = writer.finish(output)?;

    Ok(FormatSummary {
        references,
        records: record_count,
        bytes,
    })
}
