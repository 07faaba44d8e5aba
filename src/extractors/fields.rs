// src/extractors/fields.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

// --- Constants ---
/// Line of 15 `=` characters separating one lead from the next.
pub const BLOCK_SEPARATOR: &str = "===============";

// Chemical registry numbers: 2-7 digits, 2-7 digits, one check digit
const CAS_PATTERN: &str = r"(\d{2,7}-\d{2,7}-\d)";

// --- Field Vocabulary ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    BuySell,
    ProductName,
    CasNo,
    Quantity,
    Market,
    Delivery,
    Company,
    Name,
    Designation,
    ContactNo,
    EmailId,
    Stock,
}

impl Field {
    /// Column label used in the output file header.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::BuySell => "Buy/Sell",
            Field::ProductName => "Product Name",
            Field::CasNo => "CAS No.",
            Field::Quantity => "Quantity",
            Field::Market => "Market",
            Field::Delivery => "Delivery",
            Field::Company => "Company",
            Field::Name => "Name",
            Field::Designation => "Designation",
            Field::ContactNo => "Contact No.",
            Field::EmailId => "Email id",
            Field::Stock => "Stock",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Regex Patterns (Lazy Static) ---
// One matcher per field. Every pattern runs case-insensitive with `.` spanning newlines.
static FIELD_PATTERNS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    [
        (Field::BuySell, r"Buy/Sell\s*[:：]\s*(Buy|Sell)"),
        (Field::ProductName, r"(?:Product|Product Name)\s*[:：]\s*(.*?)(?:\n|$)"),
        (Field::CasNo, CAS_PATTERN),
        (Field::Quantity, r"Quantity\s*[:：]\s*(.*?)(?:\n|$)"),
        (Field::Market, r"Market\s*[:：]\s*(.*?)(?:\n|$)"),
        (Field::Delivery, r"Delivery\s*[:：]\s*(.*?)(?:\n|$)"),
        (Field::Company, r"Company\s*[:：]\s*(.*?)(?:\n|$)"),
        (Field::Name, r"Name\s*[:：]\s*(.*?)(?:\n|$)"),
        (Field::Designation, r"Designation\s*[:：]\s*(.*?)(?:\n|$)"),
        (
            Field::ContactNo,
            concat!(
                r"(?:Phone Number|Phone No\.|Phone|Contact Number|Contact No|Contact)",
                r"\s*[:：]\s*(.*?)(?:\n|$)",
            ),
        ),
        (Field::EmailId, r"E-?mail.*?[:：]\s*(.*?)(?:\n|$)"),
        (Field::Stock, r"Stock\s*[:：]\s*(.*?)(?:\n|$)"),
    ]
    .iter()
    .map(|(field, pat)| {
        let re = Regex::new(&format!("(?is){}", pat))
            .unwrap_or_else(|e| panic!("Failed to compile pattern for {}: {}", field, e));
        (*field, re)
    })
    .collect()
});

static CAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(CAS_PATTERN).expect("Failed to compile CAS_RE")
});

// A "Name:" label directly after "Product " belongs to the product, not the contact
static PRODUCT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)product\s\z").expect("Failed to compile PRODUCT_PREFIX_RE")
});

static BUY_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbuy\b").expect("Failed to compile BUY_WORD_RE")
});

static SELL_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsell\b").expect("Failed to compile SELL_WORD_RE")
});

// --- Data Structures ---
/// One output row. Fields keep the order they were first inserted in,
/// which drives the output column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: Vec<(Field, String)>,
}

impl Record {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrites an existing field in place, otherwise appends it.
    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((field, value)),
        }
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.values.iter().any(|(_, v)| v == value)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.values.iter().map(|(f, _)| *f)
    }
}

/// Counters describing a single extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub blocks: usize,
    pub records: usize,
    /// Blocks that held two or more CAS numbers and were split per number.
    pub expanded_blocks: usize,
    /// CAS matches dropped because the guessed product name was already a field value.
    pub skipped_cas_matches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub stats: ExtractionStats,
}

/// Location of a field match inside a block, from the label through the captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub field: Field,
    pub start: usize,
    pub end: usize,
}

// --- Main Extractor Structure ---
pub struct FieldExtractor;

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    pub fn new() -> Self { Self {} }

    /// Splits `document` into blocks. A document without separators is a single block.
    pub fn split_blocks<'a>(&self, document: &'a str) -> Vec<&'a str> {
        document.split(BLOCK_SEPARATOR).collect()
    }

    /// Extracts every record from `document`, in block order.
    pub fn extract(&self, document: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for (index, block) in self.split_blocks(document).into_iter().enumerate() {
            extraction.stats.blocks += 1;
            let before = extraction.records.len();
            self.extract_block(block, &mut extraction);
            tracing::debug!(
                "Block {}: {} bytes, {} record(s)",
                index,
                block.len(),
                extraction.records.len() - before
            );
        }

        extraction.stats.records = extraction.records.len();
        tracing::info!(
            "Extracted {} records from {} blocks ({} split on multiple CAS numbers)",
            extraction.stats.records,
            extraction.stats.blocks,
            extraction.stats.expanded_blocks
        );
        extraction
    }

    /// Applies the labeled matchers and the Buy/Sell fallback to one block.
    pub fn extract_fields(&self, block: &str) -> Record {
        let mut record = Record::default();

        for (field, re) in FIELD_PATTERNS.iter() {
            if let Some(caps) = first_accepted_captures(*field, re, block) {
                if let Some(value) = caps.get(1) {
                    record.insert(*field, value.as_str().trim());
                }
            }
        }

        // A labeled value keeps its slot; a fallback value lands after every matched field
        let buy_sell = match record.get(Field::BuySell) {
            Some(label) if label.eq_ignore_ascii_case("sell") => "Sell",
            Some(_) => "Buy",
            None if BUY_WORD_RE.is_match(block) => "Buy",
            None if SELL_WORD_RE.is_match(block) => "Sell",
            None => {
                tracing::trace!("No buy/sell indicator in block, defaulting to Buy");
                "Buy"
            }
        };
        record.insert(Field::BuySell, buy_sell);

        record
    }

    fn extract_block(&self, block: &str, extraction: &mut Extraction) {
        let record = self.extract_fields(block);

        let cas_matches: Vec<_> = CAS_RE.find_iter(block).collect();
        if cas_matches.len() < 2 {
            extraction.records.push(record);
            return;
        }

        extraction.stats.expanded_blocks += 1;
        for cas in cas_matches {
            let guessed_name = block[..cas.start()]
                .split_whitespace()
                .last()
                .unwrap_or_default();

            if record.contains_value(guessed_name) {
                tracing::debug!(
                    "Skipping CAS {}: guessed product '{}' already present in record",
                    cas.as_str(),
                    guessed_name
                );
                extraction.stats.skipped_cas_matches += 1;
                continue;
            }

            let mut expanded = record.clone();
            expanded.insert(Field::ProductName, guessed_name);
            expanded.insert(Field::CasNo, cas.as_str());
            extraction.records.push(expanded);
        }
    }

    /// Spans of every field match in `block`: the first accepted match per labeled
    /// field, and every CAS number. Sorted by start offset.
    pub fn field_spans(&self, block: &str) -> Vec<FieldSpan> {
        let mut spans = Vec::new();

        for (field, re) in FIELD_PATTERNS.iter() {
            if *field == Field::CasNo {
                continue;
            }
            if let Some(caps) = first_accepted_captures(*field, re, block) {
                if let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) {
                    spans.push(FieldSpan {
                        field: *field,
                        start: whole.start(),
                        end: value.end(),
                    });
                }
            }
        }

        for cas in CAS_RE.find_iter(block) {
            spans.push(FieldSpan {
                field: Field::CasNo,
                start: cas.start(),
                end: cas.end(),
            });
        }

        spans.sort_by_key(|s| (s.start, s.end));
        spans
    }
}

/// First match of `re` in `block`, skipping "Name:" labels that follow "Product ".
/// A rejected candidate resumes the search one character past its start.
fn first_accepted_captures<'h>(
    field: Field,
    re: &Regex,
    block: &'h str,
) -> Option<regex::Captures<'h>> {
    let mut from = 0;
    while from <= block.len() {
        let caps = re.captures_at(block, from)?;
        let start = caps.get(0)?.start();

        if field == Field::Name && PRODUCT_PREFIX_RE.is_match(&block[..start]) {
            let step = block[start..].chars().next().map_or(1, char::len_utf8);
            from = start + step;
            continue;
        }
        return Some(caps);
    }
    None
}
