use std::io::Cursor;

use crate::TransferError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A scalar cell value from the source table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Renders the value as CSV field text.
    ///
    /// Nulls become empty fields and booleans are written `True`/`False`,
    /// which is what existing datasets on the platform already contain.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => render_float(*v),
            Value::Text(s) => s.clone(),
        }
    }
}

/// Shortest round-trip float text. Whole numbers keep a `.0`, and values
/// below 1e-4 or from 1e16 up switch to exponent form with a signed, two-digit
/// minimum exponent (`1e-07`, `1.5e+300`).
fn render_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.into();
    }
    if v == 0.0 {
        return format!("{v:.1}");
    }

    let sci = format!("{v:e}");
    let Some((mantissa, exp)) = sci
        .split_once('e')
        .and_then(|(m, e)| e.parse::<i32>().ok().map(|e| (m, e)))
    else {
        return v.to_string();
    };

    if (-4..16).contains(&exp) {
        if v.fract() == 0.0 {
            format!("{v:.1}")
        } else {
            v.to_string()
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One source row: column names mapped to values, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, keeping the original position if the
    /// column already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

// ---------------------------------------------------------------------------
// PayloadBuffer
// ---------------------------------------------------------------------------

/// An encoded CSV snapshot, header line first.
///
/// The byte length is fixed when the buffer is built and is the size every
/// `Content-Range` header refers to.
#[derive(Debug, Clone)]
pub struct PayloadBuffer {
    data: Vec<u8>,
    columns: Vec<String>,
    rows: usize,
}

impl PayloadBuffer {
    /// Encoded size in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Header columns, in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows (the header is not counted).
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Returns a seekable reader positioned at the first byte.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.data)
    }
}

/// Encodes `records` into a CSV payload.
///
/// The first record decides the header. Later records are looked up by column
/// name: missing columns become empty fields and extra columns are dropped.
pub fn encode_records(records: &[Record]) -> Result<PayloadBuffer, TransferError> {
    let first = records.first().ok_or(TransferError::EmptyInput)?;
    let columns: Vec<String> = first.column_names().map(str::to_string).collect();

    let mut data = Vec::new();
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(&mut data);
    writer.write_record(&columns)?;

    let mut mismatched = 0usize;
    for record in records {
        if record.len() != columns.len()
            || record.column_names().any(|n| !columns.iter().any(|c| c == n))
        {
            mismatched += 1;
        }
        writer.write_record(
            columns
                .iter()
                .map(|c| record.get(c).map(Value::render).unwrap_or_default()),
        )?;
    }

    writer.flush()?;
    drop(writer);

    if mismatched > 0 {
        tracing::warn!(
            rows = mismatched,
            columns = columns.len(),
            "records do not match the header columns"
        );
    }

    tracing::debug!(
        rows = records.len(),
        columns = columns.len(),
        bytes = data.len(),
        "payload encoded"
    );

    Ok(PayloadBuffer {
        data,
        columns,
        rows: records.len(),
    })
}
