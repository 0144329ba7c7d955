use bytes::{Buf, BufMut};

use crate::common::{Result, StorageError};

use super::{DataType, Date, Schema, Value};

/// One row of a table: a value per schema column, already checked against
/// the column types and widths.
///
/// ## Record Binary Format
///
/// ```text
/// +-----------------------------------+----------------------------+
/// | Offset Directory                  | Packed Values              |
/// | (column_count + 1) x i32          | (column order)             |
/// +-----------------------------------+----------------------------+
/// ```
///
/// Entry `i` of the offset directory is where value `i` starts and the last
/// entry is where the record ends, all relative to the record's first byte.
/// A value's length is the gap to the next entry, which is how VARCHAR
/// lengths are recovered. Integers are big-endian; strings are UTF-16 code
/// units, CHAR(n) padded with spaces to exactly n units.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Builds a record, rejecting wrong arity, wrong types and strings
    /// longer than their column allows.
    pub fn new(schema: &Schema, values: Vec<Value>) -> Result<Self> {
        check_values(schema, &values)?;
        Ok(Self { values })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, schema: &Schema, name: &str) -> Option<&Value> {
        schema.column_index(name).and_then(|i| self.values.get(i))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Encoded size in bytes, offset directory included.
    pub fn encoded_size(&self, schema: &Schema) -> usize {
        schema.offset_directory_size()
            + self
                .values
                .iter()
                .zip(schema.columns())
                .map(|(v, c)| value_size(v, c.data_type()))
                .sum::<usize>()
    }
}

/// Encodes `record` into `buf` starting at `pos` and returns the number of
/// bytes written.
pub fn write_record_to_buffer(
    schema: &Schema,
    record: &Record,
    buf: &mut [u8],
    pos: usize,
) -> Result<usize> {
    check_values(schema, &record.values)?;

    let size = record.encoded_size(schema);
    let available = buf.len().saturating_sub(pos);
    if size > available {
        return Err(StorageError::RecordTooLarge {
            size,
            capacity: available,
        });
    }

    let mut out = &mut buf[pos..pos + size];

    let mut offset = schema.offset_directory_size();
    for (value, column) in record.values.iter().zip(schema.columns()) {
        out.put_i32(offset as i32);
        offset += value_size(value, column.data_type());
    }
    out.put_i32(offset as i32);

    for (value, column) in record.values.iter().zip(schema.columns()) {
        match (value, column.data_type()) {
            (Value::Int(v), _) => out.put_i32(*v),
            (Value::Real(v), _) => out.put_f32(*v),
            (Value::Text(s), DataType::Char(n)) => {
                let mut units = 0;
                for unit in s.encode_utf16() {
                    out.put_u16(unit);
                    units += 1;
                }
                for _ in units..n as usize {
                    out.put_u16(b' ' as u16);
                }
            }
            (Value::Text(s), _) => {
                for unit in s.encode_utf16() {
                    out.put_u16(unit);
                }
            }
            (Value::Date(d), _) => {
                out.put_i32(d.day);
                out.put_i32(d.month);
                out.put_i32(d.year);
            }
        }
    }

    Ok(size)
}

/// Decodes the record of `schema` that starts at `pos` in `buf`.
pub fn read_record_from_buffer(schema: &Schema, buf: &[u8], pos: usize) -> Result<Record> {
    let directory_size = schema.offset_directory_size();
    if pos > buf.len() || buf.len() - pos < directory_size {
        return Err(StorageError::CorruptRecord(format!(
            "offset directory at {} runs past the buffer",
            pos
        )));
    }

    let mut header = &buf[pos..pos + directory_size];
    let offsets: Vec<usize> = (0..=schema.column_count())
        .map(|_| header.get_i32())
        .map(|o| usize::try_from(o).unwrap_or(usize::MAX))
        .collect();

    let end = offsets[schema.column_count()];
    if end > buf.len() - pos {
        return Err(StorageError::CorruptRecord(format!(
            "record at {} claims {} bytes",
            pos, end
        )));
    }

    let mut values = Vec::with_capacity(schema.column_count());
    for (i, column) in schema.columns().enumerate() {
        let (start, stop) = (offsets[i], offsets[i + 1]);
        if start < directory_size || start > stop || stop > end {
            return Err(StorageError::CorruptRecord(format!(
                "bad offsets {}..{} for column {}",
                start,
                stop,
                column.name()
            )));
        }
        let field = &buf[pos + start..pos + stop];
        values.push(decode_value(column.name(), column.data_type(), field)?);
    }

    Ok(Record { values })
}

fn decode_value(name: &str, data_type: DataType, mut field: &[u8]) -> Result<Value> {
    let bad_length = |len: usize| {
        StorageError::CorruptRecord(format!(
            "column {} ({}) has {} bytes",
            name, data_type, len
        ))
    };

    match data_type {
        DataType::Int | DataType::Real | DataType::Date | DataType::Char(_) => {
            if Some(field.len()) != data_type.fixed_size() {
                return Err(bad_length(field.len()));
            }
        }
        DataType::VarChar(_) => {
            if field.len() % 2 != 0 || field.len() > data_type.max_size() {
                return Err(bad_length(field.len()));
            }
        }
    }

    let value = match data_type {
        DataType::Int => Value::Int(field.get_i32()),
        DataType::Real => Value::Real(field.get_f32()),
        DataType::Date => {
            let day = field.get_i32();
            let month = field.get_i32();
            let year = field.get_i32();
            Value::Date(Date::new(day, month, year))
        }
        DataType::Char(_) => Value::Text(decode_utf16(name, field)?.trim_end_matches(' ').to_string()),
        DataType::VarChar(_) => Value::Text(decode_utf16(name, field)?),
    };
    Ok(value)
}

fn decode_utf16(name: &str, mut field: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(field.len() / 2);
    while field.has_remaining() {
        units.push(field.get_u16());
    }
    String::from_utf16(&units)
        .map_err(|_| StorageError::CorruptRecord(format!("column {} is not valid UTF-16", name)))
}

fn value_size(value: &Value, data_type: DataType) -> usize {
    match (value, data_type) {
        (Value::Text(s), DataType::VarChar(_)) => 2 * s.encode_utf16().count(),
        _ => data_type.max_size(),
    }
}

fn check_values(schema: &Schema, values: &[Value]) -> Result<()> {
    if values.len() != schema.column_count() {
        return Err(StorageError::ArityMismatch {
            expected: schema.column_count(),
            actual: values.len(),
        });
    }

    for (value, column) in values.iter().zip(schema.columns()) {
        let data_type = column.data_type();
        let matches = matches!(
            (value, data_type),
            (Value::Int(_), DataType::Int)
                | (Value::Real(_), DataType::Real)
                | (Value::Text(_), DataType::Char(_) | DataType::VarChar(_))
                | (Value::Date(_), DataType::Date)
        );
        if !matches {
            return Err(StorageError::TypeMismatch {
                column: column.name().to_string(),
                expected: data_type,
                found: value.type_name(),
            });
        }

        if let (Value::Text(s), Some(max)) = (value, data_type.width()) {
            let len = s.encode_utf16().count();
            if len > max {
                return Err(StorageError::ValueTooLong {
                    column: column.name().to_string(),
                    max,
                    len,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Int)
            .column("score", DataType::Real)
            .column("code", DataType::Char(5))
            .column("name", DataType::VarChar(10))
            .column("born", DataType::Date)
            .build()
    }

    fn mixed_record(schema: &Schema) -> Record {
        Record::new(
            schema,
            vec![
                Value::Int(42),
                Value::Real(3.5),
                Value::from("ab"),
                Value::from("héllo"),
                Value::Date(Date::new(14, 7, 1989)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_mixed_record_roundtrip() {
        let schema = mixed_schema();
        let record = mixed_record(&schema);

        let mut page = vec![0u8; 256];
        let written = write_record_to_buffer(&schema, &record, &mut page, 17).unwrap();
        assert_eq!(written, record.encoded_size(&schema));

        let decoded = read_record_from_buffer(&schema, &page, 17).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_encoded_layout() {
        let schema = mixed_schema();
        let record = mixed_record(&schema);
        // 24 directory bytes + 4 + 4 + 10 + 2 * 5 + 12
        assert_eq!(record.encoded_size(&schema), 64);

        let mut buf = vec![0u8; 64];
        write_record_to_buffer(&schema, &record, &mut buf, 0).unwrap();
        let offsets: Vec<i32> = buf[..24]
            .chunks(4)
            .map(|c| i32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(offsets, vec![24, 28, 32, 42, 52, 64]);
        assert_eq!(&buf[24..28], &42i32.to_be_bytes());
        // CHAR(5) "ab" is padded with three spaces
        assert_eq!(&buf[36..42], &[0, b' ', 0, b' ', 0, b' ']);
    }

    #[test]
    fn test_char_trimmed_on_read() {
        let schema = Schema::builder().column("c", DataType::Char(4)).build();
        let record = Record::new(&schema, vec![Value::from("x")]).unwrap();
        let mut buf = vec![0u8; 32];
        write_record_to_buffer(&schema, &record, &mut buf, 0).unwrap();
        let decoded = read_record_from_buffer(&schema, &buf, 0).unwrap();
        assert_eq!(decoded.value(0).unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_empty_varchar() {
        let schema = Schema::builder()
            .column("v", DataType::VarChar(3))
            .column("n", DataType::Int)
            .build();
        let record = Record::new(&schema, vec![Value::from(""), Value::Int(-1)]).unwrap();
        let mut buf = vec![0u8; 32];
        write_record_to_buffer(&schema, &record, &mut buf, 0).unwrap();
        assert_eq!(read_record_from_buffer(&schema, &buf, 0).unwrap(), record);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let schema = mixed_schema();
        let result = Record::new(
            &schema,
            vec![
                Value::Real(1.0),
                Value::Real(3.5),
                Value::from("ab"),
                Value::from("x"),
                Value::Date(Date::new(1, 1, 2000)),
            ],
        );
        assert!(matches!(
            result,
            Err(StorageError::TypeMismatch { ref column, found: "REAL", .. }) if column == "id"
        ));
    }

    #[test]
    fn test_too_long_rejected() {
        let schema = mixed_schema();
        let result = Record::new(
            &schema,
            vec![
                Value::Int(1),
                Value::Real(3.5),
                Value::from("abcdef"),
                Value::from("x"),
                Value::Date(Date::new(1, 1, 2000)),
            ],
        );
        assert!(matches!(
            result,
            Err(StorageError::ValueTooLong { max: 5, len: 6, .. })
        ));
    }

    #[test]
    fn test_arity_rejected() {
        let schema = mixed_schema();
        assert!(matches!(
            Record::new(&schema, vec![Value::Int(1)]),
            Err(StorageError::ArityMismatch { expected: 5, actual: 1 })
        ));
    }

    #[test]
    fn test_write_past_buffer_rejected() {
        let schema = mixed_schema();
        let record = mixed_record(&schema);
        let mut buf = vec![0u8; 80];
        assert!(matches!(
            write_record_to_buffer(&schema, &record, &mut buf, 40),
            Err(StorageError::RecordTooLarge { size: 64, capacity: 40 })
        ));
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_corrupt_offsets_rejected() {
        let schema = Schema::builder().column("n", DataType::Int).build();
        let mut buf = vec![0u8; 16];
        buf[..4].copy_from_slice(&8i32.to_be_bytes());
        buf[4..8].copy_from_slice(&100i32.to_be_bytes());
        assert!(matches!(
            read_record_from_buffer(&schema, &buf, 0),
            Err(StorageError::CorruptRecord(_))
        ));
    }
}
