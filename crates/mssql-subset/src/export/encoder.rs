//! SQL literal encoding for exported column values.
//!
//! Values are rendered as T-SQL literal text in a locale-independent form.
//! Foreign key columns are rendered by the walker (as variables or lookup
//! subqueries); everything else goes through [`encode_literal`].

use crate::core::identifier::{bracket, quote_literal};
use crate::core::{ColumnRef, ColumnType, SqlValue, TableRef};
use crate::error::{ExportError, Result};

/// JPEG start-of-image marker.
const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

/// A 10x10 pixel JPEG used in place of real images when dummy substitution is enabled.
const DUMMY_JPEG_HEX: &str = concat!(
    "FFD8FFE000104A46494600010101012C012C0000FFFE00134372656174656420776974682047494D50",
    "FFE202B04943435F50524F46494C45000101000002A06C636D73043000006D6E74725247422058595A",
    "2007E500080012000C000A0015616373704D5346540000000000000000000000000000000000000000",
    "000000000000F6D6000100000000D32D6C636D73000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000D6465736300000120000000406370",
    "7274000001600000003677747074000001980000001463686164000001AC0000002C7258595A000001",
    "D8000000146258595A000001EC000000146758595A0000020000000014725452430000021400000020",
    "6754524300000214000000206254524300000214000000206368726D0000023400000024646D6E6400",
    "00025800000024646D64640000027C000000246D6C756300000000000000010000000C656E55530000",
    "00240000001C00470049004D00500020006200750069006C0074002D0069006E002000730052004700",
    "426D6C756300000000000000010000000C656E55530000001A0000001C005000750062006C00690063",
    "00200044006F006D00610069006E000058595A20000000000000F6D6000100000000D32D7366333200",
    "00000000010C42000005DEFFFFF325000007930000FD90FFFFFBA1FFFFFDA2000003DC0000C06E5859",
    "5A200000000000006FA0000038F50000039058595A20000000000000249F00000F840000B6C458595A",
    "2000000000000062970000B787000018D9706172610000000000030000000266660000F2A700000D59",
    "000013D000000A5B6368726D00000000000300000000A3D70000547C00004CCD0000999A0000266700",
    "000F5C6D6C756300000000000000010000000C656E5553000000080000001C00470049004D00506D6C",
    "756300000000000000010000000C656E5553000000080000001C0073005200470042FFDB0043000302",
    "020302020303030304030304050805050404050A070706080C0A0C0C0B0A0B0B0D0E12100D0E110E0B",
    "0B1016101113141515150C0F171816141812141514FFDB00430103040405040509050509140D0B0D14",
    "1414141414141414141414141414141414141414141414141414141414141414141414141414141414",
    "1414141414141414FFC2001108000A000A03011100021101031101FFC4001500010100000000000000",
    "000000000000000003FFC4001501010100000000000000000000000000000007FFDA000C0301000210",
    "03100000019CF65800FFC40014100100000000000000000000000000000020FFDA0008010100010502",
    "1FFFC40014110100000000000000000000000000000020FFDA0008010301013F011FFFC40014110100",
    "000000000000000000000000000020FFDA0008010201013F011FFFC400141001000000000000000000",
    "00000000000020FFDA0008010100063F021FFFC40014100100000000000000000000000000000020FF",
    "DA0008010100013F211FFFDA000C030100020003000000106DBFFFC400141101000000000000000000",
    "00000000000020FFDA0008010301013F101FFFC40014110100000000000000000000000000000020FF",
    "DA0008010201013F101FFFC40014100100000000000000000000000000000020FFDA0008010100013F",
    "101FFFD9",
);

/// Encode a non-foreign-key column value as a T-SQL literal.
///
/// # Errors
///
/// Returns `ExportError::ValueMismatch` when the value's variant does not
/// belong to `column_type`.
pub fn encode_literal(
    column: &ColumnRef,
    column_type: ColumnType,
    value: &SqlValue,
    dummy_files: bool,
) -> Result<String> {
    let literal = match (column_type, value) {
        (_, SqlValue::Null) => "null".to_string(),
        (ColumnType::String, SqlValue::Text(s)) => quote_literal(s),
        (ColumnType::BigInt, SqlValue::I64(v)) => v.to_string(),
        (ColumnType::Int, SqlValue::I32(v)) => v.to_string(),
        (ColumnType::Decimal, SqlValue::Decimal(d)) => d.to_string(),
        (ColumnType::Bit, SqlValue::Bool(b)) => if *b { "1" } else { "0" }.to_string(),
        (ColumnType::DateTime2, SqlValue::DateTime(dt)) => format!(
            "(select convert(datetime2, '{}'))",
            dt.format("%Y-%m-%dT%H:%M:%S%.f")
        ),
        (ColumnType::Binary, SqlValue::Bytes(bytes)) => binary_literal(bytes, dummy_files),
        (expected, found) => {
            return Err(ExportError::ValueMismatch {
                column: column.name.clone(),
                expected: expected.to_string(),
                found: found.kind().to_string(),
            })
        }
    };
    Ok(literal)
}

/// Render binary content as a `0x...` literal, substituting the canned JPEG
/// for JPEG content when `dummy_files` is set.
pub fn binary_literal(bytes: &[u8], dummy_files: bool) -> String {
    if dummy_files && bytes.starts_with(&JPEG_MAGIC) {
        return format!("0x{}", DUMMY_JPEG_HEX);
    }
    format!("0x{}", hex::encode_upper(bytes))
}

/// Correlated subquery resolving a reference by a stable lookup column.
pub fn lookup_subquery(
    table: &TableRef,
    id_column: &str,
    lookup_column: &str,
    lookup_value: &str,
) -> String {
    format!(
        "(select {} from {} where {} = {})",
        bracket(id_column),
        table,
        bracket(lookup_column),
        quote_literal(lookup_value)
    )
}
