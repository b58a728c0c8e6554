//! Binary spreadsheet format.
//!
//! All integers and floats are little-endian.
//!
//! ```text
//! i64  checksum     FNV-1a (32-bit, zero-extended) of every byte after this field
//! i64  cell_count
//!      cell_count x { i32 col, i32 row, expr }
//! i64  edge_count
//!      edge_count x { i32 col, i32 row (source), i32 col, i32 row (dependent) }
//! ```
//!
//! Expressions are written in pre-order, one tagged node at a time. A call
//! node is followed directly by its arguments; the arity of the function
//! code says how many, so there is no end marker.

use cellgrid_engine::engine::{
    CellRange, CellRef, Expr, ExprBuilder, FunctionKind, MAX_DEPTH, ParseError, Position,
    StackBuilder,
};

use super::checksum::fnv1a32;
use crate::error::{Result, SheetError};

/// Length of the checksum field.
pub const HEADER_LEN: usize = 8;

mod tag {
    pub const EMPTY: i8 = 0;
    pub const NUMBER: i8 = 1;
    pub const TEXT: i8 = 2;
    pub const REFERENCE: i8 = 3;
    pub const RANGE: i8 = 4;
    pub const CALL: i8 = 5;
}

/// Decoded file contents, before any semantic validation.
#[derive(Debug, Default, PartialEq)]
pub struct Snapshot {
    pub cells: Vec<(Position, Expr)>,
    pub edges: Vec<(Position, Position)>,
}

/// Encode cells and `(source, dependent)` edges, checksum included.
pub fn encode<'a, C, E>(cells: C, edges: E) -> Result<Vec<u8>>
where
    C: ExactSizeIterator<Item = (Position, &'a Expr)>,
    E: ExactSizeIterator<Item = (Position, Position)>,
{
    let mut out = Encoder::default();
    out.put_i64(0);

    out.put_count(cells.len());
    for (pos, expr) in cells {
        if contains_nul(expr) {
            return Err(SheetError::Unencodable(pos));
        }
        out.put_position(pos);
        out.put_expr(expr);
    }

    out.put_count(edges.len());
    for (source, dependent) in edges {
        out.put_position(source);
        out.put_position(dependent);
    }

    let mut bytes = out.buf;
    let checksum = i64::from(fnv1a32(&bytes[HEADER_LEN..]));
    bytes[..HEADER_LEN].copy_from_slice(&checksum.to_le_bytes());
    Ok(bytes)
}

/// Verify the checksum and decode the payload.
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(SheetError::Corrupt(format!(
            "{} bytes is too short for a header",
            bytes.len()
        )));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    let mut raw = [0u8; HEADER_LEN];
    raw.copy_from_slice(header);
    let stored = i64::from_le_bytes(raw) as u64;
    let computed = u64::from(fnv1a32(body));
    if stored != computed {
        return Err(SheetError::ChecksumMismatch { stored, computed });
    }

    let mut decoder = Decoder {
        bytes: body,
        offset: 0,
    };
    let mut snapshot = Snapshot::default();

    for _ in 0..decoder.count()? {
        let pos = decoder.position()?;
        let expr = decoder.expr()?;
        snapshot.cells.push((pos, expr));
    }
    for _ in 0..decoder.count()? {
        let source = decoder.position()?;
        let dependent = decoder.position()?;
        snapshot.edges.push((source, dependent));
    }

    if decoder.offset != body.len() {
        return Err(SheetError::Corrupt(format!(
            "{} trailing bytes",
            body.len() - decoder.offset
        )));
    }
    Ok(snapshot)
}

fn contains_nul(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |node| {
        if let Expr::Text(text) = node {
            found |= text.contains('\0');
        }
    });
    found
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn put_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_count(&mut self, count: usize) {
        self.put_i64(count as i64);
    }

    fn put_position(&mut self, pos: Position) {
        self.put_i32(pos.col);
        self.put_i32(pos.row);
    }

    fn put_cell_ref(&mut self, cell_ref: &CellRef) {
        self.put_position(cell_ref.pos);
        self.put_i8(i8::from(cell_ref.col_abs));
        self.put_i8(i8::from(cell_ref.row_abs));
    }

    fn put_expr(&mut self, expr: &Expr) {
        expr.walk(&mut |node| match node {
            Expr::Empty => self.put_i8(tag::EMPTY),
            Expr::Number(n) => {
                self.put_i8(tag::NUMBER);
                self.buf.extend_from_slice(&n.to_le_bytes());
            }
            Expr::Text(text) => {
                self.put_i8(tag::TEXT);
                self.buf.extend_from_slice(text.as_bytes());
                self.buf.push(0);
            }
            Expr::Reference(cell_ref) => {
                self.put_i8(tag::REFERENCE);
                self.put_cell_ref(cell_ref);
            }
            Expr::Range(range) => {
                self.put_i8(tag::RANGE);
                self.put_cell_ref(&range.start);
                self.put_cell_ref(&range.end);
            }
            Expr::Call(call) => {
                self.put_i8(tag::CALL);
                self.put_i8(call.kind().code());
            }
        });
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Decoder<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self
            .offset
            .checked_add(N)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| self.corrupt("unexpected end of data"))?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.bytes[self.offset..end]);
        self.offset = end;
        Ok(raw)
    }

    fn i8(&mut self) -> Result<i8> {
        self.take().map(i8::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64> {
        self.take().map(i64::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64> {
        self.take().map(f64::from_le_bytes)
    }

    fn count(&mut self) -> Result<usize> {
        let count = self.i64()?;
        usize::try_from(count).map_err(|_| self.corrupt(&format!("invalid count {count}")))
    }

    fn flag(&mut self) -> Result<bool> {
        match self.i8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.corrupt(&format!("invalid absolute flag {other}"))),
        }
    }

    fn text(&mut self) -> Result<String> {
        let rest = &self.bytes[self.offset..];
        let len = rest
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| self.corrupt("unterminated text"))?;
        let text = String::from_utf8(rest[..len].to_vec())
            .map_err(|_| self.corrupt("text is not valid UTF-8"))?;
        self.offset += len + 1;
        Ok(text)
    }

    fn position(&mut self) -> Result<Position> {
        let col = self.i32()?;
        let row = self.i32()?;
        Ok(Position::new(col, row))
    }

    fn cell_ref(&mut self) -> Result<CellRef> {
        let pos = self.position()?;
        let col_abs = self.flag()?;
        let row_abs = self.flag()?;
        Ok(CellRef::with_flags(pos, col_abs, row_abs))
    }

    /// Read one pre-order expression, rebuilding it through a [`StackBuilder`].
    fn expr(&mut self) -> Result<Expr> {
        let mut builder = StackBuilder::new();
        // Calls still waiting for arguments, with the number they lack.
        let mut open: Vec<(FunctionKind, usize)> = Vec::new();

        loop {
            match self.i8()? {
                tag::EMPTY => builder.push_empty(),
                tag::NUMBER => builder.push_number(self.f64()?),
                tag::TEXT => builder.push_text(self.text()?),
                tag::REFERENCE => builder.push_cell_ref(self.cell_ref()?),
                tag::RANGE => {
                    let start = self.cell_ref()?;
                    let end = self.cell_ref()?;
                    builder.push_cell_range(CellRange::new(start, end));
                }
                tag::CALL => {
                    let code = self.i8()?;
                    let kind = FunctionKind::from_code(code)
                        .ok_or_else(|| self.invalid(ParseError::UnknownFunctionCode(code)))?;
                    if open.len() >= MAX_DEPTH {
                        return Err(self.invalid(ParseError::TooDeep(MAX_DEPTH)));
                    }
                    open.push((kind, kind.arity()));
                    continue;
                }
                other => return Err(self.corrupt(&format!("unknown expression tag {other}"))),
            }

            // A subtree is complete; close every call it was the last argument of.
            loop {
                let Some(top) = open.last_mut() else {
                    return builder.finish().map_err(|err| self.invalid(err));
                };
                if top.1 > 1 {
                    top.1 -= 1;
                    break;
                }
                let (kind, _) = *top;
                open.pop();
                builder.push_call(kind).map_err(|err| self.invalid(err))?;
            }
        }
    }

    fn corrupt(&self, message: &str) -> SheetError {
        SheetError::Corrupt(format!("{message} at offset {}", self.offset + HEADER_LEN))
    }

    fn invalid(&self, err: ParseError) -> SheetError {
        self.corrupt(&err.to_string())
    }
}
