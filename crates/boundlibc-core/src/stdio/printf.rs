//! printf formatting engine.
//!
//! Parses a byte-oriented control string into literal runs and `%`
//! directives, then renders typed arguments into a [`Sink`]. The engine is
//! what the guarded writers build on, so it refuses rather than guesses:
//!
//! - `%n` never executes. In the control string it is a [`RenderError::WriteDirective`];
//!   inside a `%s` argument it is a [`RenderError::EmbeddedWrite`].
//! - A directive that does not parse is [`RenderError::Malformed`], not a literal.
//! - A missing argument, or one of the wrong kind, is an error rather than
//!   a read of whatever happens to be next.
//!
//! Strings (control and `%s` data) end at their first NUL byte, if any.

use boundlibc_membrane::{BufferRole, ViolationKind};

// ---------------------------------------------------------------------------
// Directives
// ---------------------------------------------------------------------------

/// Flags of one directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub left_justify: bool, // '-'
    pub force_sign: bool,   // '+'
    pub space_sign: bool,   // ' '
    pub alt_form: bool,     // '#'
    pub zero_pad: bool,     // '0'
}

/// Width or precision as written in the directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Absent,
    Fixed(usize),
    /// `*`: taken from the next argument.
    FromArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMod {
    None,
    Hh,
    H,
    L,
    Ll,
    Z,
    T,
    J,
    BigL,
}

/// One parsed `%` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub flags: Flags,
    pub width: Count,
    pub precision: Count,
    pub length: LengthMod,
    pub conversion: u8,
}

impl Directive {
    /// `%n`: stores the output count through a pointer argument.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        self.conversion == b'n'
    }
}

/// A piece of a parsed control string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a [u8]),
    /// `%%`.
    Percent,
    Directive(Directive),
    /// A `%` at `offset` that does not start a valid directive.
    Malformed { offset: usize },
}

const CONVERSIONS: &[u8] = b"diuoxXcspnfFeEgG";

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn eat(&mut self, b: u8) -> bool {
        let hit = self.peek() == Some(b);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn number(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        (self.pos > start).then(|| {
            self.bytes[start..self.pos].iter().fold(0usize, |acc, &d| {
                acc.saturating_mul(10).saturating_add(usize::from(d - b'0'))
            })
        })
    }

    fn count(&mut self) -> Count {
        if self.eat(b'*') {
            Count::FromArg
        } else {
            self.number().map_or(Count::Absent, Count::Fixed)
        }
    }
}

/// Parse one directive from the bytes following a `%`.
///
/// Returns the directive and the number of bytes it spans, or `None` if the
/// bytes do not form a supported directive.
#[must_use]
pub fn parse_directive(fmt: &[u8]) -> Option<(Directive, usize)> {
    let mut cur = Cursor::new(fmt);

    let mut flags = Flags::default();
    loop {
        match cur.peek() {
            Some(b'-') => flags.left_justify = true,
            Some(b'+') => flags.force_sign = true,
            Some(b' ') => flags.space_sign = true,
            Some(b'#') => flags.alt_form = true,
            Some(b'0') => flags.zero_pad = true,
            _ => break,
        }
        cur.pos += 1;
    }
    // '+' overrides ' ', '-' overrides '0'.
    if flags.force_sign {
        flags.space_sign = false;
    }
    if flags.left_justify {
        flags.zero_pad = false;
    }

    let width = cur.count();
    let precision = if cur.eat(b'.') {
        match cur.count() {
            Count::Absent => Count::Fixed(0),
            count => count,
        }
    } else {
        Count::Absent
    };

    let length = if cur.eat(b'h') {
        if cur.eat(b'h') { LengthMod::Hh } else { LengthMod::H }
    } else if cur.eat(b'l') {
        if cur.eat(b'l') { LengthMod::Ll } else { LengthMod::L }
    } else if cur.eat(b'z') {
        LengthMod::Z
    } else if cur.eat(b't') {
        LengthMod::T
    } else if cur.eat(b'j') {
        LengthMod::J
    } else if cur.eat(b'L') {
        LengthMod::BigL
    } else {
        LengthMod::None
    };

    let conversion = cur.bump()?;
    if !CONVERSIONS.contains(&conversion) {
        return None;
    }
    Some((
        Directive {
            flags,
            width,
            precision,
            length,
            conversion,
        },
        cur.pos,
    ))
}

/// Split a control string into pieces.
#[must_use]
pub fn parse_format(fmt: &[u8]) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = fmt;
    let mut offset = 0;

    while !rest.is_empty() {
        let run = rest.iter().position(|&b| b == b'%').unwrap_or(rest.len());
        if run > 0 {
            pieces.push(Piece::Literal(&rest[..run]));
            rest = &rest[run..];
            offset += run;
            continue;
        }
        // rest starts with '%'.
        let after = &rest[1..];
        if after.first() == Some(&b'%') {
            pieces.push(Piece::Percent);
            rest = &after[1..];
            offset += 2;
        } else if let Some((directive, used)) = parse_directive(after) {
            pieces.push(Piece::Directive(directive));
            rest = &after[used..];
            offset += 1 + used;
        } else {
            pieces.push(Piece::Malformed { offset });
            rest = after;
            offset += 1;
        }
    }
    pieces
}

/// Whether `bytes`, read as a control string, holds a `%n` directive.
///
/// `%%n` is a literal and does not count. The scan is wider than the
/// directives this engine renders: argument positions (`%2$n`) and any run
/// of flag, width, precision and length characters before the `n` count,
/// since the text may reach a formatter that accepts them.
#[must_use]
pub fn contains_write_directive(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'%') {
            i += 2;
            continue;
        }
        let rest = &bytes[i + 1..];
        let skipped = rest
            .iter()
            .take_while(|&&b| b"0123456789$*.-+ #'hlLjztqI".contains(&b))
            .count();
        if rest.get(skipped) == Some(&b'n') {
            return true;
        }
        i += 1 + skipped;
    }
    false
}

/// The bytes of `s` before its first NUL.
#[must_use]
pub fn c_str(s: &[u8]) -> &[u8] {
    s.iter().position(|&b| b == 0).map_or(s, |end| &s[..end])
}

// ---------------------------------------------------------------------------
// Arguments and errors
// ---------------------------------------------------------------------------

/// One argument of a formatted write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    /// `None` is a null string pointer.
    Str(Option<&'a [u8]>),
    Ptr(usize),
}

impl From<i32> for Arg<'_> {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Arg<'_> {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Arg<'_> {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<u64> for Arg<'_> {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for Arg<'_> {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<'a> From<&'a [u8]> for Arg<'a> {
    fn from(s: &'a [u8]) -> Self {
        Self::Str(Some(s))
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(Some(s.as_bytes()))
    }
}

/// Why a control string and argument list could not be rendered.
///
/// Argument positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("invalid directive at offset {offset}")]
    Malformed { offset: usize },
    #[error("fmt contains %n")]
    WriteDirective,
    #[error("missing argument {index} for %{conversion}")]
    MissingArgument { index: usize, conversion: char },
    #[error("argument {index} does not match %{conversion}")]
    Mismatch { index: usize, conversion: char },
    #[error("argument {index} is null")]
    NullString { index: usize },
    #[error("argument {index} contains %n")]
    EmbeddedWrite { index: usize },
}

impl RenderError {
    #[must_use]
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::NullString { .. } => ViolationKind::NullArgument,
            _ => ViolationKind::InvalidArgument,
        }
    }

    /// The input at fault.
    #[must_use]
    pub fn role(&self) -> BufferRole {
        match self {
            Self::Malformed { .. } | Self::WriteDirective => BufferRole::Format,
            Self::MissingArgument { index, .. }
            | Self::Mismatch { index, .. }
            | Self::NullString { index }
            | Self::EmbeddedWrite { index } => BufferRole::Argument(*index),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Output buffer that keeps at most `limit` bytes but counts everything.
#[derive(Debug)]
pub struct Sink {
    bytes: Vec<u8>,
    limit: usize,
    total: usize,
}

impl Sink {
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(limit.min(256)),
            limit,
            total: 0,
        }
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self::bounded(usize::MAX)
    }

    pub fn push(&mut self, bytes: &[u8]) {
        let keep = bytes.len().min(self.room());
        self.bytes.extend_from_slice(&bytes[..keep]);
        self.total = self.total.saturating_add(bytes.len());
    }

    pub fn fill(&mut self, byte: u8, count: usize) {
        let keep = count.min(self.room());
        self.bytes.resize(self.bytes.len() + keep, byte);
        self.total = self.total.saturating_add(count);
    }

    /// Bytes the full rendering would produce.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Bytes actually kept.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn truncated(&self) -> bool {
        self.total > self.bytes.len()
    }

    fn room(&self) -> usize {
        self.limit.saturating_sub(self.bytes.len())
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Reject malformed and `%n` directives in a parsed control string.
pub fn check_control(pieces: &[Piece<'_>]) -> Result<(), RenderError> {
    for piece in pieces {
        match piece {
            Piece::Malformed { offset } => {
                return Err(RenderError::Malformed { offset: *offset });
            }
            Piece::Directive(d) if d.is_write() => return Err(RenderError::WriteDirective),
            _ => {}
        }
    }
    Ok(())
}

/// Render `fmt` with `args` into `out`.
///
/// The control string is checked in full before any argument is consumed.
/// Surplus arguments are ignored.
pub fn render(fmt: &[u8], args: &[Arg<'_>], out: &mut Sink) -> Result<(), RenderError> {
    let pieces = parse_format(c_str(fmt));
    check_control(&pieces)?;

    let mut args = ArgList { list: args, next: 0 };
    for piece in &pieces {
        match piece {
            Piece::Literal(bytes) => out.push(bytes),
            Piece::Percent => out.push(b"%"),
            Piece::Directive(d) => render_directive(d, &mut args, out)?,
            Piece::Malformed { offset } => {
                return Err(RenderError::Malformed { offset: *offset });
            }
        }
    }
    Ok(())
}

struct ArgList<'s, 'a> {
    list: &'s [Arg<'a>],
    next: usize,
}

impl<'a> ArgList<'_, 'a> {
    fn take(&mut self, conversion: u8) -> Result<(usize, Arg<'a>), RenderError> {
        let index = self.next + 1;
        let arg = self
            .list
            .get(self.next)
            .copied()
            .ok_or(RenderError::MissingArgument {
                index,
                conversion: char::from(conversion),
            })?;
        self.next += 1;
        Ok((index, arg))
    }

    fn take_count(&mut self, conversion: u8) -> Result<i64, RenderError> {
        match self.take(conversion)? {
            (_, Arg::Int(v)) => Ok(v),
            (_, Arg::Uint(v)) => Ok(i64::try_from(v).unwrap_or(i64::MAX)),
            (index, _) => Err(RenderError::Mismatch {
                index,
                conversion: '*',
            }),
        }
    }
}

/// A directive with `*` counts resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spec {
    pub flags: Flags,
    pub width: usize,
    pub precision: Option<usize>,
    pub conversion: u8,
}

impl Spec {
    #[must_use]
    pub fn new(conversion: u8) -> Self {
        Self {
            flags: Flags::default(),
            width: 0,
            precision: None,
            conversion,
        }
    }
}

fn render_directive(
    d: &Directive,
    args: &mut ArgList<'_, '_>,
    out: &mut Sink,
) -> Result<(), RenderError> {
    let mut spec = Spec {
        flags: d.flags,
        width: 0,
        precision: None,
        conversion: d.conversion,
    };
    match d.width {
        Count::Fixed(w) => spec.width = w,
        Count::FromArg => {
            let w = args.take_count(d.conversion)?;
            // A negative width is a '-' flag plus a positive width.
            if w < 0 {
                spec.flags.left_justify = true;
                spec.flags.zero_pad = false;
            }
            spec.width = usize::try_from(w.unsigned_abs()).unwrap_or(usize::MAX);
        }
        Count::Absent => {}
    }
    match d.precision {
        Count::Fixed(p) => spec.precision = Some(p),
        // A negative precision is taken as if omitted.
        Count::FromArg => spec.precision = usize::try_from(args.take_count(d.conversion)?).ok(),
        Count::Absent => {}
    }

    let (index, arg) = args.take(d.conversion)?;
    match (d.conversion, arg) {
        (b'd' | b'i', Arg::Int(v)) => format_signed(narrow_signed(v, d.length), &spec, out),
        (b'd' | b'i', Arg::Uint(v)) => {
            format_signed(narrow_signed(v as i64, d.length), &spec, out);
        }
        (b'u' | b'o' | b'x' | b'X', Arg::Uint(v)) => {
            format_unsigned(narrow_unsigned(v, d.length), &spec, out);
        }
        (b'u' | b'o' | b'x' | b'X', Arg::Int(v)) => {
            format_unsigned(narrow_unsigned(v as u64, d.length), &spec, out);
        }
        (b'c', Arg::Char(c)) => format_char(c, &spec, out),
        (b'c', Arg::Int(v)) => format_char(v as u8, &spec, out),
        (b's', Arg::Str(None)) => return Err(RenderError::NullString { index }),
        (b's', Arg::Str(Some(s))) => {
            let s = c_str(s);
            if contains_write_directive(s) {
                return Err(RenderError::EmbeddedWrite { index });
            }
            format_str(s, &spec, out);
        }
        (b'p', Arg::Ptr(addr)) => format_pointer(addr, &spec, out),
        (b'p', Arg::Uint(v)) => format_pointer(v as usize, &spec, out),
        (b'f' | b'F' | b'e' | b'E' | b'g' | b'G', Arg::Float(v)) => format_float(v, &spec, out),
        _ => {
            return Err(RenderError::Mismatch {
                index,
                conversion: char::from(d.conversion),
            });
        }
    }
    Ok(())
}

// Arguments already carry their width; only `hh` and `h` narrow.
fn narrow_signed(v: i64, length: LengthMod) -> i64 {
    match length {
        LengthMod::Hh => i64::from(v as i8),
        LengthMod::H => i64::from(v as i16),
        _ => v,
    }
}

fn narrow_unsigned(v: u64, length: LengthMod) -> u64 {
    match length {
        LengthMod::Hh => u64::from(v as u8),
        LengthMod::H => u64::from(v as u16),
        _ => v,
    }
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Lay out `lead` (sign and radix prefix), `zeros` and `body` in the field.
fn emit(out: &mut Sink, spec: &Spec, lead: &[u8], zeros: usize, body: &[u8], zero_fill: bool) {
    emit_parts(out, spec, lead, zeros, (body, 0, b""), zero_fill);
}

/// [`emit`] with a body of `digits`, `tail` zero digits and `suffix`.
fn emit_parts(
    out: &mut Sink,
    spec: &Spec,
    lead: &[u8],
    zeros: usize,
    (digits, tail, suffix): (&[u8], usize, &[u8]),
    zero_fill: bool,
) {
    let content = (lead.len() + digits.len() + suffix.len())
        .saturating_add(zeros)
        .saturating_add(tail);
    let pad = spec.width.saturating_sub(content);
    let body = |out: &mut Sink| {
        out.push(digits);
        out.fill(b'0', tail);
        out.push(suffix);
    };
    if spec.flags.left_justify {
        out.push(lead);
        out.fill(b'0', zeros);
        body(out);
        out.fill(b' ', pad);
    } else if zero_fill && spec.flags.zero_pad {
        out.push(lead);
        out.fill(b'0', zeros.saturating_add(pad));
        body(out);
    } else {
        out.fill(b' ', pad);
        out.push(lead);
        out.fill(b'0', zeros);
        body(out);
    }
}

fn sign(negative: bool, flags: &Flags) -> &'static [u8] {
    if negative {
        b"-"
    } else if flags.force_sign {
        b"+"
    } else if flags.space_sign {
        b" "
    } else {
        b""
    }
}

/// Right-aligned digit scratch space.
struct Digits([u8; 64]);

impl Digits {
    fn new() -> Self {
        Self([0; 64])
    }

    fn render(&mut self, mut value: u64, base: u64, uppercase: bool) -> &[u8] {
        let alpha = if uppercase { b'A' } else { b'a' };
        let mut pos = self.0.len();
        loop {
            pos -= 1;
            let digit = (value % base) as u8;
            self.0[pos] = if digit < 10 {
                b'0' + digit
            } else {
                alpha + (digit - 10)
            };
            value /= base;
            if value == 0 {
                break;
            }
        }
        &self.0[pos..]
    }
}

/// `%d` / `%i`.
pub fn format_signed(value: i64, spec: &Spec, out: &mut Sink) {
    let mut digits = Digits::new();
    let precision = spec.precision.unwrap_or(1);
    let body = if value == 0 && precision == 0 {
        &[][..]
    } else {
        digits.render(value.unsigned_abs(), 10, false)
    };
    let zeros = precision.saturating_sub(body.len());
    let lead = sign(value < 0, &spec.flags);
    // With an explicit precision the '0' flag is ignored.
    emit(out, spec, lead, zeros, body, spec.precision.is_none());
}

/// `%u`, `%o`, `%x`, `%X`.
pub fn format_unsigned(value: u64, spec: &Spec, out: &mut Sink) {
    let (base, uppercase) = match spec.conversion {
        b'o' => (8, false),
        b'x' => (16, false),
        b'X' => (16, true),
        _ => (10, false),
    };
    let mut digits = Digits::new();
    let precision = spec.precision.unwrap_or(1);
    let body = if value == 0 && precision == 0 {
        &[][..]
    } else {
        digits.render(value, base, uppercase)
    };
    let mut zeros = precision.saturating_sub(body.len());
    let alt = spec.flags.alt_form;
    let lead: &[u8] = match spec.conversion {
        b'x' if alt && value != 0 => b"0x",
        b'X' if alt && value != 0 => b"0X",
        _ => b"",
    };
    // '#' with 'o' forces a leading zero digit.
    if alt && spec.conversion == b'o' && zeros == 0 && body.first() != Some(&b'0') {
        zeros = 1;
    }
    emit(out, spec, lead, zeros, body, spec.precision.is_none());
}

/// `%c`.
pub fn format_char(c: u8, spec: &Spec, out: &mut Sink) {
    emit(out, spec, b"", 0, &[c], false);
}

/// `%s`. Precision truncates.
pub fn format_str(s: &[u8], spec: &Spec, out: &mut Sink) {
    let s = spec.precision.map_or(s, |p| &s[..s.len().min(p)]);
    emit(out, spec, b"", 0, s, false);
}

/// `%p`: `0x` hex, or `(nil)` for address zero.
pub fn format_pointer(addr: usize, spec: &Spec, out: &mut Sink) {
    if addr == 0 {
        return emit(out, spec, b"", 0, b"(nil)", false);
    }
    let mut digits = Digits::new();
    let body = digits.render(addr as u64, 16, false);
    emit(out, spec, b"0x", 0, body, false);
}

/// Fractional digits rendered exactly. An `f64` has at most 1074 fractional
/// and 767 significant decimal digits, so every digit past this is a zero.
const EXACT_DIGITS: usize = 1100;

/// Rendered float: `digits`, then `zeros` zero digits, then `suffix`.
struct FloatText {
    digits: String,
    zeros: usize,
    suffix: String,
}

impl FloatText {
    fn plain(digits: String) -> Self {
        Self {
            digits,
            zeros: 0,
            suffix: String::new(),
        }
    }

    /// Without `#`, `%g` drops trailing fractional zeros and a bare point.
    fn stripped(self) -> Self {
        Self::plain(format!(
            "{}{}",
            strip_trailing_zeros(&self.digits),
            self.suffix
        ))
    }
}

/// `%f`, `%e`, `%g` and their uppercase forms.
pub fn format_float(value: f64, spec: &Spec, out: &mut Sink) {
    let uppercase = spec.conversion.is_ascii_uppercase();
    if !value.is_finite() {
        let word: &[u8] = match (value.is_nan(), uppercase) {
            (true, false) => b"nan",
            (true, true) => b"NAN",
            (false, false) => b"inf",
            (false, true) => b"INF",
        };
        let lead = sign(value.is_sign_negative() && !value.is_nan(), &spec.flags);
        return emit(out, spec, lead, 0, word, false);
    }

    let precision = spec.precision.unwrap_or(6);
    let alt = spec.flags.alt_form;
    let magnitude = value.abs();
    let text = match spec.conversion.to_ascii_lowercase() {
        b'e' => exponential(magnitude, precision, uppercase, alt),
        b'g' => general(magnitude, precision, uppercase, alt),
        _ => fixed(magnitude, precision, alt),
    };
    let lead = sign(value.is_sign_negative(), &spec.flags);
    emit_parts(
        out,
        spec,
        lead,
        0,
        (text.digits.as_bytes(), text.zeros, text.suffix.as_bytes()),
        true,
    );
}

fn fixed(value: f64, precision: usize, alt: bool) -> FloatText {
    let exact = precision.min(EXACT_DIGITS);
    let mut digits = format!("{value:.exact$}");
    if alt && precision == 0 {
        digits.push('.');
    }
    FloatText {
        digits,
        zeros: precision - exact,
        suffix: String::new(),
    }
}

/// Mantissa digits and decimal exponent of `value` rounded to `precision`
/// fractional digits, capped at [`EXACT_DIGITS`].
fn split_exponent(value: f64, precision: usize) -> (String, i32) {
    let exact = precision.min(EXACT_DIGITS);
    let s = format!("{value:.exact$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_owned(), exp.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn exponential(value: f64, precision: usize, uppercase: bool, alt: bool) -> FloatText {
    let (mut digits, exp) = split_exponent(value, precision);
    if alt && precision == 0 {
        digits.push('.');
    }
    let mut suffix = String::with_capacity(5);
    suffix.push(if uppercase { 'E' } else { 'e' });
    suffix.push(if exp < 0 { '-' } else { '+' });
    suffix.push_str(&format!("{:02}", exp.unsigned_abs()));
    FloatText {
        digits,
        zeros: precision - precision.min(EXACT_DIGITS),
        suffix,
    }
}

fn general(value: f64, precision: usize, uppercase: bool, alt: bool) -> FloatText {
    let p = precision.max(1);
    let exp = if value == 0.0 {
        0
    } else {
        split_exponent(value, p - 1).1
    };
    let exp_abs = usize::try_from(exp.unsigned_abs()).unwrap_or(usize::MAX);
    let text = if exp < -4 || (exp >= 0 && exp_abs >= p) {
        exponential(value, p - 1, uppercase, alt)
    } else if exp < 0 {
        fixed(value, (p - 1).saturating_add(exp_abs), alt)
    } else {
        fixed(value, p - 1 - exp_abs, alt)
    };
    if alt { text } else { text.stripped() }
}

/// Drop trailing fractional zeros (and a bare point) from the mantissa.
fn strip_trailing_zeros(s: &str) -> String {
    let (mantissa, exp) = s.find(['e', 'E']).map_or((s, ""), |at| s.split_at(at));
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{mantissa}{exp}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Arg<'_> {
        Arg::from(text)
    }

    fn rendered(fmt: &[u8], args: &[Arg<'_>]) -> Result<String, RenderError> {
        let mut out = Sink::unbounded();
        render(fmt, args, &mut out)?;
        Ok(String::from_utf8_lossy(out.as_bytes()).into_owned())
    }

    fn ok(fmt: &str, args: &[Arg<'_>]) -> String {
        rendered(fmt.as_bytes(), args).unwrap()
    }

    #[test]
    fn test_parse_simple_int() {
        let (d, used) = parse_directive(b"d").unwrap();
        assert_eq!(used, 1);
        assert_eq!(d.conversion, b'd');
        assert_eq!(d.width, Count::Absent);
        assert_eq!(d.precision, Count::Absent);
    }

    #[test]
    fn test_parse_width_precision_length() {
        let (d, used) = parse_directive(b"-+#010.5llx tail").unwrap();
        assert_eq!(used, 11);
        assert!(d.flags.left_justify && d.flags.force_sign && d.flags.alt_form);
        assert!(!d.flags.zero_pad);
        assert_eq!(d.width, Count::Fixed(10));
        assert_eq!(d.precision, Count::Fixed(5));
        assert_eq!(d.length, LengthMod::Ll);
    }

    #[test]
    fn test_parse_star_counts() {
        let (d, _) = parse_directive(b"*.*f").unwrap();
        assert_eq!(d.width, Count::FromArg);
        assert_eq!(d.precision, Count::FromArg);
        let (d, _) = parse_directive(b".s").unwrap();
        assert_eq!(d.precision, Count::Fixed(0));
    }

    #[test]
    fn test_parse_rejects_unknown_conversion() {
        assert!(parse_directive(b"q").is_none());
        assert!(parse_directive(b"5").is_none());
        assert!(parse_directive(b"").is_none());
    }

    #[test]
    fn test_parse_format_pieces() {
        let pieces = parse_format(b"a %d b %% c %y");
        assert_eq!(pieces.len(), 7);
        assert_eq!(pieces[0], Piece::Literal(b"a "));
        assert!(matches!(pieces[1], Piece::Directive(d) if d.conversion == b'd'));
        assert_eq!(pieces[2], Piece::Literal(b" b "));
        assert_eq!(pieces[3], Piece::Percent);
        assert_eq!(pieces[4], Piece::Literal(b" c "));
        assert_eq!(pieces[5], Piece::Malformed { offset: 12 });
        assert_eq!(pieces[6], Piece::Literal(b"y"));
    }

    #[test]
    fn test_write_directive_detection() {
        assert!(contains_write_directive(b"%n"));
        assert!(contains_write_directive(b"abc%5n"));
        assert!(contains_write_directive(b"%hhn"));
        assert!(contains_write_directive(b"%5$n"));
        assert!(contains_write_directive(b"%*.*lln"));
        assert!(contains_write_directive(b"%%%n"));
        assert!(!contains_write_directive(b"%%n"));
        assert!(!contains_write_directive(b"n%"));
        assert!(!contains_write_directive(b"plain"));
    }

    #[test]
    fn test_integers() {
        assert_eq!(ok("%d", &[Arg::Int(42)]), "42");
        assert_eq!(ok("%d", &[Arg::Int(-123)]), "-123");
        assert_eq!(ok("%8d|", &[Arg::Int(42)]), "      42|");
        assert_eq!(ok("%08d", &[Arg::Int(-42)]), "-0000042");
        assert_eq!(ok("%-8d|", &[Arg::Int(42)]), "42      |");
        assert_eq!(ok("%+d % d", &[Arg::Int(42), Arg::Int(42)]), "+42  42");
        assert_eq!(ok("%.0d|", &[Arg::Int(0)]), "|");
        assert_eq!(ok("%08.3d", &[Arg::Int(7)]), "     007");
        assert_eq!(ok("%d", &[Arg::Int(i64::MIN)]), "-9223372036854775808");
        assert_eq!(ok("%hhd", &[Arg::Int(300)]), "44");
    }

    #[test]
    fn test_unsigned_radix() {
        assert_eq!(ok("%#x %#X", &[Arg::Uint(255), Arg::Uint(255)]), "0xff 0XFF");
        assert_eq!(ok("%#o", &[Arg::Uint(8)]), "010");
        assert_eq!(ok("%#o", &[Arg::Uint(0)]), "0");
        assert_eq!(ok("%#x", &[Arg::Uint(0)]), "0");
        assert_eq!(ok("%u", &[Arg::Int(-1)]), "18446744073709551615");
        assert_eq!(ok("%hu", &[Arg::Uint(70000)]), "4464");
    }

    #[test]
    fn test_strings_and_chars() {
        assert_eq!(ok("%s", &[s("hello")]), "hello");
        assert_eq!(
            ok("%.3s|%5s|%-5s|", &[s("hello"), s("ab"), s("ab")]),
            "hel|   ab|ab   |"
        );
        assert_eq!(ok("%c%3c", &[Arg::Char(b'A'), Arg::Char(b'B')]), "A  B");
        assert_eq!(ok("%s", &[Arg::from(&b"ab\0cd"[..])]), "ab");
        assert_eq!(ok("%ls%s", &[s("12"), s("34")]), "1234");
    }

    #[test]
    fn test_star_width_and_precision() {
        assert_eq!(ok("%*d|", &[Arg::Int(5), Arg::Int(42)]), "   42|");
        assert_eq!(ok("%*d|", &[Arg::Int(-5), Arg::Int(42)]), "42   |");
        assert_eq!(ok("%.*s", &[Arg::Int(2), s("hello")]), "he");
        assert_eq!(ok("%.*s", &[Arg::Int(-1), s("hello")]), "hello");
    }

    #[test]
    fn test_pointers() {
        assert_eq!(ok("%p", &[Arg::Ptr(0)]), "(nil)");
        assert_eq!(ok("%p", &[Arg::Ptr(0xDEAD)]), "0xdead");
    }

    #[test]
    fn test_floats() {
        assert_eq!(ok("%f", &[Arg::Float(core::f64::consts::PI)]), "3.141593");
        assert_eq!(ok("%.2f", &[Arg::Float(-2.5)]), "-2.50");
        assert_eq!(ok("%#.0f", &[Arg::Float(3.0)]), "3.");
        assert_eq!(ok("%e", &[Arg::Float(1234.5)]), "1.234500e+03");
        assert_eq!(ok("%.1E", &[Arg::Float(0.000123)]), "1.2E-04");
        assert_eq!(ok("%e", &[Arg::Float(0.0)]), "0.000000e+00");
        assert_eq!(ok("%g", &[Arg::Float(0.0001234)]), "0.0001234");
        assert_eq!(ok("%g", &[Arg::Float(100000.0)]), "100000");
        assert_eq!(ok("%g", &[Arg::Float(1e6)]), "1e+06");
        assert_eq!(ok("%g", &[Arg::Float(0.0)]), "0");
        assert_eq!(ok("%08.2f", &[Arg::Float(-1.5)]), "-0001.50");
        assert_eq!(ok("%f %F", &[Arg::Float(f64::NAN), Arg::Float(f64::INFINITY)]), "nan INF");
        assert_eq!(ok("%5f", &[Arg::Float(f64::NEG_INFINITY)]), " -inf");
    }

    #[test]
    fn test_control_string_rejections() {
        assert_eq!(
            rendered(b"%s%n\n", &[s("x")]),
            Err(RenderError::WriteDirective)
        );
        assert_eq!(
            rendered(b"ok %q", &[]),
            Err(RenderError::Malformed { offset: 3 })
        );
        assert_eq!(rendered(b"trailing %", &[]), Err(RenderError::Malformed { offset: 9 }));
    }

    #[test]
    fn test_percent_n_literal_is_fine() {
        assert_eq!(ok("%s%%n\n", &[s("")]), "%n\n");
        assert_eq!(ok("%%n\n", &[]), "%n\n");
    }

    #[test]
    fn test_argument_rejections() {
        assert_eq!(
            rendered(b"%s", &[Arg::Str(None)]),
            Err(RenderError::NullString { index: 1 })
        );
        let err = rendered(b"%d %s", &[Arg::Int(1), s("50%n")]).unwrap_err();
        assert_eq!(err, RenderError::EmbeddedWrite { index: 2 });
        assert_eq!(err.kind(), ViolationKind::InvalidArgument);
        assert_eq!(err.role(), BufferRole::Argument(2));
        assert_eq!(
            rendered(b"%d %d", &[Arg::Int(1)]),
            Err(RenderError::MissingArgument { index: 2, conversion: 'd' })
        );
        assert_eq!(
            rendered(b"%d", &[Arg::Float(1.5)]),
            Err(RenderError::Mismatch { index: 1, conversion: 'd' })
        );
        // Surplus arguments are ignored.
        assert_eq!(ok("%d", &[Arg::Int(1), Arg::Int(2)]), "1");
    }

    #[test]
    fn test_sink_keeps_limit_counts_all() {
        let mut out = Sink::bounded(4);
        render(b"%s-%5d", &[s("abc"), Arg::Int(7)], &mut out).unwrap();
        assert_eq!(out.as_bytes(), b"abc-");
        assert_eq!(out.total(), 9);
        assert!(out.truncated());
    }

    #[test]
    fn test_float_precision_past_exact_digits() {
        let long = ok("%.1102f", &[Arg::Float(0.1)]);
        assert_eq!(long, format!("{:.1100}00", 0.1));

        let e = ok("%.1101e", &[Arg::Float(1.0)]);
        assert_eq!(e.len(), 2 + 1101 + 4);
        assert!(e.starts_with("1.000") && e.ends_with("0e+00"));

        assert_eq!(ok("%.2000g", &[Arg::Float(0.5)]), "0.5");
        let alt = ok("%#.1102g", &[Arg::Float(1.0)]);
        assert_eq!(alt, format!("1.{}", "0".repeat(1101)));
    }

    #[test]
    fn test_huge_precision_is_counted_not_stored() {
        let mut out = Sink::bounded(8);
        render(b"%.70000f", &[Arg::Float(1.0)], &mut out).unwrap();
        assert_eq!(out.as_bytes(), b"1.000000");
        assert_eq!(out.total(), 70_002);

        let mut out = Sink::bounded(4);
        let args = [Arg::Int(100_000), Arg::Float(1.0), Arg::Int(5)];
        render(b"%.*e|%.4000000000d", &args, &mut out).unwrap();
        assert_eq!(out.total(), 100_006 + 1 + 4_000_000_000);
        assert_eq!(out.as_bytes(), b"1.00");
    }
}
