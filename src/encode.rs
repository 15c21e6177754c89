//! Record encoders.
//!
//! The writer is generic over the record type; an encoder turns each record
//! into the bytes appended to the active file.

/// Turns a record into bytes.
pub trait RecordEncoder<T: ?Sized>: Send {
    /// Append the encoded form of `record` to `buf`.
    fn encode(&self, record: &T, buf: &mut Vec<u8>);
}

/// Text records, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineEncoder;

impl<T: AsRef<str> + ?Sized> RecordEncoder<T> for LineEncoder {
    fn encode(&self, record: &T, buf: &mut Vec<u8>) {
        buf.extend_from_slice(record.as_ref().as_bytes());
        buf.push(b'\n');
    }
}

/// Byte records written verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

impl<T: AsRef<[u8]> + ?Sized> RecordEncoder<T> for RawEncoder {
    fn encode(&self, record: &T, buf: &mut Vec<u8>) {
        buf.extend_from_slice(record.as_ref());
    }
}

/// Encoder backed by a closure.
pub struct FnEncoder<F>(pub F);

impl<T, F> RecordEncoder<T> for FnEncoder<F>
where
    T: ?Sized,
    F: Fn(&T, &mut Vec<u8>) + Send,
{
    fn encode(&self, record: &T, buf: &mut Vec<u8>) {
        (self.0)(record, buf)
    }
}
