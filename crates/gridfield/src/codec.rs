//! Native-endian binary field readers and writers.
//!
//! Every reader checks the remaining length first and reports a
//! [`GridError::Decode`] naming the field instead of panicking.

use bytes::{Buf, BufMut};

use crate::error::{GridError, GridResult};
use crate::Real;

pub(crate) fn put_str(buf: &mut impl BufMut, s: &str) {
    buf.put_i32_ne(s.len() as i32);
    buf.put_slice(s.as_bytes());
}

pub(crate) fn put_reals(buf: &mut impl BufMut, vals: &[Real]) {
    for v in vals {
        buf.put_f32_ne(*v);
    }
}

fn need(buf: &impl Buf, n: usize, what: &str) -> GridResult<()> {
    if buf.remaining() < n {
        return Err(GridError::decode(format!(
            "truncated payload reading {what}: need {n} bytes, {} left",
            buf.remaining()
        )));
    }
    Ok(())
}

pub(crate) fn get_i32(buf: &mut impl Buf, what: &str) -> GridResult<i32> {
    need(buf, 4, what)?;
    Ok(buf.get_i32_ne())
}

pub(crate) fn get_i64(buf: &mut impl Buf, what: &str) -> GridResult<i64> {
    need(buf, 8, what)?;
    Ok(buf.get_i64_ne())
}

pub(crate) fn get_f64(buf: &mut impl Buf, what: &str) -> GridResult<f64> {
    need(buf, 8, what)?;
    Ok(buf.get_f64_ne())
}

pub(crate) fn get_real(buf: &mut impl Buf, what: &str) -> GridResult<Real> {
    need(buf, 4, what)?;
    Ok(buf.get_f32_ne())
}

/// Read a non-negative count.
pub(crate) fn get_count(buf: &mut impl Buf, what: &str) -> GridResult<usize> {
    let n = get_i32(buf, what)?;
    usize::try_from(n).map_err(|_| GridError::decode(format!("negative {what}: {n}")))
}

pub(crate) fn get_str(buf: &mut impl Buf, what: &str) -> GridResult<String> {
    let len = get_count(buf, what)?;
    need(buf, len, what)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|e| GridError::decode(format!("{what} is not UTF-8: {e}")))
}

pub(crate) fn get_reals(buf: &mut impl Buf, n: usize, what: &str) -> GridResult<Vec<Real>> {
    let bytes = n
        .checked_mul(4)
        .ok_or_else(|| GridError::decode(format!("{what} count {n} overflows")))?;
    need(buf, bytes, what)?;
    Ok((0..n).map(|_| buf.get_f32_ne()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_string_and_reals() {
        let mut buf = BytesMut::new();
        put_str(&mut buf, "K");
        put_reals(&mut buf, &[1.5, -2.0]);

        let mut rd = buf.freeze();
        assert_eq!(get_str(&mut rd, "units").unwrap(), "K");
        assert_eq!(get_reals(&mut rd, 2, "values").unwrap(), vec![1.5, -2.0]);
        assert!(!rd.has_remaining());
    }

    #[test]
    fn test_truncation_is_reported() {
        let mut buf = BytesMut::new();
        buf.put_i32_ne(10);
        buf.put_slice(b"abc");
        let mut rd = buf.freeze();
        let err = get_str(&mut rd, "quantity").unwrap_err();
        assert!(matches!(err, GridError::Decode(msg) if msg.contains("quantity")));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_i32_ne(-4);
        let mut rd = buf.freeze();
        assert!(get_count(&mut rd, "longitude count").is_err());
    }
}
