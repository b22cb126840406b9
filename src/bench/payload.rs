//! Textual sequence payloads
//!
//! Each message carries its sequence number as decimal text, so every
//! handoff moves a heap-allocated string between the two cores.

use crate::core::{Error, Result};

/// Encode a sequence number
#[inline]
pub fn encode(seq: u64) -> String {
    seq.to_string()
}

/// Decode a payload produced by [`encode`]
#[inline]
pub fn decode(payload: &str) -> Result<u64> {
    payload
        .parse()
        .map_err(|_| Error::InvalidPayload(payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_rejects_garbage() {
        for bad in ["", "-1", "1.0", "12a", " 3"] {
            assert!(matches!(decode(bad), Err(Error::InvalidPayload(_))), "{bad:?}");
        }
    }

    #[test]
    fn terminal_value_is_distinct() {
        let last = 2_500_000;
        assert_ne!(encode(last), encode(last - 1));
        assert_eq!(decode(&encode(last)).unwrap(), last);
    }

    proptest! {
        #[test]
        fn roundtrip(seq in 1u64..=u64::MAX) {
            prop_assert_eq!(decode(&encode(seq)).unwrap(), seq);
        }
    }
}
