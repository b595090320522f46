use crate::error::ConsumerError;

/// Incremental UTF-8 decoder for chunked bodies.
///
/// A multibyte character split across chunks is held back until the rest of
/// its bytes arrive; invalid bytes are an error rather than a replacement
/// character.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as forms complete characters.
    pub fn push(&mut self, chunk: &[u8]) -> Result<String, ConsumerError> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(ConsumerError::Decode),
        };
        let tail = self.pending.split_off(valid);
        let head = std::mem::replace(&mut self.pending, tail);
        String::from_utf8(head).map_err(|_| ConsumerError::Decode)
    }

    /// Bytes still waiting for the rest of their character.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Fails if the body ended inside a character.
    pub fn finish(self) -> Result<(), ConsumerError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ConsumerError::Decode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_characters_split_across_chunks() {
        let bytes = "有益效果".as_bytes();
        let mut decoder = Utf8Accumulator::new();
        let mut out = String::new();
        for chunk in bytes.chunks(2) {
            out.push_str(&decoder.push(chunk).unwrap());
        }
        assert_eq!(out, "有益效果");
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn holds_back_an_incomplete_tail() {
        let bytes = "保".as_bytes();
        let mut decoder = Utf8Accumulator::new();
        assert_eq!(decoder.push(&bytes[..1]).unwrap(), "");
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.push(&bytes[1..]).unwrap(), "保");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn rejects_invalid_bytes() {
        let mut decoder = Utf8Accumulator::new();
        assert_eq!(decoder.push(&[0x61, 0xff, 0x62]), Err(ConsumerError::Decode));
    }

    #[test]
    fn truncated_character_at_end_is_an_error() {
        let mut decoder = Utf8Accumulator::new();
        decoder.push(&"点".as_bytes()[..2]).unwrap();
        assert_eq!(decoder.finish(), Err(ConsumerError::Decode));
    }
}
