use super::decode_line;

/// Accumulates forward reads and yields complete lines.
///
/// Bytes after the last `\n` of a read are kept as the pending partial line
/// and prefixed to the next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them, in file order.
    pub fn push(
        &mut self,
        bytes: &[u8],
    ) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let Some(last_break) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last_break).collect();
        complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Bytes consumed from the file that do not form a complete line yet
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
