use crate::logservice::LogItem;

/// Hard ceiling on lines per write.
pub const MAX_BATCH_LINES: usize = 1024;
/// Hard ceiling on bytes per write.
pub const MAX_BATCH_BYTES: usize = 512 * 1024;

/// Groups log items into writes bounded by line count and size.
#[derive(Debug)]
pub struct LogBatcher {
    max_lines: usize,
    max_bytes: usize,
    items: Vec<LogItem>,
    bytes: usize,
}

impl LogBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self::with_limits(batch_size.clamp(1, MAX_BATCH_LINES), MAX_BATCH_BYTES)
    }

    pub fn with_limits(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
            max_bytes,
            items: Vec::new(),
            bytes: 0,
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Add an item, returning the pending batch when it is full.
    ///
    /// An item larger than the byte ceiling ends up in a batch of its own.
    pub fn push(&mut self, item: LogItem) -> Option<Vec<LogItem>> {
        let size = item.approx_size();
        let full = !self.items.is_empty()
            && (self.items.len() >= self.max_lines || self.bytes + size > self.max_bytes);
        let ready = if full { self.take() } else { None };

        self.bytes += size;
        self.items.push(item);
        ready
    }

    /// Drain whatever is pending.
    pub fn take(&mut self) -> Option<Vec<LogItem>> {
        if self.items.is_empty() {
            return None;
        }
        self.bytes = 0;
        Some(std::mem::take(&mut self.items))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(value_len: usize) -> LogItem {
        LogItem {
            time: 0,
            contents: vec![("k".to_string(), "v".repeat(value_len))],
        }
    }

    #[test]
    fn test_line_limit() {
        let mut batcher = LogBatcher::with_limits(2, usize::MAX);
        assert!(batcher.push(item(1)).is_none());
        assert!(batcher.push(item(1)).is_none());
        let batch = batcher.push(item(1)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batcher.take().unwrap().len(), 1);
        assert!(batcher.take().is_none());
    }

    #[test]
    fn test_byte_limit() {
        let size = item(100).approx_size();
        let mut batcher = LogBatcher::with_limits(100, size * 2);
        assert!(batcher.push(item(100)).is_none());
        assert!(batcher.push(item(100)).is_none());
        assert_eq!(batcher.push(item(100)).unwrap().len(), 2);
    }

    #[test]
    fn test_oversized_item_goes_alone() {
        let mut batcher = LogBatcher::with_limits(100, 50);
        assert!(batcher.push(item(1)).is_none());
        assert_eq!(batcher.push(item(500)).unwrap().len(), 1);
        let alone = batcher.push(item(1)).unwrap();
        assert_eq!(alone.len(), 1);
        assert_eq!(alone[0].contents[0].1.len(), 500);
    }

    #[test]
    fn test_batch_size_is_capped() {
        assert_eq!(LogBatcher::new(5000).max_lines(), MAX_BATCH_LINES);
        assert_eq!(LogBatcher::new(10).max_lines(), 10);
        assert_eq!(LogBatcher::new(0).max_lines(), 1);
    }
}
