use alloy_primitives::B256;

/// Remembers the last transaction hash that produced a delivery on one
/// subscription. Only back-to-back repeats are suppressed.
#[derive(Debug, Default)]
pub struct DedupFilter {
    last_delivered: Option<B256>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, transaction_hash: &B256) -> bool {
        self.last_delivered.as_ref() == Some(transaction_hash)
    }

    pub fn mark_delivered(&mut self, transaction_hash: B256) {
        self.last_delivered = Some(transaction_hash);
    }

    pub fn last_delivered(&self) -> Option<B256> {
        self.last_delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_filter_accepts_everything() {
        let filter = DedupFilter::new();
        assert!(!filter.is_duplicate(&B256::ZERO));
        assert_eq!(filter.last_delivered(), None);
    }

    #[test]
    fn test_repeat_of_last_delivered_is_duplicate() {
        let mut filter = DedupFilter::new();
        let first = B256::repeat_byte(1);
        let second = B256::repeat_byte(2);

        filter.mark_delivered(first);
        assert!(filter.is_duplicate(&first));
        assert!(!filter.is_duplicate(&second));

        // Only the most recent delivery is remembered.
        filter.mark_delivered(second);
        assert!(!filter.is_duplicate(&first));
        assert!(filter.is_duplicate(&second));
    }
}
