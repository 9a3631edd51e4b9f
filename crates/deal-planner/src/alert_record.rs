use dashmap::DashSet;

/// URLs an alert has been dispatched for, for the lifetime of the process.
#[derive(Debug, Default)]
pub struct AlertRecord {
    urls: DashSet<String>,
}

impl AlertRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to alert for `url`. Only the first caller gets `true`,
    /// however many cycles race on the same URL.
    pub fn try_claim(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_claim_once() {
        let record = AlertRecord::new();
        assert!(record.try_claim("https://a"));
        assert!(!record.try_claim("https://a"));
        assert!(record.contains("https://a"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let record = Arc::new(AlertRecord::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let record = record.clone();
                std::thread::spawn(move || record.try_claim("https://race"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
