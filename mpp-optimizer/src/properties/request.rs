/// Number of distinct requirement alternatives an operator generates per property kind.
///
/// An operator is optimized once for every combination of per-kind alternatives, so the total
/// number of requests is the product of the four counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestCounts {
    pub order: usize,
    pub distribution: usize,
    pub rewindability: usize,
    pub partition_propagation: usize,
}

impl Default for RequestCounts {
    fn default() -> Self {
        Self {
            order: 1,
            distribution: 1,
            rewindability: 1,
            partition_propagation: 1,
        }
    }
}

/// One decomposed request number: the alternative index to use for each property kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PropertyRequest {
    pub order: usize,
    pub distribution: usize,
    pub rewindability: usize,
    pub partition_propagation: usize,
}

impl RequestCounts {
    pub fn with_distribution(mut self, distribution: usize) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn total(&self) -> usize {
        self.order * self.distribution * self.rewindability * self.partition_propagation
    }

    /// Decomposes `request_number` in mixed radix.
    ///
    /// Order is the most significant digit, followed by distribution and rewindability, and
    /// partition propagation varies fastest:
    ///
    /// ```text
    /// request_number = ((order * D + distribution) * R + rewindability) * P + partition_propagation
    /// ```
    pub fn lookup(&self, request_number: usize) -> PropertyRequest {
        assert!(
            self.order > 0
                && self.distribution > 0
                && self.rewindability > 0
                && self.partition_propagation > 0,
            "Every property kind must have at least one request: {:?}",
            self
        );
        assert!(
            request_number < self.total(),
            "Request number {} out of range, total requests: {}",
            request_number,
            self.total()
        );

        let partition_propagation = request_number % self.partition_propagation;
        let rest = request_number / self.partition_propagation;
        let rewindability = rest % self.rewindability;
        let rest = rest / self.rewindability;
        let distribution = rest % self.distribution;
        let order = rest / self.distribution;

        PropertyRequest {
            order,
            distribution,
            rewindability,
            partition_propagation,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::properties::{PropertyRequest, RequestCounts};

    #[test]
    fn test_single_request() {
        let counts = RequestCounts::default();
        assert_eq!(1, counts.total());
        assert_eq!(PropertyRequest::default(), counts.lookup(0));
    }

    #[test]
    fn test_lookup_mixed_radix() {
        let counts = RequestCounts {
            order: 2,
            distribution: 3,
            rewindability: 1,
            partition_propagation: 2,
        };
        assert_eq!(12, counts.total());

        assert_eq!(
            PropertyRequest {
                order: 0,
                distribution: 0,
                rewindability: 0,
                partition_propagation: 1
            },
            counts.lookup(1)
        );
        assert_eq!(
            PropertyRequest {
                order: 0,
                distribution: 1,
                rewindability: 0,
                partition_propagation: 0
            },
            counts.lookup(2)
        );
        assert_eq!(
            PropertyRequest {
                order: 1,
                distribution: 2,
                rewindability: 0,
                partition_propagation: 1
            },
            counts.lookup(11)
        );
    }

    #[test]
    fn test_lookup_visits_every_combination_once() {
        let counts = RequestCounts {
            order: 2,
            distribution: 2,
            rewindability: 3,
            partition_propagation: 2,
        };

        let mut seen = std::collections::HashSet::new();
        for request_number in 0..counts.total() {
            assert!(seen.insert(counts.lookup(request_number)));
        }
        assert_eq!(24, seen.len());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_lookup_out_of_range() {
        RequestCounts::default().with_distribution(2).lookup(2);
    }
}
